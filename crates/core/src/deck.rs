//! The in-memory deck model.
//!
//! A [`Deck`] keeps its slides in an arena in physical storage order and a
//! separate `order` list giving the presentation order, mirroring how a PPTX
//! package stores `slideN.xml` parts independently of `p:sldIdLst`.

use crate::shape::{MediaId, Picture, Shape, ShapeId, ShapeKind};
use crate::types::{ImageFormat, PageSize};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Smallest slide id allowed in `p:sldIdLst`.
pub const MIN_SLIDE_ID: u32 = 256;

/// Identifier of a slide within its deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlideId(pub u32);

/// One page of a deck: shapes in z-order.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    id: SlideId,
    shapes: Vec<Shape>,
}

impl Slide {
    /// Create an empty slide with the given id.
    pub fn new(id: SlideId) -> Self {
        Self {
            id,
            shapes: Vec::new(),
        }
    }

    pub fn id(&self) -> SlideId {
        self.id
    }

    /// Shapes in z-order (first is bottom-most).
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Next free shape id, above the ids of nested group members too. Id 1
    /// belongs to the slide's shape tree root.
    pub fn next_shape_id(&self) -> ShapeId {
        let max = self
            .shapes
            .iter()
            .flat_map(Shape::shape_ids)
            .max()
            .unwrap_or(1);
        ShapeId(max.max(1) + 1)
    }

    /// Add a new shape on top, assigning it a fresh id and default name.
    pub fn add_shape(&mut self, mut shape: Shape) -> ShapeId {
        shape.id = self.next_shape_id();
        if shape.name.is_empty() {
            shape.name = shape.default_name();
        }
        let id = shape.id;
        self.shapes.push(shape);
        id
    }

    /// Add a shape copied from another slide, keeping its ids when free.
    ///
    /// Ids already taken on this slide are moved past the highest one in
    /// use, inside the stored XML of foreign shapes as well.
    pub fn copy_shape(&mut self, mut shape: Shape) -> ShapeId {
        let taken: HashSet<u32> = self.shapes.iter().flat_map(Shape::shape_ids).collect();
        let incoming = shape.shape_ids();
        let mut next = taken
            .iter()
            .chain(&incoming)
            .copied()
            .max()
            .unwrap_or(1)
            .max(1)
            + 1;
        let mut remap = HashMap::new();
        for id in incoming {
            if (id < 2 || taken.contains(&id)) && !remap.contains_key(&id) {
                remap.insert(id, next);
                next += 1;
            }
        }

        let root = match &mut shape.kind {
            ShapeKind::Opaque(opaque) => {
                opaque.remap_ids(&remap);
                opaque.shape_ids().first().copied()
            }
            _ => None,
        };
        let id = root.unwrap_or(shape.id.0);
        shape.id = ShapeId(remap.get(&id).copied().unwrap_or(id));

        if shape.name.is_empty() {
            shape.name = shape.default_name();
        }
        let id = shape.id;
        self.shapes.push(shape);
        id
    }

    /// Keep only the shapes matching the predicate; returns how many were removed.
    pub fn retain_shapes<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&Shape) -> bool,
    {
        let before = self.shapes.len();
        self.shapes.retain(keep);
        before - self.shapes.len()
    }

    /// First non-empty text of the slide, flattened to one line.
    pub fn title(&self) -> Option<String> {
        self.shapes.iter().find_map(|shape| {
            let text = shape.inspect_text().ok().flatten()?;
            let text = text.trim();
            (!text.is_empty()).then(|| text.replace('\n', " "))
        })
    }

    /// Picture shapes of the slide.
    pub fn pictures(&self) -> impl Iterator<Item = (&Shape, &Picture)> {
        self.shapes.iter().filter_map(|shape| match &shape.kind {
            ShapeKind::Picture(picture) => Some((shape, picture)),
            _ => None,
        })
    }
}

/// An out-of-line binary part.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPart {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

/// Binary payloads of a deck, addressed by [`MediaId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaStore {
    parts: Vec<MediaPart>,
}

impl MediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload and return its id.
    pub fn add(&mut self, bytes: Vec<u8>, format: ImageFormat) -> MediaId {
        self.parts.push(MediaPart { bytes, format });
        MediaId(self.parts.len() - 1)
    }

    pub fn get(&self, id: MediaId) -> Option<&MediaPart> {
        self.parts.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MediaId, &MediaPart)> {
        self.parts.iter().enumerate().map(|(i, p)| (MediaId(i), p))
    }
}

/// A multi-slide presentation document.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    page: PageSize,
    slides: Vec<Slide>,
    order: Vec<SlideId>,
    media: MediaStore,
}

impl Deck {
    /// Create an empty deck.
    pub fn new(page: PageSize) -> Self {
        Self {
            page,
            slides: Vec::new(),
            order: Vec::new(),
            media: MediaStore::new(),
        }
    }

    /// Assemble a deck from stored parts, checking the ordering invariant.
    pub fn from_parts(
        page: PageSize,
        slides: Vec<Slide>,
        order: Vec<SlideId>,
        media: MediaStore,
    ) -> Result<Self> {
        let ids: HashSet<SlideId> = slides.iter().map(|s| s.id).collect();
        if ids.len() != slides.len() {
            return Err(Error::CorruptedFile("duplicate slide ids".to_string()));
        }

        let mut seen = HashSet::new();
        for id in &order {
            if !ids.contains(id) {
                return Err(Error::CorruptedFile(format!(
                    "slide order references missing slide {}",
                    id.0
                )));
            }
            if !seen.insert(*id) {
                return Err(Error::CorruptedFile(format!(
                    "slide {} listed twice in slide order",
                    id.0
                )));
            }
        }
        if order.len() != slides.len() {
            return Err(Error::CorruptedFile(format!(
                "{} slides stored but {} listed in slide order",
                slides.len(),
                order.len()
            )));
        }

        Ok(Self {
            page,
            slides,
            order,
            media,
        })
    }

    pub fn page(&self) -> PageSize {
        self.page
    }

    pub fn slide_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn next_slide_id(&self) -> SlideId {
        let max = self
            .slides
            .iter()
            .map(|s| s.id.0)
            .max()
            .unwrap_or(MIN_SLIDE_ID - 1);
        SlideId(max.max(MIN_SLIDE_ID - 1) + 1)
    }

    /// Append a new empty slide physically and at the end of the order.
    pub fn add_slide(&mut self) -> SlideId {
        let id = self.next_slide_id();
        self.slides.push(Slide::new(id));
        self.order.push(id);
        id
    }

    pub fn slide(&self, id: SlideId) -> Option<&Slide> {
        self.slides.iter().find(|s| s.id == id)
    }

    pub fn slide_mut(&mut self, id: SlideId) -> Option<&mut Slide> {
        self.slides.iter_mut().find(|s| s.id == id)
    }

    /// Slide at a 1-based position in presentation order.
    pub fn slide_at(&self, position: usize) -> Option<&Slide> {
        let id = *self.order.get(position.checked_sub(1)?)?;
        self.slide(id)
    }

    /// 1-based position of a slide in presentation order.
    pub fn position_of(&self, id: SlideId) -> Option<usize> {
        self.order.iter().position(|s| *s == id).map(|p| p + 1)
    }

    /// Presentation order.
    pub fn order(&self) -> &[SlideId] {
        &self.order
    }

    pub(crate) fn order_mut(&mut self) -> &mut Vec<SlideId> {
        &mut self.order
    }

    /// Slides in physical storage order.
    pub fn physical_slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Slides in presentation order.
    pub fn ordered_slides(&self) -> impl Iterator<Item = &Slide> {
        self.order.iter().filter_map(move |id| self.slide(*id))
    }

    /// Remove a slide from storage and from the order.
    pub fn remove_slide(&mut self, id: SlideId) -> Result<Slide> {
        let index = self
            .slides
            .iter()
            .position(|s| s.id == id)
            .ok_or(Error::SlideNotFound(id.0))?;
        self.order.retain(|s| *s != id);
        Ok(self.slides.remove(index))
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut MediaStore {
        &mut self.media
    }

    /// Payload bytes of a picture shape.
    pub fn picture_bytes(&self, picture: &Picture) -> Option<&[u8]> {
        self.media.get(picture.media).map(|m| m.bytes.as_slice())
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new(PageSize::default())
    }
}
