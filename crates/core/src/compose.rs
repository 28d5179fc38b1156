//! Slide composer: copies slides between decks.
//!
//! Inline shapes are cloned as they are. Picture payloads live in the source
//! deck's media store, so each one is looked up there and registered again in
//! the destination store before the picture is placed at its original z-index
//! and bounds.

use crate::deck::{Deck, SlideId};
use crate::shape::{Picture, Shape, ShapeId, ShapeKind};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;

/// A shape that could not be copied and was left out of the composed slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShapeCopyWarning {
    /// Slide the shape was copied from.
    pub source_slide: SlideId,
    pub shape: ShapeId,
    pub shape_name: String,
    pub reason: String,
}

impl fmt::Display for ShapeCopyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error copying shape '{}' from slide {}: {}",
            self.shape_name, self.source_slide.0, self.reason
        )
    }
}

/// Outcome of a composition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposeReport {
    /// Destination slides created, in the order of their sources.
    pub slides: Vec<SlideId>,
    pub warnings: Vec<ShapeCopyWarning>,
}

/// Copies slides from source decks into a destination deck.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlideComposer;

impl SlideComposer {
    pub fn new() -> Self {
        Self
    }

    /// Append a copy of every `(deck, slide)` source to `dest`, in order.
    ///
    /// Unknown source slides abort before anything is appended. Shapes that
    /// fail to copy are skipped and reported.
    pub fn compose(&self, dest: &mut Deck, sources: &[(&Deck, SlideId)]) -> Result<ComposeReport> {
        for (deck, id) in sources {
            if deck.slide(*id).is_none() {
                return Err(Error::SlideNotFound(id.0));
            }
        }

        let mut report = ComposeReport::default();
        for (source, id) in sources {
            let (slide, warnings) = self.copy_slide(dest, source, *id)?;
            report.slides.push(slide);
            report.warnings.extend(warnings);
        }
        Ok(report)
    }

    /// Append copies of all slides of `source`, in presentation order.
    pub fn compose_all(&self, dest: &mut Deck, source: &Deck) -> Result<ComposeReport> {
        let sources: Vec<(&Deck, SlideId)> = source.order().iter().map(|id| (source, *id)).collect();
        self.compose(dest, &sources)
    }

    /// Copy one slide into a freshly appended destination slide.
    fn copy_slide(
        &self,
        dest: &mut Deck,
        source: &Deck,
        id: SlideId,
    ) -> Result<(SlideId, Vec<ShapeCopyWarning>)> {
        let src = source.slide(id).ok_or(Error::SlideNotFound(id.0))?;
        let new_id = dest.add_slide();
        let mut warnings = Vec::new();

        for shape in src.shapes() {
            match self.copy_shape(dest, source, shape) {
                Ok(copy) => {
                    let slide = dest.slide_mut(new_id).ok_or(Error::SlideNotFound(new_id.0))?;
                    slide.copy_shape(copy);
                }
                Err(reason) => {
                    let warning = ShapeCopyWarning {
                        source_slide: id,
                        shape: shape.id,
                        shape_name: shape.name.clone(),
                        reason,
                    };
                    log::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        log::debug!(
            "Copied slide {} as slide {} ({} shapes skipped)",
            id.0,
            new_id.0,
            warnings.len()
        );
        Ok((new_id, warnings))
    }

    /// Prepare a copy of `shape` for the destination deck.
    fn copy_shape(
        &self,
        dest: &mut Deck,
        source: &Deck,
        shape: &Shape,
    ) -> std::result::Result<Shape, String> {
        match &shape.kind {
            ShapeKind::Picture(picture) => {
                let part = source
                    .media()
                    .get(picture.media)
                    .ok_or_else(|| format!("missing image payload {}", picture.media.0))?;
                let media = dest.media_mut().add(part.bytes.clone(), part.format);
                let mut copy = shape.clone();
                copy.kind = ShapeKind::Picture(Picture {
                    media,
                    description: picture.description.clone(),
                });
                Ok(copy)
            }
            ShapeKind::Opaque(opaque) => {
                let refs = opaque.relationship_refs().map_err(|e| e.to_string())?;
                if !refs.is_empty() {
                    return Err(format!(
                        "references parts of the source package ({})",
                        refs.join(", ")
                    ));
                }
                Ok(shape.clone())
            }
            ShapeKind::Text(_) | ShapeKind::Line(_) => Ok(shape.clone()),
        }
    }
}
