//! Deck editor: places composed slides in a deck's presentation order.
//!
//! Slides are always appended physically first; only the order list is
//! rearranged afterwards.

use crate::compose::{ComposeReport, SlideComposer};
use crate::deck::{Deck, SlideId};
use crate::{Error, Result};

/// Pair insert anchors with `slides` sources.
///
/// A single anchor applies to every slide; otherwise the counts must match.
pub fn expand_positions(positions: &[usize], slides: usize) -> Result<Vec<usize>> {
    match positions.len() {
        1 => Ok(vec![positions[0]; slides]),
        n if n == slides => Ok(positions.to_vec()),
        n => Err(Error::PositionCountMismatch {
            positions: n,
            slides,
        }),
    }
}

/// Append already-composed slides at the end of the presentation order.
///
/// Slides created by [`SlideComposer`] are appended as they are copied, so
/// this only checks that they sit at the tail in the given order.
pub fn append(deck: &mut Deck, composed: &[SlideId]) -> Result<()> {
    for id in composed {
        if deck.slide(*id).is_none() {
            return Err(Error::SlideNotFound(id.0));
        }
    }
    let order = deck.order_mut();
    order.retain(|id| !composed.contains(id));
    order.extend_from_slice(composed);
    Ok(())
}

/// A batch of insertions whose anchors all refer to the deck as it was when
/// the batch started.
///
/// Anchor `p` means "after original slide `p`" (0 is the front). Slides that
/// share an anchor keep the order they were inserted in.
#[derive(Debug)]
pub struct InsertBatch<'a> {
    deck: &'a mut Deck,
    original_len: usize,
    /// Anchors of the insertions made so far.
    placed: Vec<usize>,
}

impl<'a> InsertBatch<'a> {
    pub fn new(deck: &'a mut Deck) -> Self {
        let original_len = deck.slide_count();
        Self {
            deck,
            original_len,
            placed: Vec::new(),
        }
    }

    fn check_anchor(&self, after: usize) -> Result<()> {
        if after > self.original_len {
            return Err(Error::PositionOutOfRange {
                position: after,
                max: self.original_len,
            });
        }
        Ok(())
    }

    /// Move the slide at the tail of the order to its anchored index.
    fn place_last(&mut self, after: usize) -> Result<usize> {
        let prior = self.placed.iter().filter(|p| **p <= after).count();
        let index = after + prior;

        let order = self.deck.order_mut();
        let id = order
            .pop()
            .ok_or_else(|| Error::CorruptedFile("slide order is empty".to_string()))?;
        order.insert(index, id);
        self.placed.push(after);

        debug_assert_eq!(
            self.deck.order().len(),
            self.deck.physical_slides().len()
        );
        log::debug!("Placed slide {} at index {}", id.0, index);
        Ok(index)
    }

    /// Copy `slide` of `source` into the deck after original slide `after`.
    pub fn insert_copy(
        &mut self,
        source: &Deck,
        slide: SlideId,
        after: usize,
    ) -> Result<ComposeReport> {
        self.check_anchor(after)?;
        let report = SlideComposer::new().compose(self.deck, &[(source, slide)])?;
        self.place_last(after)?;
        Ok(report)
    }

    /// Insert a new empty slide after original slide `after`.
    pub fn insert_blank(&mut self, after: usize) -> Result<SlideId> {
        self.check_anchor(after)?;
        let id = self.deck.add_slide();
        self.place_last(after)?;
        Ok(id)
    }

    /// Number of slides inserted so far.
    pub fn inserted(&self) -> usize {
        self.placed.len()
    }
}

/// Copy each source slide into `deck` after its anchor.
///
/// Fails before any mutation when the anchors cannot be paired with the
/// sources or point past the end of the deck.
pub fn insert_slides(
    deck: &mut Deck,
    sources: &[(&Deck, SlideId)],
    positions: &[usize],
) -> Result<ComposeReport> {
    let anchors = expand_positions(positions, sources.len())?;
    let max = deck.slide_count();
    if let Some(&bad) = anchors.iter().find(|a| **a > max) {
        return Err(Error::PositionOutOfRange { position: bad, max });
    }
    for (source, id) in sources {
        if source.slide(*id).is_none() {
            return Err(Error::SlideNotFound(id.0));
        }
    }

    let mut batch = InsertBatch::new(deck);
    let mut report = ComposeReport::default();
    for ((source, id), after) in sources.iter().zip(anchors) {
        let copied = batch.insert_copy(source, *id, after)?;
        report.slides.extend(copied.slides);
        report.warnings.extend(copied.warnings);
    }
    Ok(report)
}

/// Delete slides at the given 1-based positions.
pub fn remove_slides(deck: &mut Deck, positions: &[usize]) -> Result<Vec<SlideId>> {
    let mut ids = Vec::with_capacity(positions.len());
    for &position in positions {
        let slide = deck.slide_at(position).ok_or(Error::PositionOutOfRange {
            position,
            max: deck.slide_count(),
        })?;
        ids.push(slide.id());
    }
    for id in &ids {
        deck.remove_slide(*id)?;
        log::debug!("Removed slide {}", id.0);
    }
    Ok(ids)
}
