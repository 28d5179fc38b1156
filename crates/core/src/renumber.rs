//! Page-number overlays.

use crate::deck::{Deck, SlideId};
use crate::shape::{Role, Shape, COVER_MARKER_PREFIX, PAGE_NUMBER_HEIGHT, PAGE_NUMBER_WIDTH};
use crate::style::StyleConfig;
use crate::types::{Emu, PageSize, Rect};
use crate::Result;
use serde::Serialize;

/// Outcome of a renumbering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenumberReport {
    /// Stale overlays removed.
    pub removed: usize,
    /// `(slide, number)` for every overlay added.
    pub numbered: Vec<(SlideId, usize)>,
    /// Cover slides left without a number.
    pub covers: Vec<SlideId>,
    /// Slides left unnumbered because their shapes could not be inspected.
    pub skipped: Vec<SlideId>,
}

/// Removes stale page numbers and adds fresh ones to every non-cover slide.
#[derive(Debug, Clone, Default)]
pub struct Renumberer {
    style: StyleConfig,
}

impl Renumberer {
    pub fn new(style: StyleConfig) -> Self {
        Self { style }
    }

    /// Bounds of the overlay on a page: 2 cm × 1 cm in the bottom-right corner.
    pub fn overlay_bounds(page: PageSize) -> Rect {
        Rect::new(
            page.width - Emu::cm(2.5),
            page.height - Emu::cm(1.0),
            PAGE_NUMBER_WIDTH,
            PAGE_NUMBER_HEIGHT,
        )
    }

    /// Renumber every slide of the deck by its 1-based position.
    ///
    /// Cover slides count towards positions but get no overlay.
    pub fn renumber(&self, deck: &mut Deck) -> RenumberReport {
        let mut report = RenumberReport::default();
        let order = deck.order().to_vec();
        let bounds = Self::overlay_bounds(deck.page());

        for (index, id) in order.into_iter().enumerate() {
            let Some(slide) = deck.slide_mut(id) else {
                continue;
            };
            report.removed += slide.retain_shapes(|s| s.role != Role::PageNumber);

            match is_cover(slide.shapes()) {
                Ok(true) => {
                    log::debug!("Slide {} is a cover, not numbered", index + 1);
                    report.covers.push(id);
                }
                Ok(false) => {
                    let number = index + 1;
                    slide.add_shape(
                        Shape::text(bounds, number.to_string(), self.style.page_number())
                            .with_role(Role::PageNumber),
                    );
                    report.numbered.push((id, number));
                }
                Err(e) => {
                    log::warn!("Could not inspect slide {}, left unnumbered: {}", index + 1, e);
                    report.skipped.push(id);
                }
            }
        }

        log::debug!(
            "Renumbered {} slides, removed {} stale numbers",
            report.numbered.len(),
            report.removed
        );
        report
    }
}

/// Whether a slide carries a cover marker.
fn is_cover(shapes: &[Shape]) -> Result<bool> {
    for shape in shapes {
        if shape.role == Role::CoverMarker {
            return Ok(true);
        }
        if let Some(text) = shape.inspect_text()? {
            if text.contains(COVER_MARKER_PREFIX) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
