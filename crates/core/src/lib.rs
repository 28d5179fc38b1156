//! Core deck model and the slide assembly engine: selection expressions,
//! report layouts, cross-deck slide copy, insertion and page numbering.

pub mod compose;
pub mod deck;
pub mod editor;
pub mod error;
pub mod layout;
pub mod naming;
pub mod renumber;
pub mod selection;
pub mod shape;
pub mod style;
pub mod types;

pub use compose::{ComposeReport, ShapeCopyWarning, SlideComposer};
pub use deck::{Deck, MediaPart, MediaStore, Slide, SlideId};
pub use editor::InsertBatch;
pub use error::{Error, Result};
pub use layout::{ChartImage, LayoutKind, TemplateBuilder, TemplateFields};
pub use renumber::{RenumberReport, Renumberer};
pub use shape::{MediaId, OpaqueShape, Role, Shape, ShapeId, ShapeKind};
pub use style::StyleConfig;
pub use types::{Align, Emu, ImageFormat, PageSize, Rect, Rgb, TextStyle};
