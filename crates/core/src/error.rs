//! Error types for deck assembly.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, editing or persisting decks.
#[derive(Error, Debug)]
pub enum Error {
    /// A selection token is neither an integer nor an `a-b` range.
    #[error("Malformed selection token: '{token}'")]
    MalformedSelection { token: String },

    /// A layout was given a different number of chart images than it places.
    #[error("Layout {layout} requires exactly {required} image(s), got {supplied}")]
    InsufficientImages {
        layout: u8,
        required: usize,
        supplied: usize,
    },

    /// Insert positions cannot be paired with the selected slides.
    #[error(
        "Number of insert positions ({positions}) must be 1 or match the number of slides ({slides})"
    )]
    PositionCountMismatch { positions: usize, slides: usize },

    /// An insert position lies beyond the end of the deck.
    #[error("Insert position {position} is beyond the last slide ({max})")]
    PositionOutOfRange { position: usize, max: usize },

    /// A slide id does not resolve to a slide of the deck.
    #[error("Slide {0} not found")]
    SlideNotFound(u32),

    /// A chart file is not an image format that can be embedded.
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    /// Failed to read or write one of the stores.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    Zip(String),

    /// XML parsing or generation error (for PPTX).
    #[error("XML error: {0}")]
    Xml(String),

    /// Invalid or corrupted file.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),
}
