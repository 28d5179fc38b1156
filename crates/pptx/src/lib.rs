//! PPTX (Office Open XML) backend for decks.
//!
//! A .pptx file is a ZIP archive of XML parts. [`PptxReader`] turns one into
//! a [`deck_core::Deck`] and [`PptxWriter`] turns a deck back into one.

mod package;
pub mod reader;
pub mod writer;

pub use reader::PptxReader;
pub use writer::PptxWriter;
