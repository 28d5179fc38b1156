//! Shared typography and colours for generated shapes.

use crate::types::{Align, Rgb, TextStyle};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Font and colour defaults used by the template builder and the
/// page-number overlay.
///
/// Every field is optional in JSON; missing ones take the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Typeface for every text run.
    pub font: String,
    pub text_color: Rgb,
    /// Divider colour.
    pub accent_color: Rgb,
    pub cover_title_size: f64,
    pub cover_footer_size: f64,
    pub title_size: f64,
    pub body_size: f64,
    /// Exact line spacing of the executive summary bullets.
    pub body_line_spacing: f64,
    pub header_size: f64,
    pub quadrant_text_size: f64,
    pub source_size: f64,
    pub page_number_size: f64,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            font: "Calibri".to_string(),
            text_color: Rgb::BLACK,
            accent_color: Rgb::CRIMSON,
            cover_title_size: 32.0,
            cover_footer_size: 16.0,
            title_size: 24.0,
            body_size: 14.0,
            body_line_spacing: 12.0,
            header_size: 12.0,
            quadrant_text_size: 11.0,
            source_size: 8.0,
            page_number_size: 10.0,
        }
    }
}

impl StyleConfig {
    /// Create a config with the default report styling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different typeface.
    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = font.into();
        self
    }

    /// Use a different divider colour.
    pub fn with_accent_color(mut self, color: Rgb) -> Self {
        self.accent_color = color;
        self
    }

    /// Parse a JSON style document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::CorruptedFile(format!("Invalid style config: {}", e)))
    }

    /// Load a JSON style document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Plain text style of the given size.
    pub fn text(&self, size_pt: f64) -> TextStyle {
        TextStyle {
            font: self.font.clone(),
            size_pt,
            bold: false,
            italic: false,
            align: Align::Left,
            bullet: false,
            color: self.text_color,
            line_spacing_pt: None,
            paragraph_spacing_pt: None,
        }
    }

    /// Style of the page-number overlay.
    pub fn page_number(&self) -> TextStyle {
        self.text(self.page_number_size).bold().aligned(Align::Right)
    }
}
