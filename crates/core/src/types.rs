//! Geometry and formatting primitives shared by the deck model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// EMUs per centimetre.
pub const EMU_PER_CM: i64 = 360_000;

/// EMUs per typographic point.
pub const EMU_PER_PT: i64 = 12_700;

/// A length in English Metric Units, the native PPTX unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Emu(pub i64);

impl Emu {
    /// Length from centimetres, rounded to the nearest EMU.
    pub fn cm(cm: f64) -> Self {
        Self((cm * EMU_PER_CM as f64).round() as i64)
    }

    /// Length from points, rounded to the nearest EMU.
    pub fn pt(pt: f64) -> Self {
        Self((pt * EMU_PER_PT as f64).round() as i64)
    }
}

impl Add for Emu {
    type Output = Emu;

    fn add(self, rhs: Emu) -> Emu {
        Emu(self.0 + rhs.0)
    }
}

impl Sub for Emu {
    type Output = Emu;

    fn sub(self, rhs: Emu) -> Emu {
        Emu(self.0 - rhs.0)
    }
}

impl fmt::Display for Emu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Absolute bounding box of a shape, relative to the slide origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: Emu,
    pub top: Emu,
    pub width: Emu,
    pub height: Emu,
}

impl Rect {
    pub fn new(left: Emu, top: Emu, width: Emu, height: Emu) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle given in centimetres.
    pub fn cm(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(Emu::cm(left), Emu::cm(top), Emu::cm(width), Emu::cm(height))
    }

    /// X coordinate of the right edge.
    pub fn right(&self) -> Emu {
        self.left + self.width
    }

    /// Whether width and height both match.
    pub fn has_size(&self, width: Emu, height: Emu) -> bool {
        self.width == width && self.height == height
    }
}

/// Slide dimensions shared by every slide of a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: Emu,
    pub height: Emu,
}

impl PageSize {
    /// The 33.867 cm × 19.05 cm (16:9) page used for every generated deck.
    pub fn widescreen() -> Self {
        Self {
            width: Emu::cm(33.867),
            height: Emu::cm(19.05),
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::widescreen()
    }
}

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const CRIMSON: Rgb = Rgb(192, 0, 0);

    /// Parse a six digit hex colour, with or without a leading `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Upper-case hex form as used by `a:srgbClr`.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Rgb::from_hex(&value).ok_or_else(|| format!("invalid colour '{}'", value))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// DrawingML `algn` attribute value.
    pub fn as_ooxml(self) -> &'static str {
        match self {
            Self::Left => "l",
            Self::Center => "ctr",
            Self::Right => "r",
        }
    }
}

/// Character and paragraph formatting of a text shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font: String,
    pub size_pt: f64,
    pub bold: bool,
    pub italic: bool,
    pub align: Align,
    pub bullet: bool,
    pub color: Rgb,
    /// Exact line spacing in points; `None` keeps single spacing.
    #[serde(default)]
    pub line_spacing_pt: Option<f64>,
    /// Space before and after each paragraph in points.
    #[serde(default)]
    pub paragraph_spacing_pt: Option<(f64, f64)>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: "Calibri".to_string(),
            size_pt: 18.0,
            bold: false,
            italic: false,
            align: Align::Left,
            bullet: false,
            color: Rgb::BLACK,
            line_spacing_pt: None,
            paragraph_spacing_pt: None,
        }
    }
}

impl TextStyle {
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn aligned(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn bulleted(mut self) -> Self {
        self.bullet = true;
        self
    }

    pub fn with_line_spacing(mut self, line_pt: f64) -> Self {
        self.line_spacing_pt = Some(line_pt);
        self
    }

    pub fn with_paragraph_spacing(mut self, before_pt: f64, after_pt: f64) -> Self {
        self.paragraph_spacing_pt = Some((before_pt, after_pt));
        self
    }
}

/// Raster formats that can be embedded as picture payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
}

impl ImageFormat {
    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            return Some(Self::Png);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(b"GIF8") {
            return Some(Self::Gif);
        }
        if bytes.starts_with(b"BM") {
            return Some(Self::Bmp);
        }
        if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            return Some(Self::Tiff);
        }
        None
    }

    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Extension used for media part names.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
        }
    }
}
