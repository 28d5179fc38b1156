//! Template builder: single-slide report layouts at fixed coordinates.
//!
//! All coordinates are centimetres on the 33.867 × 19.05 cm page. The
//! right-hand column is aligned with the right edge of the title box.

use crate::deck::{Deck, Slide};
use crate::shape::{Role, Shape, COVER_MARKER_PREFIX};
use crate::style::StyleConfig;
use crate::types::{Align, Emu, ImageFormat, PageSize, Rect};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const MARGIN_CM: f64 = 2.0;
const CONTENT_WIDTH_CM: f64 = 30.0;
const COLUMN_WIDTH_CM: f64 = 14.0;
/// Left edge of the right column: its right edge meets the title's.
const RIGHT_COLUMN_CM: f64 = MARGIN_CM + CONTENT_WIDTH_CM - COLUMN_WIDTH_CM;
const CHART_HEIGHT_CM: f64 = 6.0;
const HEADER_HEIGHT_CM: f64 = 0.6;
/// Header top to its divider.
const HEADER_RULE_OFFSET_CM: f64 = 0.7;
/// Header top to the content below it.
const HEADER_CONTENT_OFFSET_CM: f64 = 0.9;
const SOURCE_WIDTH_CM: f64 = 12.0;

const PLACEHOLDER_TITLE: &str = "Adjust Title";
const PLACEHOLDER_TEXT: &str = "Adjust Text";
const PLACEHOLDER_HEADER: &str = "Adjust Header";

/// The four report layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutKind {
    Cover,
    ExecutiveSummary,
    TwoChart,
    ThreeChart,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 4] = [
        Self::Cover,
        Self::ExecutiveSummary,
        Self::TwoChart,
        Self::ThreeChart,
    ];

    /// Layout by its menu number (1–4).
    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.get(usize::from(number).checked_sub(1)?).copied()
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Cover => 1,
            Self::ExecutiveSummary => 2,
            Self::TwoChart => 3,
            Self::ThreeChart => 4,
        }
    }

    /// Number of chart images the layout places.
    pub fn required_images(self) -> usize {
        match self {
            Self::Cover | Self::ExecutiveSummary => 0,
            Self::TwoChart => 2,
            Self::ThreeChart => 3,
        }
    }

    /// File name prefix of templates of this layout, e.g. `slide_layout_3`.
    pub fn file_prefix(self) -> String {
        format!("slide_layout_{}", self.number())
    }

    /// Fail unless exactly the required number of images is supplied.
    pub fn check_images(self, supplied: usize) -> Result<()> {
        let required = self.required_images();
        if supplied != required {
            return Err(Error::InsufficientImages {
                layout: self.number(),
                required,
                supplied,
            });
        }
        Ok(())
    }
}

/// A chart image supplied by the chart provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// Alt text, usually the source file name.
    pub description: String,
}

impl ChartImage {
    /// Wrap raw image bytes, detecting the format from the content first and
    /// the file name second.
    pub fn from_bytes(bytes: Vec<u8>, file_name: &str) -> Result<Self> {
        let format = ImageFormat::from_magic(&bytes)
            .or_else(|| {
                file_name
                    .rsplit_once('.')
                    .and_then(|(_, ext)| ImageFormat::from_extension(ext))
            })
            .ok_or_else(|| Error::UnsupportedImage(file_name.to_string()))?;
        Ok(Self {
            bytes,
            format,
            description: file_name.to_string(),
        })
    }
}

/// Caller-supplied text for a template. Unset fields keep the placeholder
/// text meant to be edited afterwards in PowerPoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateFields {
    pub title: String,
    /// Cover footer line.
    pub footer: String,
    pub key_message: String,
    /// Executive summary bullets.
    pub body: Vec<String>,
    /// Text of the three-chart layout's top-left quadrant.
    pub quadrant_text: String,
    /// Section headers, left to right then top to bottom.
    pub headers: Vec<String>,
    pub source: String,
    /// Stem of the file the template is saved as; cover slides carry it in
    /// their hidden marker.
    pub template_name: Option<String>,
}

impl Default for TemplateFields {
    fn default() -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
            footer: PLACEHOLDER_TEXT.to_string(),
            key_message: PLACEHOLDER_TEXT.to_string(),
            body: vec![
                "Key Insight 1".to_string(),
                "Key Insight 2".to_string(),
                "Key Insight 3".to_string(),
            ],
            quadrant_text: PLACEHOLDER_TEXT.to_string(),
            headers: Vec::new(),
            source: "Source: ITU".to_string(),
            template_name: None,
        }
    }
}

impl TemplateFields {
    fn header(&self, index: usize) -> &str {
        self.headers
            .get(index)
            .map(String::as_str)
            .unwrap_or(PLACEHOLDER_HEADER)
    }
}

/// Builds single-slide template decks.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    style: StyleConfig,
    page: PageSize,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new(StyleConfig::default())
    }
}

impl TemplateBuilder {
    pub fn new(style: StyleConfig) -> Self {
        Self {
            style,
            page: PageSize::widescreen(),
        }
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    /// Build a one-slide deck for `kind` with the given text and images.
    pub fn build(
        &self,
        kind: LayoutKind,
        fields: &TemplateFields,
        images: Vec<ChartImage>,
    ) -> Result<Deck> {
        kind.check_images(images.len())?;

        let mut deck = Deck::new(self.page);
        let mut pictures = Vec::with_capacity(images.len());
        for image in images {
            let media = deck.media_mut().add(image.bytes, image.format);
            pictures.push((media, image.description));
        }

        let id = deck.add_slide();
        let slide = deck.slide_mut(id).ok_or(Error::SlideNotFound(id.0))?;
        let mut pictures = pictures.into_iter();
        let mut chart = |slide: &mut Slide, left: f64, top: f64| {
            if let Some((media, description)) = pictures.next() {
                slide.add_shape(Shape::picture(
                    Rect::cm(left, top, COLUMN_WIDTH_CM, CHART_HEIGHT_CM),
                    media,
                    description,
                ));
            }
        };

        match kind {
            LayoutKind::Cover => self.cover(slide, fields),
            LayoutKind::ExecutiveSummary => {
                self.title(slide, fields);
                slide.add_shape(Shape::text(
                    Rect::cm(MARGIN_CM, 2.7, CONTENT_WIDTH_CM, 12.0),
                    fields.body.join("\n"),
                    self.style
                        .text(self.style.body_size)
                        .bulleted()
                        .with_line_spacing(self.style.body_line_spacing)
                        .with_paragraph_spacing(0.0, 0.0),
                ));
            }
            LayoutKind::TwoChart => {
                self.title(slide, fields);
                self.key_message(slide, fields, 7.0);
                let top = 2.6 + 7.0 + 0.5;
                self.section_header(slide, fields.header(0), MARGIN_CM, top);
                chart(slide, MARGIN_CM, top + HEADER_CONTENT_OFFSET_CM);
                self.section_header(slide, fields.header(1), RIGHT_COLUMN_CM, top);
                chart(slide, RIGHT_COLUMN_CM, top + HEADER_CONTENT_OFFSET_CM);
                self.source(slide, fields);
            }
            LayoutKind::ThreeChart => {
                self.title(slide, fields);
                self.key_message(slide, fields, 0.8);
                let top = 2.6 + 0.8 + 0.2;
                self.section_header(slide, fields.header(0), MARGIN_CM, top);
                slide.add_shape(Shape::text(
                    Rect::cm(
                        MARGIN_CM,
                        top + HEADER_CONTENT_OFFSET_CM,
                        COLUMN_WIDTH_CM,
                        4.0,
                    ),
                    fields.quadrant_text.clone(),
                    self.style.text(self.style.quadrant_text_size).bulleted(),
                ));
                self.section_header(slide, fields.header(1), RIGHT_COLUMN_CM, top);
                chart(slide, RIGHT_COLUMN_CM, top + HEADER_CONTENT_OFFSET_CM);

                let bottom = top + 7.0;
                self.section_header(slide, fields.header(2), MARGIN_CM, bottom);
                chart(slide, MARGIN_CM, bottom + HEADER_CONTENT_OFFSET_CM);
                self.section_header(slide, fields.header(3), RIGHT_COLUMN_CM, bottom);
                chart(slide, RIGHT_COLUMN_CM, bottom + HEADER_CONTENT_OFFSET_CM);
                self.source(slide, fields);
            }
        }

        log::debug!(
            "Built layout {} with {} shapes",
            kind.number(),
            slide.shapes().len()
        );
        Ok(deck)
    }

    fn cover(&self, slide: &mut Slide, fields: &TemplateFields) {
        let centered = |size| self.style.text(size).bold().aligned(Align::Center);
        slide.add_shape(Shape::text(
            Rect::cm(MARGIN_CM, 7.0, CONTENT_WIDTH_CM, 1.5),
            fields.title.clone(),
            centered(self.style.cover_title_size),
        ));
        self.divider(slide, MARGIN_CM, 8.5, CONTENT_WIDTH_CM, 1.2);
        slide.add_shape(Shape::text(
            Rect::cm(MARGIN_CM, 17.5, CONTENT_WIDTH_CM, 1.5),
            fields.footer.clone(),
            centered(self.style.cover_footer_size),
        ));

        let marker = fields
            .template_name
            .clone()
            .unwrap_or_else(|| COVER_MARKER_PREFIX.to_string());
        slide.add_shape(
            Shape::text(Rect::cm(0.0, 0.0, 1.0, 0.5), marker, self.style.text(1.0))
                .with_role(Role::CoverMarker)
                .hidden(),
        );
    }

    /// Title and the divider directly under it.
    fn title(&self, slide: &mut Slide, fields: &TemplateFields) {
        slide.add_shape(Shape::text(
            Rect::cm(MARGIN_CM, 1.0, CONTENT_WIDTH_CM, 1.2),
            fields.title.clone(),
            self.style.text(self.style.title_size).bold(),
        ));
        self.divider(slide, MARGIN_CM, 2.2, CONTENT_WIDTH_CM, 1.0);
    }

    fn key_message(&self, slide: &mut Slide, fields: &TemplateFields, height: f64) {
        slide.add_shape(Shape::text(
            Rect::cm(MARGIN_CM, 2.6, CONTENT_WIDTH_CM, height),
            fields.key_message.clone(),
            self.style.text(self.style.body_size).bold().bulleted(),
        ));
    }

    fn section_header(&self, slide: &mut Slide, text: &str, left: f64, top: f64) {
        slide.add_shape(Shape::text(
            Rect::cm(left, top, COLUMN_WIDTH_CM, HEADER_HEIGHT_CM),
            text,
            self.style.text(self.style.header_size).bold(),
        ));
        self.divider(
            slide,
            left,
            top + HEADER_RULE_OFFSET_CM,
            COLUMN_WIDTH_CM,
            1.0,
        );
    }

    /// Source caption, right-aligned with the title's right edge.
    fn source(&self, slide: &mut Slide, fields: &TemplateFields) {
        let right_edge = Emu::cm(MARGIN_CM + CONTENT_WIDTH_CM);
        let width = Emu::cm(SOURCE_WIDTH_CM);
        slide.add_shape(Shape::text(
            Rect::new(
                right_edge - width,
                self.page.height - Emu::cm(1.5),
                width,
                Emu::cm(1.0),
            ),
            fields.source.clone(),
            self.style
                .text(self.style.source_size)
                .bold()
                .italic()
                .aligned(Align::Right),
        ));
    }

    fn divider(&self, slide: &mut Slide, left: f64, top: f64, width: f64, thickness_pt: f64) {
        slide.add_shape(Shape::line(
            Rect::new(Emu::cm(left), Emu::cm(top), Emu::cm(width), Emu::pt(1.0)),
            Emu::pt(thickness_pt),
            self.style.accent_color,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeKind;

    fn png(tag: u8) -> ChartImage {
        ChartImage::from_bytes(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, tag], "chart.png")
            .unwrap()
    }

    fn only_slide(deck: &Deck) -> &Slide {
        assert_eq!(deck.slide_count(), 1);
        deck.slide_at(1).unwrap()
    }

    #[test]
    fn test_layout_numbers() {
        for kind in LayoutKind::ALL {
            assert_eq!(LayoutKind::from_number(kind.number()), Some(kind));
        }
        assert_eq!(LayoutKind::from_number(0), None);
        assert_eq!(LayoutKind::from_number(5), None);
        assert_eq!(LayoutKind::TwoChart.file_prefix(), "slide_layout_3");
    }

    #[test]
    fn test_cover_has_hidden_marker() {
        let fields = TemplateFields {
            template_name: Some("slide_layout_1_2".to_string()),
            ..TemplateFields::default()
        };
        let deck = TemplateBuilder::default()
            .build(LayoutKind::Cover, &fields, Vec::new())
            .unwrap();
        let slide = only_slide(&deck);
        let marker = slide
            .shapes()
            .iter()
            .find(|s| s.role == Role::CoverMarker)
            .unwrap();
        assert!(marker.hidden);
        assert_eq!(marker.plain_text(), Some("slide_layout_1_2"));
        assert_eq!(slide.title().as_deref(), Some("Adjust Title"));
    }

    #[test]
    fn test_executive_summary_bullets() {
        let fields = TemplateFields {
            body: vec!["Growth".to_string(), "Coverage".to_string()],
            ..TemplateFields::default()
        };
        let deck = TemplateBuilder::default()
            .build(LayoutKind::ExecutiveSummary, &fields, Vec::new())
            .unwrap();
        let body = only_slide(&deck)
            .shapes()
            .iter()
            .find_map(|s| match &s.kind {
                ShapeKind::Text(body) if body.style.bullet => Some(body),
                _ => None,
            })
            .unwrap();
        assert_eq!(body.text, "Growth\nCoverage");
        assert_eq!(body.style.size_pt, 14.0);
        assert_eq!(body.style.line_spacing_pt, Some(12.0));
        assert_eq!(body.style.paragraph_spacing_pt, Some((0.0, 0.0)));
    }

    #[test]
    fn test_two_chart_geometry() {
        let deck = TemplateBuilder::default()
            .build(
                LayoutKind::TwoChart,
                &TemplateFields::default(),
                vec![png(1), png(2)],
            )
            .unwrap();
        let slide = only_slide(&deck);
        let pictures: Vec<_> = slide.pictures().map(|(shape, _)| shape.bounds).collect();
        assert_eq!(pictures.len(), 2);
        assert_eq!(pictures[0], Rect::cm(2.0, 11.0, 14.0, 6.0));
        assert_eq!(pictures[1], Rect::cm(18.0, 11.0, 14.0, 6.0));
        // right chart ends where the title ends
        assert_eq!(pictures[1].right(), Rect::cm(2.0, 1.0, 30.0, 1.2).right());

        let source = slide
            .shapes()
            .iter()
            .find(|s| s.plain_text() == Some("Source: ITU"))
            .unwrap();
        assert_eq!(source.bounds.right(), Emu::cm(32.0));
        assert_eq!(source.bounds.top, Emu::cm(19.05) - Emu::cm(1.5));
    }

    #[test]
    fn test_three_chart_quadrants() {
        let deck = TemplateBuilder::default()
            .build(
                LayoutKind::ThreeChart,
                &TemplateFields::default(),
                vec![png(1), png(2), png(3)],
            )
            .unwrap();
        let slide = only_slide(&deck);
        let pictures: Vec<_> = slide.pictures().collect();
        assert_eq!(pictures.len(), 3);
        assert_eq!(pictures[0].0.bounds, Rect::cm(18.0, 4.5, 14.0, 6.0));
        assert_eq!(pictures[1].0.bounds, Rect::cm(2.0, 11.5, 14.0, 6.0));
        assert_eq!(pictures[2].0.bounds, Rect::cm(18.0, 11.5, 14.0, 6.0));
        // images keep the order they were supplied in
        let payloads: Vec<u8> = pictures
            .iter()
            .map(|(_, p)| *deck.picture_bytes(p).unwrap().last().unwrap())
            .collect();
        assert_eq!(payloads, vec![1, 2, 3]);
    }

    #[test]
    fn test_wrong_image_count() {
        let builder = TemplateBuilder::default();
        let err = builder
            .build(LayoutKind::TwoChart, &TemplateFields::default(), vec![png(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientImages {
                layout: 3,
                required: 2,
                supplied: 1
            }
        ));
        assert!(builder
            .build(
                LayoutKind::ThreeChart,
                &TemplateFields::default(),
                vec![png(1), png(2), png(3), png(4)]
            )
            .is_err());
    }

    #[test]
    fn test_chart_image_rejects_pdf() {
        let result = ChartImage::from_bytes(b"%PDF-1.4".to_vec(), "chart.pdf");
        assert!(matches!(result, Err(Error::UnsupportedImage(_))));
    }

    #[test]
    fn test_dividers_use_accent_color() {
        let style = StyleConfig::new().with_accent_color(crate::types::Rgb(1, 2, 3));
        let deck = TemplateBuilder::new(style)
            .build(LayoutKind::Cover, &TemplateFields::default(), Vec::new())
            .unwrap();
        let line = only_slide(&deck)
            .shapes()
            .iter()
            .find_map(|s| match &s.kind {
                ShapeKind::Line(line) => Some(line.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(line.color, crate::types::Rgb(1, 2, 3));
        assert_eq!(line.thickness, Emu::pt(1.2));
    }
}
