//! Shapes: the positioned visual elements of a slide.

use crate::types::{Emu, Rect, Rgb, TextStyle};
use crate::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Namespace URI of package relationships (`r:` prefix).
pub const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Width of the page-number overlay box.
pub const PAGE_NUMBER_WIDTH: Emu = Emu(720_000);

/// Height of the page-number overlay box.
pub const PAGE_NUMBER_HEIGHT: Emu = Emu(360_000);

/// Text carried by cover templates; its presence marks a cover slide.
pub const COVER_MARKER_PREFIX: &str = "slide_layout_1_";

/// `id` attribute of every `cNvPr` element, at any depth.
static SHAPE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(<(?:[A-Za-z_][\w.-]*:)?cNvPr\b[^>]*?\sid=")(\d+)""#).unwrap());

/// Identifier of a shape within its slide (`p:cNvPr/@id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShapeId(pub u32);

/// Identifier of an out-of-line media part within a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(pub usize);

/// What a shape is for, assigned when the shape is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Content,
    PageNumber,
    CoverMarker,
}

impl Role {
    /// Name prefix persisted in `p:cNvPr/@name` for non-content roles.
    pub fn name_prefix(self) -> Option<&'static str> {
        match self {
            Self::Content => None,
            Self::PageNumber => Some("Page Number"),
            Self::CoverMarker => Some("Cover Marker"),
        }
    }

    /// Recover a role from a persisted shape name.
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::PageNumber, Self::CoverMarker]
            .into_iter()
            .find(|role| role.name_prefix().is_some_and(|p| name.starts_with(p)))
    }

    /// Role of a text shape that predates role tagging.
    ///
    /// A 2 cm × 1 cm box holding only digits is an old page number; text
    /// mentioning a cover template name is a cover marker.
    pub fn infer(bounds: &Rect, text: &str) -> Self {
        let trimmed = text.trim();
        if bounds.has_size(PAGE_NUMBER_WIDTH, PAGE_NUMBER_HEIGHT)
            && !trimmed.is_empty()
            && trimmed.chars().all(|c| c.is_ascii_digit())
        {
            Self::PageNumber
        } else if text.contains(COVER_MARKER_PREFIX) {
            Self::CoverMarker
        } else {
            Self::Content
        }
    }
}

/// A text box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBody {
    /// Paragraphs separated by `\n`.
    pub text: String,
    pub style: TextStyle,
}

/// A thin outlined rectangle used as a divider.
#[derive(Debug, Clone, PartialEq)]
pub struct LineShape {
    pub thickness: Emu,
    pub color: Rgb,
}

/// An embedded raster image. The payload lives in the deck's media store.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub media: MediaId,
    pub description: String,
}

/// A shape read from a foreign deck that is carried through verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueShape {
    /// The element's XML, exactly as found in the source slide.
    pub xml: String,
    /// `(prefix, uri)` declarations from the source slide root.
    pub namespaces: Vec<(String, String)>,
}

impl OpaqueShape {
    /// Concatenated `a:t` text, paragraphs joined with `\n`.
    pub fn text(&self) -> Result<String> {
        let mut reader = Reader::from_str(&self.xml);
        let mut text = String::new();
        let mut in_run_text = false;
        let mut paragraphs = 0usize;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                    b"p" => {
                        if paragraphs > 0 {
                            text.push('\n');
                        }
                        paragraphs += 1;
                    }
                    b"t" => in_run_text = true,
                    _ => {}
                },
                Ok(Event::Text(ref e)) if in_run_text => {
                    let unescaped = e.unescape().map_err(|e| Error::Xml(e.to_string()))?;
                    text.push_str(&unescaped);
                }
                Ok(Event::End(ref e)) if local_name(e.name().as_ref()) == b"t" => {
                    in_run_text = false;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error inspecting shape at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(text)
    }

    /// Relationship ids referenced by the element (`r:embed`, `r:id`, ...).
    ///
    /// Such references point at parts of the source package and cannot be
    /// resolved once the element is moved to another slide part.
    pub fn relationship_refs(&self) -> Result<Vec<String>> {
        let mut prefixes: Vec<&str> = vec!["r"];
        prefixes.extend(
            self.namespaces
                .iter()
                .filter(|(_, uri)| uri == RELATIONSHIPS_NS)
                .map(|(prefix, _)| prefix.as_str()),
        );

        let mut reader = Reader::from_str(&self.xml);
        let mut refs = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    for attr in e.attributes().flatten() {
                        let key = attr.key.as_ref();
                        let Some(pos) = key.iter().position(|&b| b == b':') else {
                            continue;
                        };
                        let prefix = String::from_utf8_lossy(&key[..pos]);
                        if prefix != "xmlns" && prefixes.contains(&prefix.as_ref()) {
                            refs.push(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::Xml(e.to_string())),
                _ => {}
            }
        }

        Ok(refs)
    }

    /// Ids of the element and of any shapes nested in it, in document order.
    pub fn shape_ids(&self) -> Vec<u32> {
        SHAPE_ID_REGEX
            .captures_iter(&self.xml)
            .filter_map(|caps| caps[2].parse().ok())
            .collect()
    }

    /// Rewrite shape ids found in `remap`, leaving the rest of the XML untouched.
    pub fn remap_ids(&mut self, remap: &HashMap<u32, u32>) {
        if remap.is_empty() {
            return;
        }
        let rewritten = SHAPE_ID_REGEX.replace_all(&self.xml, |caps: &Captures| {
            let id = caps[2]
                .parse::<u32>()
                .ok()
                .and_then(|id| remap.get(&id))
                .map(u32::to_string)
                .unwrap_or_else(|| caps[2].to_string());
            format!("{}{}\"", &caps[1], id)
        });
        self.xml = rewritten.into_owned();
    }
}

/// Variant payload of a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Text(TextBody),
    Line(LineShape),
    Picture(Picture),
    Opaque(OpaqueShape),
}

/// A positioned visual element of a slide.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// Assigned when the shape is added to a slide.
    pub id: ShapeId,
    /// Non-visual name. Generated from kind and role when empty.
    pub name: String,
    pub role: Role,
    pub bounds: Rect,
    pub hidden: bool,
    pub kind: ShapeKind,
}

impl Shape {
    fn new(bounds: Rect, kind: ShapeKind) -> Self {
        Self {
            id: ShapeId(0),
            name: String::new(),
            role: Role::Content,
            bounds,
            hidden: false,
            kind,
        }
    }

    /// A text box.
    pub fn text(bounds: Rect, text: impl Into<String>, style: TextStyle) -> Self {
        Self::new(
            bounds,
            ShapeKind::Text(TextBody {
                text: text.into(),
                style,
            }),
        )
    }

    /// A divider line.
    pub fn line(bounds: Rect, thickness: Emu, color: Rgb) -> Self {
        Self::new(bounds, ShapeKind::Line(LineShape { thickness, color }))
    }

    /// A picture referencing a media part.
    pub fn picture(bounds: Rect, media: MediaId, description: impl Into<String>) -> Self {
        Self::new(
            bounds,
            ShapeKind::Picture(Picture {
                media,
                description: description.into(),
            }),
        )
    }

    /// A foreign element carried through verbatim.
    pub fn opaque(bounds: Rect, opaque: OpaqueShape) -> Self {
        Self::new(bounds, ShapeKind::Opaque(opaque))
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn is_picture(&self) -> bool {
        matches!(self.kind, ShapeKind::Picture(_))
    }

    /// Text of a modelled text shape, if any.
    pub fn plain_text(&self) -> Option<&str> {
        match &self.kind {
            ShapeKind::Text(body) => Some(&body.text),
            _ => None,
        }
    }

    /// Every shape id the shape occupies, nested group members included.
    pub fn shape_ids(&self) -> Vec<u32> {
        match &self.kind {
            ShapeKind::Opaque(opaque) => {
                let ids = opaque.shape_ids();
                if ids.is_empty() {
                    vec![self.id.0]
                } else {
                    ids
                }
            }
            _ => vec![self.id.0],
        }
    }

    /// Text content for inspection, including foreign shapes.
    pub fn inspect_text(&self) -> Result<Option<String>> {
        match &self.kind {
            ShapeKind::Text(body) => Ok(Some(body.text.clone())),
            ShapeKind::Opaque(opaque) => opaque.text().map(Some),
            _ => Ok(None),
        }
    }

    /// Name derived from role and kind, e.g. `Page Number 7`.
    pub fn default_name(&self) -> String {
        let label = self.role.name_prefix().unwrap_or(match self.kind {
            ShapeKind::Text(_) => "Text Box",
            ShapeKind::Line(_) => "Divider",
            ShapeKind::Picture(_) => "Picture",
            ShapeKind::Opaque(_) => "Shape",
        });
        format!("{} {}", label, self.id.0)
    }
}

/// Extract the local name from a potentially namespaced XML element name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(xml: &str) -> OpaqueShape {
        OpaqueShape {
            xml: xml.to_string(),
            namespaces: Vec::new(),
        }
    }

    #[test]
    fn test_role_from_name() {
        assert_eq!(Role::from_name("Page Number 12"), Some(Role::PageNumber));
        assert_eq!(Role::from_name("Cover Marker 5"), Some(Role::CoverMarker));
        assert_eq!(Role::from_name("Text Box 3"), None);
    }

    #[test]
    fn test_role_infer_page_number() {
        let bounds = Rect::new(Emu(100), Emu(200), PAGE_NUMBER_WIDTH, PAGE_NUMBER_HEIGHT);
        assert_eq!(Role::infer(&bounds, " 12 "), Role::PageNumber);
        assert_eq!(Role::infer(&bounds, "Figure 2"), Role::Content);

        let caption = Rect::cm(2.0, 2.0, 3.0, 1.0);
        assert_eq!(Role::infer(&caption, "12"), Role::Content);
    }

    #[test]
    fn test_role_infer_cover() {
        let bounds = Rect::cm(0.0, 0.0, 1.0, 1.0);
        assert_eq!(Role::infer(&bounds, "slide_layout_1_4"), Role::CoverMarker);
        assert_eq!(Role::infer(&bounds, "slide_layout_2_4"), Role::Content);
    }

    #[test]
    fn test_opaque_text() {
        let shape = opaque(
            r#"<p:sp><p:txBody><a:p><a:r><a:t>Hello</a:t></a:r><a:r><a:t> world</a:t></a:r></a:p><a:p><a:r><a:t>Again &amp; again</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        assert_eq!(shape.text().unwrap(), "Hello world\nAgain & again");
    }

    #[test]
    fn test_opaque_text_malformed() {
        let shape = opaque("<p:sp><a:t>broken</a:x></p:sp>");
        assert!(shape.text().is_err());
    }

    #[test]
    fn test_relationship_refs() {
        let shape = opaque(
            r#"<p:graphicFrame><a:graphic><a:graphicData><c:chart r:id="rId3"/></a:graphicData></a:graphic></p:graphicFrame>"#,
        );
        assert_eq!(shape.relationship_refs().unwrap(), vec!["rId3"]);

        let plain = opaque(r#"<p:sp><p:nvSpPr><p:cNvPr id="4" name="Box"/></p:nvSpPr></p:sp>"#);
        assert!(plain.relationship_refs().unwrap().is_empty());
    }

    #[test]
    fn test_relationship_refs_custom_prefix() {
        let shape = OpaqueShape {
            xml: r#"<p:pic><p:blipFill><a:blip rel:embed="rId9"/></p:blipFill></p:pic>"#.to_string(),
            namespaces: vec![("rel".to_string(), RELATIONSHIPS_NS.to_string())],
        };
        assert_eq!(shape.relationship_refs().unwrap(), vec!["rId9"]);
    }

    #[test]
    fn test_nested_shape_ids() {
        let group = opaque(
            r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="4" name="Group 3"/></p:nvGrpSpPr><p:sp><p:nvSpPr><p:cNvPr name="Inner" id="5"/></p:nvSpPr></p:sp><p:pic><p:nvPicPr><p:cNvPr id="7" name="Logo" descr="id=&quot;9&quot;"/><p:cNvPicPr/></p:nvPicPr></p:pic></p:grpSp>"#,
        );
        assert_eq!(group.shape_ids(), vec![4, 5, 7]);

        let shape = Shape::opaque(Rect::default(), group.clone());
        assert_eq!(shape.shape_ids(), vec![4, 5, 7]);
        let plain = Shape::text(Rect::default(), "x", TextStyle::default());
        assert_eq!(plain.shape_ids(), vec![0]);
    }

    #[test]
    fn test_remap_ids() {
        let mut group = opaque(
            r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="4" name="Group 3"/></p:nvGrpSpPr><p:sp><p:nvSpPr><p:cNvPr id="5" name="Inner"/><p:cNvSpPr/></p:nvSpPr><p:txBody><a:p><a:r><a:t>id="5"</a:t></a:r></a:p></p:txBody></p:sp></p:grpSp>"#,
        );
        group.remap_ids(&HashMap::from([(5, 12)]));
        assert_eq!(
            group.xml,
            r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="4" name="Group 3"/></p:nvGrpSpPr><p:sp><p:nvSpPr><p:cNvPr id="12" name="Inner"/><p:cNvSpPr/></p:nvSpPr><p:txBody><a:p><a:r><a:t>id="5"</a:t></a:r></a:p></p:txBody></p:sp></p:grpSp>"#
        );
    }

    #[test]
    fn test_default_name() {
        let mut shape = Shape::text(Rect::default(), "3", TextStyle::default())
            .with_role(Role::PageNumber);
        shape.id = ShapeId(7);
        assert_eq!(shape.default_name(), "Page Number 7");
    }
}
