//! Package-level constants shared by the reader and the writer: part names,
//! content types, relationship types and the static parts of the blank
//! master every written deck carries.

use deck_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const NS_R: &str = deck_core::shape::RELATIONSHIPS_NS;
pub const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub const PRESENTATION_PART: &str = "ppt/presentation.xml";
pub const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub const REL_EXTENDED_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";

pub const CT_PRESENTATION: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
pub const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub const CT_CORE_PROPERTIES: &str = "application/vnd.openxmlformats-package.core-properties+xml";
pub const CT_EXTENDED_PROPERTIES: &str =
    "application/vnd.openxmlformats-officedocument.extended-properties+xml";

/// Relationship type URI for a short name such as `slide` or `image`.
pub fn rel_type(kind: &str) -> String {
    format!("{}/{}", REL_BASE, kind)
}

/// A static part of the blank master set.
pub struct StaticPart {
    pub path: &'static str,
    pub content_type: &'static str,
    /// Relationship type from the presentation part, if it links there.
    pub presentation_rel: Option<&'static str>,
    pub xml: &'static str,
}

/// Master, layout, theme and property parts written into every deck.
pub const STATIC_PARTS: &[StaticPart] = &[
    StaticPart {
        path: "ppt/slideMasters/slideMaster1.xml",
        content_type: "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml",
        presentation_rel: Some("slideMaster"),
        xml: include_str!("../resources/slideMaster1.xml"),
    },
    StaticPart {
        path: "ppt/slideLayouts/slideLayout1.xml",
        content_type: "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml",
        presentation_rel: None,
        xml: include_str!("../resources/slideLayout1.xml"),
    },
    StaticPart {
        path: "ppt/theme/theme1.xml",
        content_type: "application/vnd.openxmlformats-officedocument.theme+xml",
        presentation_rel: Some("theme"),
        xml: include_str!("../resources/theme1.xml"),
    },
    StaticPart {
        path: "ppt/presProps.xml",
        content_type: "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml",
        presentation_rel: Some("presProps"),
        xml: include_str!("../resources/presProps.xml"),
    },
    StaticPart {
        path: "ppt/viewProps.xml",
        content_type: "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml",
        presentation_rel: Some("viewProps"),
        xml: include_str!("../resources/viewProps.xml"),
    },
    StaticPart {
        path: "ppt/tableStyles.xml",
        content_type: "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml",
        presentation_rel: Some("tableStyles"),
        xml: include_str!("../resources/tableStyles.xml"),
    },
];

/// Relationships part of the slide master.
pub const SLIDE_MASTER_RELS: (&str, &str) = (
    "ppt/slideMasters/_rels/slideMaster1.xml.rels",
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/></Relationships>"#,
);

/// Relationships part of the blank layout.
pub const SLIDE_LAYOUT_RELS: (&str, &str) = (
    "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#,
);

/// Target of a slide's layout relationship.
pub const SLIDE_LAYOUT_TARGET: &str = "../slideLayouts/slideLayout1.xml";

/// Part name of the N-th slide (1-based).
pub fn slide_part(n: usize) -> String {
    format!("ppt/slides/slide{}.xml", n)
}

/// Relationships part belonging to a part, e.g.
/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Directory of a part name, without trailing slash.
pub fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// One entry of a relationships part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Part name resolved against the source part's directory.
    pub target: String,
    pub external: bool,
}

/// Parse a relationships part, resolving targets against `base_dir`.
pub fn parse_relationships(xml: &str, base_dir: &str) -> Result<HashMap<String, Relationship>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut rels = HashMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = String::new();
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut external = false;

                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map_err(|e| Error::Xml(e.to_string()))?;
                    match attr.key.as_ref() {
                        b"Id" => id = value.to_string(),
                        b"Type" => rel_type = value.to_string(),
                        b"Target" => target = value.to_string(),
                        b"TargetMode" => external = value == "External",
                        _ => {}
                    }
                }

                let target = if external {
                    target
                } else {
                    resolve_target(base_dir, &target)
                };
                rels.insert(
                    id.clone(),
                    Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    },
                );
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(rels)
}
