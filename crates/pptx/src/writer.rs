//! PPTX file writer.
//!
//! Every deck is written with the engine's own blank master, layout and
//! theme. Slide parts are numbered in physical order, `p:sldIdLst` follows
//! the presentation order, and only media referenced by a slide is stored.

use crate::package::{
    self, rel_type, StaticPart, CT_CORE_PROPERTIES, CT_EXTENDED_PROPERTIES, CT_PRESENTATION,
    CT_RELS, CT_SLIDE, NS_A, NS_CONTENT_TYPES, NS_P, NS_R, NS_RELS, PRESENTATION_PART,
    PRESENTATION_RELS_PART, REL_CORE_PROPERTIES, REL_EXTENDED_PROPERTIES, REL_OFFICE_DOCUMENT,
    SLIDE_LAYOUT_RELS, SLIDE_LAYOUT_TARGET, SLIDE_MASTER_RELS, STATIC_PARTS,
};
use deck_core::shape::{LineShape, Picture, TextBody};
use deck_core::{Deck, Error, MediaId, Rect, Result, Shape, ShapeKind, Slide, SlideId, TextStyle};
use quick_xml::escape::escape;
use std::collections::HashMap;
use std::fmt::{self, Write as FmtWrite};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Notes page size PowerPoint expects alongside any slide size.
const NOTES_SIZE: (i64, i64) = (6_858_000, 9_144_000);

/// Left margin and hanging indent of bulleted paragraphs.
const BULLET_INDENT: i64 = 285_750;

/// Writer for PPTX (Office Open XML) decks.
#[derive(Debug, Clone, Copy)]
pub struct PptxWriter;

impl PptxWriter {
    /// Create a new PPTX writer.
    pub fn new() -> Self {
        Self
    }

    /// Write a deck to a file, replacing it if it exists.
    pub fn write(&self, path: impl AsRef<Path>, deck: &Deck) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes(deck)?;
        std::fs::write(path, bytes)?;
        log::debug!(
            "Wrote deck {} ({} slides)",
            path.display(),
            deck.slide_count()
        );
        Ok(())
    }

    /// Serialise a deck into PPTX bytes.
    pub fn to_bytes(&self, deck: &Deck) -> Result<Vec<u8>> {
        let media = MediaParts::collect(deck);
        let slide_count = deck.physical_slides().len();

        let mut package = Package::new();
        package.add(
            "[Content_Types].xml",
            xml(content_types(slide_count, &media, deck))?,
        )?;
        package.add("_rels/.rels", xml(root_relationships())?)?;
        package.add("docProps/core.xml", CORE_PROPERTIES)?;
        package.add("docProps/app.xml", xml(app_properties(slide_count))?)?;
        package.add(PRESENTATION_PART, xml(presentation(deck))?)?;
        package.add(PRESENTATION_RELS_PART, xml(presentation_relationships(slide_count))?)?;
        for part in STATIC_PARTS {
            package.add(part.path, part.xml)?;
        }
        package.add(SLIDE_MASTER_RELS.0, SLIDE_MASTER_RELS.1)?;
        package.add(SLIDE_LAYOUT_RELS.0, SLIDE_LAYOUT_RELS.1)?;

        for (index, slide) in deck.physical_slides().iter().enumerate() {
            let part = package::slide_part(index + 1);
            let (slide_xml, rels_xml) = SlideWriter::new(deck, &media).write(slide)?;
            package.add(&part, slide_xml)?;
            package.add(&package::rels_part_for(&part), rels_xml)?;
        }

        for (id, name) in &media.names {
            if let Some(part) = deck.media().get(*id) {
                package.add(&format!("ppt/media/{}", name), &part.bytes)?;
            }
        }

        package.finish()
    }
}

impl Default for PptxWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// ZIP archive being assembled in memory.
struct Package {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
}

impl Package {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    fn add(&mut self, name: &str, content: impl AsRef<[u8]>) -> Result<()> {
        self.zip
            .start_file(name, self.options)
            .map_err(|e| Error::Zip(format!("Failed to add '{}': {}", name, e)))?;
        self.zip.write_all(content.as_ref())?;
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        let cursor = self
            .zip
            .finish()
            .map_err(|e| Error::Zip(format!("Failed to finish ZIP: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

/// Media parts to store, named `imageN.ext` in order of first reference.
struct MediaParts {
    names: Vec<(MediaId, String)>,
}

impl MediaParts {
    fn collect(deck: &Deck) -> Self {
        let mut names: Vec<(MediaId, String)> = Vec::new();
        for slide in deck.physical_slides() {
            for (shape, picture) in slide.pictures() {
                if names.iter().any(|(id, _)| *id == picture.media) {
                    continue;
                }
                match deck.media().get(picture.media) {
                    Some(part) => {
                        let name = format!("image{}.{}", names.len() + 1, part.format.extension());
                        names.push((picture.media, name));
                    }
                    None => log::warn!(
                        "Picture '{}' on slide {} has no payload",
                        shape.name,
                        slide.id().0
                    ),
                }
            }
        }
        let unused = deck.media().len().saturating_sub(names.len());
        if unused > 0 {
            log::debug!("Pruning {} unreferenced media parts", unused);
        }
        Self { names }
    }

    fn name(&self, id: MediaId) -> Option<&str> {
        self.names
            .iter()
            .find(|(media, _)| *media == id)
            .map(|(_, name)| name.as_str())
    }
}

/// Writes one slide part and its relationships.
struct SlideWriter<'a> {
    deck: &'a Deck,
    media: &'a MediaParts,
    /// `(relationship id, type, target)`, starting with the layout.
    relationships: Vec<(String, String, String)>,
    image_rels: HashMap<MediaId, String>,
    namespaces: Vec<(String, String)>,
}

impl<'a> SlideWriter<'a> {
    fn new(deck: &'a Deck, media: &'a MediaParts) -> Self {
        Self {
            deck,
            media,
            relationships: vec![(
                "rId1".to_string(),
                rel_type("slideLayout"),
                SLIDE_LAYOUT_TARGET.to_string(),
            )],
            image_rels: HashMap::new(),
            namespaces: Vec::new(),
        }
    }

    fn write(mut self, slide: &Slide) -> Result<(String, String)> {
        let mut shapes = String::new();
        for shape in slide.shapes() {
            self.write_shape(&mut shapes, slide.id(), shape)?;
        }

        let out = xml(slide_document(&self.namespaces, &shapes))?;
        let rels = xml(relationships(&self.relationships))?;
        Ok((out, rels))
    }

    fn write_shape(&mut self, out: &mut String, slide: SlideId, shape: &Shape) -> Result<()> {
        match &shape.kind {
            ShapeKind::Text(body) => xml(write_text(out, shape, body)),
            ShapeKind::Line(line) => xml(write_line(out, shape, line)),
            ShapeKind::Picture(picture) => match self.image_relationship(picture) {
                Some(rel_id) => xml(write_picture(out, shape, picture, &rel_id)),
                None => {
                    log::warn!(
                        "Dropping picture '{}' on slide {}: payload missing",
                        shape.name,
                        slide.0
                    );
                    Ok(())
                }
            },
            ShapeKind::Opaque(opaque) => {
                match opaque.relationship_refs() {
                    Ok(refs) if refs.is_empty() => {}
                    Ok(refs) => {
                        log::warn!(
                            "Dropping shape '{}' on slide {}: references parts that are not written ({})",
                            shape.name,
                            slide.0,
                            refs.join(", ")
                        );
                        return Ok(());
                    }
                    Err(e) => {
                        log::warn!("Dropping shape '{}' on slide {}: {}", shape.name, slide.0, e);
                        return Ok(());
                    }
                }
                for (prefix, uri) in &opaque.namespaces {
                    let declared = matches!(prefix.as_str(), "a" | "r" | "p")
                        || self.namespaces.iter().any(|(p, _)| p == prefix);
                    if !declared {
                        self.namespaces.push((prefix.clone(), uri.clone()));
                    }
                }
                out.push_str(&opaque.xml);
                Ok(())
            }
        }
    }

    /// Relationship id of a picture's media part, added on first use.
    fn image_relationship(&mut self, picture: &Picture) -> Option<String> {
        if let Some(rel_id) = self.image_rels.get(&picture.media) {
            return Some(rel_id.clone());
        }
        self.deck.media().get(picture.media)?;
        let name = self.media.name(picture.media)?;
        let rel_id = format!("rId{}", self.relationships.len() + 1);
        self.relationships.push((
            rel_id.clone(),
            rel_type("image"),
            format!("../media/{}", name),
        ));
        self.image_rels.insert(picture.media, rel_id.clone());
        Some(rel_id)
    }
}

fn slide_document(
    namespaces: &[(String, String)],
    shapes: &str,
) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    write!(
        out,
        r#"{}<p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}""#,
        XML_DECLARATION, NS_A, NS_R, NS_P
    )?;
    for (prefix, uri) in namespaces {
        write!(out, r#" xmlns:{}="{}""#, prefix, escape(uri))?;
    }
    out.push_str(r#"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#);
    out.push_str(shapes);
    out.push_str(r#"</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#);
    Ok(out)
}

fn write_non_visual(out: &mut String, shape: &Shape, description: Option<&str>) -> fmt::Result {
    write!(
        out,
        r#"<p:cNvPr id="{}" name="{}""#,
        shape.id.0,
        escape(&shape.name)
    )?;
    if let Some(description) = description {
        write!(out, r#" descr="{}""#, escape(description))?;
    }
    if shape.hidden {
        out.push_str(r#" hidden="1""#);
    }
    out.push_str("/>");
    Ok(())
}

fn write_xfrm(out: &mut String, bounds: &Rect) -> fmt::Result {
    write!(
        out,
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        bounds.left, bounds.top, bounds.width, bounds.height
    )
}

fn write_text(out: &mut String, shape: &Shape, body: &TextBody) -> fmt::Result {
    out.push_str("<p:sp><p:nvSpPr>");
    write_non_visual(out, shape, None)?;
    out.push_str(r#"<p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>"#);
    write_xfrm(out, &shape.bounds)?;
    out.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    out.push_str(r#"<p:txBody><a:bodyPr wrap="square" lIns="0" tIns="0" rIns="0" bIns="0" rtlCol="0"><a:noAutofit/></a:bodyPr><a:lstStyle/>"#);
    for paragraph in body.text.split('\n') {
        write_paragraph(out, paragraph, &body.style)?;
    }
    out.push_str("</p:txBody></p:sp>");
    Ok(())
}

fn write_paragraph(out: &mut String, text: &str, style: &TextStyle) -> fmt::Result {
    out.push_str("<a:p>");
    write!(out, r#"<a:pPr algn="{}""#, style.align.as_ooxml())?;
    if style.bullet {
        write!(out, r#" marL="{}" indent="-{}""#, BULLET_INDENT, BULLET_INDENT)?;
    }
    out.push('>');
    // lnSpc, spcBef and spcAft must precede the bullet elements.
    if let Some(line) = style.line_spacing_pt {
        write!(out, r#"<a:lnSpc><a:spcPts val="{}"/></a:lnSpc>"#, centipoints(line))?;
    }
    if let Some((before, after)) = style.paragraph_spacing_pt {
        write!(
            out,
            r#"<a:spcBef><a:spcPts val="{}"/></a:spcBef><a:spcAft><a:spcPts val="{}"/></a:spcAft>"#,
            centipoints(before),
            centipoints(after)
        )?;
    }
    if style.bullet {
        out.push_str(r#"<a:buFont typeface="Arial"/><a:buChar char="•"/>"#);
    } else {
        out.push_str("<a:buNone/>");
    }
    out.push_str("</a:pPr>");

    let size = centipoints(style.size_pt);
    let mut properties = format!(r#" lang="en-US" sz="{}""#, size);
    if style.bold {
        properties.push_str(r#" b="1""#);
    }
    if style.italic {
        properties.push_str(r#" i="1""#);
    }
    let fill = format!(
        r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:latin typeface="{}"/>"#,
        style.color.to_hex(),
        escape(&style.font)
    );

    if text.is_empty() {
        write!(out, r#"<a:endParaRPr{} dirty="0">{}</a:endParaRPr>"#, properties, fill)?;
    } else {
        write!(
            out,
            r#"<a:r><a:rPr{} dirty="0">{}</a:rPr><a:t>{}</a:t></a:r>"#,
            properties,
            fill,
            escape(text)
        )?;
    }
    out.push_str("</a:p>");
    Ok(())
}

/// Hundredths of a point, the unit of `sz` and `spcPts`.
fn centipoints(pt: f64) -> i64 {
    (pt * 100.0).round() as i64
}

fn write_line(out: &mut String, shape: &Shape, line: &LineShape) -> fmt::Result {
    out.push_str("<p:sp><p:nvSpPr>");
    write_non_visual(out, shape, None)?;
    out.push_str("<p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>");
    write_xfrm(out, &shape.bounds)?;
    let color = line.color.to_hex();
    write!(
        out,
        r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:ln w="{}"><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:ln></p:spPr></p:sp>"#,
        color, line.thickness, color
    )
}

fn write_picture(out: &mut String, shape: &Shape, picture: &Picture, rel_id: &str) -> fmt::Result {
    out.push_str("<p:pic><p:nvPicPr>");
    write_non_visual(out, shape, Some(&picture.description))?;
    write!(
        out,
        r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>"#,
        rel_id
    )?;
    write_xfrm(out, &shape.bounds)?;
    out.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#);
    Ok(())
}

/// Map a formatting failure into the crate error.
fn xml<T>(result: std::result::Result<T, fmt::Error>) -> Result<T> {
    result.map_err(|e| Error::Xml(e.to_string()))
}

fn relationships(rels: &[(String, String, String)]) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    write!(out, r#"{}<Relationships xmlns="{}">"#, XML_DECLARATION, NS_RELS)?;
    for (id, rel_type, target) in rels {
        write!(
            out,
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id,
            rel_type,
            escape(target)
        )?;
    }
    out.push_str("</Relationships>");
    Ok(out)
}

fn root_relationships() -> std::result::Result<String, fmt::Error> {
    relationships(&[
        (
            "rId1".to_string(),
            REL_OFFICE_DOCUMENT.to_string(),
            PRESENTATION_PART.to_string(),
        ),
        (
            "rId2".to_string(),
            REL_CORE_PROPERTIES.to_string(),
            "docProps/core.xml".to_string(),
        ),
        (
            "rId3".to_string(),
            REL_EXTENDED_PROPERTIES.to_string(),
            "docProps/app.xml".to_string(),
        ),
    ])
}

/// Target of a `ppt/` part relative to the presentation part.
fn presentation_target(part: &StaticPart) -> &str {
    part.path.strip_prefix("ppt/").unwrap_or(part.path)
}

/// rId1 is the master, slides follow from rId2, then the other static parts.
fn presentation_relationships(slide_count: usize) -> std::result::Result<String, fmt::Error> {
    let mut rels = Vec::new();
    for part in STATIC_PARTS.iter().filter(|p| p.presentation_rel == Some("slideMaster")) {
        rels.push((
            "rId1".to_string(),
            rel_type("slideMaster"),
            presentation_target(part).to_string(),
        ));
    }
    for n in 1..=slide_count {
        rels.push((
            format!("rId{}", n + 1),
            rel_type("slide"),
            format!("slides/slide{}.xml", n),
        ));
    }
    for part in STATIC_PARTS {
        match part.presentation_rel {
            Some("slideMaster") | None => {}
            Some(kind) => rels.push((
                format!("rId{}", rels.len() + 1),
                rel_type(kind),
                presentation_target(part).to_string(),
            )),
        }
    }
    relationships(&rels)
}

fn presentation(deck: &Deck) -> std::result::Result<String, fmt::Error> {
    let physical: HashMap<SlideId, usize> = deck
        .physical_slides()
        .iter()
        .enumerate()
        .map(|(index, slide)| (slide.id(), index))
        .collect();

    let mut out = String::new();
    write!(
        out,
        r#"{}<p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" saveSubsetFonts="1">"#,
        XML_DECLARATION, NS_A, NS_R, NS_P
    )?;
    out.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);
    if !deck.is_empty() {
        out.push_str("<p:sldIdLst>");
        for id in deck.order() {
            if let Some(index) = physical.get(id) {
                write!(out, r#"<p:sldId id="{}" r:id="rId{}"/>"#, id.0, index + 2)?;
            }
        }
        out.push_str("</p:sldIdLst>");
    }
    let page = deck.page();
    write!(
        out,
        r#"<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="{}" cy="{}"/>"#,
        page.width, page.height, NOTES_SIZE.0, NOTES_SIZE.1
    )?;
    out.push_str("</p:presentation>");
    Ok(out)
}

fn content_types(
    slide_count: usize,
    media: &MediaParts,
    deck: &Deck,
) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    write!(out, r#"{}<Types xmlns="{}">"#, XML_DECLARATION, NS_CONTENT_TYPES)?;
    write!(out, r#"<Default Extension="rels" ContentType="{}"/>"#, CT_RELS)?;
    out.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);

    let mut extensions: Vec<(&str, &str)> = Vec::new();
    for (id, _) in &media.names {
        if let Some(part) = deck.media().get(*id) {
            let entry = (part.format.extension(), part.format.content_type());
            if !extensions.contains(&entry) {
                extensions.push(entry);
            }
        }
    }
    for (extension, content_type) in extensions {
        write!(
            out,
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            extension, content_type
        )?;
    }

    write!(
        out,
        r#"<Override PartName="/{}" ContentType="{}"/>"#,
        PRESENTATION_PART, CT_PRESENTATION
    )?;
    for n in 1..=slide_count {
        write!(
            out,
            r#"<Override PartName="/{}" ContentType="{}"/>"#,
            package::slide_part(n),
            CT_SLIDE
        )?;
    }
    for part in STATIC_PARTS {
        write!(
            out,
            r#"<Override PartName="/{}" ContentType="{}"/>"#,
            part.path, part.content_type
        )?;
    }
    write!(
        out,
        r#"<Override PartName="/docProps/core.xml" ContentType="{}"/><Override PartName="/docProps/app.xml" ContentType="{}"/>"#,
        CT_CORE_PROPERTIES, CT_EXTENDED_PROPERTIES
    )?;
    out.push_str("</Types>");
    Ok(out)
}

const CORE_PROPERTIES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>Presentation</dc:title><dc:creator>deck-assemble</dc:creator></cp:coreProperties>"#;

fn app_properties(slide_count: usize) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    write!(
        out,
        r#"{}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>deck-assemble</Application><Slides>{}</Slides></Properties>"#,
        XML_DECLARATION, slide_count
    )?;
    Ok(out)
}
