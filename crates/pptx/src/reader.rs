//! PPTX file reader.
//!
//! Raster pictures are parsed back into typed picture shapes. Everything else
//! in the shape tree, engine text boxes included, is kept as the exact XML it
//! was stored as; only its role is restored.

use crate::package::{self, Relationship, PRESENTATION_PART, PRESENTATION_RELS_PART};
use deck_core::shape::{local_name, OpaqueShape};
use deck_core::{
    Deck, Emu, Error, ImageFormat, MediaId, MediaStore, PageSize, Rect, Result, Role, Shape,
    ShapeId, Slide, SlideId,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Reader for PPTX (Office Open XML) decks.
#[derive(Debug, Clone, Copy)]
pub struct PptxReader;

impl PptxReader {
    /// Create a new PPTX reader.
    pub fn new() -> Self {
        Self
    }

    /// Read a deck from a file on disk.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Deck> {
        let path = path.as_ref();
        log::debug!("Reading deck {}", path.display());
        let file = File::open(path)?;
        self.read(BufReader::new(file))
    }

    /// Read a deck from any seekable source.
    pub fn read<R: Read + Seek>(&self, reader: R) -> Result<Deck> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::Zip(format!("Failed to open ZIP: {}", e)))?;

        let presentation = read_string(&mut archive, PRESENTATION_PART)?;
        let (page, entries) = parse_presentation(&presentation)?;
        let rels_xml = read_string(&mut archive, PRESENTATION_RELS_PART)?;
        let rels = package::parse_relationships(&rels_xml, package::part_dir(PRESENTATION_PART))?;

        let mut parts = Vec::with_capacity(entries.len());
        for (id, rel_id) in entries {
            let rel = rels.get(&rel_id).ok_or_else(|| {
                Error::CorruptedFile(format!(
                    "slide {} references unknown relationship '{}'",
                    id.0, rel_id
                ))
            })?;
            parts.push((id, rel.target.clone()));
        }
        let order: Vec<SlideId> = parts.iter().map(|(id, _)| *id).collect();

        // Physical order follows the slide part numbers.
        parts.sort_by(|a, b| {
            match (extract_slide_number(&a.1), extract_slide_number(&b.1)) {
                (Some(na), Some(nb)) => na.cmp(&nb),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.1.cmp(&b.1),
            }
        });

        let mut media = MediaCache::default();
        let mut slides = Vec::with_capacity(parts.len());
        for (id, part) in &parts {
            slides.push(self.read_slide(&mut archive, *id, part, &mut media)?);
        }

        log::debug!(
            "Read {} slides and {} media parts",
            slides.len(),
            media.store.len()
        );
        Deck::from_parts(page, slides, order, media.store)
    }

    /// Read one slide part and its shapes.
    fn read_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        id: SlideId,
        part: &str,
        media: &mut MediaCache,
    ) -> Result<Slide> {
        let xml = read_string(archive, part)?;
        let rels_part = package::rels_part_for(part);
        let rels = if archive.file_names().any(|name| name == rels_part) {
            let rels_xml = read_string(archive, &rels_part)?;
            package::parse_relationships(&rels_xml, package::part_dir(part))?
        } else {
            HashMap::new()
        };

        let tree = split_shape_tree(&xml)?;
        let mut slide = Slide::new(id);
        for fragment in tree.fragments {
            let shape = self.read_shape(archive, fragment, &tree.namespaces, &rels, media)?;
            slide.copy_shape(shape);
        }
        Ok(slide)
    }

    /// Turn one top-level shape tree element into a [`Shape`].
    ///
    /// Only raster pictures are modelled. Every other element keeps the exact
    /// XML it was stored as, so edits made outside the engine survive.
    fn read_shape<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        xml: String,
        namespaces: &[(String, String)],
        rels: &HashMap<String, Relationship>,
        media: &mut MediaCache,
    ) -> Result<Shape> {
        let scan = ShapeScan::scan(&xml)?;
        let picture = match scan.element.as_slice() {
            b"pic" => scan
                .embed
                .as_ref()
                .and_then(|rel_id| rels.get(rel_id))
                .filter(|rel| !rel.external)
                .and_then(|rel| media.load(archive, &rel.target)),
            _ => None,
        };

        let mut shape = match picture {
            Some(media_id) => Shape::picture(scan.bounds(), media_id, scan.description.clone()),
            None => opaque_shape(xml, namespaces, &scan),
        };
        shape.id = ShapeId(scan.id);
        shape.name = scan.name;
        shape.hidden = scan.hidden;
        Ok(shape)
    }
}

/// Keep a shape verbatim, restoring its role from the name or, for decks
/// without role names, from geometry and text.
fn opaque_shape(xml: String, namespaces: &[(String, String)], scan: &ShapeScan) -> Shape {
    let bounds = scan.bounds();
    let opaque = OpaqueShape {
        xml,
        namespaces: namespaces.to_vec(),
    };
    let role = match Role::from_name(&scan.name) {
        Some(role) => role,
        None => match opaque.text() {
            Ok(text) => Role::infer(&bounds, &text),
            Err(_) => Role::Content,
        },
    };
    Shape::opaque(bounds, opaque).with_role(role)
}

impl Default for PptxReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Media parts loaded so far, keyed by part name.
#[derive(Default)]
struct MediaCache {
    store: MediaStore,
    by_part: HashMap<String, MediaId>,
}

impl MediaCache {
    /// Load an image part once; `None` when it is missing or not a raster image.
    fn load<R: Read + Seek>(&mut self, archive: &mut ZipArchive<R>, part: &str) -> Option<MediaId> {
        if let Some(id) = self.by_part.get(part) {
            return Some(*id);
        }
        let bytes = match read_bytes(archive, part) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Picture payload '{}' unreadable: {}", part, e);
                return None;
            }
        };
        let extension = part.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        let Some(format) =
            ImageFormat::from_magic(&bytes).or_else(|| ImageFormat::from_extension(extension))
        else {
            log::debug!("Picture payload '{}' is not a raster image, kept as is", part);
            return None;
        };
        let id = self.store.add(bytes, format);
        self.by_part.insert(part.to_string(), id);
        Some(id)
    }
}

/// Top-level elements of a slide's shape tree.
struct ShapeTree {
    /// `(prefix, uri)` declarations of the slide root.
    namespaces: Vec<(String, String)>,
    /// Raw XML of each child of `p:spTree`, in z-order.
    fragments: Vec<String>,
}

/// Split a slide into the raw XML of its shape tree children.
fn split_shape_tree(xml: &str) -> Result<ShapeTree> {
    let mut reader = Reader::from_str(xml);
    let mut namespaces = Vec::new();
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut tree_depth: Option<usize> = None;
    let mut fragment_start: Option<usize> = None;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                if depth == 1 {
                    namespaces = root_namespaces(e);
                }
                match tree_depth {
                    None if local_name(e.name().as_ref()) == b"spTree" => tree_depth = Some(depth),
                    Some(tree) if depth == tree + 1 && is_shape_element(e) => {
                        fragment_start = Some(tag_start(xml, before));
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                if tree_depth == Some(depth) && is_shape_element(e) {
                    let end = reader.buffer_position() as usize;
                    fragments.push(xml[tag_start(xml, before)..end].to_string());
                }
            }
            Ok(Event::End(_)) => {
                if let (Some(tree), Some(start)) = (tree_depth, fragment_start) {
                    if depth == tree + 1 {
                        let end = reader.buffer_position() as usize;
                        fragments.push(xml[start..end].to_string());
                        fragment_start = None;
                    }
                }
                if tree_depth == Some(depth) {
                    break;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "Error parsing slide at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(ShapeTree {
        namespaces,
        fragments,
    })
}

/// Offset of the `<` opening the tag read from `pos`.
fn tag_start(xml: &str, pos: usize) -> usize {
    if pos > 0 && xml.as_bytes().get(pos - 1) == Some(&b'<') {
        return pos - 1;
    }
    xml[pos..].find('<').map_or(pos, |i| pos + i)
}

/// Whether a shape tree child is a shape rather than the tree's own properties.
fn is_shape_element(e: &BytesStart) -> bool {
    !matches!(
        local_name(e.name().as_ref()),
        b"nvGrpSpPr" | b"grpSpPr" | b"extLst"
    )
}

fn root_namespaces(e: &BytesStart) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter_map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let prefix = key.strip_prefix("xmlns:")?.to_string();
            Some((prefix, String::from_utf8_lossy(&attr.value).to_string()))
        })
        .collect()
}

/// Identity and placement of one shape element.
#[derive(Debug, Default)]
struct ShapeScan {
    element: Vec<u8>,
    id: u32,
    name: String,
    description: String,
    hidden: bool,
    offset: Option<(i64, i64)>,
    extent: Option<(i64, i64)>,
    embed: Option<String>,
}

impl ShapeScan {
    fn scan(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut scan = Self::default();
        let mut stack: Vec<Vec<u8>> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let name = local_name(e.name().as_ref()).to_vec();
                    scan.visit(e, &name, &stack)?;
                    stack.push(name);
                }
                Ok(Event::Empty(ref e)) => {
                    let name = local_name(e.name().as_ref()).to_vec();
                    scan.visit(e, &name, &stack)?;
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::Xml(format!("Error parsing shape: {}", e))),
                _ => {}
            }
        }

        Ok(scan)
    }

    /// Record what one element says about the shape.
    fn visit(&mut self, e: &BytesStart, name: &[u8], stack: &[Vec<u8>]) -> Result<()> {
        let parent = stack.last().map(Vec::as_slice);

        if stack.is_empty() {
            self.element = name.to_vec();
            return Ok(());
        }

        match name {
            b"cNvPr" if self.name.is_empty() && self.id == 0 => {
                for (key, value) in attributes(e)? {
                    match key.as_str() {
                        "id" => self.id = value.parse().unwrap_or_default(),
                        "name" => self.name = value,
                        "descr" => self.description = value,
                        "hidden" => self.hidden = value == "1" || value == "true",
                        _ => {}
                    }
                }
            }
            b"off" if parent == Some(b"xfrm".as_slice()) && self.offset.is_none() => {
                let attrs = attributes(e)?;
                self.offset = Some((int_attr(&attrs, "x"), int_attr(&attrs, "y")));
            }
            b"ext" if parent == Some(b"xfrm".as_slice()) && self.extent.is_none() => {
                let attrs = attributes(e)?;
                self.extent = Some((int_attr(&attrs, "cx"), int_attr(&attrs, "cy")));
            }
            b"blip" => {
                self.embed = e
                    .attributes()
                    .flatten()
                    .find(|attr| local_name(attr.key.as_ref()) == b"embed")
                    .map(|attr| String::from_utf8_lossy(&attr.value).to_string());
            }
            _ => {}
        }
        Ok(())
    }

    fn bounds(&self) -> Rect {
        let (left, top) = self.offset.unwrap_or_default();
        let (width, height) = self.extent.unwrap_or_default();
        Rect::new(Emu(left), Emu(top), Emu(width), Emu(height))
    }
}

/// Unescaped `(key, value)` pairs of an element.
fn attributes(e: &BytesStart) -> Result<Vec<(String, String)>> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(e.to_string()))?
                .to_string();
            Ok((key, value))
        })
        .collect()
}

fn int_attr(attrs: &[(String, String)], key: &str) -> i64 {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or_default()
}

/// Page size and `(slide id, relationship id)` entries of `presentation.xml`.
fn parse_presentation(xml: &str) -> Result<(PageSize, Vec<(SlideId, String)>)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut page = PageSize::default();
    let mut entries = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sldSz" => {
                    let attrs = attributes(e)?;
                    page = PageSize {
                        width: Emu(int_attr(&attrs, "cx")),
                        height: Emu(int_attr(&attrs, "cy")),
                    };
                }
                b"sldId" => {
                    let mut id = None;
                    let mut rel_id = None;
                    for (key, value) in attributes(e)? {
                        if key == "id" {
                            id = value.parse::<u32>().ok();
                        } else if local_name(key.as_bytes()) == b"id" {
                            rel_id = Some(value);
                        }
                    }
                    match (id, rel_id) {
                        (Some(id), Some(rel_id)) => entries.push((SlideId(id), rel_id)),
                        _ => {
                            return Err(Error::CorruptedFile(
                                "slide list entry without id".to_string(),
                            ))
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "Error parsing presentation: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok((page, entries))
}

/// Read a text part from the ZIP archive.
fn read_string<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::Zip(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::Zip(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Read a binary part from the ZIP archive.
fn read_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::Zip(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| Error::Zip(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::ShapeKind;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006">
  <p:cSld>
    <p:spTree>
      <p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
      <p:grpSpPr/>
      <p:sp><p:nvSpPr><p:cNvPr id="4" name="TextBox 3"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="11292120" y="6498000"/><a:ext cx="720000" cy="360000"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>7</a:t></a:r></a:p></p:txBody></p:sp>
      <p:cxnSp><p:nvCxnSpPr><p:cNvPr id="5" name="Connector"/><p:cNvCxnSpPr/><p:nvPr/></p:nvCxnSpPr><p:spPr/></p:cxnSp>
    </p:spTree>
  </p:cSld>
</p:sld>"#;

    #[test]
    fn test_split_shape_tree() {
        let tree = split_shape_tree(SLIDE).unwrap();
        assert_eq!(tree.fragments.len(), 2);
        assert!(tree.fragments[0].starts_with("<p:sp>"));
        assert!(tree.fragments[0].ends_with("</p:sp>"));
        assert!(tree.fragments[1].starts_with("<p:cxnSp>"));
        assert!(tree.fragments[1].ends_with("</p:cxnSp>"));
        assert!(tree
            .namespaces
            .iter()
            .any(|(prefix, _)| prefix == "mc"));
        assert_eq!(tree.namespaces.len(), 4);
    }

    #[test]
    fn test_shape_scan_legacy_text_box() {
        let tree = split_shape_tree(SLIDE).unwrap();
        let scan = ShapeScan::scan(&tree.fragments[0]).unwrap();
        assert_eq!(scan.element, b"sp");
        assert_eq!(scan.id, 4);
        assert_eq!(scan.name, "TextBox 3");
        assert_eq!(
            scan.bounds(),
            Rect::new(Emu(11_292_120), Emu(6_498_000), Emu(720_000), Emu(360_000))
        );

        let shape = opaque_shape(tree.fragments[0].clone(), &tree.namespaces, &scan);
        assert_eq!(shape.role, Role::PageNumber);
        assert_eq!(shape.inspect_text().unwrap().as_deref(), Some("7"));
    }

    #[test]
    fn test_engine_text_box_stays_verbatim() {
        let xml = r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Text Box 2"/></p:nvSpPr><p:txBody><a:p><a:pPr algn="ctr"/><a:r><a:rPr sz="1250" b="1"/><a:t>Mobile </a:t></a:r><a:r><a:rPr i="1"><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill></a:rPr><a:t>growth</a:t></a:r></a:p></p:txBody></p:sp>"#;
        let scan = ShapeScan::scan(xml).unwrap();
        let shape = opaque_shape(xml.to_string(), &[], &scan);
        match &shape.kind {
            ShapeKind::Opaque(opaque) => assert_eq!(opaque.xml, xml),
            other => panic!("expected opaque shape, got {:?}", other),
        }
        assert_eq!(shape.role, Role::Content);
        assert_eq!(shape.inspect_text().unwrap().as_deref(), Some("Mobile growth"));
    }

    #[test]
    fn test_role_restored_from_name() {
        let xml = r#"<p:sp><p:nvSpPr><p:cNvPr id="9" name="Cover Marker 9" hidden="1"/></p:nvSpPr><p:txBody><a:p><a:r><a:t>x</a:t></a:r></a:p></p:txBody></p:sp>"#;
        let scan = ShapeScan::scan(xml).unwrap();
        assert!(scan.hidden);
        let shape = opaque_shape(xml.to_string(), &[], &scan);
        assert_eq!(shape.role, Role::CoverMarker);
    }

    #[test]
    fn test_parse_presentation() {
        let xml = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="258" r:id="rId3"/><p:sldId id="256" r:id="rId2"/></p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/></p:presentation>"#;
        let (page, entries) = parse_presentation(xml).unwrap();
        assert_eq!(page.width, Emu(9_144_000));
        assert_eq!(
            entries,
            vec![
                (SlideId(258), "rId3".to_string()),
                (SlideId(256), "rId2".to_string())
            ]
        );
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("ppt/slides/slide12.xml"), Some(12));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_tag_start() {
        let xml = "<a><b/></a>";
        assert_eq!(tag_start(xml, 3), 3);
        assert_eq!(tag_start(xml, 4), 3);
    }
}
