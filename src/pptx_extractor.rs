//! PPTX outlines: one level-1 node per slide, bullets below it by indent.

use std::collections::HashMap;
use std::io::{Read, Seek};

use anyhow::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::dispatcher::{ExtractorVariant, OutlineExtractor, SourceDocument};
use crate::error::ExtractError;
use crate::outline_node::{nest_by_levels, normalize_title, OutlineItem, OutlineNode, SourceRef};
use crate::shared_utils::{
    archive_has_part, attr_value, decode_text, local_name, open_ooxml, read_archive_part,
    resolve_entity, trailing_number,
};

pub const PPTX_ROOT_TITLE: &str = "PPTX";

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";
const SLIDE_REL_SUFFIX: &str = "/relationships/slide";

/// Slides become level-1 nodes, bullet paragraphs become level `indent + 2`.
pub struct PptxSlideExtractor;

impl OutlineExtractor for PptxSlideExtractor {
    fn variant(&self) -> ExtractorVariant {
        ExtractorVariant::PptxSlide
    }

    fn extract(&self, document: &SourceDocument) -> Result<OutlineNode, ExtractError> {
        let mut archive = open_ooxml(&document.bytes)?;

        let slide_paths = slide_order(&mut archive);
        if slide_paths.is_empty() && !archive_has_part(&mut archive, PRESENTATION_PART) {
            return Err(ExtractError::Unreadable(format!("{} not found", PRESENTATION_PART)));
        }

        let mut items = Vec::new();
        for (index, path) in slide_paths.iter().enumerate() {
            let number = index as u32 + 1;
            let slide = match read_archive_part(&mut archive, path).and_then(|xml| parse_slide(&xml)) {
                Ok(slide) => slide,
                Err(e) => {
                    log::warn!("Skipping slide {} ({}): {}", number, path, e);
                    continue;
                }
            };
            items.extend(slide.into_items(number));
        }

        log::debug!("PPTX: {} slides, {} outline items", slide_paths.len(), items.len());
        Ok(nest_by_levels(items, PPTX_ROOT_TITLE))
    }
}

/// Slide part paths in presentation order.
///
/// Follows `p:sldIdLst` through the presentation relationships; when that
/// is unavailable, slide parts are ordered by the number in their file name.
pub fn slide_order<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Vec<String> {
    match presentation_order(archive) {
        Ok(paths) if !paths.is_empty() => paths,
        Ok(_) => file_name_order(archive),
        Err(e) => {
            log::debug!("Slide list unavailable ({}), ordering by file name", e);
            file_name_order(archive)
        }
    }
}

fn presentation_order<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    let presentation = read_archive_part(archive, PRESENTATION_PART)?;
    let rels = read_archive_part(archive, PRESENTATION_RELS)?;

    let targets = slide_relationships(&rels)?;
    let order = slide_ids(&presentation)?
        .iter()
        .filter_map(|rel_id| targets.get(rel_id))
        .map(|target| resolve_target(target))
        .collect();
    Ok(order)
}

fn file_name_order<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    let mut slides: Vec<(usize, String)> = archive
        .file_names()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .filter_map(|name| trailing_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort();
    slides.into_iter().map(|(_, name)| name).collect()
}

/// Relationship id -> target for every slide relationship.
fn slide_relationships(rels_xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(rels_xml);
    let mut targets = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if local_name(e.name().as_ref()) == b"Relationship" => {
                let is_slide = attr_value(e, b"Type").is_some_and(|t| t.ends_with(SLIDE_REL_SUFFIX));
                if let (true, Some(id), Some(target)) = (is_slide, attr_value(e, b"Id"), attr_value(e, b"Target")) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(targets)
}

/// `r:id` of each `p:sldId`, in list order.
fn slide_ids(presentation_xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(presentation_xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if local_name(e.name().as_ref()) == b"sldId" => {
                // The unprefixed `id` is the numeric slide id, not the relationship
                let rel_id = e.attributes().flatten().find(|attr| {
                    let key = attr.key.as_ref();
                    key != b"id" && local_name(key) == b"id"
                });
                if let Some(attr) = rel_id {
                    ids.push(String::from_utf8_lossy(&attr.value).into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ids)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target.trim_start_matches("./")),
    }
}

#[derive(Debug, Default)]
struct TextParagraph {
    indent: u32,
    text: String,
}

#[derive(Debug, Default)]
struct TextShape {
    is_title: bool,
    offset: Option<(i64, i64)>,
    paragraphs: Vec<TextParagraph>,
}

impl TextShape {
    fn first_line(&self) -> Option<String> {
        self.paragraphs
            .iter()
            .map(|p| normalize_title(&p.text))
            .find(|t| !t.is_empty())
    }
}

/// Title and bullets of one slide.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideOutline {
    /// `None` when the slide has no text to take a title from.
    pub title: Option<String>,
    /// `(indent, text)` in reading order.
    pub bullets: Vec<(u32, String)>,
}

impl SlideOutline {
    fn into_items(self, number: u32) -> Vec<OutlineItem> {
        let source = Some(SourceRef::Slide(number));
        let title = self.title.unwrap_or_else(|| format!("Slide {}", number));

        let mut items = vec![OutlineItem::new(1, title, source)];
        items.extend(
            self.bullets
                .into_iter()
                .map(|(indent, text)| OutlineItem::new(indent.saturating_add(2), text, source)),
        );
        items
    }
}

/// Read the text shapes of a slide part.
///
/// The title comes from the title placeholder, or else the first line of
/// the topmost text shape. Bullets repeating the title are left out.
pub fn parse_slide(xml: &str) -> Result<SlideOutline> {
    let shapes = read_shapes(xml)?;

    let title = match shapes.iter().find(|s| s.is_title && s.first_line().is_some()) {
        Some(shape) => {
            let joined: Vec<&str> = shape.paragraphs.iter().map(|p| p.text.as_str()).collect();
            Some(normalize_title(&joined.join(" ")))
        }
        None => shapes
            .iter()
            .filter(|s| s.first_line().is_some())
            .min_by_key(|s| s.offset.map_or((i64::MAX, i64::MAX), |(x, y)| (y, x)))
            .and_then(TextShape::first_line),
    };

    let bullets = shapes
        .iter()
        .filter(|s| !s.is_title)
        .flat_map(|s| s.paragraphs.iter())
        .map(|p| (p.indent, normalize_title(&p.text)))
        .filter(|(_, text)| !text.is_empty() && Some(text) != title.as_ref())
        .collect();

    Ok(SlideOutline { title, bullets })
}

fn read_shapes(xml: &str) -> Result<Vec<TextShape>> {
    let mut reader = Reader::from_str(xml);

    let mut shapes = Vec::new();
    let mut shape: Option<TextShape> = None;
    let mut paragraph: Option<TextParagraph> = None;
    let mut in_text_body = false;
    let mut in_run_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match local_name(e.name().as_ref()) {
                b"sp" => shape = Some(TextShape::default()),
                b"txBody" => in_text_body = shape.is_some(),
                b"p" if in_text_body => paragraph = Some(TextParagraph::default()),
                b"t" => in_run_text = paragraph.is_some(),
                _ => shape_property(e, shape.as_mut(), paragraph.as_mut()),
            },
            Event::Empty(ref e) => match local_name(e.name().as_ref()) {
                b"br" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.text.push(' ');
                    }
                }
                _ => shape_property(e, shape.as_mut(), paragraph.as_mut()),
            },
            Event::Text(ref e) if in_run_text => {
                if let Some(p) = paragraph.as_mut() {
                    p.text.push_str(&decode_text(e));
                }
            }
            Event::GeneralRef(ref e) if in_run_text => {
                if let (Some(p), Some(resolved)) = (paragraph.as_mut(), resolve_entity(e)) {
                    p.text.push_str(&resolved);
                }
            }
            Event::End(ref e) => match local_name(e.name().as_ref()) {
                b"t" => in_run_text = false,
                b"p" => {
                    if let (Some(s), Some(p)) = (shape.as_mut(), paragraph.take()) {
                        s.paragraphs.push(p);
                    }
                }
                b"txBody" => in_text_body = false,
                b"sp" => {
                    if let Some(done) = shape.take() {
                        shapes.push(done);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}

/// Placeholder type, position and paragraph indent attributes.
fn shape_property(e: &BytesStart, shape: Option<&mut TextShape>, paragraph: Option<&mut TextParagraph>) {
    match local_name(e.name().as_ref()) {
        b"ph" => {
            if let Some(shape) = shape {
                shape.is_title = matches!(attr_value(e, b"type").as_deref(), Some("title" | "ctrTitle"));
            }
        }
        b"off" => {
            if let Some(shape) = shape.filter(|s| s.offset.is_none()) {
                let coord = |key: &[u8]| attr_value(e, key).and_then(|v| v.parse::<i64>().ok());
                if let (Some(x), Some(y)) = (coord(b"x"), coord(b"y")) {
                    shape.offset = Some((x, y));
                }
            }
        }
        b"pPr" => {
            if let Some(paragraph) = paragraph {
                // a:pPr lvl is 0..=8
                paragraph.indent = attr_value(e, b"lvl")
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(0)
                    .min(8);
            }
        }
        _ => {}
    }
}
