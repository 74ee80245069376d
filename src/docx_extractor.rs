//! DOCX outlines from heading styles, explicit outline levels and manual numbering.
//!
//! Only headings become nodes; body paragraphs are dropped.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::config::HeuristicConfig;
use crate::dispatcher::{ExtractorVariant, OutlineExtractor, SourceDocument};
use crate::error::ExtractError;
use crate::heading_classifier::{ClassifierSet, HeadingSignal, LineContext};
use crate::outline_node::{nest_by_levels, normalize_title, OutlineItem, OutlineNode, SourceRef};
use crate::shared_utils::{attr_value, decode_text, local_name, open_ooxml, read_archive_part, resolve_entity};

pub const DOCX_ROOT_TITLE: &str = "DOCX";

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";

/// `w:outlineLvl` value meaning "body text".
const BODY_TEXT_OUTLINE_LEVEL: u32 = 9;

lazy_static! {
    // "heading 1" (built-in), "Heading 2", "見出し 1", "Überschrift 3", "标题 1", ...
    static ref HEADING_STYLE_NAME: Regex = Regex::new(
        r"(?i)^(?:heading|見出し|überschrift|titre|título|titulo|标题|標題|제목)\s*(\d{1,2})$"
    )
    .unwrap();
}

/// Level implied by a heading style name, if it is one.
pub fn heading_level_from_style_name(name: &str) -> Option<u32> {
    let name: String = name.trim().nfkc().collect();
    let caps = HEADING_STYLE_NAME.captures(&name)?;
    caps[1].parse::<u32>().ok().filter(|level| *level >= 1)
}

#[derive(Debug, Clone, Default, PartialEq)]
struct StyleInfo {
    name: Option<String>,
    outline_level: Option<u32>,
    based_on: Option<String>,
}

/// Paragraph styles of a document, by style id.
#[derive(Debug, Default)]
pub struct StyleTable {
    styles: HashMap<String, StyleInfo>,
}

impl StyleTable {
    pub fn parse(styles_xml: &str) -> anyhow::Result<Self> {
        let mut reader = Reader::from_str(styles_xml);
        let mut styles = HashMap::new();
        let mut current: Option<(String, StyleInfo)> = None;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) if local_name(e.name().as_ref()) == b"style" => {
                    let is_paragraph = attr_value(e, b"type").is_none_or(|t| t == "paragraph");
                    current = attr_value(e, b"styleId")
                        .filter(|_| is_paragraph)
                        .map(|id| (id, StyleInfo::default()));
                }
                Event::Start(ref e) | Event::Empty(ref e) => {
                    if let Some((_, info)) = current.as_mut() {
                        match local_name(e.name().as_ref()) {
                            b"name" => info.name = attr_value(e, b"val"),
                            b"basedOn" => info.based_on = attr_value(e, b"val"),
                            b"outlineLvl" => {
                                info.outline_level = attr_value(e, b"val").and_then(|v| v.parse().ok())
                            }
                            _ => {}
                        }
                    }
                }
                Event::End(ref e) if local_name(e.name().as_ref()) == b"style" => {
                    if let Some((id, info)) = current.take() {
                        styles.insert(id, info);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(Self { styles })
    }

    /// Heading level of a style: its outline level or its name, following `basedOn`.
    ///
    /// An unknown style id is tried as a name, since documents without a
    /// styles part still use ids such as `Heading1`.
    pub fn heading_level(&self, style_id: &str) -> Option<u32> {
        let mut seen = HashSet::new();
        let mut id = style_id;

        while seen.insert(id) {
            let Some(info) = self.styles.get(id) else {
                return heading_level_from_style_name(id);
            };
            if let Some(level) = info.outline_level {
                return (level < BODY_TEXT_OUTLINE_LEVEL).then_some(level + 1);
            }
            if let Some(level) = info.name.as_deref().and_then(heading_level_from_style_name) {
                return Some(level);
            }
            match info.based_on.as_deref() {
                Some(parent) => id = parent,
                None => return heading_level_from_style_name(style_id),
            }
        }

        None
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// One `w:p` with the properties that matter for heading detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocxParagraph {
    /// 1-based position among all paragraphs.
    pub index: u32,
    pub style_id: Option<String>,
    pub outline_level: Option<u32>,
    pub text: String,
}

/// Paragraphs of the main document part in document order.
///
/// Malformed XML ends the scan; paragraphs read up to that point are kept.
pub fn read_paragraphs(document_xml: &str) -> Vec<DocxParagraph> {
    let mut reader = Reader::from_str(document_xml);
    let mut done = Vec::new();
    // Text-box content nests paragraphs inside paragraphs
    let mut open: Vec<DocxParagraph> = Vec::new();
    let mut in_text = false;
    let mut next_index = 1u32;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                log::warn!(
                    "DOCX body XML error at byte {}: {}; keeping {} paragraphs",
                    reader.buffer_position(),
                    e,
                    done.len()
                );
                break;
            }
        };

        match event {
            Event::Start(ref e) => match local_name(e.name().as_ref()) {
                b"p" => {
                    open.push(DocxParagraph {
                        index: next_index,
                        ..DocxParagraph::default()
                    });
                    next_index += 1;
                }
                b"t" => in_text = !open.is_empty(),
                _ => {}
            },
            Event::Empty(ref e) => {
                let Some(paragraph) = open.last_mut() else {
                    if local_name(e.name().as_ref()) == b"p" {
                        next_index += 1;
                    }
                    continue;
                };
                match local_name(e.name().as_ref()) {
                    b"p" => next_index += 1,
                    b"pStyle" => paragraph.style_id = attr_value(e, b"val"),
                    b"outlineLvl" => {
                        paragraph.outline_level = attr_value(e, b"val").and_then(|v| v.parse().ok())
                    }
                    b"tab" | b"br" => paragraph.text.push(' '),
                    _ => {}
                }
            }
            Event::Text(ref e) if in_text => {
                if let Some(paragraph) = open.last_mut() {
                    paragraph.text.push_str(&decode_text(e));
                }
            }
            Event::GeneralRef(ref e) if in_text => {
                if let (Some(paragraph), Some(resolved)) = (open.last_mut(), resolve_entity(e)) {
                    paragraph.text.push_str(&resolved);
                }
            }
            Event::End(ref e) => match local_name(e.name().as_ref()) {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(paragraph) = open.pop() {
                        done.push(paragraph);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    // Nested paragraphs close before their parent; restore document order
    done.sort_by_key(|p| p.index);
    done
}

/// Maps heading styles (built-in or localized) and manually numbered
/// paragraphs to outline levels.
pub struct DocxHeadingExtractor {
    classifiers: ClassifierSet,
    config: HeuristicConfig,
}

impl DocxHeadingExtractor {
    pub fn new(config: HeuristicConfig) -> Self {
        Self {
            classifiers: ClassifierSet::default_for(&config),
            config,
        }
    }

    pub fn with_classifiers(mut self, classifiers: ClassifierSet) -> Self {
        self.classifiers = classifiers;
        self
    }

    /// Level of a paragraph, or `None` for body text.
    fn paragraph_level(&self, paragraph: &DocxParagraph, styles: &StyleTable) -> Option<u32> {
        let level = match paragraph.outline_level {
            Some(level) if level < BODY_TEXT_OUTLINE_LEVEL => Some(level + 1),
            Some(_) => None,
            None => match paragraph.style_id.as_deref().and_then(|id| styles.heading_level(id)) {
                Some(level) => Some(level),
                None => self.numbered_level(&paragraph.text),
            },
        };
        level.map(|l| l.clamp(1, self.config.max_heading_level.max(1)))
    }

    fn numbered_level(&self, text: &str) -> Option<u32> {
        let text = text.trim();
        if text.chars().count() > self.config.max_numbered_paragraph_chars {
            return None;
        }
        self.classifiers
            .classify(text, &LineContext::PARAGRAPH)
            .filter(|guess| guess.signal == HeadingSignal::Numbering)
            .map(|guess| guess.level)
    }
}

impl OutlineExtractor for DocxHeadingExtractor {
    fn variant(&self) -> ExtractorVariant {
        ExtractorVariant::DocxHeading
    }

    fn extract(&self, document: &SourceDocument) -> Result<OutlineNode, ExtractError> {
        let mut archive = open_ooxml(&document.bytes)?;
        let body = read_archive_part(&mut archive, DOCUMENT_PART).map_err(ExtractError::unreadable)?;

        let styles = match read_archive_part(&mut archive, STYLES_PART).and_then(|xml| StyleTable::parse(&xml)) {
            Ok(styles) => styles,
            Err(e) => {
                log::debug!("No usable styles part ({}), using style ids only", e);
                StyleTable::default()
            }
        };

        let paragraphs = read_paragraphs(&body);
        let items: Vec<OutlineItem> = paragraphs
            .iter()
            .filter_map(|p| {
                let title = normalize_title(&p.text);
                if title.is_empty() {
                    return None;
                }
                let level = self.paragraph_level(p, &styles)?;
                Some(OutlineItem::new(level, title, Some(SourceRef::Paragraph(p.index))))
            })
            .collect();

        log::debug!(
            "DOCX: {} paragraphs, {} styles, {} headings",
            paragraphs.len(),
            styles.len(),
            items.len()
        );
        Ok(nest_by_levels(items, DOCX_ROOT_TITLE))
    }
}
