//! PDF outline extraction: native bookmarks first, heading heuristics as fallback.

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::config::HeuristicConfig;
use crate::dispatcher::{ExtractorVariant, OutlineExtractor, SourceDocument};
use crate::error::ExtractError;
use crate::heading_classifier::{ClassifierSet, LineContext};
use crate::outline_node::{nest_by_levels, normalize_title, OutlineItem, OutlineNode, SourceRef};
use crate::pdf_text_extractor::FastPdfExtractor;

pub const PDF_ROOT_TITLE: &str = "PDF";

/// Builds the tree straight from the document's bookmark table.
pub struct PdfBookmarkExtractor;

impl OutlineExtractor for PdfBookmarkExtractor {
    fn variant(&self) -> ExtractorVariant {
        ExtractorVariant::PdfBookmark
    }

    fn extract(&self, document: &SourceDocument) -> Result<OutlineNode, ExtractError> {
        let doc = Document::load_mem(&document.bytes).map_err(ExtractError::unreadable)?;

        let bookmarks = read_bookmarks(&doc);
        if bookmarks.is_empty() {
            return Err(ExtractError::NoOutline);
        }

        let mut root = OutlineNode::new(PDF_ROOT_TITLE, 0).with_children(bookmarks);
        root.renumber();
        Ok(root)
    }
}

/// Read the bookmark table (catalog `/Outlines`) into top-level nodes.
///
/// Entries that cannot be resolved are skipped; a cycle in the
/// `/First`/`/Next` links ends the walk at the repeated entry.
pub fn read_bookmarks(doc: &Document) -> Vec<OutlineNode> {
    let Some(first) = outline_root_first(doc) else {
        return Vec::new();
    };

    let page_numbers: HashMap<ObjectId, u32> = doc
        .get_pages()
        .into_iter()
        .map(|(num, id)| (id, num))
        .collect();

    let mut walker = BookmarkWalker {
        doc,
        page_numbers,
        visited: HashSet::new(),
    };
    walker.walk_siblings(first, 1)
}

fn outline_root_first(doc: &Document) -> Option<ObjectId> {
    let catalog = doc.catalog().ok()?;
    let outlines = resolve_dict(doc, catalog.get(b"Outlines").ok()?)?;
    outlines.get(b"First").ok()?.as_reference().ok()
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

struct BookmarkWalker<'a> {
    doc: &'a Document,
    page_numbers: HashMap<ObjectId, u32>,
    visited: HashSet<ObjectId>,
}

impl BookmarkWalker<'_> {
    fn walk_siblings(&mut self, first: ObjectId, level: u32) -> Vec<OutlineNode> {
        let mut nodes = Vec::new();
        let mut current = Some(first);

        while let Some(item_ref) = current {
            if !self.visited.insert(item_ref) {
                log::warn!("Bookmark cycle at object {:?}, stopping", item_ref);
                break;
            }

            let Ok(item) = self.doc.get_dictionary(item_ref) else {
                log::debug!("Skipping unreadable bookmark {:?}", item_ref);
                break;
            };

            let children = match item.get(b"First").and_then(Object::as_reference) {
                Ok(child_ref) => self.walk_siblings(child_ref, level + 1),
                Err(_) => Vec::new(),
            };

            let title = self.title(item);
            if title.is_empty() {
                // Keep the subtree of an untitled entry in place
                nodes.extend(children);
            } else {
                nodes.push(
                    OutlineNode::new(title, level)
                        .with_source(self.destination_page(item).map(SourceRef::Page))
                        .with_children(children),
                );
            }

            current = item.get(b"Next").and_then(Object::as_reference).ok();
        }

        nodes
    }

    fn title(&self, item: &Dictionary) -> String {
        let raw = match item.get(b"Title") {
            Ok(Object::Reference(id)) => self.doc.get_object(*id).ok(),
            Ok(object) => Some(object),
            Err(_) => None,
        };
        match raw {
            Some(Object::String(bytes, _)) => normalize_title(&decode_pdf_string(bytes)),
            _ => String::new(),
        }
    }

    /// Target page from `/Dest` or a GoTo action's `/D`.
    fn destination_page(&self, item: &Dictionary) -> Option<u32> {
        if let Ok(dest) = item.get(b"Dest") {
            return self.resolve_destination(dest);
        }

        let action = resolve_dict(self.doc, item.get(b"A").ok()?)?;
        self.resolve_destination(action.get(b"D").ok()?)
    }

    fn resolve_destination(&self, dest: &Object) -> Option<u32> {
        let dest = match dest {
            Object::Reference(id) => self.doc.get_object(*id).ok()?,
            other => other,
        };
        // Named destinations are not resolved
        let page_ref = dest.as_array().ok()?.first()?.as_reference().ok()?;
        self.page_numbers.get(&page_ref).copied()
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8, else Latin-1.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Scans page text for heading-like lines when the PDF has no bookmarks.
pub struct PdfHeuristicExtractor {
    text: FastPdfExtractor,
    classifiers: ClassifierSet,
    config: HeuristicConfig,
}

impl PdfHeuristicExtractor {
    pub fn new(config: HeuristicConfig) -> Self {
        Self::with_text_extractor(FastPdfExtractor::new(), config)
    }

    pub fn with_text_extractor(text: FastPdfExtractor, config: HeuristicConfig) -> Self {
        Self {
            text,
            classifiers: ClassifierSet::default_for(&config),
            config,
        }
    }

    pub fn with_classifiers(mut self, classifiers: ClassifierSet) -> Self {
        self.classifiers = classifiers;
        self
    }
}

impl OutlineExtractor for PdfHeuristicExtractor {
    fn variant(&self) -> ExtractorVariant {
        ExtractorVariant::PdfHeuristic
    }

    fn extract(&self, document: &SourceDocument) -> Result<OutlineNode, ExtractError> {
        let pages = self
            .text
            .extract_pages(&document.bytes, self.config.max_pages)
            .map_err(|e| ExtractError::BackendsExhausted(e.to_string()))?;

        let mut items = Vec::new();
        for page in &pages {
            for line in page.text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if let Some(guess) = self.classifiers.classify(line, &LineContext::PAGE_TEXT) {
                    items.push(OutlineItem::new(guess.level, line, Some(SourceRef::Page(page.page))));
                }
            }
        }

        log::debug!("Heuristic PDF scan: {} pages, {} headings", pages.len(), items.len());
        Ok(nest_by_levels(items, PDF_ROOT_TITLE))
    }
}
