//! File-kind detection and the ordered extractor chains.
//!
//! Every kind maps to a fixed list of extractors tried in priority order;
//! the first one that yields a tree wins. Whatever it returns is normalized
//! to a single level-0 root with strictly increasing child levels and fresh ids.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use zip::ZipArchive;

use crate::cache_system::{CacheKey, OutlineCache};
use crate::config::HeuristicConfig;
use crate::docx_extractor::DocxHeadingExtractor;
use crate::error::{ExtractError, OutlineError, Result};
use crate::outline_node::OutlineNode;
use crate::pdf_extractor::{PdfBookmarkExtractor, PdfHeuristicExtractor};
use crate::pptx_extractor::PptxSlideExtractor;
use crate::shared_utils::{archive_has_part, content_hash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Pdf,
    Docx,
    Pptx,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            "pptx" => Some(FileKind::Pptx),
            _ => None,
        }
    }

    /// Parse a declared kind (`pdf`, `.docx`, `PPTX`).
    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_extension(raw.trim())
            .ok_or_else(|| OutlineError::UnsupportedFileKind(raw.trim().to_string()))
    }

    /// Guess the kind from the file contents.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let head = &bytes[..bytes.len().min(1024)];
        if head.windows(5).any(|w| w == b"%PDF-") {
            return Some(FileKind::Pdf);
        }
        if !bytes.starts_with(b"PK") {
            return None;
        }

        let mut archive = ZipArchive::new(Cursor::new(bytes)).ok()?;
        if archive_has_part(&mut archive, "word/document.xml") {
            Some(FileKind::Docx)
        } else if archive_has_part(&mut archive, "ppt/presentation.xml") {
            Some(FileKind::Pptx)
        } else {
            None
        }
    }

    /// Parse a caller-declared kind; blank counts as not declared.
    pub fn declared(declared: Option<&str>) -> Result<Option<Self>> {
        declared
            .filter(|d| !d.trim().is_empty())
            .map(Self::parse)
            .transpose()
    }

    /// Resolve the kind of a document: declared kind, then file extension, then content.
    pub fn resolve(declared: Option<&str>, path: Option<&Path>, bytes: &[u8]) -> Result<Self> {
        if let Some(kind) = Self::declared(declared)? {
            return Ok(kind);
        }

        let extension = path
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().to_string());
        if let Some(kind) = extension.as_deref().and_then(Self::from_extension) {
            return Ok(kind);
        }

        Self::sniff(bytes).ok_or_else(|| {
            OutlineError::UnsupportedFileKind(extension.unwrap_or_else(|| "unknown".to_string()))
        })
    }

    /// Root title used when the file name is unknown.
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF",
            FileKind::Docx => "DOCX",
            FileKind::Pptx => "PPTX",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label().to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorVariant {
    PdfBookmark,
    PdfHeuristic,
    DocxHeading,
    PptxSlide,
}

impl ExtractorVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractorVariant::PdfBookmark => "pdf-bookmark",
            ExtractorVariant::PdfHeuristic => "pdf-heuristic",
            ExtractorVariant::DocxHeading => "docx-heading",
            ExtractorVariant::PptxSlide => "pptx-slide",
        }
    }
}

impl fmt::Display for ExtractorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An input document held in memory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name, used as the root title.
    pub name: Option<String>,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { name: None, bytes }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let document = Self::new(bytes);
        Ok(match path.file_name() {
            Some(name) => document.with_name(name.to_string_lossy()),
            None => document,
        })
    }
}

/// One way of turning a document into an outline tree.
pub trait OutlineExtractor: Send + Sync {
    fn variant(&self) -> ExtractorVariant;

    /// Extract a tree rooted at level 0.
    ///
    /// `ExtractError::NoOutline` hands over to the next extractor in the
    /// chain without being reported as a failure.
    fn extract(&self, document: &SourceDocument) -> std::result::Result<OutlineNode, ExtractError>;
}

/// Selects and runs the extractor chain for a document.
pub struct Dispatcher {
    pdf: Vec<Box<dyn OutlineExtractor>>,
    docx: Vec<Box<dyn OutlineExtractor>>,
    pptx: Vec<Box<dyn OutlineExtractor>>,
    cache: Option<OutlineCache>,
}

impl Dispatcher {
    /// Default chains: PDF bookmarks then heuristics, DOCX headings, PPTX slides.
    pub fn new(config: HeuristicConfig) -> Self {
        Self {
            pdf: vec![
                Box::new(PdfBookmarkExtractor),
                Box::new(PdfHeuristicExtractor::new(config.clone())),
            ],
            docx: vec![Box::new(DocxHeadingExtractor::new(config))],
            pptx: vec![Box::new(PptxSlideExtractor)],
            cache: None,
        }
    }

    /// Replace the chain used for one kind.
    pub fn with_chain(mut self, kind: FileKind, extractors: Vec<Box<dyn OutlineExtractor>>) -> Self {
        match kind {
            FileKind::Pdf => self.pdf = extractors,
            FileKind::Docx => self.docx = extractors,
            FileKind::Pptx => self.pptx = extractors,
        }
        self
    }

    pub fn with_cache(mut self, cache: OutlineCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&OutlineCache> {
        self.cache.as_ref()
    }

    pub fn chain(&self, kind: FileKind) -> &[Box<dyn OutlineExtractor>] {
        match kind {
            FileKind::Pdf => &self.pdf,
            FileKind::Docx => &self.docx,
            FileKind::Pptx => &self.pptx,
        }
    }

    /// Read a file from disk, resolve its kind and extract its outline.
    ///
    /// A declared kind is checked before the file is touched.
    pub fn dispatch_path(&self, path: &Path, declared_kind: Option<&str>) -> Result<OutlineNode> {
        let declared = FileKind::declared(declared_kind)?;
        let document = SourceDocument::from_path(path)?;
        let kind = match declared {
            Some(kind) => kind,
            None => FileKind::resolve(None, Some(path), &document.bytes)?,
        };
        self.dispatch(&document, kind)
    }

    /// Run the chain for `kind`, stopping at the first extractor that succeeds.
    pub fn dispatch(&self, document: &SourceDocument, kind: FileKind) -> Result<OutlineNode> {
        let root_title = document.name.as_deref().unwrap_or(kind.label());
        let chain = self.chain(kind);
        if chain.is_empty() {
            return Err(OutlineError::UnsupportedFileKind(kind.to_string()));
        }

        let hash = self.cache.as_ref().map(|_| content_hash(&document.bytes));
        if let (Some(cache), Some(hash)) = (&self.cache, &hash) {
            for extractor in chain {
                if let Some(tree) = cache.get(&CacheKey::new(hash.as_str(), extractor.variant())) {
                    return Ok(with_root_title((*tree).clone(), root_title));
                }
            }
        }

        let mut failures = Vec::new();
        for extractor in chain {
            let variant = extractor.variant();
            match extractor.extract(document) {
                Ok(tree) => {
                    let tree = normalize_tree(tree, kind.label());
                    log::info!(
                        "Extracted {} outline nodes with {} extractor",
                        tree.node_count() - 1,
                        variant
                    );
                    let tree = match (&self.cache, &hash) {
                        (Some(cache), Some(hash)) => {
                            (*cache.insert(CacheKey::new(hash.as_str(), variant), tree)).clone()
                        }
                        _ => tree,
                    };
                    return Ok(with_root_title(tree, root_title));
                }
                Err(ExtractError::NoOutline) => {
                    log::debug!("{} found no outline, trying next extractor", variant);
                }
                Err(e) => {
                    log::warn!("{} extractor failed: {}", variant, e);
                    failures.push(format!("{}: {}", variant, e));
                }
            }
        }

        if failures.is_empty() {
            // Readable but nothing to show
            return Ok(OutlineNode::root(root_title));
        }
        Err(OutlineError::DocumentUnreadable(failures.join("; ")))
    }
}

/// Bring an extractor's output to a single level-0 root with strictly
/// increasing child levels and pre-order ids.
pub fn normalize_tree(tree: OutlineNode, root_title: &str) -> OutlineNode {
    let mut root = if tree.level == 0 {
        tree
    } else {
        OutlineNode::new(root_title, 0).with_children(vec![tree])
    };
    if root.title.trim().is_empty() {
        root.title = root_title.to_string();
    }
    root.enforce_levels();
    root.renumber();
    root
}

fn with_root_title(mut tree: OutlineNode, title: &str) -> OutlineNode {
    tree.title = title.to_string();
    tree
}
