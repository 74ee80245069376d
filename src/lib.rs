/// Outline Reader MCP - A Model Context Protocol server that turns PDF, DOCX
/// and PPTX documents into depth-bounded outline trees
/// exported as JSON, Markdown, OPML or Graphviz DOT

pub mod cache_system;
pub mod config;
pub mod dispatcher;
pub mod docx_extractor;
pub mod error;
pub mod exporters;
pub mod heading_classifier;
pub mod mcp_handler;
pub mod outline_node;
pub mod pdf_extractor;
pub mod pdf_text_extractor;
pub mod pptx_extractor;
pub mod render_adapter;
pub mod shared_utils;
pub mod transformer;

/// Re-export the OutlineReader for direct usage
pub use mcp_handler::OutlineReader;

/// Re-export the tree model
pub use outline_node::{nest_by_levels, normalize_title, OutlineItem, OutlineNode, SourceRef};

/// Re-export extraction
pub use dispatcher::{Dispatcher, ExtractorVariant, FileKind, OutlineExtractor, SourceDocument};
pub use docx_extractor::DocxHeadingExtractor;
pub use pdf_extractor::{PdfBookmarkExtractor, PdfHeuristicExtractor};
pub use pptx_extractor::PptxSlideExtractor;

/// Re-export transforms and output
pub use exporters::{export, export_dot, export_json, export_markdown, export_opml, import_json, ExportFormat};
pub use render_adapter::{to_graph, OutlineGraph};
pub use transformer::{clamp, collapse, transform, TransformConfig};

/// Re-export errors and configuration
pub use config::{HeuristicConfig, ReaderConfig};
pub use error::{ExtractError, OutlineError};

/// Re-export fast PDF extraction
pub use pdf_text_extractor::{FastPdfExtractor, PdfBackend};
