//! Error types for outline extraction.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, OutlineError>;

/// Errors surfaced to callers of the extraction pipeline.
///
/// An empty document is not an error: it yields a root with no children.
#[derive(Error, Debug)]
pub enum OutlineError {
    /// The file cannot be opened or parsed by any available backend.
    #[error("Document unreadable: {0}")]
    DocumentUnreadable(String),

    /// The declared or detected kind is not one of pdf, docx, pptx.
    #[error("Unsupported file kind: {0}")]
    UnsupportedFileKind(String),

    /// The file could not be read from disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a single extractor variant.
///
/// The dispatcher treats every variant as recoverable and moves on to the
/// next extractor in the chain; only when the chain is exhausted does the
/// failure become [`OutlineError::DocumentUnreadable`].
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The variant found nothing to work with (e.g. an empty bookmark table).
    #[error("No native outline present")]
    NoOutline,

    /// The container or its main part could not be parsed.
    #[error("Unreadable document: {0}")]
    Unreadable(String),

    /// Every text backend failed.
    #[error("All text backends failed: {0}")]
    BackendsExhausted(String),
}

impl ExtractError {
    pub fn unreadable(err: impl std::fmt::Display) -> Self {
        ExtractError::Unreadable(err.to_string())
    }
}
