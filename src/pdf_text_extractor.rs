use anyhow::{Context, Result};

/// Text of one PDF page (1-based page number).
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PdfBackend {
    Lopdf,
    PdfExtract,
    /// Backends supplied by callers (tests, alternative engines).
    Custom(&'static str),
}

/// A PDF text extraction engine.
pub trait PageTextBackend: Send + Sync {
    fn backend(&self) -> PdfBackend;

    /// Extract the text of at most `max_pages` pages, in page order.
    ///
    /// Pages that fail individually are skipped; the call only fails when
    /// the document cannot be handled by this engine at all.
    fn page_texts(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<PageText>>;
}

/// Page-by-page extraction through lopdf (secondary).
///
/// lopdf joins the text of one `BT`/`ET` block without line breaks, so it
/// only serves when pdf-extract cannot handle the document.
pub struct LopdfTextBackend;

impl PageTextBackend for LopdfTextBackend {
    fn backend(&self) -> PdfBackend {
        PdfBackend::Lopdf
    }

    fn page_texts(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<PageText>> {
        let doc = lopdf::Document::load_mem(pdf_bytes)
            .with_context(|| "Failed to load PDF with lopdf")?;

        if doc.is_encrypted() {
            anyhow::bail!("PDF is encrypted");
        }

        let pages = doc.get_pages();
        let mut texts = Vec::new();
        let mut failed = 0usize;

        for (&page_num, _) in pages.iter().take(max_pages) {
            match doc.extract_text(&[page_num]) {
                Ok(text) => texts.push(PageText { page: page_num, text }),
                Err(e) => {
                    log::debug!("Skipping page {} (lopdf): {}", page_num, e);
                    failed += 1;
                }
            }
        }

        if texts.is_empty() && failed > 0 {
            anyhow::bail!("lopdf could not extract text from any of {} pages", failed);
        }

        Ok(texts)
    }
}

/// Layout-aware extraction through pdf-extract (primary).
pub struct PdfExtractTextBackend;

impl PageTextBackend for PdfExtractTextBackend {
    fn backend(&self) -> PdfBackend {
        PdfBackend::PdfExtract
    }

    fn page_texts(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<PageText>> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .with_context(|| "Failed to extract text from bytes with pdf-extract")?;

        Ok(pages
            .into_iter()
            .zip(1u32..)
            .take(max_pages)
            .filter(|(text, _)| !text.trim().is_empty())
            .map(|(text, page)| PageText { page, text })
            .collect())
    }
}

/// PDF text extraction with ordered backend fallback.
///
/// Backends are tried in order; the first one that succeeds wins. A backend
/// that errors or panics is logged and skipped.
pub struct FastPdfExtractor {
    backends: Vec<Box<dyn PageTextBackend>>,
}

impl FastPdfExtractor {
    /// pdf-extract first, lopdf as fallback.
    pub fn new() -> Self {
        Self::with_backends(vec![Box::new(PdfExtractTextBackend), Box::new(LopdfTextBackend)])
    }

    pub fn with_backends(backends: Vec<Box<dyn PageTextBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_order(&self) -> Vec<PdfBackend> {
        self.backends.iter().map(|b| b.backend()).collect()
    }

    /// Extract page texts using the first backend that works.
    pub fn extract_pages(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<PageText>> {
        let mut failures = Vec::new();

        for backend in &self.backends {
            let attempt = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                backend.page_texts(pdf_bytes, max_pages)
            }));

            match attempt {
                Ok(Ok(pages)) => {
                    log::debug!(
                        "Extracted {} PDF pages with {:?} backend",
                        pages.len(),
                        backend.backend()
                    );
                    return Ok(pages);
                }
                Ok(Err(e)) => {
                    log::warn!("Backend {:?} failed: {}", backend.backend(), e);
                    failures.push(format!("{:?}: {}", backend.backend(), e));
                }
                Err(_) => {
                    log::warn!("Backend {:?} panicked", backend.backend());
                    failures.push(format!("{:?}: panicked", backend.backend()));
                }
            }
        }

        anyhow::bail!("All PDF extraction backends failed ({})", failures.join("; "))
    }
}

impl Default for FastPdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    impl PageTextBackend for FailingBackend {
        fn backend(&self) -> PdfBackend {
            PdfBackend::Custom("failing")
        }

        fn page_texts(&self, _pdf_bytes: &[u8], _max_pages: usize) -> Result<Vec<PageText>> {
            anyhow::bail!("corrupt content stream")
        }
    }

    struct PanickingBackend;

    impl PageTextBackend for PanickingBackend {
        fn backend(&self) -> PdfBackend {
            PdfBackend::Custom("panicking")
        }

        fn page_texts(&self, _pdf_bytes: &[u8], _max_pages: usize) -> Result<Vec<PageText>> {
            panic!("decoder bug")
        }
    }

    struct FixedBackend(&'static [&'static str]);

    impl PageTextBackend for FixedBackend {
        fn backend(&self) -> PdfBackend {
            PdfBackend::Custom("fixed")
        }

        fn page_texts(&self, _pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<PageText>> {
            Ok(self
                .0
                .iter()
                .zip(1u32..)
                .take(max_pages)
                .map(|(text, page)| PageText { page, text: text.to_string() })
                .collect())
        }
    }

    #[test]
    fn test_default_backend_order() {
        let extractor = FastPdfExtractor::new();
        assert_eq!(
            extractor.backend_order(),
            vec![PdfBackend::PdfExtract, PdfBackend::Lopdf]
        );
    }

    #[test]
    fn test_fallback_to_secondary() {
        let extractor = FastPdfExtractor::with_backends(vec![
            Box::new(FailingBackend),
            Box::new(FixedBackend(&["Intro", "Methods"])),
        ]);

        let pages = extractor.extract_pages(b"%PDF-1.4", 10).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page, 2);
        assert_eq!(pages[1].text, "Methods");
    }

    #[test]
    fn test_panicking_backend_is_skipped() {
        let extractor = FastPdfExtractor::with_backends(vec![
            Box::new(PanickingBackend),
            Box::new(FixedBackend(&["only page"])),
        ]);

        let pages = extractor.extract_pages(b"", 10).unwrap();
        assert_eq!(pages[0].text, "only page");
    }

    #[test]
    fn test_all_backends_fail() {
        let extractor = FastPdfExtractor::with_backends(vec![Box::new(FailingBackend)]);
        let err = extractor.extract_pages(b"", 10).unwrap_err();
        assert!(err.to_string().contains("All PDF extraction backends failed"));
    }

    #[test]
    fn test_invalid_pdf_fails_with_real_backends() {
        let extractor = FastPdfExtractor::new();
        assert!(extractor.extract_pages(b"This is not a valid PDF file", 10).is_err());
    }
}
