//! PDF backends
//!
//! `PdfExtractBackend` uses pdf-extract's page-wise layout text and is the
//! primary method. `LopdfBackend` reads content streams directly through
//! lopdf and copes with some files pdf-extract rejects.

use crate::{collect_pages, PageExtractor, PageRecord, ParserError, Result};

/// Primary backend built on `pdf-extract`
pub struct PdfExtractBackend;

impl PageExtractor for PdfExtractBackend {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageRecord>> {
        let texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ParserError::PdfError(e.to_string()))?;
        Ok(collect_pages(texts))
    }
}

/// Fallback backend built on `lopdf`
pub struct LopdfBackend;

impl PageExtractor for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageRecord>> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| ParserError::PdfError(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(ParserError::EncryptedFile(
                "document is encrypted".to_string(),
            ));
        }

        let mut pages = Vec::new();
        // Keys are 1-based page numbers in physical order
        for page_number in doc.get_pages().into_keys() {
            match doc.extract_text(&[page_number]) {
                Ok(text) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        pages.push(PageRecord::new(page_number, trimmed));
                    }
                }
                Err(e) => {
                    tracing::debug!("[PDF] lopdf skipped page {page_number}: {e}");
                }
            }
        }

        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(PdfExtractBackend.name(), "pdf-extract");
        assert_eq!(LopdfBackend.name(), "lopdf");
    }

    #[test]
    fn test_lopdf_rejects_garbage() {
        assert!(LopdfBackend.extract_pages(b"this is not a pdf").is_err());
    }
}
