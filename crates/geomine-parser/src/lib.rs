//! GeoMine Parser - Page-wise PDF text extraction
//!
//! A `PdfTextExtractor` runs a primary backend and, when it fails or finds
//! no text, a secondary backend. Extraction never fails outward: an
//! unreadable document simply yields no pages, so a batch keeps going.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

pub mod pdf;

pub use pdf::{LopdfBackend, PdfExtractBackend};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document parsing
#[derive(Error, Debug)]
pub enum ParserError {
    /// IO error while reading the file or directory
    #[error("IO error reading {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// File is encrypted and cannot be parsed
    #[error("File is encrypted and requires a password: {0}")]
    EncryptedFile(String),

    /// The parsing library panicked on malformed input
    #[error("PDF parser aborted: {0}")]
    ParserPanic(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Page records
// ============================================================================

/// Text of one physical page, numbered from 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub page_number: u32,
    pub text: String,
}

impl PageRecord {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// Number pages from 1 in iteration order, trimming text and dropping blank pages
pub fn collect_pages<I, S>(texts: I) -> Vec<PageRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .enumerate()
        .filter_map(|(i, text)| {
            let trimmed = text.as_ref().trim();
            (!trimmed.is_empty()).then(|| PageRecord::new(i as u32 + 1, trimmed))
        })
        .collect()
}

/// A single method of turning PDF bytes into page texts
pub trait PageExtractor: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Extract non-empty pages in physical order
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageRecord>>;
}

// ============================================================================
// Extractor with fallback
// ============================================================================

/// PDF text extractor with a primary and a fallback backend
pub struct PdfTextExtractor {
    primary: Box<dyn PageExtractor>,
    fallback: Box<dyn PageExtractor>,
}

impl PdfTextExtractor {
    /// `pdf-extract` first, `lopdf` as fallback
    pub fn new() -> Self {
        Self::with_backends(Box::new(PdfExtractBackend), Box::new(LopdfBackend))
    }

    pub fn with_backends(primary: Box<dyn PageExtractor>, fallback: Box<dyn PageExtractor>) -> Self {
        Self { primary, fallback }
    }

    /// Extract pages from a file. Unreadable files yield no pages.
    pub fn extract(&self, path: &Path) -> Vec<PageRecord> {
        let label = path.display().to_string();
        match std::fs::read(path) {
            Ok(bytes) => self.extract_bytes(&bytes, &label),
            Err(e) => {
                warn!("[PDF] Cannot read {label}: {e}");
                Vec::new()
            }
        }
    }

    /// Extract pages from in-memory PDF bytes
    pub fn extract_bytes(&self, bytes: &[u8], label: &str) -> Vec<PageRecord> {
        info!("[PDF] Parsing with {}: {label}", self.primary.name());
        match run_guarded(self.primary.as_ref(), bytes) {
            Ok(pages) if !pages.is_empty() => {
                debug!("[PDF] {} extracted {} pages", self.primary.name(), pages.len());
                return pages;
            }
            Ok(_) => warn!("[PDF] {} found no text in {label}", self.primary.name()),
            Err(e) => warn!("[PDF] {} failed for {label}: {e}", self.primary.name()),
        }

        info!("[PDF] Falling back to {}: {label}", self.fallback.name());
        match run_guarded(self.fallback.as_ref(), bytes) {
            Ok(pages) => {
                debug!("[PDF] {} extracted {} pages", self.fallback.name(), pages.len());
                pages
            }
            Err(e) => {
                warn!("[PDF] {} failed for {label}: {e}", self.fallback.name());
                Vec::new()
            }
        }
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a backend, turning a library panic into an error and dropping blank pages
fn run_guarded(backend: &dyn PageExtractor, bytes: &[u8]) -> Result<Vec<PageRecord>> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| backend.extract_pages(bytes)));
    let pages = match outcome {
        Ok(result) => result?,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            return Err(ParserError::ParserPanic(message));
        }
    };

    Ok(pages
        .into_iter()
        .filter(|p| !p.text.trim().is_empty())
        .collect())
}

// ============================================================================
// Directory listing
// ============================================================================

/// Whether the path has a `.pdf` extension (any case)
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// PDF files directly inside `dir`, sorted by file name
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ParserError::IoError {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ParserError::IoError {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file() && is_pdf(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend(std::result::Result<Vec<&'static str>, &'static str>);

    impl PageExtractor for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<PageRecord>> {
            match &self.0 {
                Ok(texts) => Ok(collect_pages(texts.iter())),
                Err(msg) => Err(ParserError::PdfError(msg.to_string())),
            }
        }
    }

    struct PanickingBackend;

    impl PageExtractor for PanickingBackend {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<PageRecord>> {
            panic!("bad xref table")
        }
    }

    #[test]
    fn test_collect_pages_skips_blank_pages() {
        let pages = collect_pages(["  first  ", "", "\n\t", "fourth"]);
        assert_eq!(
            pages,
            vec![PageRecord::new(1, "first"), PageRecord::new(4, "fourth")]
        );
    }

    #[test]
    fn test_primary_success_skips_fallback() {
        let extractor = PdfTextExtractor::with_backends(
            Box::new(FixedBackend(Ok(vec!["primary text"]))),
            Box::new(FixedBackend(Ok(vec!["fallback text"]))),
        );
        let pages = extractor.extract_bytes(b"%PDF", "test.pdf");
        assert_eq!(pages, vec![PageRecord::new(1, "primary text")]);
    }

    #[test]
    fn test_error_falls_back() {
        let extractor = PdfTextExtractor::with_backends(
            Box::new(FixedBackend(Err("broken"))),
            Box::new(FixedBackend(Ok(vec!["", "fallback text"]))),
        );
        let pages = extractor.extract_bytes(b"%PDF", "test.pdf");
        assert_eq!(pages, vec![PageRecord::new(2, "fallback text")]);
    }

    #[test]
    fn test_empty_output_falls_back() {
        let extractor = PdfTextExtractor::with_backends(
            Box::new(FixedBackend(Ok(vec!["   "]))),
            Box::new(FixedBackend(Ok(vec!["fallback text"]))),
        );
        assert_eq!(extractor.extract_bytes(b"%PDF", "x.pdf").len(), 1);
    }

    #[test]
    fn test_panic_is_contained() {
        let extractor = PdfTextExtractor::with_backends(
            Box::new(PanickingBackend),
            Box::new(FixedBackend(Err("also broken"))),
        );
        assert!(extractor.extract_bytes(b"garbage", "x.pdf").is_empty());
    }

    #[test]
    fn test_missing_file_yields_no_pages() {
        let extractor = PdfTextExtractor::new();
        assert!(extractor
            .extract(Path::new("/definitely/not/here.pdf"))
            .is_empty());
    }

    #[test]
    fn test_list_pdfs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf.bak"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let files = list_pdfs(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn test_list_pdfs_missing_dir_is_error() {
        assert!(list_pdfs(Path::new("/definitely/not/a/dir")).is_err());
    }
}
