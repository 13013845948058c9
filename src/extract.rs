//! Document text extraction collaborator.
//!
//! The ingestion pipeline consumes per-page text through the
//! [`TextExtractor`] trait; [`PdfExtractor`] is the production
//! implementation backed by `pdf-extract`. Corrupt or unreadable input
//! is fatal to the ingest call.

use crate::error::{Error, Result};

/// Extracts ordered per-page text from a binary document.
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

/// PDF extractor producing one text entry per page.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| Error::Extract(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_is_fatal() {
        let err = PdfExtractor.extract_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, Error::Extract(_)));
    }
}
