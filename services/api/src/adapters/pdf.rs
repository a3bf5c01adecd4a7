//! services/api/src/adapters/pdf.rs
//!
//! Text extraction for PDF uploads. Implements the `TextExtractionService` port
//! with `pdf-extract`.

use async_trait::async_trait;
use bytes::Bytes;
use document_insights_core::domain::ExtractedText;
use document_insights_core::ports::{PortError, PortResult, TextExtractionService};
use tracing::debug;

const PDF_MIME: &str = "application/pdf";

/// Extracts plain text from PDFs; every other format is unsupported.
#[derive(Clone, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractionService for PdfTextExtractor {
    fn supports(&self, mime_type: &str) -> bool {
        mime_type.eq_ignore_ascii_case(PDF_MIME)
    }

    async fn extract(&self, bytes: Bytes) -> PortResult<ExtractedText> {
        // A panic in the parser surfaces here as a JoinError.
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await
        .map_err(|e| PortError::Unexpected(format!("PDF parser crashed: {}", e)))?
        .map_err(|e| PortError::Unexpected(format!("Failed to extract text from PDF: {}", e)))?;

        let extracted = join_pages(pages);
        debug!(
            chars = extracted.text.len(),
            page_count = ?extracted.page_count,
            "Extracted text from PDF"
        );
        Ok(extracted)
    }
}

fn join_pages(pages: Vec<String>) -> ExtractedText {
    ExtractedText {
        page_count: u32::try_from(pages.len()).ok(),
        text: pages.join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pdf_is_supported() {
        let extractor = PdfTextExtractor::new();
        assert!(extractor.supports("application/pdf"));
        assert!(extractor.supports("Application/PDF"));
        assert!(!extractor.supports("text/plain"));
        assert!(!extractor.supports("image/png"));
    }

    #[test]
    fn pages_are_joined_and_counted() {
        let extracted = join_pages(vec![
            "Notice of assessment".to_string(),
            "Amount due: $120".to_string(),
            String::new(),
        ]);
        assert_eq!(extracted.page_count, Some(3));
        assert_eq!(extracted.text, "Notice of assessment\nAmount due: $120\n");
    }

    #[tokio::test]
    async fn garbage_bytes_are_an_extraction_error() {
        let extractor = PdfTextExtractor::new();
        let result = extractor
            .extract(Bytes::from_static(b"definitely not a pdf"))
            .await;
        assert!(result.is_err());
    }
}
