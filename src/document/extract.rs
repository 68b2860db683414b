use lopdf::Document;

use crate::error::UploadRejection;

pub trait TextExtractor: Send + Sync {
    /// Plain text of at most `max_pages` pages.
    fn extract(&self, bytes: &[u8], max_pages: usize) -> Result<String, UploadRejection>;
}

pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8], max_pages: usize) -> Result<String, UploadRejection> {
        let document = Document::load_mem(bytes)
            .map_err(|e| UploadRejection::ExtractionFailed(e.to_string()))?;

        let pages = document.get_pages();
        if pages.len() > max_pages {
            tracing::info!("PDF has {} pages, reading the first {}", pages.len(), max_pages);
        }

        let mut text = String::new();
        for page_number in pages.keys().take(max_pages) {
            match document.extract_text(&[*page_number]) {
                Ok(page_text) => {
                    text.push_str(page_text.trim());
                    text.push_str("\n\n");
                }
                Err(e) => tracing::warn!("Skipping page {}: {}", page_number, e),
            }
        }

        Ok(text.trim().to_string())
    }
}
