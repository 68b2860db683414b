pub mod catalog;
pub mod extract;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{ExamError, UploadRejection};

pub use catalog::Catalog;
pub use extract::{PdfTextExtractor, TextExtractor};

pub const PDF_MIME: &str = "application/pdf";

/// Appended to prompt text that was cut at the character limit.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated for processing...]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    Catalog,
    Upload,
}

#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub text: String,
    pub filename: String,
    pub title: Option<String>,
    pub byte_size: u64,
    pub source: DocumentSource,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub filename: String,
    pub title: Option<String>,
    pub size: u64,
    pub content_length: usize,
    pub has_content: bool,
    pub source: Option<DocumentSource>,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub min_chars: usize,
    pub max_pages: usize,
}

impl From<&Settings> for UploadLimits {
    fn from(settings: &Settings) -> Self {
        Self {
            max_bytes: settings.max_upload_bytes,
            min_chars: settings.min_extracted_chars,
            max_pages: settings.max_pdf_pages,
        }
    }
}

impl DocumentContent {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn metadata(&self) -> DocumentMetadata {
        let content_length = self.char_len();
        DocumentMetadata {
            filename: self.filename.clone(),
            title: self.title.clone(),
            size: self.byte_size,
            content_length,
            has_content: content_length > 0,
            source: Some(self.source),
            loaded_at: Some(self.loaded_at),
        }
    }
}

/// Holds the one study document of a session. A new load replaces it
/// wholesale; a rejected load leaves it untouched.
pub struct DocumentStore {
    catalog: Catalog,
    extractor: Arc<dyn TextExtractor>,
    limits: UploadLimits,
    current: Option<DocumentContent>,
}

impl DocumentStore {
    pub fn new(catalog: Catalog, extractor: Arc<dyn TextExtractor>, limits: UploadLimits) -> Self {
        Self {
            catalog,
            extractor,
            limits,
            current: None,
        }
    }

    pub fn load_from_catalog(&mut self, id: &str) -> Result<&DocumentContent, ExamError> {
        let material = self
            .catalog
            .get(id)
            .ok_or_else(|| ExamError::NotFound(id.to_string()))?;

        let document = DocumentContent {
            text: material.content.clone(),
            filename: material.filename.clone(),
            title: Some(material.title.clone()),
            byte_size: material.content.len() as u64,
            source: DocumentSource::Catalog,
            loaded_at: Utc::now(),
        };

        tracing::info!("Loaded material {} ({} characters)", id, document.char_len());
        Ok(&*self.current.insert(document))
    }

    pub fn load_from_upload(
        &mut self,
        filename: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<&DocumentContent, ExamError> {
        if mime_type != PDF_MIME {
            return Err(UploadRejection::UnsupportedType(mime_type.to_string()).into());
        }

        let size = bytes.len() as u64;
        if size > self.limits.max_bytes {
            return Err(UploadRejection::TooLarge { size, limit: self.limits.max_bytes }.into());
        }

        let text = self.extractor.extract(bytes, self.limits.max_pages)?;
        let text = text.trim();
        let chars = text.chars().count();
        if chars < self.limits.min_chars {
            tracing::warn!("Rejected {}: only {} characters extracted", filename, chars);
            return Err(UploadRejection::ExtractionFailed(format!(
                "{} characters extracted, at least {} required",
                chars, self.limits.min_chars
            ))
            .into());
        }

        let document = DocumentContent {
            text: text.to_string(),
            filename: filename.to_string(),
            title: None,
            byte_size: size,
            source: DocumentSource::Upload,
            loaded_at: Utc::now(),
        };

        tracing::info!("Loaded upload {} ({} bytes, {} characters)", filename, size, chars);
        Ok(&*self.current.insert(document))
    }

    pub fn current(&self) -> Option<&DocumentContent> {
        self.current.as_ref()
    }

    /// Stored text for prompt inclusion, empty when nothing is loaded.
    pub fn for_prompt(&self, max_chars: usize) -> Cow<'_, str> {
        match self.current() {
            Some(document) => truncate_for_prompt(&document.text, max_chars),
            None => Cow::Borrowed(""),
        }
    }

    pub fn chunks(&self, chunk_size: usize) -> Vec<String> {
        self.current()
            .map(|document| chunk_words(&document.text, chunk_size))
            .unwrap_or_default()
    }

    pub fn metadata(&self) -> DocumentMetadata {
        self.current()
            .map(DocumentContent::metadata)
            .unwrap_or_else(|| DocumentMetadata {
                filename: "Unknown".to_string(),
                title: None,
                size: 0,
                content_length: 0,
                has_content: false,
                source: None,
                loaded_at: None,
            })
    }
}

/// Returns `text` unchanged when it fits, else its first `max_chars`
/// characters followed by [`TRUNCATION_MARKER`].
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(format!("{}{}", &text[..idx], TRUNCATION_MARKER)),
        None => Cow::Borrowed(text),
    }
}

/// Greedy word packing. A single word longer than `chunk_size` gets its own chunk.
pub fn chunk_words(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        if current_chars > 0 && current_chars + 1 + word_chars > chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if current_chars > 0 {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(word);
        current_chars += word_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
