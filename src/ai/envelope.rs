//! Recovers a JSON object from free-form model output.
//!
//! Model replies are not guaranteed to be bare JSON. They are often fenced in
//! a ```json block or surrounded by prose. Recovery runs in two stages: strip
//! fences and parse, then fall back to the greedy span from the first `{` to
//! the last `}`. The greedy span can swallow prose between two separate
//! objects; callers get `EnvelopeUnparseable` in that case rather than a
//! guessed object.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::ExamError;

const PREVIEW_CHARS: usize = 120;

fn object_span() -> &'static Regex {
    static SPAN: OnceLock<Regex> = OnceLock::new();
    SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

pub fn extract_json(text: &str) -> Result<Value, ExamError> {
    let stripped = strip_code_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        if value.is_object() {
            return Ok(value);
        }
    }

    if let Some(span) = object_span().find(stripped) {
        if let Ok(value) = serde_json::from_str::<Value>(span.as_str()) {
            return Ok(value);
        }
    }

    tracing::warn!("Failed to parse JSON from model output: {}", preview(text));
    Err(ExamError::EnvelopeUnparseable(preview(text)))
}

/// Extracts the JSON object and decodes it into `T`.
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, ExamError> {
    let value = extract_json(text)?;
    serde_json::from_value(value).map_err(|e| ExamError::EnvelopeUnparseable(e.to_string()))
}

fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();

    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }

    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }

    s.trim()
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
