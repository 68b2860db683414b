use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

use super::AppState;
use crate::ai::prompts::{self, PromptRequest};
use crate::document::truncate_for_prompt;
use crate::error::{ExamError, ValidationError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionRequest {
    #[serde(default)]
    pub pdf_content: String,
    pub previous_question: Option<String>,
    #[serde(default)]
    pub make_harder: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCodeRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub student_code: String,
    #[serde(default)]
    pub pdf_content: String,
}

pub async fn secret(State(state): State<AppState>) -> Response {
    match state.api() {
        Ok(api) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            api.config.to_secret_text(),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Serving /secret failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Configuration not loaded").into_response()
        }
    }
}

pub async fn generate_question(
    State(state): State<AppState>,
    body: Result<Json<GenerateQuestionRequest>, JsonRejection>,
) -> Result<Json<Value>, ExamError> {
    let Json(request) = body.map_err(malformed_body)?;
    let api = state.api()?;

    if request.pdf_content.trim().is_empty() {
        return Err(ValidationError::NoDocument.into());
    }

    let material = truncate_for_prompt(&request.pdf_content, state.settings.max_prompt_chars);
    let prompt = prompts::question_prompt(
        &material,
        request.previous_question.as_deref(),
        request.make_harder,
    );

    tracing::info!(make_harder = request.make_harder, "Generating question");
    let envelope = api.relay.complete(&prompt.into_messages()).await?;
    Ok(Json(envelope.into_value()))
}

pub async fn review_code(
    State(state): State<AppState>,
    body: Result<Json<ReviewCodeRequest>, JsonRejection>,
) -> Result<Json<Value>, ExamError> {
    let Json(request) = body.map_err(malformed_body)?;
    let api = state.api()?;

    if request.student_code.trim().is_empty() {
        return Err(ValidationError::EmptyCode.into());
    }
    if request.question.trim().is_empty() {
        return Err(ValidationError::NoQuestion.into());
    }

    let prompt = prompts::build(&PromptRequest::ReviewCode {
        question: &request.question,
        code: &request.student_code,
        material: &request.pdf_content,
    });

    tracing::info!("Reviewing code ({} characters)", request.student_code.len());
    let envelope = api.relay.complete(&prompt.into_messages()).await?;
    Ok(Json(envelope.into_value()))
}

fn malformed_body(rejection: JsonRejection) -> ExamError {
    tracing::warn!("Rejected request body: {}", rejection.body_text());
    ValidationError::MalformedBody(rejection.body_text()).into()
}

pub async fn index(State(state): State<AppState>) -> Response {
    match tokio::fs::read_to_string(state.settings.static_dir.join("index.html")).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::warn!("index.html unavailable: {}", e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

pub async fn static_file(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(path) = resolve_static_path(&state.settings.static_dir, uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.essence_str().to_string())], bytes).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Maps a request path under `root`, refusing anything that could escape it.
/// Decoding happens before the component check so `%2e%2e` is refused too.
fn resolve_static_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(request_path).ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));
    if relative.as_os_str().is_empty() {
        return None;
    }

    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            _ => return None,
        }
    }
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_static_path() {
        let root = Path::new("/srv/www");
        assert_eq!(
            resolve_static_path(root, "/assets/js/app.js"),
            Some(PathBuf::from("/srv/www/assets/js/app.js"))
        );
        assert_eq!(resolve_static_path(root, "/../etc/passwd"), None);
        assert_eq!(resolve_static_path(root, "/assets/../../x"), None);
        assert_eq!(resolve_static_path(root, "/"), None);
        assert_eq!(
            resolve_static_path(root, "/my%20notes.html"),
            Some(PathBuf::from("/srv/www/my notes.html"))
        );
        assert_eq!(resolve_static_path(root, "/%2e%2e/etc/passwd"), None);
        assert_eq!(resolve_static_path(root, "/assets/%2E%2E/%2E%2E/x"), None);
    }

    #[test]
    fn test_request_bodies_accept_camel_case() {
        let request: GenerateQuestionRequest = serde_json::from_str(
            r#"{"pdfContent": "m", "previousQuestion": "q", "makeHarder": true}"#,
        )
        .unwrap();
        assert!(request.make_harder);
        assert_eq!(request.previous_question.as_deref(), Some("q"));

        let request: GenerateQuestionRequest = serde_json::from_str(r#"{"pdfContent": "m"}"#).unwrap();
        assert!(!request.make_harder);

        let request: ReviewCodeRequest = serde_json::from_str(
            r#"{"question": "q", "studentCode": "print(1)", "pdfContent": "m"}"#,
        )
        .unwrap();
        assert_eq!(request.student_code, "print(1)");
    }
}
