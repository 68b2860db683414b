pub mod handlers;
pub mod proxy;

use anyhow::Result;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::ai::ChatCompletion;
use crate::config::{ApiConfig, Settings};
use crate::error::ExamError;

/// Credentials plus the relay built from them, created once at startup.
#[derive(Clone)]
pub struct ApiHandle {
    pub config: Arc<ApiConfig>,
    pub relay: Arc<dyn ChatCompletion>,
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    api: Option<ApiHandle>,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, api: Option<ApiHandle>) -> Self {
        Self {
            settings,
            api,
            http: reqwest::Client::new(),
        }
    }

    pub fn api(&self) -> Result<&ApiHandle, ExamError> {
        self.api.as_ref().ok_or_else(|| {
            ExamError::ConfigurationMissing(self.settings.secret_file.display().to_string())
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

impl IntoResponse for ExamError {
    fn into_response(self) -> Response {
        if let ExamError::Relay(e) = &self {
            tracing::warn!(upstream_status = ?e.status(), "Relay call failed: {}", e);
        }

        let status = match &self {
            ExamError::Validation(_) | ExamError::UploadRejected(_) => StatusCode::BAD_REQUEST,
            ExamError::NotFound(_) => StatusCode::NOT_FOUND,
            ExamError::ConfigurationMissing(_)
            | ExamError::Relay(_)
            | ExamError::EnvelopeUnparseable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/secret", get(handlers::secret))
        .route("/api/generate-question", post(handlers::generate_question))
        .route("/api/review-code", post(handlers::review_code))
        .route("/api/proxy", any(proxy::forward_prefixed))
        .route("/api/proxy/", any(proxy::forward_prefixed))
        .route("/api/proxy/*target", any(proxy::forward_prefixed))
        .fallback(handlers::static_file)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Standalone proxy: every path is `/<absolute-url>`.
pub fn proxy_router(state: AppState) -> Router {
    Router::new()
        .fallback(proxy::forward_bare)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.settings.bind_address, state.settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("📚 Exam Maker running on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn serve_proxy(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.settings.bind_address, state.settings.proxy_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 CORS Proxy running on http://{}", addr);
    tracing::info!("Usage: http://{}/https://api.example.com/endpoint", addr);
    axum::serve(listener, proxy_router(state)).await?;
    Ok(())
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
    );
    response
}
