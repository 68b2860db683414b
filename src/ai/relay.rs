use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{ChatCompletion, ChatEnvelope, ChatMessage};
use crate::config::{ApiConfig, Settings};
use crate::error::RelayError;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

/// Forwards chat messages to `{api_url}/chat/completions`. One call per
/// request, no retries.
pub struct ChatRelay {
    client: Client,
    config: Arc<ApiConfig>,
    temperature: f32,
    max_tokens: u32,
}

impl ChatRelay {
    pub fn new(config: Arc<ApiConfig>, settings: &Settings) -> Result<Self, RelayError> {
        let mut builder = Client::builder();
        if let Some(secs) = settings.relay_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(RelayError::Network)?;

        Ok(Self {
            client,
            config,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl ChatCompletion for ChatRelay {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatEnvelope, RelayError> {
        let request_id = Uuid::new_v4();
        let endpoint = self.config.completions_url();
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            stream: false,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(%request_id, model = %self.config.model, %endpoint, "Sending chat completion");

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(%request_id, "AI API request failed: {}", e);
                RelayError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%request_id, "AI API request failed with status {}: {}", status, body);
            return Err(RelayError::Status { status: status.as_u16(), body });
        }

        let body = response.text().await.map_err(RelayError::Network)?;
        let value: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(%request_id, "AI API returned malformed JSON: {}", e);
            RelayError::Parse(e.to_string())
        })?;

        tracing::debug!(%request_id, "Chat completion received");
        Ok(ChatEnvelope(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{completion_body, spawn_server};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::Mutex;

    fn relay_for(api_url: String) -> ChatRelay {
        let config = ApiConfig {
            api_key: "test-key".to_string(),
            api_url,
            model: "test-model".to_string(),
        };
        ChatRelay::new(Arc::new(config), &Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_sends_bearer_auth_and_non_streaming_body() {
        let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();

        let upstream = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *captured.lock().unwrap() = Some((auth, body));
                    Json(completion_body("{\"ok\": true}"))
                }
            }),
        );
        let addr = spawn_server(upstream).await;

        let relay = relay_for(format!("http://{}/v1/", addr));
        let envelope = relay
            .complete(&[ChatMessage::system("sys"), ChatMessage::user("hello")])
            .await
            .unwrap();
        assert_eq!(envelope.text(), "{\"ok\": true}");

        let (auth, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(auth, "Bearer test-key");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let upstream = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let addr = spawn_server(upstream).await;

        let err = relay_for(format!("http://{}", addr))
            .complete(&[ChatMessage::user("x")])
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert!(matches!(err, RelayError::Status { ref body, .. } if body == "slow down"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let upstream = Router::new().route("/chat/completions", post(|| async { "not json" }));
        let addr = spawn_server(upstream).await;

        let err = relay_for(format!("http://{}", addr))
            .complete(&[ChatMessage::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = relay_for(format!("http://{}", addr))
            .complete(&[ChatMessage::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Network(_)));
    }
}
