pub mod envelope;
pub mod prompts;
pub mod relay;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;

pub use envelope::parse_reply;
pub use relay::ChatRelay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Upstream chat-completion response, kept verbatim so it can be relayed as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatEnvelope(pub Value);

impl ChatEnvelope {
    /// `choices[0].message.content`, or an empty string when the shape is off.
    pub fn text(&self) -> &str {
        self.0
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

#[async_trait::async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatEnvelope, RelayError>;
}
