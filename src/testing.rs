//! Fakes shared by the unit tests.

use axum::Router;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::ai::{ChatCompletion, ChatEnvelope, ChatMessage};
use crate::document::TextExtractor;
use crate::error::{RelayError, UploadRejection};

pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

pub const QUESTION_REPLY: &str = "```json\n{\"question\": \"Write a loop that prints 1 to 10\", \"topic\": \"loops\", \"difficulty\": \"easy\", \"hints\": [\"use range\"]}\n```";

pub const REVIEW_REPLY: &str = "{\"score\": 55, \"quality\": \"not bad\", \"feedback\": {\"summary\": \"Almost\", \"strengths\": [\"clear\"], \"weaknesses\": [\"syntax\"]}, \"errors\": [{\"line\": 1, \"type\": \"syntax\", \"description\": \"missing colon\", \"suggestion\": \"add ':'\"}], \"notes\": \"Check colons\"}";

/// Returns scripted replies in order and counts calls. Once the script runs
/// out every call fails with a 503.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedCompletion {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Every call waits for a `notify_one` on the returned handle before replying.
    pub fn gated(replies: &[&str]) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut scripted = Self::new(replies);
        scripted.gate = Some(gate.clone());
        (scripted, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl ChatCompletion for ScriptedCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatEnvelope, RelayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(text) => Ok(ChatEnvelope(completion_body(&text))),
            None => Err(RelayError::Status { status: 503, body: "script exhausted".to_string() }),
        }
    }
}

/// Pretends every upload extracts to the same text.
pub struct FixedText(pub String);

impl TextExtractor for FixedText {
    fn extract(&self, _bytes: &[u8], _max_pages: usize) -> Result<String, UploadRejection> {
        Ok(self.0.clone())
    }
}
