use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ai::prompts::{self, PromptRequest};
use crate::ai::{parse_reply, ChatCompletion};
use crate::config::Settings;
use crate::document::{DocumentMetadata, DocumentStore};
use crate::error::{ExamError, ValidationError};
use crate::model::{Question, Review};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ContentLoading,
    ContentReady,
    QuestionGenerating,
    QuestionReady,
    CodeSubmitting,
    ReviewReady,
}

struct Session {
    phase: Phase,
    documents: DocumentStore,
    question: Option<Question>,
    review: Option<Review>,
}

/// Drives one practice session: load material, generate questions, review
/// code. Generate and submit share a single in-flight flag so two relay calls
/// never race to update the same question or review.
#[derive(Clone)]
pub struct App {
    relay: Arc<dyn ChatCompletion>,
    session: Arc<Mutex<Session>>,
    in_flight: Arc<AtomicBool>,
    max_prompt_chars: usize,
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ValidationError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| ValidationError::OperationInFlight)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl App {
    pub fn new(relay: Arc<dyn ChatCompletion>, documents: DocumentStore, settings: &Settings) -> Self {
        Self {
            relay,
            session: Arc::new(Mutex::new(Session {
                phase: Phase::Idle,
                documents,
                question: None,
                review: None,
            })),
            in_flight: Arc::new(AtomicBool::new(false)),
            max_prompt_chars: settings.max_prompt_chars,
        }
    }

    pub async fn load_material(&self, id: &str) -> Result<DocumentMetadata, ExamError> {
        self.load_with(|documents| documents.load_from_catalog(id).map(|d| d.metadata()))
            .await
    }

    pub async fn load_upload(
        &self,
        filename: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<DocumentMetadata, ExamError> {
        self.load_with(|documents| {
            documents
                .load_from_upload(filename, bytes, mime_type)
                .map(|d| d.metadata())
        })
        .await
    }

    async fn load_with<F>(&self, load: F) -> Result<DocumentMetadata, ExamError>
    where
        F: FnOnce(&mut DocumentStore) -> Result<DocumentMetadata, ExamError>,
    {
        // A reply still in flight was built from the old material.
        let _guard = InFlight::acquire(&self.in_flight)?;

        let mut session = self.session.lock().await;
        let previous = session.phase;
        session.phase = Phase::ContentLoading;

        match load(&mut session.documents) {
            Ok(metadata) => {
                session.question = None;
                session.review = None;
                session.phase = Phase::ContentReady;
                Ok(metadata)
            }
            Err(e) => {
                session.phase = previous;
                Err(e)
            }
        }
    }

    /// Generates a question. `harder` builds on the current question, which
    /// must exist. `on_text` receives the raw model text once, before parsing.
    pub async fn generate_question<F>(&self, harder: bool, on_text: F) -> Result<Question, ExamError>
    where
        F: FnOnce(&str),
    {
        let _guard = InFlight::acquire(&self.in_flight)?;

        let (material, previous_question, prior_phase) = {
            let mut session = self.session.lock().await;
            let material = session.documents.for_prompt(self.max_prompt_chars).into_owned();
            if material.is_empty() {
                return Err(ValidationError::NoDocument.into());
            }

            let previous_question = if harder {
                match &session.question {
                    Some(question) => Some(question.question.clone()),
                    None => return Err(ValidationError::NoPreviousQuestion.into()),
                }
            } else {
                None
            };

            let prior_phase = session.phase;
            session.phase = Phase::QuestionGenerating;
            (material, previous_question, prior_phase)
        };

        let request = match previous_question.as_deref() {
            Some(previous_question) => PromptRequest::HarderQuestion { material: &material, previous_question },
            None => PromptRequest::NewQuestion { material: &material },
        };
        let messages = prompts::build(&request).into_messages();

        let result = self.relay.complete(&messages).await.map_err(ExamError::from).and_then(|envelope| {
            let text = envelope.text();
            on_text(text);
            parse_reply::<Question>(text)
        });

        let mut session = self.session.lock().await;
        match result {
            Ok(question) => {
                tracing::info!(topic = %question.topic, difficulty = question.difficulty.as_str(), "Question generated");
                session.question = Some(question.clone());
                session.review = None;
                session.phase = Phase::QuestionReady;
                Ok(question)
            }
            Err(e) => {
                tracing::error!("Failed to generate question: {}", e);
                session.phase = prior_phase;
                Err(e)
            }
        }
    }

    pub async fn submit_code(&self, code: &str) -> Result<Review, ExamError> {
        let _guard = InFlight::acquire(&self.in_flight)?;

        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::EmptyCode.into());
        }

        let (material, question, prior_phase) = {
            let mut session = self.session.lock().await;
            let question = session
                .question
                .as_ref()
                .map(|q| q.question.clone())
                .ok_or(ValidationError::NoQuestion)?;
            let material = session.documents.for_prompt(self.max_prompt_chars).into_owned();

            let prior_phase = session.phase;
            session.phase = Phase::CodeSubmitting;
            (material, question, prior_phase)
        };

        let messages = prompts::build(&PromptRequest::ReviewCode {
            question: &question,
            code,
            material: &material,
        })
        .into_messages();

        let result = match self.relay.complete(&messages).await {
            Ok(envelope) => parse_reply::<Review>(envelope.text()),
            Err(e) => Err(e.into()),
        };

        let mut session = self.session.lock().await;
        match result {
            Ok(review) => {
                tracing::info!(score = review.score, quality = review.quality.as_str(), "Review complete");
                session.review = Some(review.clone());
                session.phase = Phase::ReviewReady;
                Ok(review)
            }
            Err(e) => {
                tracing::error!("Failed to review code: {}", e);
                session.phase = prior_phase;
                Err(e)
            }
        }
    }

    /// Drops the current question and review, keeping the loaded content.
    pub async fn try_again(&self) -> Result<(), ExamError> {
        if self.is_busy() {
            return Err(ValidationError::OperationInFlight.into());
        }

        let mut session = self.session.lock().await;
        if !session.documents.metadata().has_content {
            return Err(ValidationError::NoDocument.into());
        }
        session.question = None;
        session.review = None;
        session.phase = Phase::ContentReady;
        Ok(())
    }

    pub async fn phase(&self) -> Phase {
        self.session.lock().await.phase
    }

    pub async fn current_question(&self) -> Option<Question> {
        self.session.lock().await.question.clone()
    }

    pub async fn last_review(&self) -> Option<Review> {
        self.session.lock().await.review.clone()
    }

    pub async fn document_metadata(&self) -> DocumentMetadata {
        self.session.lock().await.documents.metadata()
    }

    pub async fn document_chunks(&self, chunk_size: usize) -> Vec<String> {
        self.session.lock().await.documents.chunks(chunk_size)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}
