use thiserror::Error;

/// Every failure the exam flow can surface to a caller.
#[derive(Debug, Error)]
pub enum ExamError {
    #[error("Configuration not loaded: set API_KEY, API_URL and MODEL or provide {0}")]
    ConfigurationMissing(String),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Invalid JSON response from AI: {0}")]
    EnvelopeUnparseable(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to process PDF: {0}")]
    UploadRejected(#[from] UploadRejection),

    #[error("Material not found: {0}")]
    NotFound(String),
}

/// Failures talking to the upstream chat-completion API. Never retried.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("API request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("API request failed: {status}")]
    Status { status: u16, body: String },

    #[error("API response was not valid JSON: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please upload a PDF first")]
    NoDocument,

    #[error("Please write some code first")]
    EmptyCode,

    #[error("No question available")]
    NoQuestion,

    #[error("No previous question to make harder")]
    NoPreviousQuestion,

    #[error("Another request is already in progress")]
    OperationInFlight,

    #[error("Invalid request body: {0}")]
    MalformedBody(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("Please upload a valid PDF file (got {0})")]
    UnsupportedType(String),

    #[error("PDF file is too large ({size} bytes, limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("PDF appears to be empty or text could not be extracted ({0})")]
    ExtractionFailed(String),
}

impl RelayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RelayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
