//! Adapter error types

use shared::{FailureCategory, ProviderId, TaskError};
use thiserror::Error;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Failures returned by a provider adapter.
///
/// Adapters never retry; the orchestrator decides based on [`AdapterError::category`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("no credential configured for {provider}")]
    MissingCredential { provider: ProviderId },

    #[error("credential rejected ({status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("unexpected HTTP status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("provider rejected request: {message}")]
    Rejected { message: String },

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("malformed provider response: {message}")]
    Malformed { message: String },

    #[error("adapter configuration error: {message}")]
    Config { message: String },
}

impl AdapterError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed { message: message.into() }
    }

    /// Canonical failure category used for retry decisions and diagnostics
    pub fn category(&self) -> FailureCategory {
        match self {
            AdapterError::MissingCredential { .. } | AdapterError::Authentication { .. } => FailureCategory::Auth,
            AdapterError::Http { status, .. } if *status == 429 || *status >= 500 => FailureCategory::Transport,
            AdapterError::Http { .. } | AdapterError::Rejected { .. } => FailureCategory::ProviderSideFailure,
            AdapterError::Transport { .. } | AdapterError::Malformed { .. } => FailureCategory::Transport,
            AdapterError::Config { .. } => FailureCategory::Validation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn to_task_error(&self) -> TaskError {
        TaskError::new(self.category(), self.to_string())
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::transport("request timed out")
        } else if err.is_decode() {
            AdapterError::malformed(err.to_string())
        } else {
            AdapterError::transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for AdapterError {
    fn from(err: url::ParseError) -> Self {
        AdapterError::Config { message: format!("invalid URL: {err}") }
    }
}
