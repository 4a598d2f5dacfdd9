//! Orchestrator-specific error types

use std::path::PathBuf;

use shared::{ProviderId, SharedError, TaskId, TaskStatus};
use thiserror::Error;

/// Failures of the durable task store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Task not found: {task_id}")]
    NotFound { task_id: TaskId },

    #[error("Illegal transition for task {task_id}: {from} -> {to}")]
    IllegalTransition { task_id: TaskId, from: TaskStatus, to: TaskStatus },

    #[error("Task {task_id} rejected update: {message}")]
    InvariantViolation { task_id: TaskId, message: String },

    #[error("Task store I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task store file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Attach the task id to a lifecycle rejection from `ProviderTask::apply`
    pub fn from_shared(task_id: TaskId, err: SharedError) -> Self {
        match err {
            SharedError::IllegalTransition { from, to } => StoreError::IllegalTransition { task_id, from, to },
            other => StoreError::InvariantViolation { task_id, message: other.to_string() },
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Task store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider {provider} is not available: {reason}")]
    ProviderUnavailable { provider: ProviderId, reason: String },

    #[error("Script not found: {title}")]
    ScriptNotFound { title: String },

    #[error("Character limit reached ({limit})")]
    CharacterLimit { limit: usize },

    #[error("Character already exists: {name}")]
    DuplicateCharacter { name: String },

    #[error("Character image unavailable: {reference}: {message}")]
    ImageUnavailable { reference: String, message: String },

    #[error("Configuration error: {field}: {message}")]
    ConfigurationError { field: String, message: String },

    #[error("File system operation failed: {operation} on {path}: {source}")]
    FileSystemError {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    JsonError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Polling for task {task_id} aborted: {message}")]
    PollingAborted { task_id: TaskId, message: String },
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        OrchestratorError::ConfigurationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn fs(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OrchestratorError::FileSystemError {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
