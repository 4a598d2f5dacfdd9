//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::SharedError;

/// Unique identifier for a locally tracked provider task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First block of the uuid, used in activity messages
    pub fn short(&self) -> String {
        self.0.to_string().chars().take(8).collect()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External image-to-video services the studio can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Runway,
    Luma,
    Kling,
    Minimax,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Runway,
        ProviderId::Luma,
        ProviderId::Kling,
        ProviderId::Minimax,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Runway => "runway",
            ProviderId::Luma => "luma",
            ProviderId::Kling => "kling",
            ProviderId::Minimax => "minimax",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn credential_env_var(&self) -> &'static str {
        match self {
            ProviderId::Runway => "RUNWAY_API_KEY",
            ProviderId::Luma => "LUMA_API_KEY",
            ProviderId::Kling => "KLING_API_KEY",
            ProviderId::Minimax => "MINIMAX_API_KEY",
        }
    }

    /// Environment variable overriding this provider's base URL
    pub fn base_url_env_var(&self) -> &'static str {
        match self {
            ProviderId::Runway => "RUNWAY_BASE_URL",
            ProviderId::Luma => "LUMA_BASE_URL",
            ProviderId::Kling => "KLING_BASE_URL",
            ProviderId::Minimax => "MINIMAX_BASE_URL",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "runway" | "runwayml" => Ok(ProviderId::Runway),
            "luma" | "dream-machine" => Ok(ProviderId::Luma),
            "kling" => Ok(ProviderId::Kling),
            "minimax" | "hailuo" => Ok(ProviderId::Minimax),
            _ => Err(SharedError::UnknownProvider { input: s.to_string() }),
        }
    }
}

/// Canonical job status reported by a provider status probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle state of a locally tracked provider task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Created,
    Submitted,
    Polling,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// `Polling -> Polling` is allowed so a re-poll can record bookkeeping
    /// without changing state.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Created, Submitted)
                | (Created, Failed)
                | (Submitted, Polling)
                | (Polling, Polling)
                | (Polling, Succeeded)
                | (Polling, Failed)
        )
    }

    /// Whether a task in this state must carry a provider job id
    pub fn requires_job_id(&self) -> bool {
        matches!(self, TaskStatus::Submitted | TaskStatus::Polling | TaskStatus::Succeeded)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Created => write!(f, "created"),
            TaskStatus::Submitted => write!(f, "submitted"),
            TaskStatus::Polling => write!(f, "polling"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Diagnostic category attached to every terminal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    /// Scene or character input was not dispatchable
    Validation,
    /// Credential missing or rejected by the provider
    Auth,
    /// Timeout, connection failure or malformed response
    Transport,
    /// The provider reported or caused a failed generation
    ProviderSideFailure,
}

impl FailureCategory {
    /// Whether the orchestrator may retry an operation failing this way
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureCategory::Transport)
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCategory::Validation => write!(f, "validation error"),
            FailureCategory::Auth => write!(f, "authentication error"),
            FailureCategory::Transport => write!(f, "transport error"),
            FailureCategory::ProviderSideFailure => write!(f, "provider-side failure"),
        }
    }
}

/// Error payload stored on a failed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub category: FailureCategory,
    pub message: String,
}

impl TaskError {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    /// Short user-facing diagnostic, e.g. "authentication error: 401 invalid key"
    pub fn diagnostic(&self) -> String {
        format!("{}: {}", self.category, self.message)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagnostic())
    }
}
