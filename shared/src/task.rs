//! Durable record of one dispatch attempt of one scene to one provider

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::types::{ProviderId, TaskError, TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderTask {
    pub task_id: TaskId,
    pub script_title: String,
    pub scene_number: u32,
    pub provider: ProviderId,
    /// Assigned by the provider on submit, empty until then
    #[serde(default)]
    pub provider_job_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result_asset: Option<String>,
    #[serde(default)]
    pub last_error: Option<TaskError>,
    /// Number of status probes recorded while polling
    #[serde(default)]
    pub poll_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderTask {
    /// New task in `Created` state for a scene about to be dispatched
    pub fn new(script_title: impl Into<String>, scene_number: u32, provider: ProviderId) -> Self {
        let now = Utc::now();
        Self {
            task_id: TaskId::new(),
            script_title: script_title.into(),
            scene_number,
            provider,
            provider_job_id: String::new(),
            status: TaskStatus::Created,
            result_asset: None,
            last_error: None,
            poll_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_for_scene(&self, script_title: &str, scene_number: u32) -> bool {
        self.script_title == script_title && self.scene_number == scene_number
    }

    /// Apply a partial update, enforcing the lifecycle rules.
    ///
    /// The record is left untouched when the update is rejected.
    /// `updated_at` strictly advances on every accepted update.
    pub fn apply(&mut self, update: &TaskUpdate) -> SharedResult<()> {
        let mut next = self.clone();

        if let Some(status) = update.status {
            if !self.status.can_transition_to(status) {
                return Err(SharedError::IllegalTransition { from: self.status, to: status });
            }
            next.status = status;
        } else if self.is_terminal() && !update.is_empty() {
            return Err(SharedError::InvariantViolation {
                message: format!("task {} is {} and can no longer change", self.task_id, self.status),
            });
        }

        if let Some(job_id) = &update.provider_job_id {
            if !self.provider_job_id.is_empty() && &self.provider_job_id != job_id {
                return Err(SharedError::InvariantViolation {
                    message: format!("task {} already has provider job {}", self.task_id, self.provider_job_id),
                });
            }
            next.provider_job_id = job_id.clone();
        }
        if let Some(asset) = &update.result_asset {
            next.result_asset = Some(asset.clone());
        }
        if let Some(error) = &update.last_error {
            next.last_error = Some(error.clone());
        }
        if let Some(count) = update.poll_count {
            next.poll_count = count;
        }

        next.check_invariants()?;

        let now = Utc::now();
        let floor = self.updated_at + Duration::microseconds(1);
        next.updated_at = if now > floor { now } else { floor };
        *self = next;
        Ok(())
    }

    /// Job id and result asset consistency with the lifecycle state
    pub fn check_invariants(&self) -> SharedResult<()> {
        if self.status.requires_job_id() && self.provider_job_id.is_empty() {
            return Err(SharedError::InvariantViolation {
                message: format!("task {} is {} without a provider job id", self.task_id, self.status),
            });
        }
        if self.status == TaskStatus::Created && !self.provider_job_id.is_empty() {
            return Err(SharedError::InvariantViolation {
                message: format!("task {} has a provider job id before submission", self.task_id),
            });
        }
        if self.result_asset.is_some() && self.status != TaskStatus::Succeeded {
            return Err(SharedError::InvariantViolation {
                message: format!("task {} has a result asset while {}", self.task_id, self.status),
            });
        }
        if self.status == TaskStatus::Succeeded && self.result_asset.is_none() {
            return Err(SharedError::InvariantViolation {
                message: format!("task {} succeeded without a result asset", self.task_id),
            });
        }
        Ok(())
    }
}

/// Partial mutation of a [`ProviderTask`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub provider_job_id: Option<String>,
    pub result_asset: Option<String>,
    pub last_error: Option<TaskError>,
    pub poll_count: Option<u32>,
}

impl TaskUpdate {
    pub fn submitted(provider_job_id: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Submitted),
            provider_job_id: Some(provider_job_id.into()),
            ..Default::default()
        }
    }

    pub fn polling() -> Self {
        Self {
            status: Some(TaskStatus::Polling),
            ..Default::default()
        }
    }

    /// Re-poll bookkeeping: stays in `Polling`, records the probe count
    pub fn polled(poll_count: u32) -> Self {
        Self {
            status: Some(TaskStatus::Polling),
            poll_count: Some(poll_count),
            ..Default::default()
        }
    }

    pub fn succeeded(result_asset: impl Into<String>, poll_count: u32) -> Self {
        Self {
            status: Some(TaskStatus::Succeeded),
            result_asset: Some(result_asset.into()),
            poll_count: Some(poll_count),
            ..Default::default()
        }
    }

    pub fn failed(error: TaskError) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            last_error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_poll_count(mut self, poll_count: u32) -> Self {
        self.poll_count = Some(poll_count);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &TaskUpdate::default()
    }
}
