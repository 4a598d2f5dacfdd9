//! Per-scene outcomes and batch summaries returned to the caller

use serde::Serialize;
use shared::{FailureCategory, ProviderId, ProviderTask, TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SceneOutcome {
    Submitted {
        scene_number: u32,
        task_id: TaskId,
        provider_job_id: String,
    },
    Failed {
        scene_number: u32,
        task_id: TaskId,
        category: FailureCategory,
        message: String,
    },
    /// Rejected before any task was created
    Invalid { scene_number: u32, message: String },
    /// Scene already has a non-terminal task
    AlreadyInFlight { scene_number: u32, task_id: TaskId },
    Cancelled { scene_number: u32 },
    /// The task store rejected a write. `provider_job_id` is set when the
    /// provider had already accepted the job.
    StoreFailed {
        scene_number: u32,
        task_id: Option<TaskId>,
        provider_job_id: Option<String>,
        message: String,
    },
}

impl SceneOutcome {
    pub fn scene_number(&self) -> u32 {
        match self {
            SceneOutcome::Submitted { scene_number, .. }
            | SceneOutcome::Failed { scene_number, .. }
            | SceneOutcome::Invalid { scene_number, .. }
            | SceneOutcome::AlreadyInFlight { scene_number, .. }
            | SceneOutcome::Cancelled { scene_number }
            | SceneOutcome::StoreFailed { scene_number, .. } => *scene_number,
        }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            SceneOutcome::Submitted { task_id, .. }
            | SceneOutcome::Failed { task_id, .. }
            | SceneOutcome::AlreadyInFlight { task_id, .. } => Some(*task_id),
            SceneOutcome::StoreFailed { task_id, .. } => *task_id,
            SceneOutcome::Invalid { .. } | SceneOutcome::Cancelled { .. } => None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, SceneOutcome::Submitted { .. })
    }

    /// One-line description for terminal output
    pub fn describe(&self) -> String {
        match self {
            SceneOutcome::Submitted { scene_number, provider_job_id, .. } => {
                format!("scene {scene_number}: submitted (job {provider_job_id})")
            }
            SceneOutcome::Failed { scene_number, category, message, .. } => {
                format!("scene {scene_number}: {category}: {message}")
            }
            SceneOutcome::Invalid { scene_number, message } => {
                format!("scene {scene_number}: {}: {message}", FailureCategory::Validation)
            }
            SceneOutcome::AlreadyInFlight { scene_number, task_id } => {
                format!("scene {scene_number}: already in flight as task {}", task_id.short())
            }
            SceneOutcome::Cancelled { scene_number } => format!("scene {scene_number}: cancelled"),
            SceneOutcome::StoreFailed {
                scene_number,
                provider_job_id: Some(job_id),
                message,
                ..
            } => format!("scene {scene_number}: job {job_id} not recorded: {message}"),
            SceneOutcome::StoreFailed { scene_number, message, .. } => {
                format!("scene {scene_number}: task store error: {message}")
            }
        }
    }
}

/// Result of submitting one script's ready scenes to a provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub script_title: String,
    pub provider: ProviderId,
    pub ready: usize,
    pub total: usize,
    pub outcomes: Vec<SceneOutcome>,
}

impl DispatchReport {
    pub fn submitted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_submitted()).count()
    }

    /// Ids of tasks this dispatch submitted
    pub fn submitted_task_ids(&self) -> Vec<TaskId> {
        self.outcomes
            .iter()
            .filter(|o| o.is_submitted())
            .filter_map(SceneOutcome::task_id)
            .collect()
    }

    /// "N of M submitted", M being the number of ready scenes
    pub fn summary(&self) -> String {
        format!("{} of {} submitted", self.submitted_count(), self.ready)
    }
}

/// Dispatch report plus the tracked tasks' final snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub dispatch: DispatchReport,
    pub tasks: Vec<ProviderTask>,
}

impl BatchReport {
    pub fn succeeded_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Succeeded).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Failed).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}; {} succeeded, {} failed",
            self.dispatch.summary(),
            self.succeeded_count(),
            self.failed_count()
        )
    }
}
