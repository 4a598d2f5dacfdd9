//! Core orchestrator logic without I/O

pub mod activity;
pub mod readiness;
pub mod reports;
pub mod retry;

pub use activity::{ActivityLog, ACTIVITY_WINDOW};
pub use readiness::{is_ready, project_summaries, ready_scenes, ProjectSummary, Readiness};
pub use reports::{BatchReport, DispatchReport, SceneOutcome};
pub use retry::RetryPolicy;
