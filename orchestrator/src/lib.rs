//! Video generation dispatch and task tracking for the horror shorts studio
//!
//! This library takes ready scenes from the studio's scripts, submits them to
//! an image-to-video provider, and tracks each provider job to completion in
//! a durable task store.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use crate::core::{
    is_ready, project_summaries, ready_scenes, ActivityLog, BatchReport, DispatchReport, ProjectSummary, Readiness,
    RetryPolicy, SceneOutcome,
};
pub use config::{DispatchPolicy, StudioConfig};
pub use error::{OrchestratorError, OrchestratorResult, StoreError, StoreResult};
pub use orchestrator::Orchestrator;
pub use traits::{ApiKeySource, ImageSource, MockApiKeySource, MockImageSource, MockTaskStore, TaskStore};
