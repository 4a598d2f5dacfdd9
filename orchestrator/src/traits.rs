//! Trait definitions with mockall annotations for testing
//!
//! Every collaborator the orchestrator touches sits behind one of these
//! seams so batches can be driven end to end against mocks.

use std::collections::HashMap;

use shared::{ProviderId, ProviderTask, TaskId, TaskUpdate};

use crate::error::{OrchestratorResult, StoreResult};

/// Durable store of provider tasks keyed by task id.
///
/// Implementations must be safe under concurrent calls for distinct ids and
/// must reject updates that break the task lifecycle.
#[mockall::automock]
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    /// Record a new task in `Created` state under a fresh id
    async fn create(&self, script_title: &str, scene_number: u32, provider: ProviderId) -> StoreResult<TaskId>;

    /// Apply a partial update and return the resulting record
    async fn update(&self, task_id: TaskId, update: TaskUpdate) -> StoreResult<ProviderTask>;

    async fn get(&self, task_id: TaskId) -> StoreResult<Option<ProviderTask>>;

    /// Tasks for one scene in dispatch order, most recent last
    async fn list_by_scene(&self, script_title: &str, scene_number: u32) -> StoreResult<Vec<ProviderTask>>;

    /// Every task in dispatch order
    async fn list_all(&self) -> StoreResult<Vec<ProviderTask>>;

    /// Tasks not yet `Succeeded` or `Failed`
    async fn list_non_terminal(&self) -> StoreResult<Vec<ProviderTask>>;
}

/// Source of provider credentials
#[mockall::automock]
#[async_trait::async_trait]
pub trait ApiKeySource: Send + Sync {
    /// Current credential per provider; providers without a key are absent
    async fn load_credentials(&self) -> OrchestratorResult<HashMap<ProviderId, String>>;
}

/// Resolves a character's image reference to raw bytes
#[mockall::automock]
#[async_trait::async_trait]
pub trait ImageSource: Send + Sync {
    async fn load_image(&self, reference: &str) -> OrchestratorResult<Vec<u8>>;
}
