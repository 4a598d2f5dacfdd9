//! JSON-file backed task store
//!
//! The whole table is kept in memory and rewritten atomically to
//! `tasks.json` after every mutation. Records are stored as an array in
//! dispatch order so `list_by_scene` needs no extra sort key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shared::{component_debug, logging::ComponentId, ProviderId, ProviderTask, TaskId, TaskUpdate};
use tokio::sync::Mutex;

use super::file_system::{read_optional, write_json_atomic};
use crate::error::{StoreError, StoreResult};
use crate::traits::TaskStore;

#[derive(Debug, Default)]
struct TaskTable {
    /// Dispatch order
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, ProviderTask>,
}

impl TaskTable {
    fn from_records(records: Vec<ProviderTask>) -> Self {
        let mut table = Self::default();
        for task in records {
            if table.tasks.insert(task.task_id, task.clone()).is_none() {
                table.order.push(task.task_id);
            }
        }
        table
    }

    fn ordered(&self) -> impl Iterator<Item = &ProviderTask> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    fn records(&self) -> Vec<ProviderTask> {
        self.ordered().cloned().collect()
    }
}

/// Task store persisted to a JSON file, or purely in memory
pub struct JsonTaskStore {
    path: Option<PathBuf>,
    table: Mutex<TaskTable>,
}

impl JsonTaskStore {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: Mutex::new(TaskTable::default()),
        }
    }

    /// Open the store at `path`, loading any previously persisted tasks
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let records = Self::load(&path).await?;
        component_debug!(
            ComponentId::Orchestrator,
            path = %path.display(),
            tasks = records.len(),
            "Opened task store"
        );
        Ok(Self {
            table: Mutex::new(TaskTable::from_records(records)),
            path: Some(path),
        })
    }

    async fn load(path: &Path) -> StoreResult<Vec<ProviderTask>> {
        let content = read_optional(path).await.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match content {
            Some(content) if !content.trim().is_empty() => {
                serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })
            }
            _ => Ok(Vec::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self, table: &TaskTable) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_json_atomic(path, &table.records())
            .await
            .map_err(|source| StoreError::Io { path: path.clone(), source })
    }
}

#[async_trait]
impl TaskStore for JsonTaskStore {
    async fn create(&self, script_title: &str, scene_number: u32, provider: ProviderId) -> StoreResult<TaskId> {
        let task = ProviderTask::new(script_title, scene_number, provider);
        let task_id = task.task_id;

        let mut table = self.table.lock().await;
        table.order.push(task_id);
        table.tasks.insert(task_id, task);
        if let Err(err) = self.persist(&table).await {
            table.order.pop();
            table.tasks.remove(&task_id);
            return Err(err);
        }
        Ok(task_id)
    }

    async fn update(&self, task_id: TaskId, update: TaskUpdate) -> StoreResult<ProviderTask> {
        let mut table = self.table.lock().await;
        let current = table
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or(StoreError::NotFound { task_id })?;

        let mut next = current.clone();
        next.apply(&update).map_err(|e| StoreError::from_shared(task_id, e))?;

        table.tasks.insert(task_id, next.clone());
        if let Err(err) = self.persist(&table).await {
            table.tasks.insert(task_id, current);
            return Err(err);
        }
        Ok(next)
    }

    async fn get(&self, task_id: TaskId) -> StoreResult<Option<ProviderTask>> {
        Ok(self.table.lock().await.tasks.get(&task_id).cloned())
    }

    async fn list_by_scene(&self, script_title: &str, scene_number: u32) -> StoreResult<Vec<ProviderTask>> {
        let table = self.table.lock().await;
        Ok(table
            .ordered()
            .filter(|task| task.is_for_scene(script_title, scene_number))
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> StoreResult<Vec<ProviderTask>> {
        Ok(self.table.lock().await.records())
    }

    async fn list_non_terminal(&self) -> StoreResult<Vec<ProviderTask>> {
        let table = self.table.lock().await;
        Ok(table.ordered().filter(|task| !task.is_terminal()).cloned().collect())
    }
}
