//! JSON file helpers with atomic replacement
//!
//! Writes go to a sibling temp file which is then renamed over the target,
//! so readers never observe a half-written document.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{OrchestratorError, OrchestratorResult};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` as pretty JSON and atomically replace `path`
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<()> {
    let content = serde_json::to_vec_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(&content).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await
}

/// Read raw file contents, `None` if the file does not exist
pub async fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Load a JSON document, falling back to `T::default()` when the file is
/// missing or empty
pub async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> OrchestratorResult<T> {
    let content = read_optional(path)
        .await
        .map_err(|e| OrchestratorError::fs("read", path, e))?;

    match content {
        Some(content) if !content.trim().is_empty() => {
            serde_json::from_str(&content).map_err(|source| OrchestratorError::JsonError {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => Ok(T::default()),
    }
}

/// Atomic write mapped into the orchestrator error space
pub async fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> OrchestratorResult<()> {
    write_json_atomic(path, value)
        .await
        .map_err(|e| OrchestratorError::fs("write", path, e))
}
