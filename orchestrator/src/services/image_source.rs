//! Character image loading from the local file system

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::ImageSource;

/// Reads character images, resolving relative references against a root
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl ImageSource for FsImageSource {
    async fn load_image(&self, reference: &str) -> OrchestratorResult<Vec<u8>> {
        let unavailable = |message: String| OrchestratorError::ImageUnavailable {
            reference: reference.to_string(),
            message,
        };

        if reference.trim().is_empty() {
            return Err(unavailable("empty image reference".to_string()));
        }

        let bytes = tokio::fs::read(self.resolve(reference))
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if bytes.is_empty() {
            return Err(unavailable("image file is empty".to_string()));
        }
        Ok(bytes)
    }
}
