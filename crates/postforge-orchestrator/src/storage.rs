//! Persistence for inline image payloads.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{AgentError, Result};

/// Stores decoded image bytes and returns where they landed.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persists `bytes` of the given MIME type.
    ///
    /// # Errors
    /// Returns `AgentError::Storage` if the bytes cannot be written.
    async fn store(&self, bytes: &[u8], mime_type: &str) -> Result<PathBuf>;
}

/// Writes images as `image_<unix>_<id>.<ext>` under a directory.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    dir: PathBuf,
}

impl FsImageStore {
    /// The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn store(&self, bytes: &[u8], mime_type: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            error!(dir = %self.dir.display(), error = %e, "Failed to create images directory");
            AgentError::Storage(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let id = Uuid::new_v4().simple().to_string();
        let filename = format!(
            "image_{}_{}.{}",
            chrono::Utc::now().timestamp(),
            &id[..8],
            extension_for(mime_type)
        );
        let path = self.dir.join(filename);
        debug!(path = %path.display(), size = bytes.len(), "Writing image");

        tokio::fs::write(&path, bytes).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to write image");
            AgentError::Storage(format!("cannot write {}: {e}", path.display()))
        })?;

        info!(path = %path.display(), "Image saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_creates_directory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsImageStore::new(temp_dir.path().join("nested/images"));

        let path = store.store(b"png-bytes", "image/png").await.unwrap();

        assert!(path.starts_with(store.dir()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("image_"));
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_store_failure_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let err = FsImageStore::new(&blocker).store(b"data", "image/png").await.unwrap_err();
        assert!(matches!(err, AgentError::Storage(_)));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/octet-stream"), "png");
    }
}
