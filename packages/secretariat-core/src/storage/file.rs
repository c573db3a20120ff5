//! Directory-backed image store for native targets.
//!
//! Layout: `<root>/<store_name>/<image_key>.db`. A save writes the full image
//! to a sibling temp file, syncs it, and renames it over the target, so a
//! crash mid-save leaves the previous image intact.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{StorageBackend, StoreConfig};
use crate::error::{Error, Result};

/// File-system [`StorageBackend`]
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
    config: StoreConfig,
}

/// Handle returned by [`FileBackend::open_store`]
#[derive(Debug, Clone)]
pub struct FileHandle {
    dir: PathBuf,
    image_path: PathBuf,
}

impl FileBackend {
    /// Store images under `root` with the default store name and key
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, StoreConfig::default())
    }

    /// Store images under `root` with an explicit store name and key
    pub fn with_config(root: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Root directory the store lives in
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn temp_path(handle: &FileHandle) -> Result<PathBuf> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::StorageUnavailable(format!("System time error: {}", e)))?
            .as_nanos();
        let name = handle
            .image_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::StorageUnavailable("Invalid image filename".to_string()))?;
        Ok(handle.dir.join(format!("{}.{}.tmp", name, nanos)))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    type Handle = FileHandle;

    async fn open_store(&self) -> Result<FileHandle> {
        let dir = self.root.join(&self.config.store_name);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::StorageUnavailable(format!("Failed to open store {}: {}", dir.display(), e))
        })?;
        let image_path = dir.join(format!("{}.db", self.config.image_key));
        Ok(FileHandle { dir, image_path })
    }

    async fn load(&self, handle: &FileHandle) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&handle.image_path).await {
            Ok(bytes) => {
                tracing::debug!(
                    path = %handle.image_path.display(),
                    bytes = bytes.len(),
                    "Loaded image"
                );
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageUnavailable(format!(
                "Failed to read {}: {}",
                handle.image_path.display(),
                e
            ))),
        }
    }

    async fn save(&self, handle: &FileHandle, image: &[u8]) -> Result<()> {
        let temp_path = Self::temp_path(handle)?;

        let written = match write_synced(&temp_path, image).await {
            Ok(()) => tokio::fs::rename(&temp_path, &handle.image_path)
                .await
                .map_err(|e| Error::StorageUnavailable(format!("Atomic rename failed: {}", e))),
            Err(e) => Err(e),
        };

        if written.is_err() {
            remove_temp(&temp_path).await;
        }
        written
    }
}

async fn write_synced(path: &Path, image: &[u8]) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| Error::StorageUnavailable(format!("Temp file create failed: {}", e)))?;
    file.write_all(image)
        .await
        .map_err(|e| Error::StorageUnavailable(format!("Temp file write failed: {}", e)))?;
    file.sync_all()
        .await
        .map_err(|e| Error::StorageUnavailable(format!("Temp file sync failed: {}", e)))
}

async fn remove_temp(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());

        let first = backend.open_store().await.unwrap();
        let second = backend.open_store().await.unwrap();
        assert_eq!(first.image_path, second.image_path);
        assert!(dir.path().join("secretariat").is_dir());
    }

    #[tokio::test]
    async fn test_load_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        let handle = backend.open_store().await.unwrap();
        assert!(backend.load(&handle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_whole_image() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::with_config(
            dir.path(),
            StoreConfig {
                store_name: "journal".into(),
                image_key: "main".into(),
            },
        );
        let handle = backend.open_store().await.unwrap();

        backend.save(&handle, b"a much longer first image").await.unwrap();
        backend.save(&handle, b"short").await.unwrap();

        assert_eq!(backend.load(&handle).await.unwrap().unwrap(), b"short");
        assert!(dir.path().join("journal").join("main.db").is_file());

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("journal"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_root_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let backend = FileBackend::new(&blocker);
        let err = backend.open_store().await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_save_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        let handle = backend.open_store().await.unwrap();

        // A non-empty directory where the image should go makes the rename fail
        std::fs::create_dir_all(handle.image_path.join("occupied")).unwrap();

        let err = backend.save(&handle, b"image").await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));

        let leftovers: Vec<_> = std::fs::read_dir(&handle.dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
