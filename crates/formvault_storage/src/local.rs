//! Filesystem-backed object transport.
//!
//! Objects are laid out under a root directory by key, one file per object.
//! Useful for single-host deployments and for the CLI.

use crate::{AccessDescriptor, ObjectTransport};
use bytes::Bytes;
use chrono::Utc;
use formvault_error::{StorageError, StorageErrorKind, StorageResult};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Local filesystem object store.
///
/// Stores each object at `{root}/{key}`:
///
/// ```text
/// /var/formvault/objects/
/// └── attachments/
///     └── sub-42/
///         └── photos/
///             └── 3f2a9c...   (payload bytes)
/// ```
///
/// # Features
///
/// - **Atomic writes**: temp file + rename
/// - **Idempotent puts**: writing a key again replaces the object
/// - **Confined keys**: keys with `..` or absolute components are rejected
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a local object store rooted at `root`.
    ///
    /// Creates the root directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    #[tracing::instrument(skip(root))]
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::new(StorageErrorKind::Persistence(format!(
                "create {}: {}",
                root.display(),
                e
            )))
        })?;

        tracing::info!(path = %root.display(), "Created local object store");
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path inside the root.
    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let confined = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !confined {
            return Err(StorageError::new(StorageErrorKind::InvalidConfig(format!(
                "object key escapes store root: {}",
                key
            ))));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl ObjectTransport for LocalObjectStore {
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::BackendUnavailable(format!(
                    "create {}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::BackendUnavailable(format!(
                "write {}: {}",
                temp_path.display(),
                e
            )))
        })?;

        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::BackendUnavailable(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        tracing::debug!(path = %path.display(), "Stored object");
        Ok(())
    }

    async fn presigned_get(&self, key: &str, ttl: Duration) -> StorageResult<AccessDescriptor> {
        let path = self.path_for(key)?;

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::new(StorageErrorKind::NotFound(key.to_string())));
        }

        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        Ok(AccessDescriptor {
            url: format!("file://{}?expires={}", path.display(), expires_at.timestamp()),
            expires_at,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;

        tokio::fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(key.to_string()))
            } else {
                StorageError::new(StorageErrorKind::BackendUnavailable(format!(
                    "delete {}: {}",
                    path.display(),
                    e
                )))
            }
        })?;

        tracing::debug!(path = %path.display(), "Deleted object");
        Ok(())
    }
}
