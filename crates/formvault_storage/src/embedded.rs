//! Embedded backend: payloads held inline, bounded per file and in aggregate.

use crate::{Payload, QuotaManager, StorageBackend};
use bytes::Bytes;
use formvault_core::BackendKind;
use formvault_error::{StorageError, StorageErrorKind, StorageResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Embedded storage backend.
///
/// Keys are record ids. Every write is checked against the per-file ceiling
/// first, then admitted through the shared [`QuotaManager`]; a rejected write
/// leaves both the payload map and the counter untouched.
pub struct EmbeddedBackend {
    payloads: RwLock<HashMap<String, Bytes>>,
    quota: Arc<QuotaManager>,
    max_file_bytes: u64,
}

impl EmbeddedBackend {
    /// Create an empty embedded backend.
    pub fn new(quota: Arc<QuotaManager>, max_file_bytes: u64) -> Self {
        tracing::debug!(
            max_file_bytes,
            quota_bytes = quota.quota_bytes(),
            "Created embedded backend"
        );
        Self {
            payloads: RwLock::new(HashMap::new()),
            quota,
            max_file_bytes,
        }
    }

    /// Shared quota gate.
    pub fn quota(&self) -> &Arc<QuotaManager> {
        &self.quota
    }

    /// Per-file ceiling.
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Reload a payload from persisted state without ceiling checks.
    pub async fn restore(&self, key: &str, data: Bytes) {
        let size = data.len() as u64;
        let previous = self.payloads.write().await.insert(key.to_string(), data);
        if let Some(previous) = previous {
            self.quota.release(previous.len() as u64).await;
        }
        self.quota.restore(size).await;
    }

    /// Number of payloads held.
    pub async fn len(&self) -> usize {
        self.payloads.read().await.len()
    }

    /// True when no payloads are held.
    pub async fn is_empty(&self) -> bool {
        self.payloads.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl StorageBackend for EmbeddedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<String> {
        let size = data.len() as u64;
        if size > self.max_file_bytes {
            tracing::warn!(size, limit = self.max_file_bytes, "File exceeds per-file ceiling");
            return Err(StorageError::new(StorageErrorKind::SizeExceeded {
                size,
                limit: self.max_file_bytes,
            }));
        }

        let mut payloads = self.payloads.write().await;
        let previous = payloads.get(key).map(|b| b.len() as u64).unwrap_or(0);
        let used = self.quota.try_admit(previous, size).await?;
        payloads.insert(key.to_string(), data);

        tracing::debug!(used, "Stored embedded payload");
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> StorageResult<Payload> {
        self.payloads
            .read()
            .await
            .get(key)
            .cloned()
            .map(Payload::Bytes)
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(key.to_string())))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let removed = self.payloads.write().await.remove(key);
        match removed {
            Some(data) => {
                self.quota.release(data.len() as u64).await;
                tracing::debug!(size = data.len(), "Deleted embedded payload");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.payloads.read().await.contains_key(key))
    }
}
