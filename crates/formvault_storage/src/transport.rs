//! Object-storage transport contract and an in-process implementation.

use crate::AccessDescriptor;
use bytes::Bytes;
use chrono::Utc;
use formvault_error::{StorageError, StorageErrorKind, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Minimal contract the remote backend needs from an object store.
///
/// Transient failures are reported as `BackendUnavailable`; a missing object
/// is reported as `NotFound`.
#[async_trait::async_trait]
pub trait ObjectTransport: Send + Sync {
    /// Write `data` under `key`, overwriting any existing object.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Produce a URL granting read access to `key` for `ttl`.
    async fn presigned_get(&self, key: &str, ttl: Duration) -> StorageResult<AccessDescriptor>;

    /// Remove the object under `key`.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// In-process object store.
///
/// Holds objects in memory and can inject failures and latency, which makes
/// it suitable for tests and for embedding applications without a real store.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use formvault_storage::{MemoryObjectStore, ObjectTransport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryObjectStore::new("memory://bucket");
/// store.put("a/b", Bytes::from_static(b"hi")).await?;
/// assert_eq!(store.object("a/b").await.as_deref(), Some(&b"hi"[..]));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: RwLock<HashMap<String, Bytes>>,
    failing_puts: AtomicUsize,
    put_calls: AtomicUsize,
    latency: RwLock<Option<Duration>>,
}

impl MemoryObjectStore {
    /// Create an empty store whose presigned URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
            failing_puts: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
            latency: RwLock::new(None),
        }
    }

    /// Make the next `count` put calls fail with `BackendUnavailable`.
    pub fn fail_next_puts(&self, count: usize) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    /// Delay every call by `latency` (or stop delaying with `None`).
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    /// Number of put calls received, failed ones included.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Stored object bytes, if any.
    pub async fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).cloned()
    }

    /// Number of stored objects.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait::async_trait]
impl ObjectTransport for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let should_fail = self
            .failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StorageError::new(StorageErrorKind::BackendUnavailable(format!(
                "injected put failure for {}",
                key
            ))));
        }

        self.objects.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn presigned_get(&self, key: &str, ttl: Duration) -> StorageResult<AccessDescriptor> {
        self.simulate_latency().await;

        if !self.objects.read().await.contains_key(key) {
            return Err(StorageError::new(StorageErrorKind::NotFound(key.to_string())));
        }

        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        Ok(AccessDescriptor {
            url: format!(
                "{}/{}?expires={}",
                self.base_url.trim_end_matches('/'),
                key,
                expires_at.timestamp()
            ),
            expires_at,
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.simulate_latency().await;

        match self.objects.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::new(StorageErrorKind::NotFound(key.to_string()))),
        }
    }
}
