//! Remote backend: payloads in an external object store, referenced by key.

use crate::{ObjectTransport, Payload, StorageBackend};
use bytes::Bytes;
use formvault_core::{BackendKind, FileId, RemoteConfig};
use formvault_error::{StorageError, StorageErrorKind, StorageResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry2::strategy::jitter;
use tokio_retry2::{Retry, RetryError};

/// Upper bound for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Remote storage backend.
///
/// Every transport call is bounded by a timeout and retried with exponential
/// backoff. Only `BackendUnavailable` (including timeouts) is retried;
/// `NotFound` and other errors fail immediately.
pub struct RemoteBackend {
    transport: Arc<dyn ObjectTransport>,
    config: RemoteConfig,
}

impl RemoteBackend {
    /// Create a remote backend over `transport`.
    pub fn new(transport: Arc<dyn ObjectTransport>, config: RemoteConfig) -> Self {
        tracing::debug!(
            key_prefix = %config.key_prefix(),
            timeout_ms = config.timeout_ms(),
            max_retries = config.max_retries(),
            "Created remote backend"
        );
        Self { transport, config }
    }

    /// Backend configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Object key for a record: `{prefix}/{submission}/{field}/{id}`.
    ///
    /// Characters outside `[A-Za-z0-9._-]` in the submission and field ids are
    /// replaced with `_` so keys never nest unexpectedly.
    ///
    /// ```
    /// use formvault_core::{FileId, RemoteConfig};
    /// use formvault_storage::RemoteBackend;
    ///
    /// let key = RemoteBackend::object_key(
    ///     &RemoteConfig::default(),
    ///     "sub/1",
    ///     "photos",
    ///     &FileId::from("abc"),
    /// );
    /// assert_eq!(key, "attachments/sub_1/photos/abc");
    /// ```
    pub fn object_key(
        config: &RemoteConfig,
        submission_id: &str,
        field_id: &str,
        id: &FileId,
    ) -> String {
        fn clean(segment: &str) -> String {
            let cleaned: String = segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
                "_".to_string()
            } else {
                cleaned
            }
        }

        let prefix = config.key_prefix().trim_matches('/');
        let tail = format!("{}/{}/{}", clean(submission_id), clean(field_id), clean(id.as_str()));
        if prefix.is_empty() {
            tail
        } else {
            format!("{}/{}", prefix, tail)
        }
    }

    /// Backoff schedule: `initial * 2^n` per retry, capped, with jitter.
    fn backoff(&self) -> Vec<Duration> {
        let initial = *self.config.initial_backoff_ms();
        (0..*self.config.max_retries())
            .map(|attempt| {
                let millis = initial.saturating_mul(1u64 << attempt.min(16));
                jitter(Duration::from_millis(millis).min(MAX_BACKOFF))
            })
            .collect()
    }

    /// Run a transport call with per-attempt timeout and bounded retries.
    async fn call<T, F, Fut>(&self, operation: &'static str, key: &str, f: F) -> StorageResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let timeout = Duration::from_millis(*self.config.timeout_ms());

        Retry::spawn(self.backoff(), || {
            let attempt = tokio::time::timeout(timeout, f());
            async move {
                match attempt.await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) if e.kind.is_retryable() => {
                        tracing::warn!(operation, key, error = %e, "Transient remote failure, will retry");
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                    Ok(Err(e)) => Err(RetryError::Permanent(e)),
                    Err(_) => {
                        tracing::warn!(operation, key, timeout_ms = timeout.as_millis() as u64, "Remote call timed out, will retry");
                        Err(RetryError::Transient {
                            err: StorageError::new(StorageErrorKind::BackendUnavailable(format!(
                                "{} {} timed out after {}ms",
                                operation,
                                key,
                                timeout.as_millis()
                            ))),
                            retry_after: None,
                        })
                    }
                }
            }
        })
        .await
    }
}

#[async_trait::async_trait]
impl StorageBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<String> {
        self.call("put", key, || self.transport.put(key, data.clone()))
            .await?;
        tracing::debug!("Stored remote object");
        Ok(key.to_string())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> StorageResult<Payload> {
        let ttl = Duration::from_secs(*self.config.url_ttl_secs());
        let descriptor = self
            .call("presigned_get", key, || self.transport.presigned_get(key, ttl))
            .await?;
        Ok(Payload::Descriptor(descriptor))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> StorageResult<bool> {
        match self.call("delete", key, || self.transport.delete(key)).await {
            Ok(()) => Ok(true),
            Err(e) if matches!(e.kind, StorageErrorKind::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let ttl = Duration::from_secs(*self.config.url_ttl_secs());
        match self
            .call("presigned_get", key, || self.transport.presigned_get(key, ttl))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind, StorageErrorKind::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
