//! Storage backend trait definition.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use formvault_core::BackendKind;
use formvault_error::StorageResult;
use serde::{Deserialize, Serialize};

/// Time-limited access to a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDescriptor {
    /// URL the client can fetch the object from
    pub url: String,
    /// Instant after which the URL stops working
    pub expires_at: DateTime<Utc>,
}

/// What a backend hands back for a stored payload.
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
    /// Raw bytes, as stored
    Bytes(Bytes),
    /// Presigned access to bytes held elsewhere
    Descriptor(AccessDescriptor),
}

impl Payload {
    /// Raw bytes, if this payload carries them.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Payload::Bytes(data) => Some(data),
            Payload::Descriptor(_) => None,
        }
    }

    /// Access descriptor, if this payload is remote.
    pub fn as_descriptor(&self) -> Option<&AccessDescriptor> {
        match self {
            Payload::Bytes(_) => None,
            Payload::Descriptor(descriptor) => Some(descriptor),
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Bytes(data) => f.debug_struct("Bytes").field("len", &data.len()).finish(),
            Payload::Descriptor(descriptor) => f.debug_tuple("Descriptor").field(descriptor).finish(),
        }
    }
}

/// Capability set shared by the embedded and remote backends.
///
/// Implementations are selected by configuration and used through
/// `Arc<dyn StorageBackend>`.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Store `data` under `key` and return the key it was stored under.
    ///
    /// Re-putting an existing key overwrites it.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<String>;

    /// Fetch a payload: bytes for embedded storage, an access descriptor for remote.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Payload>;

    /// Delete a payload. Returns `false` if nothing was stored under `key`.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check whether a payload is stored under `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}
