//! Storage backends and bookkeeping for formvault.
//!
//! Two interchangeable [`StorageBackend`] implementations hold attachment
//! payloads:
//!
//! - **Embedded**: bytes inline, bounded per file and by an aggregate quota
//! - **Remote**: bytes in an object store reached through an [`ObjectTransport`],
//!   with timeouts and bounded retries
//!
//! Alongside them, [`RecordStore`] persists the record catalog and
//! [`QuotaManager`] owns the embedded byte counter.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use formvault_storage::{EmbeddedBackend, QuotaManager, StorageBackend};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let quota = Arc::new(QuotaManager::new(1024));
//! let backend = EmbeddedBackend::new(quota.clone(), 512);
//!
//! backend.put("file-1", Bytes::from_static(b"hello")).await?;
//! let payload = backend.get("file-1").await?;
//! assert_eq!(payload.as_bytes().map(|b| &b[..]), Some(&b"hello"[..]));
//! assert_eq!(quota.used_bytes().await, 5);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod embedded;
mod local;
mod quota;
mod record_store;
mod remote;
mod transport;

pub use backend::{AccessDescriptor, Payload, StorageBackend};
pub use embedded::EmbeddedBackend;
pub use formvault_error::{StorageError, StorageErrorKind, StorageResult};
pub use local::LocalObjectStore;
pub use quota::{CleanupReport, EvictionPlan, QuotaManager, QuotaUsage};
pub use record_store::RecordStore;
pub use remote::RemoteBackend;
pub use transport::{MemoryObjectStore, ObjectTransport};
