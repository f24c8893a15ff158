//! Core data types for the formvault attachment storage engine.
//!
//! This crate holds the persisted [`FileRecord`], its [`PayloadLocation`],
//! the inputs a caller supplies per upload, and the workspace configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod context;
mod payload;
mod record;
mod telemetry;

pub use clock::{Clock, SystemClock};
pub use config::{
    BackendKind, BatchConfig, CompressionConfig, FormvaultConfig, MigrationConfig, RemoteConfig,
    StorageConfig,
};
pub use context::{FileInput, UploadContext};
pub use payload::{PayloadLocation, base64_bytes};
pub use record::{FileId, FileRecord, FileRecordBuilder, FileRecordBuilderError};
pub use telemetry::init_tracing;
