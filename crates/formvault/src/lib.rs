//! Formvault - attachment storage for form submissions
//!
//! Formvault stores files uploaded through forms, either inline with their
//! metadata or in a remote object store, and moves them between the two
//! without losing data.
//!
//! # Features
//!
//! - **Image compression**: deterministic resize and re-encode before storage
//! - **Dual backends**: embedded (quota-bounded) and remote (presigned access)
//! - **Batch uploads**: bounded worker pool with progress and cancellation
//! - **Migration**: per-record atomic moves from embedded to remote storage
//! - **Explicit cleanup**: age-based eviction of embedded records
//!
//! # Architecture
//!
//! Formvault is organized as a workspace with focused crates:
//!
//! - `formvault_error` - Error types
//! - `formvault_core` - Records, inputs and configuration
//! - `formvault_compress` - Image compression
//! - `formvault_storage` - Backends, quota and record persistence
//!
//! This crate (`formvault`) ties them together behind [`AttachmentService`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod in_flight;
mod migration;
mod service;

pub use batch::{BatchHandle, BatchItemOutcome, BatchProgress, BatchReport, BatchUploadCoordinator};
pub use in_flight::{InFlight, InFlightGuard};
pub use migration::{
    MigrationCoordinator, MigrationEntry, MigrationOutcome, MigrationReport, MigrationTarget,
};
pub use service::{AttachmentService, AttachmentServiceBuilder, ServiceStats};

// Re-export the crates callers need alongside the service
pub use formvault_core::*;
pub use formvault_error::*;
pub use formvault_storage::{
    AccessDescriptor, CleanupReport, LocalObjectStore, MemoryObjectStore, ObjectTransport, Payload,
    QuotaUsage, RecordStore,
};
