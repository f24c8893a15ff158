//! Error types for the formvault attachment storage engine.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Storage operations and per-item batch or migration outcomes use
//! [`StorageResult`]; configuration loading, service construction and the
//! CLI use [`FormvaultResult`].
//!
//! # Examples
//!
//! ```
//! use formvault_error::{FormvaultResult, StorageError, StorageErrorKind};
//!
//! fn admit(size: u64) -> FormvaultResult<()> {
//!     if size > 1024 {
//!         Err(StorageError::new(StorageErrorKind::SizeExceeded { size, limit: 1024 }))?
//!     }
//!     Ok(())
//! }
//!
//! assert!(admit(2048).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod json;
mod storage;

pub use config::ConfigError;
pub use error::{FormvaultError, FormvaultErrorKind, FormvaultResult};
pub use json::JsonError;
pub use storage::{StorageError, StorageErrorKind, StorageResult};
