//! Storage error types.

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum StorageErrorKind {
    /// A single payload is larger than the per-file ceiling
    #[display("File of {} bytes exceeds the {} byte limit", size, limit)]
    SizeExceeded {
        /// Size of the rejected payload
        size: u64,
        /// Configured per-file ceiling
        limit: u64,
    },
    /// Admitting the payload would push the embedded backend over its quota
    #[display(
        "Quota exceeded: {} bytes requested with {} of {} bytes in use",
        requested,
        used,
        quota
    )]
    QuotaExceeded {
        /// Bytes the write asked for
        requested: u64,
        /// Bytes in use before the write
        used: u64,
        /// Configured aggregate quota
        quota: u64,
    },
    /// Image decode or re-encode failed; callers fall back to the original bytes
    #[display("Compression failed: {}", _0)]
    CompressionFailed(String),
    /// No record or object under the given id/key
    #[display("Not found: {}", _0)]
    NotFound(String),
    /// Remote transport failed or timed out after all retries
    #[display("Backend unavailable: {}", _0)]
    BackendUnavailable(String),
    /// Record is already being migrated by another operation
    #[display("Migration already in progress for {}", _0)]
    MigrationConflict(String),
    /// Batch was cancelled before this item was scheduled
    #[display("Cancelled before processing: {}", _0)]
    Cancelled(String),
    /// Reading or writing the persisted record store failed
    #[display("Persistence failure: {}", _0)]
    Persistence(String),
    /// Invalid storage configuration
    #[display("Invalid configuration: {}", _0)]
    InvalidConfig(String),
}

impl StorageErrorKind {
    /// Whether a failed operation may succeed if attempted again.
    ///
    /// Only transport failures are transient. Size and quota rejections are
    /// final for the given payload.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageErrorKind::BackendUnavailable(_))
    }
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use formvault_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::NotFound("abc123".to_string()));
/// assert!(format!("{}", err).contains("Not found"));
/// assert!(!err.kind.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StorageErrorKind {
        &self.kind
    }
}

/// Result type for storage-layer operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
