//! Top-level error wrapper types.

use crate::{ConfigError, JsonError, StorageError, StorageErrorKind};

/// All error conditions surfaced by the formvault crates.
///
/// # Examples
///
/// ```
/// use formvault_error::{ConfigError, FormvaultError};
///
/// let err: FormvaultError = ConfigError::new("missing data_dir").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum FormvaultErrorKind {
    /// Storage, quota, migration and transport errors
    #[from(StorageError)]
    Storage(StorageError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
}

/// Formvault error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Formvault Error: {}", _0)]
pub struct FormvaultError(Box<FormvaultErrorKind>);

impl FormvaultError {
    /// Create a new error from a kind.
    pub fn new(kind: FormvaultErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &FormvaultErrorKind {
        &self.0
    }

    /// The storage error kind, if this is a storage error.
    ///
    /// ```
    /// use formvault_error::{FormvaultError, StorageError, StorageErrorKind};
    ///
    /// let err: FormvaultError =
    ///     StorageError::new(StorageErrorKind::NotFound("x".into())).into();
    /// assert!(matches!(err.storage_kind(), Some(StorageErrorKind::NotFound(_))));
    /// ```
    pub fn storage_kind(&self) -> Option<&StorageErrorKind> {
        match self.kind() {
            FormvaultErrorKind::Storage(e) => Some(&e.kind),
            _ => None,
        }
    }
}

// Generic From implementation for any type that converts to FormvaultErrorKind
impl<T> From<T> for FormvaultError
where
    T: Into<FormvaultErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for formvault operations.
pub type FormvaultResult<T> = std::result::Result<T, FormvaultError>;
