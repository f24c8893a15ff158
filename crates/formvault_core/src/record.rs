//! File record types.

use crate::{PayloadLocation, UploadContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Identifier of a stored file.
///
/// Derived once at upload time and never changed afterwards.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Derive an id from the upload context, creation time and a random salt.
    ///
    /// The id is the first 32 hex characters of
    /// `SHA-256(submission ‖ field ‖ nanos ‖ salt)`.
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use formvault_core::{FileId, UploadContext};
    /// use uuid::Uuid;
    ///
    /// let ctx = UploadContext::new("sub-1", "photo");
    /// let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    /// let a = FileId::derive(&ctx, at, Uuid::from_u128(1));
    /// let b = FileId::derive(&ctx, at, Uuid::from_u128(2));
    /// assert_eq!(a.as_str().len(), 32);
    /// assert_ne!(a, b);
    /// ```
    pub fn derive(context: &UploadContext, created_at: DateTime<Utc>, salt: Uuid) -> Self {
        let nanos = created_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| created_at.timestamp_micros());

        let mut hasher = Sha256::new();
        hasher.update(context.submission_id().as_bytes());
        hasher.update([0u8]);
        hasher.update(context.field_id().as_bytes());
        hasher.update([0u8]);
        hasher.update(nanos.to_be_bytes());
        hasher.update(salt.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..32].to_string())
    }

    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Persisted unit of attachment metadata plus payload location.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use chrono::Utc;
/// use formvault_core::{FileId, FileRecordBuilder, PayloadLocation};
///
/// let record = FileRecordBuilder::default()
///     .id(FileId::from("0123456789abcdef0123456789abcdef"))
///     .original_name("notes.txt")
///     .mime_type("text/plain")
///     .original_size_bytes(5u64)
///     .stored_size_bytes(5u64)
///     .payload_location(PayloadLocation::Embedded { data: Bytes::from_static(b"hello") })
///     .field_id("notes")
///     .submission_id("sub-1")
///     .created_at(Utc::now())
///     .is_image(false)
///     .build()
///     .unwrap();
///
/// assert!(record.payload_location().is_embedded());
/// assert_eq!(*record.stored_size_bytes(), 5);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct FileRecord {
    /// Immutable unique identifier
    id: FileId,
    /// Name supplied by the uploader
    original_name: String,
    /// MIME type of the stored payload
    mime_type: String,
    /// Size of the uploaded bytes before compression
    original_size_bytes: u64,
    /// Size of the bytes actually stored
    stored_size_bytes: u64,
    /// Where the payload lives
    payload_location: PayloadLocation,
    /// Form field the file was uploaded to
    field_id: String,
    /// Submission the file belongs to
    submission_id: String,
    /// Creation time
    created_at: DateTime<Utc>,
    /// Whether the upload was declared as an image
    is_image: bool,
    /// Compression was not applied (non-image, disabled or undecodable)
    #[builder(default)]
    #[serde(default)]
    compression_skipped: bool,
    /// Stored image width in pixels
    #[builder(default)]
    #[serde(default)]
    width: Option<u32>,
    /// Stored image height in pixels
    #[builder(default)]
    #[serde(default)]
    height: Option<u32>,
}

impl FileRecord {
    /// Return a copy of this record with a different payload location.
    ///
    /// Every other field, the id included, is carried over unchanged.
    pub fn relocated(&self, payload_location: PayloadLocation) -> FileRecord {
        FileRecord {
            payload_location,
            ..self.clone()
        }
    }

    /// Bytes counted against the embedded quota (zero for remote records).
    pub fn embedded_bytes(&self) -> u64 {
        if self.payload_location.is_embedded() {
            self.stored_size_bytes
        } else {
            0
        }
    }
}
