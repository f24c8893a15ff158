//! Compression result type.

use bytes::Bytes;
use derive_getters::Getters;

/// Result of running a payload through the [`CompressionEngine`](crate::CompressionEngine).
#[derive(Clone, PartialEq, Eq, Getters)]
pub struct CompressionOutcome {
    /// Bytes to store (compressed or original)
    pub(crate) data: Bytes,
    /// MIME type of `data`
    pub(crate) mime_type: String,
    /// Size of the input
    pub(crate) original_size: u64,
    /// The input was declared as an image
    pub(crate) is_image: bool,
    /// A re-encode was produced and accepted
    pub(crate) applied: bool,
    /// Compression was not attempted or could not run (non-image, disabled, undecodable)
    pub(crate) skipped: bool,
    /// Width of the stored image, when decoded
    pub(crate) width: Option<u32>,
    /// Height of the stored image, when decoded
    pub(crate) height: Option<u32>,
}

impl CompressionOutcome {
    /// Outcome that stores `data` unchanged, flagged as skipped.
    pub fn pass_through(data: Bytes, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self {
            original_size: data.len() as u64,
            is_image: crate::is_image_mime(&mime_type),
            data,
            mime_type,
            applied: false,
            skipped: true,
            width: None,
            height: None,
        }
    }

    /// Size of the bytes to store.
    pub fn stored_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Consume the outcome, returning the bytes to store.
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

impl std::fmt::Debug for CompressionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionOutcome")
            .field("mime_type", &self.mime_type)
            .field("original_size", &self.original_size)
            .field("stored_size", &self.stored_size())
            .field("applied", &self.applied)
            .field("skipped", &self.skipped)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
