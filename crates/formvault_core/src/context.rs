//! Upload inputs supplied by the caller.

use bytes::Bytes;

/// Submission context supplied for each upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_getters::Getters)]
pub struct UploadContext {
    /// Submission the files belong to
    submission_id: String,
    /// Form field the files were uploaded to
    field_id: String,
}

impl UploadContext {
    /// Create a new upload context.
    pub fn new(submission_id: impl Into<String>, field_id: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
            field_id: field_id.into(),
        }
    }
}

/// One uploaded file.
#[derive(Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct FileInput {
    /// Name supplied by the uploader
    original_name: String,
    /// Declared MIME type
    mime_type: String,
    /// Raw uploaded bytes
    data: Bytes,
}

impl FileInput {
    /// Create a new file input.
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Size of the uploaded bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl std::fmt::Debug for FileInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileInput")
            .field("original_name", &self.original_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}
