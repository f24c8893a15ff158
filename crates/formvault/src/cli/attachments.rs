//! Upload, fetch, delete and list handlers.

use super::print_json;
use formvault::{
    AttachmentService, BatchItemOutcome, BatchUploadCoordinator, FileId, FileInput,
    FormvaultResult, Payload, StorageError, StorageErrorKind, UploadContext,
};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Guess a MIME type from a file extension.
fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Upload `files` as one batch, printing progress and per-file outcomes.
#[tracing::instrument(skip(service, files), fields(count = files.len()))]
pub async fn upload_files(
    service: &AttachmentService,
    files: &[PathBuf],
    submission: &str,
    field: &str,
    mime: Option<&str>,
) -> FormvaultResult<()> {
    let mut inputs = Vec::with_capacity(files.len());
    for path in files {
        let data = tokio::fs::read(path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::NotFound(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime.unwrap_or_else(|| guess_mime(path));
        inputs.push(FileInput::new(name, mime_type, data));
    }

    let coordinator =
        BatchUploadCoordinator::new(service.clone(), *service.config().batch().workers());
    let handle = coordinator.start(UploadContext::new(submission, field), inputs);

    let mut progress = handle.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = *progress.borrow_and_update();
            eprintln!("{}/{} processed", snapshot.completed, snapshot.total);
            if snapshot.is_done() {
                break;
            }
        }
    });

    let report = handle.finish().await?;
    reporter.abort();

    let outcomes: Vec<_> = report
        .outcomes
        .iter()
        .map(|outcome| match outcome {
            BatchItemOutcome::Stored(record) => json!({
                "status": "stored",
                "id": record.id(),
                "name": record.original_name(),
                "mime_type": record.mime_type(),
                "original_size_bytes": record.original_size_bytes(),
                "stored_size_bytes": record.stored_size_bytes(),
                "backend": record.payload_location().backend_name(),
            }),
            BatchItemOutcome::Failed {
                original_name,
                error,
            } => json!({
                "status": "failed",
                "name": original_name,
                "error": error.kind.to_string(),
            }),
        })
        .collect();

    print_json(&outcomes)
}

/// Print a record; write its bytes to `out` or print its access URL.
pub async fn get_attachment(
    service: &AttachmentService,
    id: &str,
    out: Option<&Path>,
) -> FormvaultResult<()> {
    let id = FileId::from(id);
    let record = service.get(&id).await?;

    let access = match service.retrieve(&id).await? {
        Payload::Bytes(data) => match out {
            Some(path) => {
                tokio::fs::write(path, &data).await.map_err(|e| {
                    StorageError::new(StorageErrorKind::Persistence(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                })?;
                json!({ "written_to": path.display().to_string(), "bytes": data.len() })
            }
            None => json!({ "bytes": data.len() }),
        },
        Payload::Descriptor(descriptor) => json!(descriptor),
    };

    print_json(&json!({
        "id": record.id(),
        "name": record.original_name(),
        "mime_type": record.mime_type(),
        "submission_id": record.submission_id(),
        "field_id": record.field_id(),
        "created_at": record.created_at(),
        "stored_size_bytes": record.stored_size_bytes(),
        "backend": record.payload_location().backend_name(),
        "payload": access,
    }))
}

/// Delete a record.
pub async fn delete_attachment(service: &AttachmentService, id: &str) -> FormvaultResult<()> {
    let deleted = service.delete(&FileId::from(id)).await?;
    print_json(&json!({ "id": id, "deleted": deleted }))
}

/// List a submission's records.
pub async fn list_attachments(service: &AttachmentService, submission: &str) -> FormvaultResult<()> {
    let listing: Vec<_> = service
        .list_by_context(submission)
        .await
        .iter()
        .map(|record| {
            json!({
                "id": record.id(),
                "name": record.original_name(),
                "field_id": record.field_id(),
                "created_at": record.created_at(),
                "stored_size_bytes": record.stored_size_bytes(),
                "backend": record.payload_location().backend_name(),
            })
        })
        .collect();
    print_json(&listing)
}
