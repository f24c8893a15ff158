//! Tests for batch uploads.

use formvault::{
    AttachmentService, BackendKind, BatchItemOutcome, BatchUploadCoordinator, FileInput,
    FormvaultConfig, MemoryObjectStore, StorageConfig, StorageErrorKind, UploadContext,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn inputs(sizes: &[usize]) -> Vec<FileInput> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, len)| FileInput::new(format!("file-{}.txt", i + 1), "text/plain", vec![b'x'; *len]))
        .collect()
}

async fn embedded_service(max_file_bytes: u64) -> AttachmentService {
    let config = FormvaultConfig::default().with_storage(
        StorageConfig::default()
            .with_max_file_bytes(max_file_bytes)
            .with_quota_bytes(1_000_000),
    );
    AttachmentService::builder(config).build().await.unwrap()
}

#[tokio::test]
async fn test_oversized_item_fails_alone_and_order_is_kept() {
    let service = embedded_service(100).await;
    let batch = BatchUploadCoordinator::new(service.clone(), 3);

    let handle = batch.start(
        UploadContext::new("sub", "files"),
        inputs(&[10, 20, 101, 30, 40]),
    );
    let progress = handle.progress();
    let report = handle.finish().await.unwrap();

    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.failed(), 1);

    for (i, outcome) in report.outcomes.iter().enumerate() {
        if i == 2 {
            let error = outcome.error().unwrap();
            assert_eq!(
                error.kind,
                StorageErrorKind::SizeExceeded {
                    size: 101,
                    limit: 100
                }
            );
        } else {
            let record = outcome.record().unwrap();
            assert_eq!(record.original_name(), &format!("file-{}.txt", i + 1));
        }
    }

    let progress = *progress.borrow();
    assert_eq!(progress.completed, 5);
    assert_eq!(progress.succeeded, 4);
    assert_eq!(progress.failed, 1);
    assert_eq!(progress.total, 5);
    assert!(progress.is_done());

    assert_eq!(service.stats().await.file_count, 4);
    assert_eq!(service.list_by_context("sub").await.len(), 4);
}

#[tokio::test]
async fn test_progress_counts_every_item() {
    let service = embedded_service(1000).await;
    let batch = BatchUploadCoordinator::new(service, 2);

    let handle = batch.start(UploadContext::new("s", "f"), inputs(&[1, 2, 3, 4, 5, 6, 7]));
    let mut progress = handle.progress();

    let mut seen = Vec::new();
    while progress.changed().await.is_ok() {
        let snapshot = *progress.borrow_and_update();
        seen.push(snapshot.completed);
        if snapshot.is_done() {
            break;
        }
    }
    let report = handle.finish().await.unwrap();

    assert_eq!(report.succeeded(), 7);
    assert_eq!(seen.last(), Some(&7));
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_cancelled_before_start_schedules_nothing() {
    let service = embedded_service(1000).await;
    let batch = BatchUploadCoordinator::new(service.clone(), 2);

    let token = CancellationToken::new();
    token.cancel();
    let handle = batch.start_with_token(UploadContext::new("s", "f"), inputs(&[1, 2, 3]), token);
    let progress = handle.progress();
    let report = handle.finish().await.unwrap();

    assert_eq!(report.succeeded(), 0);
    for outcome in &report.outcomes {
        assert!(matches!(
            outcome.error().map(|e| &e.kind),
            Some(StorageErrorKind::Cancelled(_))
        ));
    }
    assert_eq!(progress.borrow().failed, 3);
    assert_eq!(service.stats().await.file_count, 0);
}

#[tokio::test]
async fn test_cancel_lets_in_flight_items_finish() {
    let store = Arc::new(MemoryObjectStore::new("memory://bucket"));
    store.set_latency(Some(Duration::from_millis(100))).await;
    let config = FormvaultConfig::default()
        .with_storage(StorageConfig::default().with_primary_backend(BackendKind::Remote));
    let service = AttachmentService::builder(config)
        .transport(store.clone())
        .build()
        .await
        .unwrap();

    let batch = BatchUploadCoordinator::new(service, 1);
    let handle = batch.start(UploadContext::new("s", "f"), inputs(&[1, 2, 3, 4, 5]));

    let mut progress = handle.progress();
    progress.changed().await.unwrap();
    handle.cancel();
    let report = handle.finish().await.unwrap();

    // The first item finished; the in-flight one (if any) finished too
    assert!(report.succeeded() >= 1);
    assert!(report.failed() >= 3);
    assert_eq!(store.object_count().await, report.succeeded());

    let first_cancelled = report
        .outcomes
        .iter()
        .position(|o| matches!(o, BatchItemOutcome::Failed { .. }))
        .unwrap();
    assert!(report.outcomes[first_cancelled..].iter().all(|o| matches!(
        o.error().map(|e| &e.kind),
        Some(StorageErrorKind::Cancelled(_))
    )));
}
