//! Tests for explicit age-based cleanup.

use chrono::{DateTime, Duration, TimeZone, Utc};
use formvault::{
    AttachmentService, Clock, FileInput, FileRecord, FormvaultConfig, MemoryObjectStore,
    MigrationTarget, RecordStore, UploadContext,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Clock the test moves by hand.
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

async fn upload_at(
    service: &AttachmentService,
    clock: &ManualClock,
    at: DateTime<Utc>,
    len: usize,
) -> FileRecord {
    clock.set(at);
    service
        .upload(
            FileInput::new(format!("{}.txt", len), "text/plain", vec![b'c'; len]),
            &UploadContext::new("sub", "f"),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cleanup_deletes_exactly_the_older_embedded_records() {
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock(Mutex::new(now)));
    let service = AttachmentService::builder(FormvaultConfig::default())
        .transport(Arc::new(MemoryObjectStore::new("memory://bucket")))
        .clock(clock.clone())
        .build()
        .await
        .unwrap();

    let old_a = upload_at(&service, &clock, now - Duration::days(40), 10).await;
    let old_remote = upload_at(&service, &clock, now - Duration::days(40), 20).await;
    let old_b = upload_at(&service, &clock, now - Duration::days(31), 30).await;
    let recent = upload_at(&service, &clock, now - Duration::days(29), 40).await;
    let boundary = upload_at(&service, &clock, now - Duration::days(30), 60).await;
    let fresh = upload_at(&service, &clock, now, 50).await;

    service
        .migrate(MigrationTarget::One(old_remote.id().clone()))
        .await
        .unwrap();

    clock.set(now);
    let report = service.cleanup(30).await;

    assert_eq!(report.count, 2);
    assert_eq!(report.bytes_reclaimed, 40);

    for gone in [&old_a, &old_b] {
        assert!(service.get(gone.id()).await.is_err());
    }
    for kept in [&old_remote, &recent, &boundary, &fresh] {
        assert!(service.get(kept.id()).await.is_ok());
    }

    let stats = service.stats().await;
    assert_eq!(stats.file_count, 4);
    assert_eq!(stats.total_bytes, 150);
}

#[tokio::test]
async fn test_cleanup_with_nothing_old_is_a_no_op() {
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
    let clock = Arc::new(ManualClock(Mutex::new(now)));
    let service = AttachmentService::builder(FormvaultConfig::default())
        .clock(clock.clone())
        .build()
        .await
        .unwrap();

    upload_at(&service, &clock, now - Duration::days(3), 5).await;

    let report = service.cleanup(7).await;
    assert_eq!(report.count, 0);
    assert_eq!(report.bytes_reclaimed, 0);
    assert_eq!(service.stats().await.total_bytes, 5);
}

#[tokio::test]
async fn test_failed_eviction_keeps_record_payload_and_quota() {
    let temp_dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
    let clock = Arc::new(ManualClock(Mutex::new(now)));
    let service = AttachmentService::builder(FormvaultConfig::default())
        .record_store(RecordStore::open(temp_dir.path()).unwrap())
        .clock(clock.clone())
        .build()
        .await
        .unwrap();

    let older = upload_at(&service, &clock, now - Duration::days(60), 10).await;
    let old = upload_at(&service, &clock, now - Duration::days(45), 7).await;

    // Retirement markers can no longer be written
    let retired = temp_dir.path().join("retired");
    std::fs::remove_dir_all(&retired).unwrap();
    std::fs::write(&retired, b"").unwrap();

    clock.set(now);
    let report = service.cleanup(30).await;
    assert_eq!(report.count, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(report.bytes_reclaimed, 0);

    for (record, len) in [(&older, 10), (&old, 7)] {
        assert!(service.get(record.id()).await.unwrap().payload_location().is_embedded());
        let payload = service.retrieve(record.id()).await.unwrap();
        assert_eq!(payload.as_bytes().map(|b| b.len()), Some(len));
    }
    let stats = service.stats().await;
    assert_eq!(stats.file_count, 2);
    assert_eq!(stats.total_bytes, 17);

    // Once the store is writable again the same records are evicted
    std::fs::remove_file(&retired).unwrap();
    std::fs::create_dir(&retired).unwrap();
    let report = service.cleanup(30).await;
    assert_eq!(report.count, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.bytes_reclaimed, 17);
    assert_eq!(service.stats().await.total_bytes, 0);
}
