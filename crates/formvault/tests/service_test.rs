//! Tests for the attachment service operations.

use formvault::{
    AttachmentService, BackendKind, CompressionConfig, FileId, FileInput, FormvaultConfig,
    MemoryObjectStore, RecordStore, RemoteConfig, StorageConfig, StorageErrorKind, UploadContext,
};
use image::codecs::jpeg::JpegEncoder;
use image::{GenericImageView, Rgb, RgbImage};
use std::sync::Arc;
use tempfile::TempDir;

fn config(max_file_bytes: u64, quota_bytes: u64) -> FormvaultConfig {
    FormvaultConfig::default().with_storage(
        StorageConfig::default()
            .with_max_file_bytes(max_file_bytes)
            .with_quota_bytes(quota_bytes),
    )
}

async fn service(config: FormvaultConfig) -> AttachmentService {
    AttachmentService::builder(config).build().await.unwrap()
}

fn text(name: &str, len: usize) -> FileInput {
    FileInput::new(name, "text/plain", vec![b'a'; len])
}

#[tokio::test]
async fn test_embedded_round_trip_is_byte_exact() {
    let service = service(FormvaultConfig::default()).await;
    let ctx = UploadContext::new("sub-1", "cv");
    let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

    let record = service
        .upload(FileInput::new("blob.bin", "application/octet-stream", data.clone()), &ctx)
        .await
        .unwrap();

    assert_eq!(record.id().as_str().len(), 32);
    assert_eq!(*record.original_size_bytes(), 4096);
    assert_eq!(*record.stored_size_bytes(), 4096);
    assert!(*record.compression_skipped());
    assert!(!*record.is_image());
    assert_eq!(record.submission_id(), "sub-1");
    assert_eq!(record.field_id(), "cv");

    let payload = service.retrieve(record.id()).await.unwrap();
    assert_eq!(payload.as_bytes().map(|b| &b[..]), Some(&data[..]));
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let service = service(FormvaultConfig::default()).await;
    let id = FileId::from("does-not-exist");

    let err = service.get(&id).await.unwrap_err();
    assert!(matches!(err.kind, StorageErrorKind::NotFound(_)));
    let err = service.retrieve(&id).await.unwrap_err();
    assert!(matches!(err.kind, StorageErrorKind::NotFound(_)));
    assert!(!service.delete(&id).await.unwrap());
}

#[tokio::test]
async fn test_delete_releases_quota_and_retires_record() {
    let service = service(config(1000, 1000)).await;
    let ctx = UploadContext::new("s", "f");
    let record = service.upload(text("a.txt", 600), &ctx).await.unwrap();

    // Quota is full enough that a second 600-byte file is refused
    let err = service.upload(text("b.txt", 600), &ctx).await.unwrap_err();
    assert!(matches!(err.kind, StorageErrorKind::QuotaExceeded { .. }));

    assert!(service.delete(record.id()).await.unwrap());
    assert!(!service.delete(record.id()).await.unwrap());
    assert_eq!(service.stats().await.total_bytes, 0);

    service.upload(text("b.txt", 600), &ctx).await.unwrap();
}

#[tokio::test]
async fn test_rejected_upload_leaves_state_unchanged() {
    let service = service(config(500, 1000)).await;
    let ctx = UploadContext::new("s", "f");
    service.upload(text("a.txt", 400), &ctx).await.unwrap();
    service.upload(text("b.txt", 400), &ctx).await.unwrap();

    let before = service.stats().await;

    let err = service.upload(text("big.txt", 501), &ctx).await.unwrap_err();
    assert_eq!(
        err.kind,
        StorageErrorKind::SizeExceeded {
            size: 501,
            limit: 500
        }
    );
    let err = service.upload(text("c.txt", 201), &ctx).await.unwrap_err();
    assert!(matches!(err.kind, StorageErrorKind::QuotaExceeded { used: 800, .. }));

    let after = service.stats().await;
    assert_eq!(before, after);
    assert_eq!(after.file_count, 2);
    assert_eq!(after.total_bytes, 800);
    assert_eq!(after.used_percent, 80.0);
}

#[tokio::test]
async fn test_quota_total_matches_embedded_records() {
    let service = service(config(1000, 5000)).await;
    let ctx = UploadContext::new("s", "f");

    for (i, len) in [100usize, 250, 999, 1, 640].into_iter().enumerate() {
        service
            .upload(text(&format!("{}.txt", i), len), &ctx)
            .await
            .unwrap();
    }

    let stored: u64 = service
        .list_by_context("s")
        .await
        .iter()
        .map(|r| *r.stored_size_bytes())
        .sum();
    let stats = service.stats().await;
    assert_eq!(stored, 1990);
    assert_eq!(stats.total_bytes, stored);
    assert_eq!(stats.embedded_files, 5);
    assert_eq!(stats.remote_files, 0);
}

#[tokio::test]
async fn test_list_by_context_keeps_creation_order() {
    let service = service(FormvaultConfig::default()).await;
    let a = UploadContext::new("sub-a", "f");
    let b = UploadContext::new("sub-b", "f");

    let first = service.upload(text("1.txt", 1), &a).await.unwrap();
    service.upload(text("x.txt", 1), &b).await.unwrap();
    let second = service.upload(text("2.txt", 1), &a).await.unwrap();
    let third = service.upload(text("3.txt", 1), &a).await.unwrap();

    let ids: Vec<_> = service
        .list_by_context("sub-a")
        .await
        .into_iter()
        .map(|r| r.id().clone())
        .collect();
    assert_eq!(ids, vec![first.id().clone(), second.id().clone(), third.id().clone()]);
    assert!(service.list_by_context("sub-c").await.is_empty());
}

#[tokio::test]
async fn test_remote_primary_returns_descriptor() {
    let config = FormvaultConfig::default()
        .with_storage(StorageConfig::default().with_primary_backend(BackendKind::Remote))
        .with_remote(RemoteConfig::default().with_key_prefix("uploads".to_string()));
    let store = Arc::new(MemoryObjectStore::new("https://objects.example"));
    let service = AttachmentService::builder(config)
        .transport(store.clone())
        .build()
        .await
        .unwrap();

    let record = service
        .upload(text("doc.txt", 10), &UploadContext::new("s1", "docs"))
        .await
        .unwrap();

    let key = record.payload_location().remote_key().unwrap().to_string();
    assert_eq!(key, format!("uploads/s1/docs/{}", record.id()));
    assert_eq!(store.object(&key).await.map(|b| b.len()), Some(10));

    let payload = service.retrieve(record.id()).await.unwrap();
    let descriptor = payload.as_descriptor().unwrap();
    assert!(descriptor.url.starts_with("https://objects.example/uploads/s1/docs/"));
    assert_eq!(service.stats().await.total_bytes, 0);

    assert!(service.delete(record.id()).await.unwrap());
    assert_eq!(store.object_count().await, 0);
}

#[tokio::test]
async fn test_remote_primary_requires_transport() {
    let config = FormvaultConfig::default()
        .with_storage(StorageConfig::default().with_primary_backend(BackendKind::Remote));

    let err = AttachmentService::builder(config).build().await.err().unwrap();
    assert!(matches!(
        err.storage_kind(),
        Some(StorageErrorKind::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = FormvaultConfig::default()
        .with_compression(CompressionConfig::default().with_quality(0));
    assert!(AttachmentService::builder(config).build().await.is_err());
}

#[tokio::test]
async fn test_large_jpeg_is_stored_downscaled() {
    let image = RgbImage::from_fn(2000, 1500, |x, y| {
        Rgb([
            ((x * 7 + y * 3) % 256) as u8,
            ((x ^ y) % 256) as u8,
            ((x * y / 13) % 256) as u8,
        ])
    });
    let mut original = Vec::new();
    JpegEncoder::new_with_quality(&mut original, 95)
        .encode_image(&image)
        .unwrap();
    let original_len = original.len() as u64;

    let service = service(config(original.len() as u64, original.len() as u64 * 2)).await;
    let record = service
        .upload(
            FileInput::new("photo.jpg", "image/jpeg", original),
            &UploadContext::new("s", "photo"),
        )
        .await
        .unwrap();

    assert!(*record.is_image());
    assert!(!*record.compression_skipped());
    assert_eq!(*record.original_size_bytes(), original_len);
    assert!(*record.stored_size_bytes() < original_len);
    assert_eq!(record.mime_type(), "image/jpeg");
    assert!(record.width().unwrap() <= 1920);
    assert!(record.height().unwrap() <= 1080);

    let payload = service.retrieve(record.id()).await.unwrap();
    let stored = image::load_from_memory(payload.as_bytes().unwrap()).unwrap();
    assert_eq!(stored.dimensions(), (1440, 1080));
}

#[tokio::test]
async fn test_directory_store_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let records_dir = temp_dir.path().join("records");
    let data = b"persist me".to_vec();

    let id = {
        let service = AttachmentService::builder(FormvaultConfig::default())
            .record_store(RecordStore::open(&records_dir).unwrap())
            .build()
            .await
            .unwrap();
        let record = service
            .upload(
                FileInput::new("p.txt", "text/plain", data.clone()),
                &UploadContext::new("s", "f"),
            )
            .await
            .unwrap();

        let raw = std::fs::read_to_string(records_dir.join(format!("{}.json", record.id()))).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(json["record"]["payload_location"]["data"].is_string());

        record.id().clone()
    };

    let service = AttachmentService::builder(FormvaultConfig::default())
        .record_store(RecordStore::open(&records_dir).unwrap())
        .build()
        .await
        .unwrap();

    let payload = service.retrieve(&id).await.unwrap();
    assert_eq!(payload.as_bytes().map(|b| &b[..]), Some(&data[..]));
    assert_eq!(service.stats().await.total_bytes, data.len() as u64);
}

#[tokio::test]
async fn test_open_uses_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config = FormvaultConfig::default().with_storage(
        StorageConfig::default().with_data_dir(Some(temp_dir.path().to_path_buf())),
    );

    let service = AttachmentService::open(config.clone()).await.unwrap();
    let record = service
        .upload(text("a.txt", 5), &UploadContext::new("s", "f"))
        .await
        .unwrap();
    let report = service
        .migrate(formvault::MigrationTarget::One(record.id().clone()))
        .await
        .unwrap();
    assert_eq!(report.migrated(), 1);
    drop(service);

    let reopened = AttachmentService::open(config).await.unwrap();
    let record = reopened.get(record.id()).await.unwrap();
    let key = record.payload_location().remote_key().unwrap();
    assert!(temp_dir.path().join("objects").join(key).exists());
    assert!(reopened.retrieve(record.id()).await.unwrap().as_descriptor().is_some());
}
