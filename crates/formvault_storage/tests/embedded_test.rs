//! Tests for the embedded backend and its quota gate.

use bytes::Bytes;
use formvault_storage::{EmbeddedBackend, QuotaManager, StorageBackend, StorageErrorKind};
use std::sync::Arc;

fn backend(quota_bytes: u64, max_file_bytes: u64) -> EmbeddedBackend {
    EmbeddedBackend::new(Arc::new(QuotaManager::new(quota_bytes)), max_file_bytes)
}

#[tokio::test]
async fn test_put_get_round_trip() {
    let backend = backend(1024, 512);
    let data = Bytes::from(vec![7u8; 100]);

    let key = backend.put("a", data.clone()).await.unwrap();
    assert_eq!(key, "a");

    let payload = backend.get("a").await.unwrap();
    assert_eq!(payload.as_bytes(), Some(&data));
    assert!(payload.as_descriptor().is_none());
    assert_eq!(backend.quota().used_bytes().await, 100);
}

#[tokio::test]
async fn test_file_over_ceiling_is_rejected() {
    let backend = backend(1024, 10);

    let err = backend.put("big", Bytes::from(vec![0u8; 11])).await.unwrap_err();
    assert_eq!(
        err.kind,
        StorageErrorKind::SizeExceeded {
            size: 11,
            limit: 10
        }
    );
    assert!(!backend.exists("big").await.unwrap());
    assert_eq!(backend.quota().used_bytes().await, 0);
}

#[tokio::test]
async fn test_quota_exceeded_leaves_state_untouched() {
    let backend = backend(100, 100);
    backend.put("a", Bytes::from(vec![0u8; 70])).await.unwrap();

    let err = backend.put("b", Bytes::from(vec![0u8; 40])).await.unwrap_err();
    assert!(matches!(
        err.kind,
        StorageErrorKind::QuotaExceeded {
            requested: 40,
            used: 70,
            quota: 100
        }
    ));
    assert!(!backend.exists("b").await.unwrap());
    assert_eq!(backend.quota().used_bytes().await, 70);

    // Exactly at the ceiling is accepted
    backend.put("c", Bytes::from(vec![0u8; 30])).await.unwrap();
    assert_eq!(backend.quota().used_bytes().await, 100);
}

#[tokio::test]
async fn test_overwrite_is_charged_by_difference() {
    let backend = backend(100, 100);
    backend.put("a", Bytes::from(vec![0u8; 80])).await.unwrap();
    backend.put("a", Bytes::from(vec![0u8; 90])).await.unwrap();

    assert_eq!(backend.quota().used_bytes().await, 90);
    assert_eq!(backend.len().await, 1);
}

#[tokio::test]
async fn test_delete_releases_quota() {
    let backend = backend(100, 100);
    backend.put("a", Bytes::from(vec![0u8; 60])).await.unwrap();

    assert!(backend.delete("a").await.unwrap());
    assert_eq!(backend.quota().used_bytes().await, 0);
    assert!(!backend.delete("a").await.unwrap());

    let err = backend.get("a").await.unwrap_err();
    assert!(matches!(err.kind, StorageErrorKind::NotFound(_)));
}

#[tokio::test]
async fn test_restore_bypasses_ceilings() {
    let backend = backend(10, 5);
    backend.restore("old", Bytes::from(vec![0u8; 20])).await;

    assert!(backend.exists("old").await.unwrap());
    assert_eq!(backend.quota().used_bytes().await, 20);

    // Over quota now, so new writes are refused until space is freed
    let err = backend.put("new", Bytes::from_static(b"x")).await.unwrap_err();
    assert!(matches!(err.kind, StorageErrorKind::QuotaExceeded { .. }));
}

#[tokio::test]
async fn test_concurrent_puts_never_exceed_quota() {
    let backend = Arc::new(backend(1000, 1000));

    let mut handles = Vec::new();
    for i in 0..20 {
        let backend = backend.clone();
        handles.push(tokio::spawn(async move {
            backend
                .put(&format!("k{}", i), Bytes::from(vec![0u8; 100]))
                .await
                .is_ok()
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(backend.quota().used_bytes().await, 1000);
    assert_eq!(backend.len().await, 10);
}
