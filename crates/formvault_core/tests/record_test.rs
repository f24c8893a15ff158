use bytes::Bytes;
use chrono::{TimeZone, Utc};
use formvault_core::{FileId, FileRecord, FileRecordBuilder, PayloadLocation, UploadContext};
use uuid::Uuid;

fn sample_record(data: &'static [u8]) -> FileRecord {
    FileRecordBuilder::default()
        .id(FileId::from("00112233445566778899aabbccddeeff"))
        .original_name("scan.pdf")
        .mime_type("application/pdf")
        .original_size_bytes(data.len() as u64)
        .stored_size_bytes(data.len() as u64)
        .payload_location(PayloadLocation::Embedded {
            data: Bytes::from_static(data),
        })
        .field_id("documents")
        .submission_id("sub-42")
        .created_at(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
        .is_image(false)
        .compression_skipped(true)
        .build()
        .unwrap()
}

#[test]
fn derived_ids_differ_by_salt_and_context() {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let ctx = UploadContext::new("sub-1", "photo");
    let other = UploadContext::new("sub-1", "signature");

    let a = FileId::derive(&ctx, at, Uuid::from_u128(7));
    let b = FileId::derive(&ctx, at, Uuid::from_u128(8));
    let c = FileId::derive(&other, at, Uuid::from_u128(7));

    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(a, FileId::derive(&ctx, at, Uuid::from_u128(7)));
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn record_json_round_trip_is_byte_exact() {
    let record = sample_record(b"%PDF-1.4\n\x00\x9c\xff binary tail");
    let json = serde_json::to_string(&record).unwrap();

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["payload_location"]["data"].is_string());

    let back: FileRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn relocated_keeps_identity() {
    let record = sample_record(b"payload");
    let moved = record.relocated(PayloadLocation::Remote {
        key: "attachments/sub-42/documents/x".to_string(),
    });

    assert_eq!(moved.id(), record.id());
    assert_eq!(moved.created_at(), record.created_at());
    assert!(moved.payload_location().is_remote());
    assert_eq!(record.embedded_bytes(), 7);
    assert_eq!(moved.embedded_bytes(), 0);
}
