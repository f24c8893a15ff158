use formvault_core::{BackendKind, BatchConfig, CompressionConfig, FormvaultConfig, StorageConfig};
use std::io::Write;

#[test]
fn defaults_are_valid() {
    let config = FormvaultConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(*config.storage().primary_backend(), BackendKind::Embedded);
    assert_eq!(*config.compression().max_width(), 1920);
    assert_eq!(*config.compression().max_height(), 1080);
}

#[test]
fn validate_rejects_out_of_range_quality() {
    let config = FormvaultConfig::default()
        .with_compression(CompressionConfig::default().with_quality(0));
    assert!(config.validate().is_err());

    let config = FormvaultConfig::default()
        .with_compression(CompressionConfig::default().with_quality(101));
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_file_ceiling_above_quota() {
    let config = FormvaultConfig::default().with_storage(
        StorageConfig::default()
            .with_max_file_bytes(2048)
            .with_quota_bytes(1024),
    );
    let err = config.validate().unwrap_err();
    assert!(err.message.contains("max_file_bytes"));
}

#[test]
fn validate_rejects_empty_worker_pool() {
    let config = FormvaultConfig::default().with_batch(BatchConfig::default().with_workers(0));
    assert!(config.validate().is_err());
}

#[test]
fn from_file_merges_partial_sections_with_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[storage]
primary_backend = "remote"
quota_bytes = 4096
max_file_bytes = 1024

[compression]
quality = 65
"#
    )
    .unwrap();

    let config = FormvaultConfig::from_file(file.path()).unwrap();
    assert_eq!(*config.storage().primary_backend(), BackendKind::Remote);
    assert_eq!(*config.storage().quota_bytes(), 4096);
    assert_eq!(*config.compression().quality(), 65);
    assert_eq!(*config.compression().max_width(), 1920);
    assert_eq!(*config.batch().workers(), 4);
}

#[test]
fn from_file_rejects_invalid_values() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[migration]\nconcurrency = 0").unwrap();

    assert!(FormvaultConfig::from_file(file.path()).is_err());
}

#[test]
fn default_data_dir_keeps_explicit_directory() {
    let explicit = std::path::PathBuf::from("/srv/formvault");
    let config = FormvaultConfig::default()
        .with_storage(StorageConfig::default().with_data_dir(Some(explicit.clone())))
        .with_default_data_dir()
        .unwrap();
    assert_eq!(config.storage().data_dir().as_deref(), Some(explicit.as_path()));
}

#[test]
fn default_data_dir_fills_unset_directory() {
    let Some(platform) = dirs::data_dir() else {
        return;
    };
    let config = FormvaultConfig::default().with_default_data_dir().unwrap();
    assert_eq!(
        config.storage().data_dir().as_deref(),
        Some(platform.join("formvault").as_path())
    );
}
