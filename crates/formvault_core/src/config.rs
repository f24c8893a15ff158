//! Configuration structures and loading.
//!
//! The configuration system supports:
//! - Bundled defaults (include_str! from formvault.toml)
//! - User overrides (~/.config/formvault/formvault.toml, then ./formvault.toml)
//! - Environment overrides (`FORMVAULT__STORAGE__QUOTA_BYTES=...`)
//! - An explicit file passed by the caller, taking precedence over all files

use derive_getters::Getters;
use formvault_error::{ConfigError, FormvaultResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Storage backend variants.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Payload inline with the record, quota-bounded
    #[default]
    #[display("embedded")]
    Embedded,
    /// Payload in a remote object store, referenced by key
    #[display("remote")]
    Remote,
}

/// Storage and quota settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct StorageConfig {
    /// Backend new uploads are written to
    #[serde(default)]
    primary_backend: BackendKind,

    /// Directory for persisted records and local objects
    ///
    /// Services built without one keep everything in memory. The CLI fills
    /// it in with [`FormvaultConfig::with_default_data_dir`].
    #[serde(default)]
    data_dir: Option<PathBuf>,

    /// Per-file ceiling for the embedded backend
    #[serde(default = "default_max_file_bytes")]
    max_file_bytes: u64,

    /// Aggregate ceiling for the embedded backend
    #[serde(default = "default_quota_bytes")]
    quota_bytes: u64,
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_quota_bytes() -> u64 {
    500 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            primary_backend: BackendKind::default(),
            data_dir: None,
            max_file_bytes: default_max_file_bytes(),
            quota_bytes: default_quota_bytes(),
        }
    }
}

/// Image compression settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct CompressionConfig {
    /// Whether image payloads are recompressed at all
    #[serde(default = "default_enabled")]
    enabled: bool,

    /// Maximum stored width in pixels
    #[serde(default = "default_max_width")]
    max_width: u32,

    /// Maximum stored height in pixels
    #[serde(default = "default_max_height")]
    max_height: u32,

    /// JPEG quality factor (1-100)
    #[serde(default = "default_quality")]
    quality: u8,
}

fn default_enabled() -> bool {
    true
}

fn default_max_width() -> u32 {
    1920
}

fn default_max_height() -> u32 {
    1080
}

fn default_quality() -> u8 {
    80
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            quality: default_quality(),
        }
    }
}

/// Remote object store call settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct RemoteConfig {
    /// Prefix prepended to every object key
    #[serde(default = "default_key_prefix")]
    key_prefix: String,

    /// Timeout for a single transport attempt (milliseconds)
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,

    /// Retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    max_retries: usize,

    /// First backoff delay (milliseconds), doubled per retry
    #[serde(default = "default_initial_backoff_ms")]
    initial_backoff_ms: u64,

    /// Lifetime of presigned access URLs (seconds)
    #[serde(default = "default_url_ttl_secs")]
    url_ttl_secs: u64,
}

fn default_key_prefix() -> String {
    "attachments".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_url_ttl_secs() -> u64 {
    900
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            url_ttl_secs: default_url_ttl_secs(),
        }
    }
}

/// Batch upload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct BatchConfig {
    /// Files processed concurrently within one batch
    #[serde(default = "default_workers")]
    workers: usize,
}

fn default_workers() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Migration sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct MigrationConfig {
    /// Records migrated concurrently within one sweep
    #[serde(default = "default_concurrency")]
    concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Top-level formvault configuration.
///
/// # Example
///
/// ```
/// use formvault_core::{CompressionConfig, FormvaultConfig};
///
/// let config = FormvaultConfig::default()
///     .with_compression(CompressionConfig::default().with_quality(70));
/// assert_eq!(*config.compression().quality(), 70);
/// assert!(config.validate().is_ok());
/// ```
#[derive(
    Debug, Clone, PartialEq, Default, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct FormvaultConfig {
    /// Storage and quota settings
    #[serde(default)]
    storage: StorageConfig,
    /// Image compression settings
    #[serde(default)]
    compression: CompressionConfig,
    /// Remote object store settings
    #[serde(default)]
    remote: RemoteConfig,
    /// Batch upload settings
    #[serde(default)]
    batch: BatchConfig,
    /// Migration sweep settings
    #[serde(default)]
    migration: MigrationConfig,
}

impl FormvaultConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> FormvaultResult<Self> {
        debug!("Loading configuration from file");

        let loaded: Self = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Load configuration with precedence: explicit file > env > cwd > home > bundled.
    ///
    /// User config files are optional and silently skipped if missing.
    #[instrument]
    pub fn load(explicit: Option<&Path>) -> FormvaultResult<Self> {
        debug!("Loading configuration");

        const DEFAULT_CONFIG: &str = include_str!("../../../formvault.toml");

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            DEFAULT_CONFIG,
            config::FileFormat::Toml,
        ));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/formvault/formvault.toml");
            builder = builder.add_source(config::File::from(home_config).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("formvault").required(false))
            .add_source(
                config::Environment::with_prefix("FORMVAULT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path));
        }

        let loaded: Self = builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Fill `storage.data_dir` with `{platform data dir}/formvault` when unset.
    ///
    /// An explicit directory is kept as is.
    ///
    /// # Errors
    ///
    /// Returns an error if no directory is set and the platform has none.
    pub fn with_default_data_dir(mut self) -> Result<Self, ConfigError> {
        if self.storage.data_dir.is_none() {
            let dir = dirs::data_dir()
                .map(|dir| dir.join("formvault"))
                .ok_or_else(|| {
                    ConfigError::new(
                        "storage.data_dir is unset and no platform data directory is available",
                    )
                })?;
            debug!(data_dir = %dir.display(), "Using default data directory");
            self.storage.data_dir = Some(dir);
        }
        Ok(self)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let compression = &self.compression;
        if !(1..=100).contains(&compression.quality) {
            return Err(ConfigError::new(format!(
                "compression.quality must be in 1..=100, got {}",
                compression.quality
            )));
        }
        if compression.max_width == 0 || compression.max_height == 0 {
            return Err(ConfigError::new(format!(
                "compression bounds must be positive, got {}x{}",
                compression.max_width, compression.max_height
            )));
        }
        if self.storage.max_file_bytes == 0 {
            return Err(ConfigError::new("storage.max_file_bytes must be positive"));
        }
        if self.storage.max_file_bytes > self.storage.quota_bytes {
            return Err(ConfigError::new(format!(
                "storage.max_file_bytes ({}) exceeds storage.quota_bytes ({})",
                self.storage.max_file_bytes, self.storage.quota_bytes
            )));
        }
        if self.batch.workers == 0 {
            return Err(ConfigError::new("batch.workers must be at least 1"));
        }
        if self.migration.concurrency == 0 {
            return Err(ConfigError::new("migration.concurrency must be at least 1"));
        }
        if self.remote.timeout_ms == 0 {
            return Err(ConfigError::new("remote.timeout_ms must be positive"));
        }
        if self.remote.max_retries > 10 {
            return Err(ConfigError::new(format!(
                "remote.max_retries must be at most 10, got {}",
                self.remote.max_retries
            )));
        }
        Ok(())
    }
}
