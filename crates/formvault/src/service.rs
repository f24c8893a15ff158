//! Attachment service: the operations exposed to form handlers.

use crate::{InFlight, MigrationCoordinator, MigrationReport, MigrationTarget};
use formvault_compress::{CompressionEngine, CompressionOutcome, is_image_mime};
use formvault_core::{
    BackendKind, Clock, FileId, FileInput, FileRecord, FileRecordBuilder, FormvaultConfig,
    PayloadLocation, SystemClock, UploadContext,
};
use formvault_error::FormvaultResult;
use formvault_storage::{
    CleanupReport, EmbeddedBackend, LocalObjectStore, MemoryObjectStore, ObjectTransport, Payload,
    QuotaManager, RecordStore, RemoteBackend, StorageBackend, StorageError, StorageErrorKind,
    StorageResult,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Usage snapshot returned by [`AttachmentService::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStats {
    /// Live records across both backends
    pub file_count: usize,
    /// Records with an inline payload
    pub embedded_files: usize,
    /// Records with a remote payload
    pub remote_files: usize,
    /// Bytes held by the embedded backend
    pub total_bytes: u64,
    /// Embedded quota
    pub quota_bytes: u64,
    /// `total_bytes / quota_bytes * 100`, two decimals
    pub used_percent: f64,
}

/// Builder for [`AttachmentService`].
pub struct AttachmentServiceBuilder {
    config: FormvaultConfig,
    transport: Option<Arc<dyn ObjectTransport>>,
    clock: Option<Arc<dyn Clock>>,
    records: Option<RecordStore>,
}

impl AttachmentServiceBuilder {
    /// Object store used by the remote backend.
    pub fn transport(mut self, transport: Arc<dyn ObjectTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Time source for creation times and cleanup horizons.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Record catalog. Defaults to an in-memory store.
    pub fn record_store(mut self, records: RecordStore) -> Self {
        self.records = Some(records);
        self
    }

    /// Validate the configuration and assemble the service.
    ///
    /// Embedded payloads already in the record store are loaded into the
    /// embedded backend and counted against the quota.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails, or `InvalidConfig`
    /// if the primary backend is remote and no transport was supplied.
    pub async fn build(self) -> FormvaultResult<AttachmentService> {
        self.config.validate()?;

        let storage = self.config.storage();
        if *storage.primary_backend() == BackendKind::Remote && self.transport.is_none() {
            return Err(StorageError::new(StorageErrorKind::InvalidConfig(
                "primary backend is remote but no object transport is configured".to_string(),
            ))
            .into());
        }

        let quota = Arc::new(QuotaManager::new(*storage.quota_bytes()));
        let embedded = Arc::new(EmbeddedBackend::new(
            Arc::clone(&quota),
            *storage.max_file_bytes(),
        ));
        let remote = self
            .transport
            .map(|transport| Arc::new(RemoteBackend::new(transport, self.config.remote().clone())));
        let records = Arc::new(self.records.unwrap_or_else(RecordStore::in_memory));

        let mut restored = 0usize;
        for record in records.all().await {
            if let Some(data) = record.payload_location().embedded_bytes() {
                embedded.restore(record.id().as_str(), data.clone()).await;
                restored += 1;
            }
        }

        let usage = quota.usage().await;
        if usage.used_bytes > usage.quota_bytes {
            tracing::warn!(
                used = usage.used_bytes,
                quota = usage.quota_bytes,
                "Restored payloads exceed quota, new embedded uploads will be rejected"
            );
        }
        tracing::info!(
            restored,
            used_bytes = usage.used_bytes,
            primary = %storage.primary_backend(),
            remote = remote.is_some(),
            "Attachment service ready"
        );

        Ok(AttachmentService {
            compression: Arc::new(CompressionEngine::new(self.config.compression().clone())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            in_flight: Arc::new(InFlight::new()),
            config: Arc::new(self.config),
            records,
            quota,
            embedded,
            remote,
        })
    }
}

/// Stores, serves, migrates and evicts form attachments.
///
/// Cloning is cheap; clones share the same stores.
///
/// # Example
///
/// ```rust
/// use formvault::AttachmentService;
/// use formvault_core::{FileInput, FormvaultConfig, UploadContext};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = AttachmentService::builder(FormvaultConfig::default()).build().await?;
/// let ctx = UploadContext::new("sub-1", "resume");
///
/// let record = service
///     .upload(FileInput::new("cv.txt", "text/plain", b"hello".to_vec()), &ctx)
///     .await?;
/// let payload = service.retrieve(record.id()).await?;
/// assert_eq!(payload.as_bytes().map(|b| &b[..]), Some(&b"hello"[..]));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AttachmentService {
    config: Arc<FormvaultConfig>,
    records: Arc<RecordStore>,
    quota: Arc<QuotaManager>,
    embedded: Arc<EmbeddedBackend>,
    remote: Option<Arc<RemoteBackend>>,
    compression: Arc<CompressionEngine>,
    clock: Arc<dyn Clock>,
    in_flight: Arc<InFlight>,
}

impl AttachmentService {
    /// Start building a service from `config`.
    pub fn builder(config: FormvaultConfig) -> AttachmentServiceBuilder {
        AttachmentServiceBuilder {
            config,
            transport: None,
            clock: None,
            records: None,
        }
    }

    /// Open a service as described by `config` alone.
    ///
    /// With `storage.data_dir` set, records persist under `{data_dir}/records`
    /// and remote objects under `{data_dir}/objects`. Without it, both live in
    /// memory.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or a directory cannot
    /// be opened.
    #[tracing::instrument(skip(config))]
    pub async fn open(config: FormvaultConfig) -> FormvaultResult<Self> {
        let builder = match config.storage().data_dir().clone() {
            Some(dir) => {
                let records = RecordStore::open(dir.join("records"))?;
                let objects = LocalObjectStore::new(dir.join("objects"))?;
                Self::builder(config)
                    .record_store(records)
                    .transport(Arc::new(objects))
            }
            None => Self::builder(config).transport(Arc::new(MemoryObjectStore::new(
                "memory://formvault",
            ))),
        };
        builder.build().await
    }

    /// Active configuration.
    pub fn config(&self) -> &FormvaultConfig {
        &self.config
    }

    /// Store one file for `context`.
    ///
    /// Images are recompressed first; compression problems never fail the
    /// upload. The stored bytes go to the configured primary backend.
    ///
    /// # Errors
    ///
    /// `SizeExceeded` or `QuotaExceeded` from the embedded backend,
    /// `BackendUnavailable` from the remote backend, `Persistence` if the
    /// record cannot be saved. Nothing is stored on error.
    #[tracing::instrument(
        skip(self, input, context),
        fields(
            submission = %context.submission_id(),
            field = %context.field_id(),
            name = %input.original_name(),
            size = input.size()
        )
    )]
    pub async fn upload(&self, input: FileInput, context: &UploadContext) -> StorageResult<FileRecord> {
        let original_size = input.size();
        let outcome = self.compress(&input).await;

        let created_at = self.clock.now();
        let id = loop {
            let candidate = FileId::derive(context, created_at, Uuid::new_v4());
            if !self.records.is_known(&candidate).await {
                break candidate;
            }
            tracing::debug!(id = %candidate, "Derived id already issued, re-deriving");
        };

        let backend = self.primary_backend()?;
        let key = match backend.kind() {
            BackendKind::Embedded => id.to_string(),
            BackendKind::Remote => RemoteBackend::object_key(
                self.config.remote(),
                context.submission_id(),
                context.field_id(),
                &id,
            ),
        };

        let stored_size = outcome.stored_size();
        let mime_type = outcome.mime_type().clone();
        let (compression_skipped, width, height) =
            (*outcome.skipped(), *outcome.width(), *outcome.height());
        let data = outcome.into_data();

        let key = backend.put(&key, data.clone()).await?;
        let payload_location = match backend.kind() {
            BackendKind::Embedded => PayloadLocation::Embedded { data },
            BackendKind::Remote => PayloadLocation::Remote { key: key.clone() },
        };

        let record = FileRecordBuilder::default()
            .id(id)
            .original_name(input.original_name().clone())
            .mime_type(mime_type)
            .original_size_bytes(original_size)
            .stored_size_bytes(stored_size)
            .payload_location(payload_location)
            .field_id(context.field_id().clone())
            .submission_id(context.submission_id().clone())
            .created_at(created_at)
            .is_image(is_image_mime(input.mime_type()))
            .compression_skipped(compression_skipped)
            .width(width)
            .height(height)
            .build()
            .map_err(|e| StorageError::new(StorageErrorKind::Persistence(e.to_string())));

        let inserted = match record {
            Ok(record) => self.records.insert(record.clone()).await.map(|_| record),
            Err(e) => Err(e),
        };

        match inserted {
            Ok(record) => {
                tracing::info!(
                    id = %record.id(),
                    backend = %backend.kind(),
                    stored = stored_size,
                    "Stored attachment"
                );
                Ok(record)
            }
            Err(e) => {
                if let Err(cleanup) = backend.delete(&key).await {
                    tracing::warn!(key = %key, error = %cleanup, "Failed to roll back payload");
                }
                Err(e)
            }
        }
    }

    /// Record metadata for `id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no live record has this id.
    pub async fn get(&self, id: &FileId) -> StorageResult<FileRecord> {
        self.records
            .get(id)
            .await
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(id.to_string())))
    }

    /// Stored payload for `id`: bytes if embedded, a presigned descriptor if remote.
    ///
    /// # Errors
    ///
    /// `NotFound` if the record or its payload is missing,
    /// `BackendUnavailable` if the remote store cannot be reached.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve(&self, id: &FileId) -> StorageResult<Payload> {
        let record = self.get(id).await?;
        match record.payload_location() {
            PayloadLocation::Embedded { .. } => self.embedded.get(id.as_str()).await,
            PayloadLocation::Remote { key } => self.remote()?.get(key).await,
        }
    }

    /// Delete a record and its payload.
    ///
    /// Returns `false` if no live record has this id. The id is never reissued.
    ///
    /// # Errors
    ///
    /// `MigrationConflict` if the record is being migrated,
    /// `BackendUnavailable` if the remote payload cannot be removed (the
    /// record is kept).
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &FileId) -> StorageResult<bool> {
        let Some(_guard) = self.in_flight.try_acquire(id) else {
            return Err(StorageError::new(StorageErrorKind::MigrationConflict(
                id.to_string(),
            )));
        };

        let Some(record) = self.records.get(id).await else {
            return Ok(false);
        };

        match record.payload_location() {
            PayloadLocation::Embedded { data } => {
                self.embedded.delete(id.as_str()).await?;
                if let Err(e) = self.records.remove(id).await {
                    self.embedded.restore(id.as_str(), data.clone()).await;
                    return Err(e);
                }
            }
            PayloadLocation::Remote { key } => {
                if !self.remote()?.delete(key).await? {
                    tracing::warn!(key = %key, "Remote object already absent");
                }
                self.records.remove(id).await?;
            }
        }

        tracing::info!(backend = record.payload_location().backend_name(), "Deleted attachment");
        Ok(true)
    }

    /// All records of a submission, in creation order.
    pub async fn list_by_context(&self, submission_id: &str) -> Vec<FileRecord> {
        self.records.list_by_submission(submission_id).await
    }

    /// Move embedded payloads to the remote backend.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if no remote backend is configured, `NotFound` if a
    /// single targeted record does not exist. Per-record failures are reported
    /// in the returned report.
    pub async fn migrate(&self, target: MigrationTarget) -> StorageResult<MigrationReport> {
        if let MigrationTarget::One(id) = &target {
            self.get(id).await?;
        }
        Ok(self.migration()?.run(target).await)
    }

    /// Coordinator over this service's stores.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if no remote backend is configured.
    pub fn migration(&self) -> StorageResult<MigrationCoordinator> {
        Ok(MigrationCoordinator::new(
            Arc::clone(&self.records),
            Arc::clone(&self.embedded),
            Arc::clone(self.remote()?),
            Arc::clone(&self.in_flight),
            *self.config.migration().concurrency(),
        ))
    }

    /// Usage snapshot.
    pub async fn stats(&self) -> ServiceStats {
        let records = self.records.all().await;
        let embedded_files = records
            .iter()
            .filter(|record| record.payload_location().is_embedded())
            .count();
        let usage = self.quota.usage().await;

        ServiceStats {
            file_count: records.len(),
            embedded_files,
            remote_files: records.len() - embedded_files,
            total_bytes: usage.used_bytes,
            quota_bytes: usage.quota_bytes,
            used_percent: usage.used_percent,
        }
    }

    /// Delete embedded records created more than `older_than_days` days ago.
    ///
    /// Records held by another operation are left alone. Remote records are
    /// never touched. A record that cannot be evicted keeps its payload and
    /// is counted in `failed`; the pass continues with the next one.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup(&self, older_than_days: u32) -> CleanupReport {
        let records = self.records.all().await;
        let plan = self
            .quota
            .plan_eviction(&records, older_than_days, self.clock.now());
        tracing::debug!(
            candidates = plan.candidates.len(),
            planned_bytes = plan.total_bytes(),
            "Planned eviction"
        );

        let mut report = CleanupReport::default();
        for (id, bytes) in &plan.candidates {
            match self.evict(id).await {
                Ok(true) => {
                    report.count += 1;
                    report.bytes_reclaimed += bytes;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Eviction failed, record kept");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            horizon = %plan.horizon,
            count = report.count,
            failed = report.failed,
            bytes_reclaimed = report.bytes_reclaimed,
            "Cleanup finished"
        );
        report
    }

    /// Remove one embedded record and its payload.
    ///
    /// Returns `false` if the record is in flight, gone, or no longer embedded.
    async fn evict(&self, id: &FileId) -> StorageResult<bool> {
        let Some(_guard) = self.in_flight.try_acquire(id) else {
            tracing::debug!(id = %id, "Record in flight, skipping");
            return Ok(false);
        };
        // Re-check under the claim; a migration may have finished meanwhile
        let Some(record) = self.records.get(id).await else {
            return Ok(false);
        };
        let PayloadLocation::Embedded { data } = record.payload_location() else {
            return Ok(false);
        };

        self.embedded.delete(id.as_str()).await?;
        if let Err(e) = self.records.remove(id).await {
            self.embedded.restore(id.as_str(), data.clone()).await;
            return Err(e);
        }
        Ok(true)
    }

    async fn compress(&self, input: &FileInput) -> CompressionOutcome {
        let engine = Arc::clone(&self.compression);
        let data = input.data().clone();
        let mime_type = input.mime_type().clone();

        match tokio::task::spawn_blocking(move || engine.compress(&data, &mime_type)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Compression task failed, storing original bytes");
                CompressionOutcome::pass_through(input.data().clone(), input.mime_type().clone())
            }
        }
    }

    fn primary_backend(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        match self.config.storage().primary_backend() {
            BackendKind::Embedded => Ok(Arc::clone(&self.embedded) as Arc<dyn StorageBackend>),
            BackendKind::Remote => Ok(Arc::clone(self.remote()?) as Arc<dyn StorageBackend>),
        }
    }

    fn remote(&self) -> StorageResult<&Arc<RemoteBackend>> {
        self.remote.as_ref().ok_or_else(|| {
            StorageError::new(StorageErrorKind::InvalidConfig(
                "no remote backend configured".to_string(),
            ))
        })
    }
}
