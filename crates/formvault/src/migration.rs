//! Embedded-to-remote payload migration.

use crate::InFlight;
use formvault_core::{FileId, FileRecord, PayloadLocation};
use formvault_storage::{
    EmbeddedBackend, Payload, RecordStore, RemoteBackend, StorageBackend, StorageError,
    StorageErrorKind,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;

/// Which records a migration covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationTarget {
    /// A single record
    One(FileId),
    /// Every record, in creation order
    All,
}

/// Result of migrating one record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Payload now lives remotely under `key`
    Migrated {
        /// Remote object key
        key: String,
    },
    /// Record was already remote
    Skipped,
    /// Record stayed where it was
    Failed {
        /// Why the record was not migrated
        #[serde(serialize_with = "error_string")]
        error: StorageError,
    },
}

fn error_string<S: serde::Serializer>(error: &StorageError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&error.kind)
}

/// Per-record outcome within a report.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationEntry {
    /// Record id
    pub id: FileId,
    /// What happened to it
    #[serde(flatten)]
    pub outcome: MigrationOutcome,
}

/// Outcome of a migration run, in creation order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// One entry per record considered
    pub entries: Vec<MigrationEntry>,
}

impl MigrationReport {
    /// Records moved to remote storage in this run.
    pub fn migrated(&self) -> usize {
        self.count(|outcome| matches!(outcome, MigrationOutcome::Migrated { .. }))
    }

    /// Records that were already remote.
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, MigrationOutcome::Skipped))
    }

    /// Records that failed and stayed embedded.
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, MigrationOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&MigrationOutcome) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|entry| predicate(&entry.outcome))
            .count()
    }
}

/// Moves embedded payloads into the remote backend.
///
/// Per record: claim the id, copy the bytes to remote storage, persist the
/// relocated record, then drop the embedded bytes. The embedded copy is only
/// released once the remote copy and the relocated record are both durable.
pub struct MigrationCoordinator {
    records: Arc<RecordStore>,
    embedded: Arc<EmbeddedBackend>,
    remote: Arc<RemoteBackend>,
    in_flight: Arc<InFlight>,
    concurrency: usize,
}

impl MigrationCoordinator {
    /// Create a coordinator over the given stores.
    pub fn new(
        records: Arc<RecordStore>,
        embedded: Arc<EmbeddedBackend>,
        remote: Arc<RemoteBackend>,
        in_flight: Arc<InFlight>,
        concurrency: usize,
    ) -> Self {
        Self {
            records,
            embedded,
            remote,
            in_flight,
            concurrency: concurrency.max(1),
        }
    }

    /// Migrate the targeted records.
    ///
    /// A failing record never aborts the sweep. Running the same target again
    /// reports already-migrated records as skipped.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, target: MigrationTarget) -> MigrationReport {
        let ids: Vec<FileId> = match target {
            MigrationTarget::One(id) => vec![id],
            MigrationTarget::All => self
                .records
                .all()
                .await
                .into_iter()
                .map(|record| record.id().clone())
                .collect(),
        };

        let entries: Vec<MigrationEntry> = stream::iter(ids)
            .map(|id| async move {
                let outcome = self.migrate_one(&id).await;
                MigrationEntry { id, outcome }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = MigrationReport { entries };
        tracing::info!(
            migrated = report.migrated(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Migration finished"
        );
        report
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn migrate_one(&self, id: &FileId) -> MigrationOutcome {
        let Some(_guard) = self.in_flight.try_acquire(id) else {
            tracing::warn!("Record already in flight");
            return failed(StorageErrorKind::MigrationConflict(id.to_string()));
        };

        let Some(record) = self.records.get(id).await else {
            return failed(StorageErrorKind::NotFound(id.to_string()));
        };

        if record.payload_location().is_remote() {
            tracing::debug!("Already remote, skipping");
            return MigrationOutcome::Skipped;
        }

        match self.relocate(&record).await {
            Ok(key) => MigrationOutcome::Migrated { key },
            Err(error) => {
                tracing::warn!(error = %error, "Migration failed, record stays embedded");
                MigrationOutcome::Failed { error }
            }
        }
    }

    async fn relocate(&self, record: &FileRecord) -> Result<String, StorageError> {
        let id = record.id();
        let data = match self.embedded.get(id.as_str()).await? {
            Payload::Bytes(data) => data,
            Payload::Descriptor(_) => {
                return Err(StorageError::new(StorageErrorKind::NotFound(id.to_string())));
            }
        };

        let key = RemoteBackend::object_key(
            self.remote.config(),
            record.submission_id(),
            record.field_id(),
            id,
        );
        let key = self.remote.put(&key, data).await?;

        let relocated = record.relocated(PayloadLocation::Remote { key: key.clone() });
        if let Err(e) = self.records.replace(relocated).await {
            if let Err(cleanup) = self.remote.delete(&key).await {
                tracing::warn!(key = %key, error = %cleanup, "Failed to remove orphaned remote copy");
            }
            return Err(e);
        }

        self.embedded.delete(id.as_str()).await?;
        tracing::debug!(key = %key, "Migrated record");
        Ok(key)
    }
}

#[track_caller]
fn failed(kind: StorageErrorKind) -> MigrationOutcome {
    MigrationOutcome::Failed {
        error: StorageError::new(kind),
    }
}
