//! Persisted catalog of file records.
//!
//! The store maps record ids to serialized [`FileRecord`]s, embedded payloads
//! included. It is either purely in-memory or backed by a directory:
//!
//! ```text
//! {dir}/
//! ├── 3f2a9c....json      one record (payload inline as base64)
//! ├── 8b01de....json
//! └── retired/
//!     └── 77ac41...       marker for a deleted id, never reissued
//! ```

use formvault_core::{FileId, FileRecord};
use formvault_error::{StorageError, StorageErrorKind, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// On-disk form of a record.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    /// Creation order within the store
    sequence: u64,
    record: FileRecord,
}

#[derive(Debug, Default)]
struct Catalog {
    records: HashMap<FileId, (u64, FileRecord)>,
    order: BTreeMap<u64, FileId>,
    retired: HashSet<FileId>,
    next_sequence: u64,
}

impl Catalog {
    fn ordered(&self) -> impl Iterator<Item = &FileRecord> {
        self.order
            .values()
            .filter_map(|id| self.records.get(id).map(|(_, record)| record))
    }
}

/// Record catalog with optional directory persistence.
///
/// Writes are persisted before the in-memory catalog changes, so a failed
/// write leaves the catalog as it was.
#[derive(Debug)]
pub struct RecordStore {
    dir: Option<PathBuf>,
    catalog: RwLock<Catalog>,
}

impl RecordStore {
    /// Create a store that keeps records in memory only.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            catalog: RwLock::new(Catalog::default()),
        }
    }

    /// Open (or create) a directory-backed store and load its records.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the directory cannot be created or a record
    /// file cannot be read or parsed.
    #[tracing::instrument(skip(dir), fields(dir = %dir.as_ref().display()))]
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let retired_dir = dir.join("retired");
        std::fs::create_dir_all(&retired_dir).map_err(|e| persistence(&retired_dir, e))?;

        let mut loaded: Vec<PersistedRecord> = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| persistence(&dir, e))? {
            let path = entry.map_err(|e| persistence(&dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = std::fs::read(&path).map_err(|e| persistence(&path, e))?;
            let persisted: PersistedRecord = serde_json::from_slice(&raw).map_err(|e| {
                StorageError::new(StorageErrorKind::Persistence(format!(
                    "parse {}: {}",
                    path.display(),
                    e
                )))
            })?;
            loaded.push(persisted);
        }

        let mut catalog = Catalog::default();
        for persisted in loaded {
            let id = persisted.record.id().clone();
            catalog.next_sequence = catalog.next_sequence.max(persisted.sequence + 1);
            catalog.order.insert(persisted.sequence, id.clone());
            catalog.records.insert(id, (persisted.sequence, persisted.record));
        }

        for entry in std::fs::read_dir(&retired_dir).map_err(|e| persistence(&retired_dir, e))? {
            let entry = entry.map_err(|e| persistence(&retired_dir, e))?;
            if let Some(name) = entry.file_name().to_str() {
                catalog.retired.insert(FileId::from(name));
            }
        }

        tracing::info!(
            records = catalog.records.len(),
            retired = catalog.retired.len(),
            "Opened record store"
        );

        Ok(Self {
            dir: Some(dir),
            catalog: RwLock::new(catalog),
        })
    }

    /// True if `id` is live or has ever been deleted.
    pub async fn is_known(&self, id: &FileId) -> bool {
        let catalog = self.catalog.read().await;
        catalog.records.contains_key(id) || catalog.retired.contains(id)
    }

    /// Insert a new record, assigning it the next creation sequence.
    ///
    /// # Errors
    ///
    /// Fails if the id is live or retired, or if persisting fails.
    #[tracing::instrument(skip(self, record), fields(id = %record.id()))]
    pub async fn insert(&self, record: FileRecord) -> StorageResult<u64> {
        let mut catalog = self.catalog.write().await;
        let id = record.id().clone();

        if catalog.records.contains_key(&id) || catalog.retired.contains(&id) {
            return Err(StorageError::new(StorageErrorKind::Persistence(format!(
                "id {} already issued",
                id
            ))));
        }

        let sequence = catalog.next_sequence;
        let persisted = PersistedRecord { sequence, record };
        self.write_record(&persisted).await?;

        catalog.next_sequence += 1;
        catalog.order.insert(sequence, id.clone());
        catalog.records.insert(id, (sequence, persisted.record));
        Ok(sequence)
    }

    /// Replace an existing record, keeping its creation sequence.
    ///
    /// # Errors
    ///
    /// `NotFound` if no record has this id; `Persistence` if writing fails.
    #[tracing::instrument(skip(self, record), fields(id = %record.id()))]
    pub async fn replace(&self, record: FileRecord) -> StorageResult<()> {
        let mut catalog = self.catalog.write().await;
        let id = record.id().clone();

        let sequence = match catalog.records.get(&id) {
            Some((sequence, _)) => *sequence,
            None => return Err(StorageError::new(StorageErrorKind::NotFound(id.to_string()))),
        };

        let persisted = PersistedRecord { sequence, record };
        self.write_record(&persisted).await?;
        catalog.records.insert(id, (sequence, persisted.record));
        Ok(())
    }

    /// Remove a record and retire its id.
    ///
    /// Returns `None` if the id is not live.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, id: &FileId) -> StorageResult<Option<FileRecord>> {
        let mut catalog = self.catalog.write().await;
        let sequence = match catalog.records.get(id) {
            Some((sequence, _)) => *sequence,
            None => return Ok(None),
        };

        if let Some(dir) = &self.dir {
            let marker = dir.join("retired").join(id.as_str());
            tokio::fs::write(&marker, b"").await.map_err(|e| persistence(&marker, e))?;

            let path = dir.join(format!("{}.json", id));
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(persistence(&path, e)),
            }
        }

        catalog.order.remove(&sequence);
        catalog.retired.insert(id.clone());
        Ok(catalog.records.remove(id).map(|(_, record)| record))
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: &FileId) -> Option<FileRecord> {
        self.catalog
            .read()
            .await
            .records
            .get(id)
            .map(|(_, record)| record.clone())
    }

    /// All records of a submission, in creation order.
    pub async fn list_by_submission(&self, submission_id: &str) -> Vec<FileRecord> {
        self.catalog
            .read()
            .await
            .ordered()
            .filter(|record| record.submission_id() == submission_id)
            .cloned()
            .collect()
    }

    /// All records, in creation order.
    pub async fn all(&self) -> Vec<FileRecord> {
        self.catalog.read().await.ordered().cloned().collect()
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        self.catalog.read().await.records.len()
    }

    /// True when no records are live.
    pub async fn is_empty(&self) -> bool {
        self.catalog.read().await.records.is_empty()
    }

    async fn write_record(&self, persisted: &PersistedRecord) -> StorageResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let json = serde_json::to_vec(persisted).map_err(|e| {
            StorageError::new(StorageErrorKind::Persistence(format!(
                "serialize {}: {}",
                persisted.record.id(),
                e
            )))
        })?;

        // Write to temp file first, then rename for atomicity
        let path = dir.join(format!("{}.json", persisted.record.id()));
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|e| persistence(&temp_path, e))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| persistence(&path, e))?;

        tracing::debug!(path = %path.display(), size = json.len(), "Persisted record");
        Ok(())
    }
}

fn persistence(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::new(StorageErrorKind::Persistence(format!("{}: {}", path.display(), e)))
}
