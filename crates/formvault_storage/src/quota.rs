//! Aggregate quota accounting and eviction planning for the embedded backend.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use formvault_core::{FileId, FileRecord};
use formvault_error::{StorageError, StorageErrorKind, StorageResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Snapshot of embedded usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Bytes currently held inline
    pub used_bytes: u64,
    /// Configured ceiling
    pub quota_bytes: u64,
    /// `used_bytes / quota_bytes * 100`, rounded to two decimals
    pub used_percent: f64,
}

/// Records selected for eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionPlan {
    /// Records created before this instant are selected
    pub horizon: DateTime<Utc>,
    /// Selected record ids with their embedded byte counts, oldest first
    pub candidates: Vec<(FileId, u64)>,
}

impl EvictionPlan {
    /// Total bytes the plan would reclaim.
    pub fn total_bytes(&self) -> u64 {
        self.candidates.iter().map(|(_, bytes)| bytes).sum()
    }
}

/// Result of an explicit cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Records deleted
    pub count: usize,
    /// Embedded bytes released
    pub bytes_reclaimed: u64,
    /// Records selected but kept because removal failed
    pub failed: usize,
}

/// Single serialized gate over the embedded byte counter.
///
/// Every change to the counter goes through this type. Admission is
/// check-and-set under one lock, so a rejected write never moves the counter.
#[derive(Debug)]
pub struct QuotaManager {
    quota_bytes: u64,
    used: Mutex<u64>,
}

impl QuotaManager {
    /// Create a manager with the given ceiling and an empty counter.
    pub fn new(quota_bytes: u64) -> Self {
        tracing::debug!(quota_bytes, "Creating quota manager");
        Self {
            quota_bytes,
            used: Mutex::new(0),
        }
    }

    /// Configured ceiling.
    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Admit a write that replaces `previous` bytes with `incoming` bytes.
    ///
    /// Returns the new total on success.
    ///
    /// # Errors
    ///
    /// `QuotaExceeded` if the prospective total would pass the ceiling. The
    /// counter is left unchanged.
    pub async fn try_admit(&self, previous: u64, incoming: u64) -> StorageResult<u64> {
        let mut used = self.used.lock().await;
        let prospective = used.saturating_sub(previous).saturating_add(incoming);

        if prospective > self.quota_bytes {
            tracing::warn!(
                requested = incoming,
                used = *used,
                quota = self.quota_bytes,
                "Quota exceeded, rejecting write"
            );
            return Err(StorageError::new(StorageErrorKind::QuotaExceeded {
                requested: incoming,
                used: *used,
                quota: self.quota_bytes,
            }));
        }

        *used = prospective;
        Ok(prospective)
    }

    /// Give back `bytes` after a payload is removed.
    pub async fn release(&self, bytes: u64) {
        let mut used = self.used.lock().await;
        if bytes > *used {
            tracing::warn!(bytes, used = *used, "Releasing more than accounted, clamping");
        }
        *used = used.saturating_sub(bytes);
    }

    /// Account for payloads reloaded from persisted state.
    ///
    /// Bypasses the ceiling: data already on disk is never refused.
    pub async fn restore(&self, bytes: u64) {
        let mut used = self.used.lock().await;
        *used = used.saturating_add(bytes);
    }

    /// Bytes currently accounted.
    pub async fn used_bytes(&self) -> u64 {
        *self.used.lock().await
    }

    /// Current usage snapshot.
    pub async fn usage(&self) -> QuotaUsage {
        let used_bytes = self.used_bytes().await;
        let used_percent = if self.quota_bytes == 0 {
            0.0
        } else {
            ((used_bytes as f64 / self.quota_bytes as f64) * 10_000.0).round() / 100.0
        };
        QuotaUsage {
            used_bytes,
            quota_bytes: self.quota_bytes,
            used_percent,
        }
    }

    /// Select embedded records created more than `older_than_days` days before `now`.
    ///
    /// Remote records hold no quota and are never selected.
    pub fn plan_eviction<'a>(
        &self,
        records: impl IntoIterator<Item = &'a FileRecord>,
        older_than_days: u32,
        now: DateTime<Utc>,
    ) -> EvictionPlan {
        let horizon = now - ChronoDuration::days(i64::from(older_than_days));

        let mut selected: Vec<&FileRecord> = records
            .into_iter()
            .filter(|record| record.payload_location().is_embedded())
            .filter(|record| *record.created_at() < horizon)
            .collect();
        selected.sort_by_key(|record| *record.created_at());

        let candidates = selected
            .into_iter()
            .map(|record| (record.id().clone(), record.embedded_bytes()))
            .collect();

        EvictionPlan {
            horizon,
            candidates,
        }
    }
}
