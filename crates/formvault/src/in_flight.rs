//! Per-record exclusion for operations that move or remove payloads.

use formvault_core::FileId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of record ids currently owned by a migration, delete or cleanup.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: Mutex<HashSet<FileId>>,
}

impl InFlight {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or return `None` if another operation holds it.
    pub fn try_acquire(self: &Arc<Self>, id: &FileId) -> Option<InFlightGuard> {
        if !self.lock().insert(id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            owner: Arc::clone(self),
            id: id.clone(),
        })
    }

    /// True if some operation currently holds `id`.
    pub fn contains(&self, id: &FileId) -> bool {
        self.lock().contains(id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<FileId>> {
        // The set stays consistent even if a holder panicked
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the claimed id when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    owner: Arc<InFlight>,
    id: FileId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.id);
    }
}
