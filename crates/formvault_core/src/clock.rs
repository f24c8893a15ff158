//! Time source abstraction.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Record creation times and eviction horizons are read through this trait so
/// embedding applications and tests can supply their own clock.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
