//! Time sources for heartbeat stores.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Something that can tell the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used for deterministic replays and tests.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
