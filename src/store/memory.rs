//! In-memory heartbeat store.

use crate::core::grid::CellId;
use crate::store::clock::{Clock, SystemClock};
use crate::store::{Heartbeat, HeartbeatStore, Scope, StoreError, TimeRange};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

/// Heartbeats held in a lock-guarded vector, stamped by a pluggable clock.
pub struct InMemoryStore {
    heartbeats: RwLock<Vec<Heartbeat>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    /// Create an empty store on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping heartbeats with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            heartbeats: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Insert a heartbeat with an explicit timestamp (seeding and replay).
    pub fn insert_at(&self, cell_id: CellId, timestamp: DateTime<Utc>) {
        let mut heartbeats = self.heartbeats.write().unwrap_or_else(|e| e.into_inner());
        heartbeats.push(Heartbeat { cell_id, timestamp });
    }

    /// Number of stored heartbeats.
    pub fn len(&self) -> usize {
        self.heartbeats.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatStore for InMemoryStore {
    fn append(&self, cell_id: CellId) -> Result<Heartbeat, StoreError> {
        let heartbeat = Heartbeat {
            cell_id,
            timestamp: self.clock.now(),
        };
        let mut heartbeats = self
            .heartbeats
            .write()
            .map_err(|_| StoreError::Unavailable("heartbeat lock poisoned".to_string()))?;
        heartbeats.push(heartbeat.clone());
        Ok(heartbeat)
    }

    fn query_range(&self, scope: Scope, range: TimeRange) -> Result<Vec<Heartbeat>, StoreError> {
        let heartbeats = self
            .heartbeats
            .read()
            .map_err(|_| StoreError::Unavailable("heartbeat lock poisoned".to_string()))?;
        Ok(heartbeats
            .iter()
            .filter(|h| scope.matches(h) && range.contains(h.timestamp))
            .cloned()
            .collect())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
