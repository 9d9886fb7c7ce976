//! Heartbeat storage for the signalvoid engine.
//!
//! The engine only ever talks to a [`HeartbeatStore`]. Two implementations
//! ship with the crate: an in-memory store for tests and the HTTP server, and
//! an append-only JSON-lines file used by the CLI.

pub mod clock;
pub mod jsonl;
pub mod memory;

use crate::core::grid::CellId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use jsonl::JsonlStore;
pub use memory::InMemoryStore;

/// One anonymous occurrence of an observer inside a cell.
///
/// Heartbeats are never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Cell the observer was in
    pub cell_id: CellId,
    /// Assigned by the store at write time
    pub timestamp: DateTime<Utc>,
}

/// Which cells a range query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Cell(CellId),
    All,
}

impl Scope {
    /// Whether a heartbeat belongs to this scope.
    pub fn matches(&self, heartbeat: &Heartbeat) -> bool {
        match self {
            Scope::Cell(cell) => heartbeat.cell_id == *cell,
            Scope::All => true,
        }
    }
}

/// Half-open time range `[from, to)`. A missing `from` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to,
        }
    }

    /// Everything strictly before `to`.
    pub fn until(to: DateTime<Utc>) -> Self {
        Self { from: None, to }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| timestamp >= from) && timestamp < self.to
    }
}

/// Errors reported by a store. The engine never retries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or read
    Unavailable(String),
    /// The store did not answer within the caller's deadline
    Timeout(Duration),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
            StoreError::Timeout(after) => {
                write!(f, "Store timed out after {}ms", after.as_millis())
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Append-only, queryable time series of heartbeats.
///
/// Implementations synchronise internally; callers may share one store
/// between concurrent single-cell and batch passes.
pub trait HeartbeatStore: Send + Sync {
    /// Record one heartbeat for `cell_id`, stamped with the store's clock.
    fn append(&self, cell_id: CellId) -> Result<Heartbeat, StoreError>;

    /// All heartbeats in `scope` whose timestamp lies in `range`.
    ///
    /// No ordering of the returned sequence is promised.
    fn query_range(&self, scope: Scope, range: TimeRange) -> Result<Vec<Heartbeat>, StoreError>;

    /// The store's notion of the current instant.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: HeartbeatStore + ?Sized> HeartbeatStore for std::sync::Arc<T> {
    fn append(&self, cell_id: CellId) -> Result<Heartbeat, StoreError> {
        (**self).append(cell_id)
    }

    fn query_range(&self, scope: Scope, range: TimeRange) -> Result<Vec<Heartbeat>, StoreError> {
        (**self).query_range(scope, range)
    }

    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
