//! Entry points of the classification engine.
//!
//! - **Single-cell mode** runs for every fresh location sample of an observer:
//!   bucket, append a heartbeat, classify the cell, probe its neighbours.
//! - **Batch-all mode** runs on a timer: classify every cell with baseline
//!   activity in one pass.
//!
//! The engine owns no threads and takes no locks. Both modes may run
//! concurrently against the same store.

use crate::core::{
    cell_of, classify, counts_for, counts_for_all, neighbor_summary, CellId, EngineResult, Policy,
};
use crate::report::{BatchEntry, BatchReport, CellReport};
use crate::source::LocationSample;
use crate::store::HeartbeatStore;
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// State of one observing session.
#[derive(Debug, Clone)]
pub struct ObserverSession {
    id: Uuid,
    current_cell: Option<CellId>,
    last_sample_at: Option<DateTime<Utc>>,
    samples: u64,
}

impl ObserverSession {
    /// Start an anonymous session with a fresh random id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            current_cell: None,
            last_sample_at: None,
            samples: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cell of the most recent sample, if any.
    pub fn current_cell(&self) -> Option<CellId> {
        self.current_cell
    }

    pub fn last_sample_at(&self) -> Option<DateTime<Utc>> {
        self.last_sample_at
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Move the session into `cell`. Returns true when the cell changed.
    fn enter(&mut self, cell: CellId, at: DateTime<Utc>) -> bool {
        let changed = self.current_cell != Some(cell);
        self.current_cell = Some(cell);
        self.last_sample_at = Some(at);
        self.samples += 1;
        changed
    }
}

impl Default for ObserverSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Classification engine bound to one heartbeat store.
pub struct Engine<S> {
    store: S,
    realtime: Policy,
    batch: Policy,
    log: Option<SharedTransparencyLog>,
}

impl<S: HeartbeatStore> Engine<S> {
    /// Create an engine, validating both policies up front.
    pub fn new(store: S, realtime: Policy, batch: Policy) -> EngineResult<Self> {
        realtime.validate()?;
        batch.validate()?;
        Ok(Self {
            store,
            realtime,
            batch,
            log: None,
        })
    }

    /// Record activity counters into `log`.
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn realtime_policy(&self) -> &Policy {
        &self.realtime
    }

    pub fn batch_policy(&self) -> &Policy {
        &self.batch
    }

    /// Single-cell mode for one fresh location sample.
    ///
    /// A failed append is logged and counted but does not prevent
    /// classification of the heartbeats already stored.
    pub fn observe(
        &self,
        session: &mut ObserverSession,
        sample: &LocationSample,
    ) -> EngineResult<CellReport> {
        let cell = cell_of(sample.lat, sample.lng)?;
        if let Some(log) = &self.log {
            log.record_sample();
        }
        if session.enter(cell, sample.observed_at) {
            tracing::info!(session = %session.id(), cell = %cell, "Observer entered cell");
        }

        let now = match self.store.append(cell) {
            Ok(heartbeat) => {
                if let Some(log) = &self.log {
                    log.record_heartbeat_sent();
                }
                // Just past the fresh heartbeat so it falls inside `[.., now)`.
                self.store
                    .now()
                    .max(heartbeat.timestamp + Duration::milliseconds(1))
            }
            Err(e) => {
                tracing::warn!(cell = %cell, "Heartbeat append failed: {e}");
                if let Some(log) = &self.log {
                    log.record_append_failure();
                }
                self.store.now()
            }
        };

        self.classify_cell(Some(session.id()), cell, now)
    }

    /// Classify a cell and probe its neighbours without appending anything.
    pub fn inspect(&self, cell_id: CellId) -> EngineResult<CellReport> {
        self.classify_cell(None, cell_id, self.store.now())
    }

    fn classify_cell(
        &self,
        session_id: Option<Uuid>,
        cell_id: CellId,
        now: DateTime<Utc>,
    ) -> EngineResult<CellReport> {
        let counts = counts_for(&self.store, cell_id, now, self.realtime.windows())?;
        let result = classify(&counts, &self.realtime.thresholds)?;
        let neighbors = neighbor_summary(&self.store, cell_id, now)?;

        if let Some(log) = &self.log {
            log.record_cells_classified(1);
        }
        tracing::debug!(
            cell = %cell_id,
            status = %result.status,
            confidence = %result.confidence,
            "Classified cell"
        );

        Ok(CellReport::new(session_id, &result, neighbors, now))
    }

    /// Batch-all mode: classify every cell with activity in the baseline window.
    pub fn run_batch(&self) -> EngineResult<BatchReport> {
        self.run_batch_at(self.store.now())
    }

    /// Batch-all mode at an explicit reference instant.
    pub fn run_batch_at(&self, now: DateTime<Utc>) -> EngineResult<BatchReport> {
        let counts = counts_for_all(&self.store, now, self.batch.windows())?;

        let mut grids = std::collections::BTreeMap::new();
        for (cell, cell_counts) in &counts {
            let result = classify(cell_counts, &self.batch.thresholds)?;
            grids.insert(*cell, BatchEntry::from(&result));
        }

        if let Some(log) = &self.log {
            log.record_cells_classified(grids.len() as u64);
            log.record_batch_pass();
        }
        tracing::info!(cells = grids.len(), "Batch classification pass complete");

        Ok(BatchReport {
            updated_at: now,
            grids,
        })
    }
}
