//! Windowed heartbeat counts per cell.
//!
//! Each pass issues a single range query bounded by the baseline window and
//! splits the result in memory at the recent-window cutoff. Because the recent
//! count is a subset test over the same fetched set it can never exceed the
//! baseline count.

use crate::core::error::{EngineError, EngineResult};
use crate::core::grid::CellId;
use crate::store::{Heartbeat, HeartbeatStore, Scope, TimeRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The two lookback lengths used by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    /// Shorter, most current interval (numerator)
    pub recent: Duration,
    /// Longer interval used as the denominator
    pub baseline: Duration,
}

impl Windows {
    pub fn new(recent: Duration, baseline: Duration) -> Self {
        Self { recent, baseline }
    }

    /// Reject a recent window that would not nest inside the baseline window.
    pub fn validate(&self) -> EngineResult<()> {
        if self.recent > self.baseline {
            return Err(EngineError::InvalidInput(format!(
                "recent window ({}s) is longer than baseline window ({}s)",
                self.recent.as_secs(),
                self.baseline.as_secs()
            )));
        }
        Ok(())
    }

    /// Start instants of the baseline and recent windows ending at `now`.
    fn cutoffs(&self, now: DateTime<Utc>) -> EngineResult<(DateTime<Utc>, DateTime<Utc>)> {
        self.validate()?;
        let baseline_start = now - to_chrono(self.baseline)?;
        let recent_start = now - to_chrono(self.recent)?;
        Ok((baseline_start, recent_start))
    }
}

fn to_chrono(duration: Duration) -> EngineResult<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| EngineError::InvalidInput(format!("window too long: {e}")))
}

/// Heartbeat counts for one cell at one instant. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounts {
    pub cell_id: CellId,
    pub recent_count: u64,
    pub baseline_count: u64,
}

impl WindowCounts {
    /// Build counts, rejecting a recent count above the baseline count.
    pub fn new(cell_id: CellId, recent_count: u64, baseline_count: u64) -> EngineResult<Self> {
        if recent_count > baseline_count {
            return Err(EngineError::InvalidInput(format!(
                "recent count {recent_count} exceeds baseline count {baseline_count}"
            )));
        }
        Ok(Self {
            cell_id,
            recent_count,
            baseline_count,
        })
    }

    /// Build counts from externally supplied signed values.
    pub fn from_signed(cell_id: CellId, recent_count: i64, baseline_count: i64) -> EngineResult<Self> {
        let recent = u64::try_from(recent_count).map_err(|_| {
            EngineError::InvalidInput(format!("negative recent count: {recent_count}"))
        })?;
        let baseline = u64::try_from(baseline_count).map_err(|_| {
            EngineError::InvalidInput(format!("negative baseline count: {baseline_count}"))
        })?;
        Self::new(cell_id, recent, baseline)
    }

    fn empty(cell_id: CellId) -> Self {
        Self {
            cell_id,
            recent_count: 0,
            baseline_count: 0,
        }
    }

    fn record(&mut self, heartbeat: &Heartbeat, recent_start: DateTime<Utc>) {
        self.baseline_count += 1;
        if heartbeat.timestamp >= recent_start {
            self.recent_count += 1;
        }
    }
}

/// Counts for a single cell over `[now - baseline, now)`.
pub fn counts_for<S: HeartbeatStore + ?Sized>(
    store: &S,
    cell_id: CellId,
    now: DateTime<Utc>,
    windows: Windows,
) -> EngineResult<WindowCounts> {
    let (baseline_start, recent_start) = windows.cutoffs(now)?;
    let heartbeats = store.query_range(Scope::Cell(cell_id), TimeRange::new(baseline_start, now))?;

    let mut counts = WindowCounts::empty(cell_id);
    for heartbeat in heartbeats.iter().filter(|h| h.cell_id == cell_id) {
        counts.record(heartbeat, recent_start);
    }

    tracing::debug!(
        cell = %cell_id,
        recent = counts.recent_count,
        baseline = counts.baseline_count,
        "Computed window counts"
    );

    Ok(counts)
}

/// Counts for every cell observed in the baseline window.
///
/// Cells without any baseline heartbeat are absent from the map; an empty
/// store yields an empty map.
pub fn counts_for_all<S: HeartbeatStore + ?Sized>(
    store: &S,
    now: DateTime<Utc>,
    windows: Windows,
) -> EngineResult<BTreeMap<CellId, WindowCounts>> {
    let (baseline_start, recent_start) = windows.cutoffs(now)?;
    let heartbeats = store.query_range(Scope::All, TimeRange::new(baseline_start, now))?;

    let mut by_cell: BTreeMap<CellId, WindowCounts> = BTreeMap::new();
    for heartbeat in &heartbeats {
        by_cell
            .entry(heartbeat.cell_id)
            .or_insert_with(|| WindowCounts::empty(heartbeat.cell_id))
            .record(heartbeat, recent_start);
    }

    tracing::debug!(
        heartbeats = heartbeats.len(),
        cells = by_cell.len(),
        "Grouped baseline window by cell"
    );

    Ok(by_cell)
}
