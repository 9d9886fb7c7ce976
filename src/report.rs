//! Report shapes handed to presentation and reporting collaborators.
//!
//! The classifier only knows [`Status`] and [`Confidence`]. Labels and
//! explanation text are chosen here, solely from the status.

use crate::core::classify::{ClassificationResult, Confidence, Status};
use crate::core::grid::CellId;
use crate::core::neighbors::NeighborPresence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Short label for a status.
pub fn status_label(status: Status) -> &'static str {
    match status {
        Status::Baseline => "Collecting baseline data",
        Status::Silent => "Silent",
        Status::Reduced => "Reduced",
        Status::Normal => "Normal",
    }
}

/// Fixed human-readable explanation for a status.
pub fn explanation(status: Status) -> &'static str {
    match status {
        Status::Baseline => "Gathering enough activity data to assess this area.",
        Status::Silent => "No recent activity detected here. Consider avoiding or staying alert.",
        Status::Reduced => "Activity has dropped compared to recent patterns. Stay cautious.",
        Status::Normal => "Activity levels are consistent with recent patterns.",
    }
}

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Low => "Low",
        Confidence::Medium => "Medium",
        Confidence::High => "High",
    }
}

/// Result of a single-cell pass for one observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellReport {
    /// Observing session, absent for plain cell inspection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub cell_id: CellId,
    pub status: Status,
    pub confidence: Confidence,
    pub status_label: String,
    pub explanation: String,
    pub recent_count: u64,
    pub baseline_count: u64,
    /// Presence of the four orthogonal neighbours
    pub neighbors: Vec<NeighborPresence>,
    pub updated_at: DateTime<Utc>,
}

impl CellReport {
    pub fn new(
        session_id: Option<Uuid>,
        result: &ClassificationResult,
        neighbors: Vec<NeighborPresence>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            cell_id: result.cell_id,
            status: result.status,
            confidence: result.confidence,
            status_label: status_label(result.status).to_string(),
            explanation: explanation(result.status).to_string(),
            recent_count: result.recent_count,
            baseline_count: result.baseline_count,
            neighbors,
            updated_at,
        }
    }

    /// One-line status headline, e.g. `Grid grid_123_567 - Silent`.
    pub fn headline(&self) -> String {
        format!("Grid {} - {}", self.cell_id, self.status_label)
    }

    /// Update time and confidence rendered in `tz`.
    pub fn meta_line(&self, tz: chrono_tz::Tz) -> String {
        format!(
            "Last updated: {} | Confidence: {}",
            self.updated_at.with_timezone(&tz).format("%H:%M:%S"),
            confidence_label(self.confidence)
        )
    }

    /// Multi-line text rendering for terminals.
    pub fn render(&self, tz: chrono_tz::Tz) -> String {
        let mut out = format!(
            "{}\n{}\n{}\nNearby:",
            self.headline(),
            self.explanation,
            self.meta_line(tz)
        );
        for neighbor in &self.neighbors {
            let label = if neighbor.present { "Active" } else { "No data" };
            out.push_str(&format!(
                "\n  {} ({}) -> {}",
                neighbor.cell_id, neighbor.direction, label
            ));
        }
        out
    }
}

/// Per-cell entry of a batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub status: Status,
    pub recent_count: u64,
    pub baseline_count: u64,
}

impl From<&ClassificationResult> for BatchEntry {
    fn from(result: &ClassificationResult) -> Self {
        Self {
            status: result.status,
            recent_count: result.recent_count,
            baseline_count: result.baseline_count,
        }
    }
}

/// Output of one batch-all pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Single instant for the whole pass
    pub updated_at: DateTime<Utc>,
    pub grids: BTreeMap<CellId, BatchEntry>,
}

impl BatchReport {
    /// Number of cells per status.
    pub fn status_counts(&self) -> BTreeMap<Status, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.grids.values() {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        counts
    }

    /// Cells currently classified as silent.
    pub fn silent_cells(&self) -> Vec<CellId> {
        self.grids
            .iter()
            .filter(|(_, e)| e.status == Status::Silent)
            .map(|(cell, _)| *cell)
            .collect()
    }
}
