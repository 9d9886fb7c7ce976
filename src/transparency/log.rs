//! Activity counters for the heartbeat engine.
//!
//! Counts how many location samples were bucketed, how many heartbeats the
//! store accepted or refused, and how much classification work followed. The
//! counters are cumulative across CLI runs when a persistence path is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters of engine activity.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Location samples received from the geolocation source
    samples_received: AtomicU64,
    /// Heartbeats durably appended
    heartbeats_sent: AtomicU64,
    /// Appends the store rejected
    append_failures: AtomicU64,
    /// Cells classified (single-cell and batch)
    cells_classified: AtomicU64,
    /// Batch passes completed
    batch_passes: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            samples_received: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
            append_failures: AtomicU64::new(0),
            cells_classified: AtomicU64::new(0),
            batch_passes: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log that loads and saves cumulative counters.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_sample(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat_sent(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_append_failure(&self) {
        self.append_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cells_classified(&self, count: u64) {
        self.cells_classified.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_batch_pass(&self) {
        self.batch_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
            cells_classified: self.cells_classified.load(Ordering::Relaxed),
            batch_passes: self.batch_passes.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Heartbeat Activity:\n\
             - Location samples bucketed: {}\n\
             - Heartbeats stored: {}\n\
             - Heartbeats refused by the store: {}\n\
             - Cell classifications: {}\n\
             - Batch passes: {}\n\
             - Running for {} seconds\n\
             \n\
             Each heartbeat holds a cell id and the store's timestamp.",
            stats.samples_received,
            stats.heartbeats_sent,
            stats.append_failures,
            stats.cells_classified,
            stats.batch_passes,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                samples_received: stats.samples_received,
                heartbeats_sent: stats.heartbeats_sent,
                append_failures: stats.append_failures,
                cells_classified: stats.cells_classified,
                batch_passes: stats.batch_passes,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_received
                    .store(persisted.samples_received, Ordering::Relaxed);
                self.heartbeats_sent
                    .store(persisted.heartbeats_sent, Ordering::Relaxed);
                self.append_failures
                    .store(persisted.append_failures, Ordering::Relaxed);
                self.cells_classified
                    .store(persisted.cells_classified, Ordering::Relaxed);
                self.batch_passes
                    .store(persisted.batch_passes, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.samples_received.store(0, Ordering::Relaxed);
        self.heartbeats_sent.store(0, Ordering::Relaxed);
        self.append_failures.store(0, Ordering::Relaxed);
        self.cells_classified.store(0, Ordering::Relaxed);
        self.batch_passes.store(0, Ordering::Relaxed);
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub samples_received: u64,
    pub heartbeats_sent: u64,
    pub append_failures: u64,
    pub cells_classified: u64,
    pub batch_passes: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_received: u64,
    heartbeats_sent: u64,
    append_failures: u64,
    cells_classified: u64,
    batch_passes: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparency_log_counting() {
        let log = TransparencyLog::new();

        log.record_sample();
        log.record_sample();
        log.record_heartbeat_sent();
        log.record_cells_classified(4);

        let stats = log.stats();
        assert_eq!(stats.samples_received, 2);
        assert_eq!(stats.heartbeats_sent, 1);
        assert_eq!(stats.cells_classified, 4);
        assert_eq!(stats.append_failures, 0);
    }

    #[test]
    fn test_transparency_log_reset() {
        let log = TransparencyLog::new();

        log.record_cells_classified(100);
        log.record_batch_pass();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.cells_classified, 0);
        assert_eq!(stats.batch_passes, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("signalvoid-transparency-{}", uuid::Uuid::new_v4()))
            .join("transparency.json");

        let log = TransparencyLog::with_persistence(path.clone());
        log.record_heartbeat_sent();
        log.record_batch_pass();
        log.save().unwrap();

        let reloaded = TransparencyLog::with_persistence(path);
        let stats = reloaded.stats();
        assert_eq!(stats.heartbeats_sent, 1);
        assert_eq!(stats.batch_passes, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = TransparencyLog::new().summary();

        assert!(summary.contains("Heartbeats stored: 0"));
        assert!(summary.contains("Heartbeats refused by the store: 0"));
        assert!(summary.contains("cell id"));
    }

    #[test]
    fn test_reset_clears_persisted_counters() {
        let path = std::env::temp_dir()
            .join(format!("signalvoid-transparency-{}", uuid::Uuid::new_v4()))
            .join("transparency.json");

        let log = TransparencyLog::with_persistence(path.clone());
        log.record_append_failure();
        log.record_cells_classified(7);
        log.save().unwrap();

        let reopened = TransparencyLog::with_persistence(path.clone());
        assert_eq!(reopened.stats().cells_classified, 7);
        reopened.reset();
        reopened.save().unwrap();

        let stats = TransparencyLog::with_persistence(path.clone()).stats();
        assert_eq!(stats.cells_classified, 0);
        assert_eq!(stats.append_failures, 0);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
