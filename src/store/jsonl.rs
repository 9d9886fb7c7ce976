//! Append-only JSON-lines heartbeat store.
//!
//! One heartbeat per line. Lines that fail to parse are skipped with a warning
//! so a torn final write never poisons the whole history.

use crate::core::grid::CellId;
use crate::store::clock::{Clock, SystemClock};
use crate::store::{Heartbeat, HeartbeatStore, Scope, StoreError, TimeRange};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Heartbeats persisted to a single file on disk.
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl JsonlStore {
    /// Open (or lazily create) a store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, heartbeat: &Heartbeat) -> Result<(), StoreError> {
        let line =
            serde_json::to_string(heartbeat).map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(&self.path, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| unavailable(&self.path, e))?;
        writeln!(file, "{line}").map_err(|e| unavailable(&self.path, e))?;
        Ok(())
    }

    /// Insert a heartbeat with an explicit timestamp.
    pub fn insert_at(&self, cell_id: CellId, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
        self.write_line(&Heartbeat { cell_id, timestamp })
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {e}", path.display()))
}

impl HeartbeatStore for JsonlStore {
    fn append(&self, cell_id: CellId) -> Result<Heartbeat, StoreError> {
        let heartbeat = Heartbeat {
            cell_id,
            timestamp: self.clock.now(),
        };
        self.write_line(&heartbeat)?;
        Ok(heartbeat)
    }

    fn query_range(&self, scope: Scope, range: TimeRange) -> Result<Vec<Heartbeat>, StoreError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            // Nothing written yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(&self.path, e)),
        };

        let mut matched = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| unavailable(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Heartbeat>(&line) {
                Ok(heartbeat) if scope.matches(&heartbeat) && range.contains(heartbeat.timestamp) => {
                    matched.push(heartbeat)
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable heartbeat at {}:{}: {}",
                        self.path.display(),
                        index + 1,
                        e
                    );
                }
            }
        }

        Ok(matched)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
