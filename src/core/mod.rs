//! Core functionality of the signalvoid engine.
//!
//! This module contains:
//! - Grid bucketing of coordinates into cells
//! - Windowed heartbeat counts per cell
//! - Status and confidence classification
//! - Neighbour presence probing
//! - Named threshold policies

pub mod aggregate;
pub mod classify;
pub mod error;
pub mod grid;
pub mod neighbors;
pub mod policy;

// Re-export commonly used types
pub use aggregate::{counts_for, counts_for_all, WindowCounts, Windows};
pub use classify::{classify, confidence_for, ClassificationResult, Confidence, Status, Thresholds};
pub use error::{EngineError, EngineResult};
pub use grid::{
    cell_of, neighbors_of, CellId, Direction, CELL_SCALE, MAX_LAT_INDEX, MAX_LNG_INDEX,
};
pub use neighbors::{neighbor_summary, NeighborPresence};
pub use policy::{Policy, Preset};
