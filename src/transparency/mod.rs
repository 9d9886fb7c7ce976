//! Engine activity counters.
//!
//! Shown by `signalvoid status` and served at `GET /stats`.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
