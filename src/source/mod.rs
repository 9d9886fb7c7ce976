//! Geolocation sources feeding the single-cell entry point.

pub mod replay;
pub mod types;

// Re-export commonly used types
pub use replay::{ReplayConfig, ReplayInput, ReplaySource, SourceError};
pub use types::LocationSample;
