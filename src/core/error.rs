//! Error types shared by the classification engine.

use crate::store::StoreError;

/// Errors surfaced by the grid, aggregator, classifier and entry points.
///
/// None of these are retried internally. An area with too little history is
/// reported through [`crate::core::Status::Baseline`], never through an error.
#[derive(Debug)]
pub enum EngineError {
    /// A cell identifier could not be split into two integer axis components.
    MalformedCellId(String),
    /// Counts, coordinates or window lengths that cannot be classified.
    InvalidInput(String),
    /// Propagated unchanged from the heartbeat store.
    Store(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MalformedCellId(id) => write!(f, "Malformed cell id: {id:?}"),
            EngineError::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            EngineError::Store(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}

/// Convenience alias used throughout the core.
pub type EngineResult<T> = Result<T, EngineError>;
