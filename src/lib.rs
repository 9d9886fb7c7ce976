//! signalvoid - anonymous heartbeat density engine.
//!
//! Observers send anonymous heartbeats tagged only with a coarse map cell.
//! The engine compares each cell's recent heartbeat density with its own
//! baseline and flags cells whose activity has dropped or gone silent, a
//! proxy signal for outages and anomalies in a physical area.
//!
//! # Privacy Guarantees
//!
//! - **No coordinates stored**: positions are bucketed into 0.1° cells on arrival
//! - **No identity**: heartbeats carry a cell id and a store timestamp, nothing else
//! - **Transparency**: all engine activity is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          signalvoid                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐            │
//! │  │  Location  │──▶│  GridIndex │──▶│ Heartbeat  │            │
//! │  │   Source   │   │  (0.1°)    │   │   Store    │            │
//! │  └────────────┘   └────────────┘   └─────┬──────┘            │
//! │                                          ▼                   │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐            │
//! │  │  Reports   │◀──│ Classifier │◀──│ Aggregator │            │
//! │  │ cell/batch │   │            │   │ recent/base│            │
//! │  └────────────┘   └────────────┘   └────────────┘            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use signalvoid::{Engine, InMemoryStore, LocationSample, ObserverSession, Policy, Status};
//!
//! let engine = Engine::new(InMemoryStore::new(), Policy::realtime(), Policy::batch()).unwrap();
//! let mut session = ObserverSession::new();
//!
//! let report = engine
//!     .observe(&mut session, &LocationSample::new(12.34, 56.78))
//!     .unwrap();
//! assert_eq!(report.cell_id.to_string(), "grid_123_567");
//! assert_eq!(report.status, Status::Baseline);
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod report;
pub mod source;
pub mod store;
pub mod transparency;

#[cfg(feature = "gateway")]
pub mod gateway;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use crate::core::{
    cell_of, classify, neighbors_of, CellId, ClassificationResult, Confidence, Direction,
    EngineError, Policy, Preset, Status, Thresholds, WindowCounts,
};
pub use engine::{Engine, ObserverSession};
pub use report::{BatchReport, CellReport};
pub use source::{LocationSample, ReplaySource};
pub use store::{HeartbeatStore, InMemoryStore, JsonlStore, StoreError};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

#[cfg(feature = "gateway")]
pub use gateway::{BlockingGatewayClient, GatewayClient, GatewayConfig, GatewayError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 SIGNALVOID - PRIVACY DECLARATION                 ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tool shares anonymous presence signals for your area.      ║
║                                                                  ║
║  ✓ WHAT WE RECORD:                                               ║
║    • Which 0.1° map cell you are in (roughly 11 km across)       ║
║    • When the heartbeat reached the store                        ║
║                                                                  ║
║  ✗ WHAT WE NEVER RECORD:                                         ║
║    • Your exact coordinates                                      ║
║    • Who you are, or any device identifier                       ║
║    • Your movement path between cells                            ║
║                                                                  ║
║  Coordinates are bucketed the moment they arrive and then        ║
║  discarded.                                                      ║
║                                                                  ║
║  You can view engine statistics anytime with:                    ║
║    signalvoid status                                             ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER RECORD"));
        assert!(PRIVACY_DECLARATION.contains("exact coordinates"));
    }
}
