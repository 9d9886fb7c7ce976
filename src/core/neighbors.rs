//! Coarse liveness probe of the cells around an observer.

use crate::core::error::EngineResult;
use crate::core::grid::{CellId, Direction};
use crate::store::{HeartbeatStore, Scope, TimeRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a neighbouring cell has ever seen a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborPresence {
    pub cell_id: CellId,
    pub direction: Direction,
    pub present: bool,
}

/// Probe each orthogonal neighbour of `cell_id` for any heartbeat before `now`.
///
/// This is an existence check, not a classification: no windows, ratios or
/// confidence are involved.
pub fn neighbor_summary<S: HeartbeatStore + ?Sized>(
    store: &S,
    cell_id: CellId,
    now: DateTime<Utc>,
) -> EngineResult<Vec<NeighborPresence>> {
    cell_id
        .neighbors()
        .into_iter()
        .map(|(direction, neighbor)| -> EngineResult<NeighborPresence> {
            let hits = store.query_range(Scope::Cell(neighbor), TimeRange::until(now))?;
            Ok(NeighborPresence {
                cell_id: neighbor,
                direction,
                present: !hits.is_empty(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::Duration;

    #[test]
    fn test_presence_is_unwindowed() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let origin = CellId::new(100, 200);

        // A heartbeat from a year ago still counts as presence.
        store.insert_at(origin.neighbor(Direction::East), now - Duration::days(365));
        store.insert_at(origin.neighbor(Direction::South), now - Duration::seconds(1));
        // Not before `now`, so ignored.
        store.insert_at(origin.neighbor(Direction::North), now);
        // The origin itself is never probed.
        store.insert_at(origin, now - Duration::seconds(1));

        let summary = neighbor_summary(&store, origin, now).unwrap();
        assert_eq!(summary.len(), 4);

        let present: Vec<(Direction, bool)> =
            summary.iter().map(|n| (n.direction, n.present)).collect();
        assert_eq!(
            present,
            vec![
                (Direction::East, true),
                (Direction::North, false),
                (Direction::West, false),
                (Direction::South, true),
            ]
        );
        assert!(summary.iter().all(|n| n.cell_id != origin));
    }
}
