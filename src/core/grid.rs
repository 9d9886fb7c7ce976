//! Grid bucketing of coordinates into fixed 0.1° cells.
//!
//! Each coordinate is scaled by [`CELL_SCALE`] and truncated toward zero, so
//! every observer computes the same cell for the same position without any
//! coordination. Only the resulting cell id ever leaves the device.

use crate::core::error::{EngineError, EngineResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Cells per degree on each axis (0.1° resolution).
pub const CELL_SCALE: f64 = 10.0;

/// Largest latitude index `cell_of` can produce.
pub const MAX_LAT_INDEX: i64 = 900;

/// Largest longitude index `cell_of` can produce.
pub const MAX_LNG_INDEX: i64 = 1800;

/// Prefix of the textual cell identifier.
const CELL_PREFIX: &str = "grid";

/// A discrete spatial bucket, identified by its two scaled axis indices.
///
/// The textual form is `grid_<lat>_<lng>`, e.g. `grid_123_567`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    pub lat_index: i64,
    pub lng_index: i64,
}

/// Direction of an orthogonal neighbour relative to its origin cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    East,
    North,
    West,
    South,
}

impl Direction {
    /// All directions in the fixed neighbour order.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::West,
        Direction::South,
    ];

    /// Axis offsets `(lat, lng)` for this direction.
    fn offset(self) -> (i64, i64) {
        match self {
            Direction::East => (0, 1),
            Direction::North => (1, 0),
            Direction::West => (0, -1),
            Direction::South => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::East => "east",
            Direction::North => "north",
            Direction::West => "west",
            Direction::South => "south",
        };
        f.write_str(name)
    }
}

impl CellId {
    pub fn new(lat_index: i64, lng_index: i64) -> Self {
        Self {
            lat_index,
            lng_index,
        }
    }

    /// The cell adjacent to this one in `direction`.
    pub fn neighbor(&self, direction: Direction) -> CellId {
        let (dlat, dlng) = direction.offset();
        CellId::new(
            self.lat_index.saturating_add(dlat),
            self.lng_index.saturating_add(dlng),
        )
    }

    /// The four orthogonal neighbours, in east, north, west, south order.
    pub fn neighbors(&self) -> [(Direction, CellId); 4] {
        Direction::ALL.map(|d| (d, self.neighbor(d)))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CELL_PREFIX}_{}_{}", self.lat_index, self.lng_index)
    }
}

impl FromStr for CellId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || EngineError::MalformedCellId(s.to_string());

        let mut parts = s.split('_');
        if parts.next() != Some(CELL_PREFIX) {
            return Err(malformed());
        }
        let lat_index = parts
            .next()
            .and_then(|p| p.parse::<i64>().ok())
            .ok_or_else(malformed)?;
        let lng_index = parts
            .next()
            .and_then(|p| p.parse::<i64>().ok())
            .ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }
        // Neighbours of edge cells stay parseable.
        if lat_index.unsigned_abs() > MAX_LAT_INDEX.unsigned_abs() + 1
            || lng_index.unsigned_abs() > MAX_LNG_INDEX.unsigned_abs() + 1
        {
            return Err(malformed());
        }

        Ok(CellId::new(lat_index, lng_index))
    }
}

impl Serialize for CellId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Map a coordinate to its cell.
///
/// Truncation toward zero is the tie-break; values are never rounded to the
/// nearest boundary.
pub fn cell_of(lat: f64, lng: f64) -> EngineResult<CellId> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(EngineError::InvalidInput(format!(
            "latitude out of range: {lat}"
        )));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(EngineError::InvalidInput(format!(
            "longitude out of range: {lng}"
        )));
    }

    Ok(CellId::new(axis_index(lat), axis_index(lng)))
}

fn axis_index(value: f64) -> i64 {
    (value * CELL_SCALE).trunc() as i64
}

/// Parse a textual cell id and return its four orthogonal neighbours.
pub fn neighbors_of(cell_id: &str) -> EngineResult<[(Direction, CellId); 4]> {
    let cell: CellId = cell_id.parse()?;
    Ok(cell.neighbors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_same_bucket() {
        let a = cell_of(12.34, 56.78).unwrap();
        let b = cell_of(12.39, 56.71).unwrap();
        let c = cell_of(12.44, 56.78).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "grid_123_567");
    }

    #[test]
    fn test_cell_of_is_deterministic() {
        for &(lat, lng) in &[(0.0, 0.0), (51.5074, -0.1278), (-33.8688, 151.2093)] {
            assert_eq!(cell_of(lat, lng).unwrap(), cell_of(lat, lng).unwrap());
        }
    }

    #[test]
    fn test_truncates_toward_zero() {
        assert_eq!(cell_of(-12.34, -56.78).unwrap(), CellId::new(-123, -567));
        assert_eq!(cell_of(-0.05, 0.05).unwrap(), CellId::new(0, 0));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(
            cell_of(91.0, 0.0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            cell_of(0.0, f64::NAN),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_neighbors_round_trip() {
        let cell = cell_of(12.34, 56.78).unwrap();
        let neighbors = neighbors_of(&cell.to_string()).unwrap();

        let ids: HashSet<CellId> = neighbors.iter().map(|(_, c)| *c).collect();
        assert_eq!(ids.len(), 4);
        assert!(!ids.contains(&cell));

        assert_eq!(neighbors[0], (Direction::East, CellId::new(123, 568)));
        assert_eq!(neighbors[1], (Direction::North, CellId::new(124, 567)));
        assert_eq!(neighbors[2], (Direction::West, CellId::new(123, 566)));
        assert_eq!(neighbors[3], (Direction::South, CellId::new(122, 567)));
    }

    #[test]
    fn test_malformed_cell_ids() {
        for bad in ["", "grid", "grid_1", "grid_a_2", "cell_1_2", "grid_1_2_3", "grid_1.5_2"] {
            assert!(
                matches!(neighbors_of(bad), Err(EngineError::MalformedCellId(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_indices_beyond_the_globe() {
        for bad in [
            format!("grid_{}_0", i64::MAX),
            format!("grid_0_{}", i64::MIN),
            "grid_903_0".to_string(),
            "grid_0_-1802".to_string(),
        ] {
            assert!(
                matches!(neighbors_of(&bad), Err(EngineError::MalformedCellId(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_edge_neighbors_parse() {
        let pole = cell_of(90.0, 180.0).unwrap();
        assert_eq!(pole, CellId::new(MAX_LAT_INDEX, MAX_LNG_INDEX));
        for (_, neighbor) in neighbors_of(&pole.to_string()).unwrap() {
            assert_eq!(neighbor.to_string().parse::<CellId>().unwrap(), neighbor);
        }
    }

    #[test]
    fn test_neighbor_never_overflows() {
        let far = CellId::new(i64::MAX, i64::MIN);
        assert_eq!(far.neighbor(Direction::North), far);
        assert_eq!(far.neighbor(Direction::West), far);
    }

    #[test]
    fn test_negative_ids_parse() {
        let cell: CellId = "grid_-5_-1800".parse().unwrap();
        assert_eq!(cell, CellId::new(-5, -1800));
    }

    #[test]
    fn test_serde_as_string() {
        let cell = CellId::new(7, -3);
        let json = serde_json::to_string(&cell).unwrap();
        assert_eq!(json, "\"grid_7_-3\"");
        let back: CellId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cell);
    }
}
