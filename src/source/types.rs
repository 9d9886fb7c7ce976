//! Location samples from the geolocation source.
//!
//! Raw coordinates live only long enough to be bucketed into a cell; they are
//! never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One position fix of an observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub lat: f64,
    pub lng: f64,
    /// When the fix was taken on the device
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            observed_at: Utc::now(),
        }
    }

    /// Parse one input line: a JSON object (`{"lat": .., "lng": ..}`) or a
    /// `lat,lng` CSV pair.
    ///
    /// Blank lines and `#` comments yield `Ok(None)`.
    pub fn parse_line(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        if line.starts_with('{') {
            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| format!("invalid JSON sample: {e}"));
        }

        let mut fields = line.split(',').map(str::trim);
        let lat = fields
            .next()
            .and_then(|f| f.parse::<f64>().ok())
            .ok_or_else(|| format!("invalid latitude in {line:?}"))?;
        let lng = fields
            .next()
            .and_then(|f| f.parse::<f64>().ok())
            .ok_or_else(|| format!("invalid longitude in {line:?}"))?;

        Ok(Some(Self::new(lat, lng)))
    }
}
