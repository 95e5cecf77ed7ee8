//! Typed records returned by the store and the query facade

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Display name for a station without a registry entry, in latest readings
pub const UNKNOWN_DISPLAY_NAME: &str = "unknown";

/// Name synthesized for measured stations missing from the registry listing
pub const UNNAMED_STATION: &str = "Unknown";

/// Truncate a timestamp down to millisecond resolution.
///
/// Stored timestamps carry milliseconds only, so any comparison bound or
/// newly assigned timestamp goes through here first.
pub fn truncate_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(Duration::milliseconds(1)).unwrap_or(t)
}

/// One stored row of the measurement log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeasurement {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "stationid")]
    pub station_id: String,
    pub temperature: f64,
    pub humidity: f64,
}

/// Most recent reading of a station, decorated for presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestReading {
    pub time: DateTime<Utc>,

    /// Wall-clock age of the reading at query time
    #[serde(rename = "deltat", serialize_with = "serialize_seconds")]
    pub delta_from_now: Duration,

    #[serde(rename = "stationid")]
    pub station_id: String,

    pub name: String,
    pub temperature: f64,
    pub humidity: f64,
}

impl LatestReading {
    pub fn from_stored(row: StoredMeasurement, name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            time: row.timestamp,
            delta_from_now: now - row.timestamp,
            station_id: row.station_id,
            name: name.unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string()),
            temperature: row.temperature,
            humidity: row.humidity,
        }
    }

    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.delta_from_now > threshold
    }
}

fn serialize_seconds<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.num_milliseconds() as f64 / 1000.0)
}

/// Registry entry mapping a station id to its display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationName {
    #[serde(rename = "stationid")]
    pub station_id: String,
    pub name: String,
}
