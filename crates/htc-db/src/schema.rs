//! Table layout for the measurement log and station names
//!
//! Timestamps are stored as DATETIME(3) holding UTC wall time; the
//! conversion to and from `DateTime<Utc>` happens only in this module.

use crate::{DbClient, DbResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use htc_core::StoredMeasurement;
use sqlx::FromRow;
use tracing::debug;

/// Measurement log row as read back from MySQL
#[derive(Debug, Clone, FromRow)]
pub struct MeasurementRow {
    /// Insertion sequence, only used to break timestamp ties
    #[sqlx(rename = "Id")]
    pub id: i64,

    #[sqlx(rename = "Timestamp")]
    pub timestamp: NaiveDateTime,

    #[sqlx(rename = "Stationid")]
    pub station_id: String,

    #[sqlx(rename = "Temperature")]
    pub temperature: f64,

    #[sqlx(rename = "Humidity")]
    pub humidity: f64,
}

impl From<MeasurementRow> for StoredMeasurement {
    fn from(row: MeasurementRow) -> Self {
        Self {
            timestamp: from_db_time(row.timestamp),
            station_id: row.station_id,
            temperature: row.temperature,
            humidity: row.humidity,
        }
    }
}

/// Station name registry row
#[derive(Debug, Clone, FromRow)]
pub struct StationNameRow {
    #[sqlx(rename = "Stationid")]
    pub station_id: String,

    #[sqlx(rename = "Name")]
    pub name: String,
}

pub(crate) fn to_db_time(t: DateTime<Utc>) -> NaiveDateTime {
    t.naive_utc()
}

pub(crate) fn from_db_time(t: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(t, Utc)
}

/// Table names
pub mod tables {
    pub const MEASUREMENTS: &str = "Measurements";
    pub const STATION_NAMES: &str = "StationNames";
}

pub const CREATE_MEASUREMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS Measurements (
    Id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    Timestamp DATETIME(3) NOT NULL,
    Stationid VARCHAR(100) NOT NULL,
    Temperature DOUBLE NOT NULL,
    Humidity DOUBLE NOT NULL,
    INDEX ts (Timestamp),
    INDEX si (Stationid)
)
"#;

pub const CREATE_STATION_NAMES: &str = r#"
CREATE TABLE IF NOT EXISTS StationNames (
    Stationid VARCHAR(100) NOT NULL PRIMARY KEY,
    Name TEXT NOT NULL
)
"#;

impl DbClient {
    /// Create both tables when missing. Existing tables are left alone.
    pub async fn ensure_schema(&self) -> DbResult<()> {
        for ddl in [CREATE_MEASUREMENTS, CREATE_STATION_NAMES] {
            sqlx::query(ddl).execute(self.pool()).await?;
        }
        debug!(
            "Ensured tables {} and {}",
            tables::MEASUREMENTS,
            tables::STATION_NAMES
        );
        Ok(())
    }
}
