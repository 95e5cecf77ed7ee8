//! Database query operations for the measurement and station name tables

use crate::schema::{from_db_time, to_db_time, MeasurementRow, StationNameRow};
use crate::{DbClient, DbResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use htc_core::{truncate_to_millis, Measurement, StationId, StationSelector, StoredMeasurement};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

impl DbClient {
    /// Append a measurement stamped with the current UTC time (millisecond resolution)
    #[instrument(skip(self, measurement), fields(station = %measurement.station_id()))]
    pub async fn insert_measurement(&self, measurement: &Measurement) -> DbResult<u64> {
        let timestamp = truncate_to_millis(Utc::now());
        let result = sqlx::query(
            r#"
            INSERT INTO Measurements (Timestamp, Stationid, Temperature, Humidity)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(to_db_time(timestamp))
        .bind(measurement.station_id().as_str())
        .bind(measurement.temperature())
        .bind(measurement.humidity())
        .execute(self.pool())
        .await?;

        debug!("Inserted measurement at {}", timestamp);
        Ok(result.rows_affected())
    }

    /// Get measurements within an inclusive time range, oldest first
    #[instrument(skip(self))]
    pub async fn get_measurement_range(
        &self,
        selector: &StationSelector,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<StoredMeasurement>> {
        let start = to_db_time(truncate_to_millis(start));
        let end = to_db_time(end.unwrap_or_else(Utc::now));

        let rows = match selector {
            StationSelector::All => {
                sqlx::query_as::<_, MeasurementRow>(
                    r#"
                    SELECT Id, Timestamp, Stationid, Temperature, Humidity
                    FROM Measurements
                    WHERE Timestamp >= ? AND Timestamp <= ?
                    ORDER BY Timestamp ASC, Id ASC
                    "#,
                )
                .bind(start)
                .bind(end)
                .fetch_all(self.pool())
                .await?
            }
            StationSelector::One(station_id) => {
                sqlx::query_as::<_, MeasurementRow>(
                    r#"
                    SELECT Id, Timestamp, Stationid, Temperature, Humidity
                    FROM Measurements
                    WHERE Stationid = ? AND Timestamp >= ? AND Timestamp <= ?
                    ORDER BY Timestamp ASC, Id ASC
                    "#,
                )
                .bind(station_id.as_str())
                .bind(start)
                .bind(end)
                .fetch_all(self.pool())
                .await?
            }
        };

        debug!(
            "Retrieved {} measurements between {} and {}",
            rows.len(),
            start,
            end
        );
        Ok(rows.into_iter().map(StoredMeasurement::from).collect())
    }

    /// Get the most recent measurement of one station or of every station
    #[instrument(skip(self))]
    pub async fn get_latest_measurements(
        &self,
        selector: &StationSelector,
    ) -> DbResult<Vec<StoredMeasurement>> {
        let rows = match selector {
            StationSelector::All => {
                sqlx::query_as::<_, MeasurementRow>(
                    r#"
                    SELECT Id, Timestamp, Stationid, Temperature, Humidity
                    FROM (
                        SELECT Id, Timestamp, Stationid, Temperature, Humidity,
                               ROW_NUMBER() OVER (
                                   PARTITION BY Stationid
                                   ORDER BY Timestamp DESC, Id DESC
                               ) AS rn
                        FROM Measurements
                    ) ranked
                    WHERE rn = 1
                    ORDER BY Stationid ASC
                    "#,
                )
                .fetch_all(self.pool())
                .await?
            }
            StationSelector::One(station_id) => {
                sqlx::query_as::<_, MeasurementRow>(
                    r#"
                    SELECT Id, Timestamp, Stationid, Temperature, Humidity
                    FROM Measurements
                    WHERE Stationid = ?
                    ORDER BY Timestamp DESC, Id DESC
                    LIMIT 1
                    "#,
                )
                .bind(station_id.as_str())
                .fetch_all(self.pool())
                .await?
            }
        };

        debug!("Retrieved {} latest measurements", rows.len());
        Ok(rows.into_iter().map(StoredMeasurement::from).collect())
    }

    /// Get the timestamp of the last measurement strictly before `mark`
    #[instrument(skip(self))]
    pub async fn get_timestamp_before(
        &self,
        station_id: &StationId,
        mark: DateTime<Utc>,
    ) -> DbResult<Option<DateTime<Utc>>> {
        let timestamp = sqlx::query_scalar::<_, NaiveDateTime>(
            r#"
            SELECT Timestamp FROM Measurements
            WHERE Stationid = ? AND Timestamp < ?
            ORDER BY Timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(station_id.as_str())
        .bind(to_db_time(mark))
        .fetch_optional(self.pool())
        .await?;

        Ok(timestamp.map(from_db_time))
    }

    /// Get every station id present in the measurement log
    #[instrument(skip(self))]
    pub async fn get_distinct_stations(&self) -> DbResult<BTreeSet<String>> {
        let stations = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT Stationid FROM Measurements ORDER BY Stationid",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(stations.into_iter().collect())
    }

    /// Insert or replace the display name of a station
    #[instrument(skip(self))]
    pub async fn set_station_name(&self, station_id: &StationId, name: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO StationNames (Stationid, Name)
            VALUES (?, ?)
            ON DUPLICATE KEY UPDATE Name = VALUES(Name)
            "#,
        )
        .bind(station_id.as_str())
        .bind(name)
        .execute(self.pool())
        .await?;

        debug!("Set station name: {} = {}", station_id, name);
        Ok(())
    }

    /// Get the display name of a station
    #[instrument(skip(self))]
    pub async fn get_station_name(&self, station_id: &StationId) -> DbResult<Option<String>> {
        let name = sqlx::query_scalar::<_, String>(
            "SELECT Name FROM StationNames WHERE Stationid = ?",
        )
        .bind(station_id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(name)
    }

    /// Get all registered station names
    #[instrument(skip(self))]
    pub async fn get_station_names(&self) -> DbResult<BTreeMap<String, String>> {
        let rows = sqlx::query_as::<_, StationNameRow>("SELECT Stationid, Name FROM StationNames")
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(|r| (r.station_id, r.name)).collect())
    }
}
