//! `MeasurementStore` and `NameRegistry` over the MySQL client

use crate::DbClient;
use chrono::{DateTime, Utc};
use htc_core::{
    Measurement, MeasurementStore, NameRegistry, StationId, StationSelector, StorageResult,
    StoredMeasurement,
};
use std::collections::{BTreeMap, BTreeSet};

#[async_trait::async_trait]
impl MeasurementStore for DbClient {
    async fn store(&self, measurement: &Measurement) -> StorageResult<u64> {
        Ok(self.insert_measurement(measurement).await?)
    }

    async fn retrieve_range(
        &self,
        selector: &StationSelector,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<StoredMeasurement>> {
        Ok(self.get_measurement_range(selector, start, end).await?)
    }

    async fn retrieve_latest(
        &self,
        selector: &StationSelector,
    ) -> StorageResult<Vec<StoredMeasurement>> {
        Ok(self.get_latest_measurements(selector).await?)
    }

    async fn retrieve_timestamp_before(
        &self,
        station_id: &StationId,
        mark: DateTime<Utc>,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        Ok(self.get_timestamp_before(station_id, mark).await?)
    }

    async fn distinct_stations(&self) -> StorageResult<BTreeSet<String>> {
        Ok(self.get_distinct_stations().await?)
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(DbClient::ping(self).await?)
    }
}

#[async_trait::async_trait]
impl NameRegistry for DbClient {
    async fn upsert_name(&self, station_id: &StationId, name: &str) -> StorageResult<()> {
        Ok(self.set_station_name(station_id, name).await?)
    }

    async fn get_name(&self, station_id: &StationId) -> StorageResult<Option<String>> {
        Ok(self.get_station_name(station_id).await?)
    }

    async fn list_names(&self) -> StorageResult<BTreeMap<String, String>> {
        Ok(self.get_station_names().await?)
    }
}
