//! In-process backend keeping readings and names in memory
//!
//! Used when no database is configured and as the backend for tests.
//! Contents are lost on restart.

use chrono::{DateTime, Utc};
use htc_core::{
    truncate_to_millis, Measurement, MeasurementStore, NameRegistry, StationId, StationSelector,
    StorageResult, StoredMeasurement,
};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// Append-only; the index is the insertion sequence
    rows: Vec<StoredMeasurement>,
    names: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reading with an explicit timestamp, for seeding history
    pub async fn store_at(&self, measurement: &Measurement, timestamp: DateTime<Utc>) {
        let row = StoredMeasurement {
            timestamp: truncate_to_millis(timestamp),
            station_id: measurement.station_id().to_string(),
            temperature: measurement.temperature(),
            humidity: measurement.humidity(),
        };
        self.inner.write().await.rows.push(row);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl MeasurementStore for MemoryStore {
    async fn store(&self, measurement: &Measurement) -> StorageResult<u64> {
        self.store_at(measurement, Utc::now()).await;
        Ok(1)
    }

    async fn retrieve_range(
        &self,
        selector: &StationSelector,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<StoredMeasurement>> {
        let start = truncate_to_millis(start);
        let end = end.unwrap_or_else(Utc::now);

        let inner = self.inner.read().await;
        let mut rows: Vec<StoredMeasurement> = inner
            .rows
            .iter()
            .filter(|r| selector.matches(&r.station_id))
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }

    async fn retrieve_latest(
        &self,
        selector: &StationSelector,
    ) -> StorageResult<Vec<StoredMeasurement>> {
        let inner = self.inner.read().await;
        let mut latest: BTreeMap<&str, &StoredMeasurement> = BTreeMap::new();
        for row in inner.rows.iter().filter(|r| selector.matches(&r.station_id)) {
            match latest.get(row.station_id.as_str()) {
                Some(current) if current.timestamp > row.timestamp => {}
                _ => {
                    latest.insert(&row.station_id, row);
                }
            }
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn retrieve_timestamp_before(
        &self,
        station_id: &StationId,
        mark: DateTime<Utc>,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.station_id == station_id.as_str() && r.timestamp < mark)
            .map(|r| r.timestamp)
            .max())
    }

    async fn distinct_stations(&self) -> StorageResult<BTreeSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner.rows.iter().map(|r| r.station_id.clone()).collect())
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl NameRegistry for MemoryStore {
    async fn upsert_name(&self, station_id: &StationId, name: &str) -> StorageResult<()> {
        self.inner
            .write()
            .await
            .names
            .insert(station_id.to_string(), name.to_string());
        Ok(())
    }

    async fn get_name(&self, station_id: &StationId) -> StorageResult<Option<String>> {
        Ok(self.inner.read().await.names.get(station_id.as_str()).cloned())
    }

    async fn list_names(&self) -> StorageResult<BTreeMap<String, String>> {
        Ok(self.inner.read().await.names.clone())
    }
}
