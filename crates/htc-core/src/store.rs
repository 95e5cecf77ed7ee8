//! Backend contracts for the measurement log and the station name registry

use crate::{Measurement, StationId, StationSelector, StoredMeasurement};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Backend unreachable or statement failure.
///
/// Wraps the driver fault unchanged; nothing in the core retries.
#[derive(Debug, thiserror::Error)]
#[error("storage error: {source}")]
pub struct StorageError {
    #[source]
    source: BoxError,
}

impl StorageError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only time series of station readings
#[async_trait::async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Append one reading stamped with the current UTC time; returns rows affected
    async fn store(&self, measurement: &Measurement) -> StorageResult<u64>;

    /// Readings with `start <= timestamp <= end` (end defaults to now),
    /// in ascending time order, ties in insertion order
    async fn retrieve_range(
        &self,
        selector: &StationSelector,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<StoredMeasurement>>;

    /// Most recent reading per selected station; identical timestamps
    /// resolve to the later insertion
    async fn retrieve_latest(
        &self,
        selector: &StationSelector,
    ) -> StorageResult<Vec<StoredMeasurement>>;

    /// Timestamp of the last reading strictly before `mark`
    async fn retrieve_timestamp_before(
        &self,
        station_id: &StationId,
        mark: DateTime<Utc>,
    ) -> StorageResult<Option<DateTime<Utc>>>;

    /// Every station id that reported at least once
    async fn distinct_stations(&self) -> StorageResult<BTreeSet<String>>;

    /// Cheap liveness probe
    async fn ping(&self) -> StorageResult<()>;
}

/// Station id to display name mapping, last write wins
#[async_trait::async_trait]
pub trait NameRegistry: Send + Sync {
    async fn upsert_name(&self, station_id: &StationId, name: &str) -> StorageResult<()>;

    async fn get_name(&self, station_id: &StationId) -> StorageResult<Option<String>>;

    /// Registry content only; no defaults are synthesized here
    async fn list_names(&self) -> StorageResult<BTreeMap<String, String>>;
}
