//! Composition of store and registry for the presentation layer

use chrono::{Duration, Utc};
use htc_core::{
    LatestReading, Measurement, MeasurementStore, NameRegistry, StationId, StationSelector,
    StorageError, StorageResult, StoredMeasurement, UNNAMED_STATION,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default window of the time series view
pub const DEFAULT_SERIES_HOURS: i64 = 24;

/// Longest time series window served
pub const MAX_SERIES_HOURS: i64 = 24 * 31;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("hours must be between 1 and {max}, got {0}", max = MAX_SERIES_HOURS)]
    InvalidWindow(i64),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Read/write entry point shared by all request handlers.
///
/// Cheap to clone; the backends are reference counted and carry no
/// per-request state.
#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<dyn MeasurementStore>,
    names: Arc<dyn NameRegistry>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn MeasurementStore>, names: Arc<dyn NameRegistry>) -> Self {
        Self { store, names }
    }

    /// Use one backend for both the measurement log and the names
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: MeasurementStore + NameRegistry + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            store: backend.clone(),
            names: backend,
        }
    }

    pub fn store(&self) -> &dyn MeasurementStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &dyn NameRegistry {
        self.names.as_ref()
    }

    /// Persist a validated reading
    #[instrument(skip(self, measurement))]
    pub async fn record(&self, measurement: &Measurement) -> StorageResult<u64> {
        let n = self.store.store(measurement).await?;
        info!(
            station = %measurement.station_id(),
            temperature = measurement.temperature(),
            humidity = measurement.humidity(),
            "Stored measurement"
        );
        Ok(n)
    }

    /// Latest reading per selected station, each with a display name
    #[instrument(skip(self))]
    pub async fn latest_with_names(
        &self,
        selector: &StationSelector,
    ) -> StorageResult<Vec<LatestReading>> {
        let rows = self.store.retrieve_latest(selector).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut names = match selector {
            StationSelector::All => self.names.list_names().await?,
            StationSelector::One(id) => self
                .names
                .get_name(id)
                .await?
                .map(|name| BTreeMap::from([(id.to_string(), name)]))
                .unwrap_or_default(),
        };

        let now = Utc::now();
        Ok(rows
            .into_iter()
            .map(|row| {
                let name = names.remove(&row.station_id);
                LatestReading::from_stored(row, name, now)
            })
            .collect())
    }

    /// Readings of the last `hours` hours, `1..=MAX_SERIES_HOURS`.
    ///
    /// The window starts at the last reading before the cutoff when there is
    /// one, so a sparse reporter still yields a leading point.
    #[instrument(skip(self))]
    pub async fn last_hours(
        &self,
        station_id: &StationId,
        hours: i64,
    ) -> QueryResult<Vec<StoredMeasurement>> {
        if !(1..=MAX_SERIES_HOURS).contains(&hours) {
            return Err(QueryError::InvalidWindow(hours));
        }
        let now = Utc::now();
        let cutoff = now - Duration::hours(hours);
        let anchor = self
            .store
            .retrieve_timestamp_before(station_id, cutoff)
            .await?
            .unwrap_or(cutoff);

        let selector = StationSelector::One(station_id.clone());
        let rows = self.store.retrieve_range(&selector, anchor, Some(now)).await?;
        debug!("Series for {} from {}: {} points", station_id, anchor, rows.len());
        Ok(rows)
    }

    pub async fn last_24_hours(
        &self,
        station_id: &StationId,
    ) -> QueryResult<Vec<StoredMeasurement>> {
        self.last_hours(station_id, DEFAULT_SERIES_HOURS).await
    }

    /// Registry listing plus an "Unknown" entry for every measured but unnamed station
    #[instrument(skip(self))]
    pub async fn names_with_defaults(&self) -> StorageResult<BTreeMap<String, String>> {
        let mut names = self.names.list_names().await?;
        for station in self.store.distinct_stations().await? {
            names
                .entry(station)
                .or_insert_with(|| UNNAMED_STATION.to_string());
        }
        Ok(names)
    }

    /// Set a display name and return the refreshed listing
    #[instrument(skip(self))]
    pub async fn name_station(
        &self,
        station_id: &StationId,
        name: &str,
    ) -> StorageResult<BTreeMap<String, String>> {
        self.names.upsert_name(station_id, name).await?;
        info!(station = %station_id, display_name = name, "Station renamed");
        self.names_with_defaults().await
    }

    pub async fn ping(&self) -> StorageResult<()> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use chrono::DateTime;
    use htc_core::UNKNOWN_DISPLAY_NAME;
    use std::collections::BTreeSet;

    fn facade() -> (QueryFacade, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        let facade = QueryFacade::new(backend.clone(), backend.clone());
        (facade, backend)
    }

    fn id(s: &str) -> StationId {
        s.parse().unwrap()
    }

    fn m(station: &str, temperature: f64, humidity: f64) -> Measurement {
        Measurement::new(station, temperature, humidity).unwrap()
    }

    #[tokio::test]
    async fn test_record_then_latest() {
        let (facade, _) = facade();
        facade.record(&m("shed-1", 21.5, 55.0)).await.unwrap();

        let latest = facade
            .latest_with_names(&StationSelector::One(id("shed-1")))
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].station_id, "shed-1");
        assert_eq!(latest[0].temperature, 21.5);
        assert_eq!(latest[0].humidity, 55.0);
        assert_eq!(latest[0].name, UNKNOWN_DISPLAY_NAME);
        assert!(latest[0].delta_from_now < Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_latest_all_joins_names() {
        let (facade, _) = facade();
        facade.name_station(&id("test-100001"), "testroom1").await.unwrap();
        facade.record(&m("test-100001", 10.0, 40.0)).await.unwrap();
        facade.record(&m("test-100002", 15.0, 45.0)).await.unwrap();

        let latest = facade.latest_with_names(&StationSelector::All).await.unwrap();
        assert_eq!(latest.len(), 2);
        let first = latest.iter().find(|r| r.station_id == "test-100001").unwrap();
        assert_eq!(first.name, "testroom1");
        let second = latest.iter().find(|r| r.station_id == "test-100002").unwrap();
        assert_eq!(second.name, UNKNOWN_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn test_latest_picks_newest_reading() {
        let (facade, backend) = facade();
        let t0 = Utc::now() - Duration::seconds(10);
        backend.store_at(&m("shed-1", 21.5, 55.0), t0).await;
        backend
            .store_at(&m("shed-1", 22.0, 54.0), t0 + Duration::seconds(1))
            .await;

        let latest = facade
            .latest_with_names(&StationSelector::One(id("shed-1")))
            .await
            .unwrap();
        assert_eq!((latest[0].temperature, latest[0].humidity), (22.0, 54.0));

        let rows = facade
            .store()
            .retrieve_range(
                &StationSelector::One(id("shed-1")),
                t0 - Duration::seconds(1),
                None,
            )
            .await
            .unwrap();
        let temps: Vec<f64> = rows.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![21.5, 22.0]);
    }

    #[tokio::test]
    async fn test_last_24_hours_anchors_on_prior_reading() {
        let (facade, backend) = facade();
        let now = Utc::now();
        backend
            .store_at(&m("shed-1", 10.0, 50.0), now - Duration::hours(40))
            .await;
        backend
            .store_at(&m("shed-1", 11.0, 50.0), now - Duration::hours(30))
            .await;
        backend
            .store_at(&m("shed-1", 12.0, 50.0), now - Duration::minutes(20))
            .await;

        let series = facade.last_24_hours(&id("shed-1")).await.unwrap();
        let temps: Vec<f64> = series.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![11.0, 12.0]);
    }

    #[tokio::test]
    async fn test_last_24_hours_without_prior_reading() {
        let (facade, backend) = facade();
        let now = Utc::now();
        backend
            .store_at(&m("shed-1", 12.0, 50.0), now - Duration::hours(2))
            .await;
        backend
            .store_at(&m("shed-2", 9.0, 50.0), now - Duration::hours(1))
            .await;

        let series = facade.last_24_hours(&id("shed-1")).await.unwrap();
        assert_eq!(series.len(), 1);
        assert!(facade.last_24_hours(&id("nowhere")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_series_window_is_bounded() {
        let (facade, backend) = facade();
        let now = Utc::now();
        backend
            .store_at(&m("shed-1", 12.0, 50.0), now - Duration::hours(2))
            .await;

        for hours in [0, -5, MAX_SERIES_HOURS + 1, i64::MAX / 1000] {
            let err = facade.last_hours(&id("shed-1"), hours).await.unwrap_err();
            assert!(matches!(err, QueryError::InvalidWindow(h) if h == hours));
        }

        let series = facade
            .last_hours(&id("shed-1"), MAX_SERIES_HOURS)
            .await
            .unwrap();
        assert_eq!(series.len(), 1);
    }

    #[tokio::test]
    async fn test_named_station_without_readings_is_not_latest() {
        let (facade, _) = facade();
        facade.record(&m("shed-1", 21.5, 55.0)).await.unwrap();
        facade.name_station(&id("named-only"), "Attic").await.unwrap();

        let all = facade.latest_with_names(&StationSelector::All).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.iter().all(|r| r.station_id != "named-only"));

        let one = facade
            .latest_with_names(&StationSelector::One(id("named-only")))
            .await
            .unwrap();
        assert!(one.is_empty());
    }

    #[tokio::test]
    async fn test_names_with_defaults() {
        let (facade, _) = facade();
        facade.record(&m("measured-only", 1.0, 2.0)).await.unwrap();
        facade.name_station(&id("named-only"), "Attic").await.unwrap();

        let names = facade.names_with_defaults().await.unwrap();
        assert_eq!(names["measured-only"], UNNAMED_STATION);
        assert_eq!(names["named-only"], "Attic");

        // the raw registry stays free of synthesized entries
        let raw = facade.registry().list_names().await.unwrap();
        assert!(!raw.contains_key("measured-only"));
    }

    #[tokio::test]
    async fn test_rename_is_last_write_wins() {
        let (facade, _) = facade();
        facade.name_station(&id("abcdef"), "Room A").await.unwrap();
        let names = facade.name_station(&id("abcdef"), "Room B").await.unwrap();

        assert_eq!(names.len(), 1);
        assert_eq!(names["abcdef"], "Room B");
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl MeasurementStore for Unreachable {
        async fn store(&self, _: &Measurement) -> StorageResult<u64> {
            Err(StorageError::new("connection refused"))
        }

        async fn retrieve_range(
            &self,
            _: &StationSelector,
            _: DateTime<Utc>,
            _: Option<DateTime<Utc>>,
        ) -> StorageResult<Vec<StoredMeasurement>> {
            Err(StorageError::new("connection refused"))
        }

        async fn retrieve_latest(
            &self,
            _: &StationSelector,
        ) -> StorageResult<Vec<StoredMeasurement>> {
            Err(StorageError::new("connection refused"))
        }

        async fn retrieve_timestamp_before(
            &self,
            _: &StationId,
            _: DateTime<Utc>,
        ) -> StorageResult<Option<DateTime<Utc>>> {
            Err(StorageError::new("connection refused"))
        }

        async fn distinct_stations(&self) -> StorageResult<BTreeSet<String>> {
            Err(StorageError::new("connection refused"))
        }

        async fn ping(&self) -> StorageResult<()> {
            Err(StorageError::new("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let facade = QueryFacade::new(Arc::new(Unreachable), Arc::new(MemoryStore::new()));

        let err = facade.record(&m("shed-1", 1.0, 2.0)).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(facade.latest_with_names(&StationSelector::All).await.is_err());
        assert!(matches!(
            facade.last_24_hours(&id("shed-1")).await,
            Err(QueryError::Storage(_))
        ));
        assert!(facade.ping().await.is_err());
    }
}
