//! HTTP surface of the collector: ingestion, views and probes
//!
//! Handlers only parse requests and render results; all data access goes
//! through the injected [`QueryFacade`].

pub mod error;
pub mod render;

use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use htc_core::{LatestReading, Measurement, StationId, StationSelector, StoredMeasurement};
use htc_query::{QueryFacade, DEFAULT_SERIES_HOURS};
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;

pub use error::ApiError;

pub struct AppState {
    ready: AtomicBool,
    facade: QueryFacade,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    stored_total: Counter<u64>,
    rejected_total: Counter<u64>,
}

impl AppState {
    pub fn facade(&self) -> &QueryFacade {
        &self.facade
    }
}

pub fn build_app(facade: QueryFacade) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter()
        .with_registry(registry.clone())
        .build()
        .context("failed to build prometheus exporter")?;
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("htc-server");

    let requests_total = meter
        .u64_counter("htc_requests_total")
        .with_description("Total HTTP requests served")
        .init();
    let stored_total = meter
        .u64_counter("htc_measurements_stored_total")
        .with_description("Measurements written to the store")
        .init();
    let rejected_total = meter
        .u64_counter("htc_rejected_measurements_total")
        .with_description("Measurements refused by validation")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        facade,
        registry,
        provider,
        requests_total,
        stored_total,
        rejected_total,
    });

    let router = Router::new()
        .route("/sensorlog", get(sensorlog))
        .route("/html", get(latest_html))
        .route("/name", get(set_name))
        .route("/names", get(names_html))
        .route("/api/v1/latest", get(latest_json))
        .route("/api/v1/series", get(series_json))
        .route("/api/v1/names", get(names_json))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .fallback(forbidden)
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

#[derive(Deserialize)]
struct SensorLogQuery {
    hum: String,
    temp: String,
    id: String,
}

async fn sensorlog(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SensorLogQuery>,
) -> Result<StatusCode, ApiError> {
    state.requests_total.add(1, &[]);
    let measurement = Measurement::parse(&q.id, &q.temp, &q.hum).map_err(|e| {
        state.rejected_total.add(1, &[]);
        ApiError::from(e)
    })?;

    state.facade.record(&measurement).await?;
    state.stored_total.add(1, &[]);
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct StationQuery {
    id: Option<String>,
}

async fn latest_readings(
    state: &AppState,
    q: &StationQuery,
) -> Result<Vec<LatestReading>, ApiError> {
    state.requests_total.add(1, &[]);
    let selector = StationSelector::from_param(q.id.as_deref())?;
    Ok(state.facade.latest_with_names(&selector).await?)
}

async fn latest_html(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StationQuery>,
) -> Result<Html<String>, ApiError> {
    let readings = latest_readings(&state, &q).await?;
    Ok(Html(render::latest_page(&readings)))
}

async fn latest_json(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StationQuery>,
) -> Result<Json<Vec<LatestReading>>, ApiError> {
    Ok(Json(latest_readings(&state, &q).await?))
}

#[derive(Deserialize)]
struct NameQuery {
    id: String,
    name: String,
}

async fn set_name(
    State(state): State<Arc<AppState>>,
    Query(q): Query<NameQuery>,
) -> Result<Html<String>, ApiError> {
    state.requests_total.add(1, &[]);
    let station_id: StationId = q.id.parse()?;
    let name = q.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    let names = state.facade.name_station(&station_id, name).await?;
    Ok(Html(render::names_page(&names)))
}

async fn names_html(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    state.requests_total.add(1, &[]);
    let names = state.facade.names_with_defaults().await?;
    Ok(Html(render::names_page(&names)))
}

async fn names_json(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    state.requests_total.add(1, &[]);
    Ok(Json(state.facade.names_with_defaults().await?))
}

#[derive(Deserialize)]
struct SeriesQuery {
    id: String,
    hours: Option<i64>,
}

async fn series_json(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SeriesQuery>,
) -> Result<Json<Vec<StoredMeasurement>>, ApiError> {
    state.requests_total.add(1, &[]);
    let station_id: StationId = q.id.parse()?;
    let hours = q.hours.unwrap_or(DEFAULT_SERIES_HOURS);
    Ok(Json(state.facade.last_hours(&station_id, hours).await?))
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.requests_total.add(1, &[]);
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if !state.ready.load(Ordering::Relaxed) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    match state.facade.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> (
    [(axum::http::header::HeaderName, axum::http::HeaderValue); 1],
    String,
) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}

async fn forbidden() -> StatusCode {
    StatusCode::FORBIDDEN
}
