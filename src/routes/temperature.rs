//! `GET /temperature`: latest reading, its band, and when it was measured.
//!
//! The reading may come from cache, but the staleness check always runs
//! against `measured_at`, so a warm cache never serves an old measurement.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::{
    freshness::is_fresh,
    models::{classify, TemperatureStatus},
    AppState, FetchError,
};

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/temperature", get(handler))
}

#[derive(Debug, Serialize)]
struct TemperatureResponse {
    temperature: f64,
    status: TemperatureStatus,
    timestamp: DateTime<Utc>,
}

async fn handler(State(state): State<AppState>) -> Result<Json<TemperatureResponse>, FetchError> {
    // ---
    let reading = state.fetcher.get_reading(&state.config.sensebox_id).await?;

    let now = Utc::now();
    let max_age = state.config.max_measurement_age;
    if !is_fresh(reading.measured_at, now, max_age) {
        return Err(FetchError::StaleMeasurement {
            age_secs: now.signed_duration_since(reading.measured_at).num_seconds(),
            max_age_secs: max_age.as_secs(),
        });
    }

    let status = classify(reading.temperature);
    state.metrics.last_temperature.set(reading.temperature);
    info!(
        "GET /temperature - {} ({})",
        reading.temperature,
        status.as_str()
    );

    Ok(Json(TemperatureResponse {
        temperature: reading.temperature,
        status,
        timestamp: reading.measured_at,
    }))
}
