//! HTTP gateway: merges the per-endpoint subrouters, counts requests, and
//! owns the single translation of `FetchError` into status codes and bodies.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tracing::{error, warn};

use crate::{AppState, FetchError};

mod health;
mod info;
mod metrics;
mod store;
mod temperature;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(info::router())
        .merge(temperature::router())
        .merge(store::router())
        .merge(health::router())
        .merge(metrics::router())
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

/// Count every request and observe its latency.
async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    // ---
    let started = Instant::now();
    let response = next.run(req).await;

    state.metrics.request_count.inc();
    state
        .metrics
        .request_latency
        .observe(started.elapsed().as_secs_f64());
    response
}

/// Status code and public message for a fetch failure.
pub(crate) fn error_parts(err: &FetchError) -> (StatusCode, String) {
    // ---
    match err {
        FetchError::Unreachable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Error fetching sensor data".to_string(),
        ),
        FetchError::SensorNotFound => (
            StatusCode::NOT_FOUND,
            "Temperature sensor not found".to_string(),
        ),
        FetchError::NoMeasurement => (
            StatusCode::NOT_FOUND,
            "No temperature measurements available".to_string(),
        ),
        FetchError::InvalidMeasurement(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid measurement data".to_string(),
        ),
        FetchError::StaleMeasurement { max_age_secs, .. } => (
            StatusCode::NOT_FOUND,
            format!("Data exceeds {} threshold", describe_secs(*max_age_secs)),
        ),
        FetchError::TimestampParse(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid timestamp format".to_string(),
        ),
        FetchError::InvalidPayload(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

impl IntoResponse for FetchError {
    fn into_response(self) -> Response {
        // ---
        let (status, message) = error_parts(&self);
        if status.is_server_error() && !self.is_unreachable() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request failed: {}", self);
        }
        (status, message).into_response()
    }
}

/// "1 hour", "5 minutes", "90 seconds".
fn describe_secs(secs: u64) -> String {
    // ---
    let (n, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };

    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        // ---
        let cases = [
            (FetchError::Unreachable("x".into()), 503),
            (FetchError::SensorNotFound, 404),
            (FetchError::NoMeasurement, 404),
            (FetchError::InvalidMeasurement("x".into()), 500),
            (
                FetchError::StaleMeasurement {
                    age_secs: 7200,
                    max_age_secs: 3600,
                },
                404,
            ),
            (FetchError::TimestampParse("x".into()), 500),
            (FetchError::InvalidPayload("x".into()), 500),
        ];

        for (err, expected) in cases {
            assert_eq!(error_parts(&err).0.as_u16(), expected, "for {err:?}");
        }
    }

    #[test]
    fn test_stale_message() {
        // ---
        let err = FetchError::StaleMeasurement {
            age_secs: 7200,
            max_age_secs: 3600,
        };
        assert_eq!(error_parts(&err).1, "Data exceeds 1 hour threshold");
    }

    #[test]
    fn test_describe_secs() {
        // ---
        assert_eq!(describe_secs(3600), "1 hour");
        assert_eq!(describe_secs(7200), "2 hours");
        assert_eq!(describe_secs(300), "5 minutes");
        assert_eq!(describe_secs(90), "90 seconds");
        assert_eq!(describe_secs(1), "1 second");
    }
}
