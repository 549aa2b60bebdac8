use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::error;

use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(handler))
}

/// Prometheus pull endpoint.
async fn handler(State(state): State<AppState>) -> Response {
    // ---
    match state.metrics.gather() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}
