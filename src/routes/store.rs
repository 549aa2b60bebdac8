use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::AppState;

use super::error_parts;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/store", get(handler))
}

#[derive(Debug, Serialize)]
struct StoreResponse {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

impl StoreResponse {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            object: None,
            timestamp: None,
        }
    }
}

/// Persist the current snapshot immediately, outside the periodic schedule.
async fn handler(State(state): State<AppState>) -> Response {
    // ---
    info!("GET /store - Manual snapshot requested");

    let snapshot = match state.fetcher.get_snapshot(&state.config.sensebox_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("GET /store - No snapshot to store: {}", e);
            let (status, message) = error_parts(&e);
            let message = if e.is_unreachable() {
                "Failed to fetch sensor data".to_string()
            } else {
                message
            };
            return (status, Json(StoreResponse::error(message))).into_response();
        }
    };

    match state.writer.persist(&snapshot).await {
        Ok(name) => (
            StatusCode::OK,
            Json(StoreResponse {
                status: "success",
                message: "Data stored successfully".to_string(),
                object: Some(name),
                timestamp: Some(Utc::now()),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("GET /store - Storage failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StoreResponse::error("Failed to store data in object storage")),
            )
                .into_response()
        }
    }
}
