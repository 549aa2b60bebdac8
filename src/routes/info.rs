//! Service descriptor (`/`) and plain-text version (`/version`).

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

// ---

pub const SERVICE_NAME: &str = "OpenSenseMap Beekeeping API";

pub const ENDPOINTS: [&str; 5] = ["/version", "/temperature", "/metrics", "/store", "/readyz"];

#[derive(Serialize)]
struct IndexResponse {
    name: &'static str,
    version: &'static str,
    endpoints: [&'static str; 5],
}

async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS,
    })
}

async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/version", get(version))
}
