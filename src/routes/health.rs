// src/routes/health.rs
//! Readiness endpoint for the beekeeping API.
//!
//! This module defines the `/readyz` route used by container orchestrators
//! (e.g., Docker, Kubernetes) to decide whether the service should receive
//! traffic. Unlike a bare liveness check it contacts the senseBox upstream and
//! inspects the cache, so it does touch external services:
//! - `200` while the upstream answers *or* the cache is still warm
//! - `503` only when both fail
//!
//! Each upstream check is a forced GET against openSenseMap. Its result is
//! reused for `REACHABILITY_COOLDOWN_SECS` (30 s by default), so polling
//! `/readyz` every few seconds costs at most one upstream call per cooldown.
//! With a cooldown of 0 every call goes upstream, and `reachable` may lag
//! the real upstream state by up to one cooldown otherwise.
//!
//! The gateway merges this subrouter into the top-level API router so that
//! `main.rs` does not need to know about individual endpoints.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::{health::TOTAL_BOXES, models::Overall, AppState};

/// JSON response body for the `/readyz` endpoint.
#[derive(Serialize)]
struct ReadyzResponse {
    status: Overall,
    reachable: bool,
    cache_fresh: bool,
    boxes_accessible: u32,
    total_boxes: u32,
    cache_status: &'static str,
}

/// Handle `GET /readyz`.
async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ReadyzResponse>) {
    // ---
    let health = state.health.check_health().await;

    let code = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadyzResponse {
        status: health.overall,
        reachable: health.reachable,
        cache_fresh: health.cache_fresh,
        boxes_accessible: u32::from(health.reachable),
        total_boxes: TOTAL_BOXES,
        cache_status: if health.cache_fresh { "fresh" } else { "stale" },
    };

    (code, Json(body))
}

/// Create a subrouter containing the `/readyz` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/readyz", get(readyz))
}
