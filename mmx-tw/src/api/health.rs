//! Worker liveness and diagnostics
//!
//! `/health` answers for the worker and for the artifact store behind it. A
//! recorded training failure or an unreachable storage root degrades the
//! report; the endpoint itself stays up so operators can see why.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the last job failed or storage is unreachable
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Whether the artifact store currently answers requests
    pub storage_ok: bool,
    /// Outcome of the most recent failed job, cleared only by restart
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let last_error = state.last_error.read().await.clone();

    // Any answer at all means the storage root is reachable; the key itself
    // need not exist.
    let storage_ok = state.store.exists(mmx_common::paths::RUN_ROOT).is_ok();

    let status = if storage_ok && last_error.is_none() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        service: "mmx-tw".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        storage_ok,
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
