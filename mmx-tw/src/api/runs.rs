//! Run listing API handlers

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::services::{list_runs, RunNode};
use crate::AppState;

/// GET /runs query parameters
#[derive(Debug, Default, Deserialize)]
pub struct RunsQuery {
    pub segment: Option<String>,
    pub revision: Option<String>,
}

/// GET /runs response
#[derive(Debug, Serialize)]
pub struct RunsResponse {
    pub runs: Vec<RunNode>,
}

/// GET /runs
///
/// Navigable run tree for the results browser, grouped by
/// revision/segment/timestamp.
pub async fn get_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> ApiResult<Json<RunsResponse>> {
    let runs = list_runs(
        state.store.as_ref(),
        query.segment.as_deref(),
        query.revision.as_deref(),
    )?;
    Ok(Json(RunsResponse { runs }))
}

/// Build run listing routes
pub fn run_routes() -> Router<AppState> {
    Router::new().route("/runs", get(get_runs))
}
