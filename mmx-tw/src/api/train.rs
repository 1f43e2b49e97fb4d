//! Training API handlers
//!
//! POST /train validates the request, launches the external training
//! process, and blocks until it exits; on success it runs the summary
//! extraction and segment re-aggregation before responding.

use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::time::Duration;

use mmx_common::aggregate::aggregate_segment;
use mmx_common::extract::{extract_summary, ExtractOutcome};
use mmx_common::summary::ModelSummary;

use crate::error::ApiResult;
use crate::services::{build_descriptor, TrainRequest, TrainerLauncher};
use crate::AppState;

/// Terminal state of one training request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
    TimedOut,
}

/// POST /train response
#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub run_prefix: String,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Captured combined stdout/stderr, also stored as `training.log`
    pub log: String,
    /// Present when post-training extraction produced a summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ModelSummary>,
    /// Extraction problem after an otherwise successful run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
}

/// POST /train
///
/// The request blocks until the training subprocess exits; a non-zero exit
/// or timeout is reported in the response body, not as an HTTP error.
pub async fn start_training(
    State(state): State<AppState>,
    Json(request): Json<TrainRequest>,
) -> ApiResult<Json<TrainResponse>> {
    let descriptor = build_descriptor(&request)?;
    let run = descriptor.run_id()?;
    tracing::info!(
        run = %run,
        iterations = descriptor.iterations,
        trials = descriptor.trials,
        "training request accepted"
    );

    let launcher = TrainerLauncher::new(
        state.config.trainer_binary.clone(),
        Duration::from_secs(state.config.training_timeout_secs),
        state.config.requested_cores,
    );
    let outcome = launcher.launch(&descriptor, state.store.as_ref()).await?;

    let status = if outcome.succeeded() {
        JobStatus::Succeeded
    } else if outcome.timed_out {
        JobStatus::TimedOut
    } else {
        JobStatus::Failed
    };

    let mut summary = None;
    let mut extraction_error = None;
    if outcome.succeeded() {
        match extract_summary(state.store.as_ref(), &run, false) {
            Ok(ExtractOutcome::Written(s)) => summary = Some(s),
            Ok(ExtractOutcome::Skipped) => {
                tracing::debug!(run = %run, "summary already written by training process");
            }
            Err(e) => {
                tracing::error!(run = %run, error = %e, "post-training extraction failed");
                extraction_error = Some(e.to_string());
            }
        }
        if let Err(e) = aggregate_segment(state.store.as_ref(), &run.segment) {
            tracing::error!(segment = %run.segment, error = %e, "post-training aggregation failed");
        }
    } else {
        let message = format!(
            "training for {} ended with status {:?} (exit code {:?})",
            run, status, outcome.exit_code
        );
        *state.last_error.write().await = Some(message);
    }

    Ok(Json(TrainResponse {
        run_prefix: run.prefix(),
        status,
        exit_code: outcome.exit_code,
        timed_out: outcome.timed_out,
        log: outcome.log,
        summary,
        extraction_error,
    }))
}

/// Build training routes
pub fn train_routes() -> Router<AppState> {
    Router::new().route("/train", post(start_training))
}
