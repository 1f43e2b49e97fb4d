//! Artifact download API handlers
//!
//! `/download` resolves an artifact to a signed redirect or an inline
//! payload; `/signed/{key}` serves the bytes behind an issued signed URL
//! after verifying its token and expiry.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};
use crate::services::{resolve_artifact, Resolution};
use crate::AppState;

/// GET /download query parameters
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub key: String,
}

/// GET /download?key={artifact-key}
///
/// Returns a redirect to a time-bounded signed URL when signing is
/// available, otherwise an inline base64 payload for small artifacts.
pub async fn download_artifact(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    mmx_common::store::validate_key(&query.key)?;
    let resolution = resolve_artifact(
        state.store.as_ref(),
        &query.key,
        Duration::from_secs(state.config.signed_url_ttl_secs),
        state.config.max_inline_bytes,
    )?;
    match resolution {
        Resolution::Signed(signed) => {
            tracing::debug!(key = %query.key, expires_at = %signed.expires_at, "issued signed URL");
            Ok(Redirect::to(&signed.url).into_response())
        }
        inline @ Resolution::Inline { .. } => Ok(Json(inline).into_response()),
    }
}

/// GET /signed/{key} query parameters
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub token: String,
}

/// GET /signed/{*key}?expires={unix}&token={hex}
///
/// Serves artifact bytes for a previously issued signed URL. Expired or
/// tampered tokens are refused; the link is read-only and scoped to
/// exactly one key.
pub async fn serve_signed(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> ApiResult<Response> {
    mmx_common::store::validate_key(&key)?;
    if !state.store.verify(&key, query.expires, &query.token)? {
        return Err(ApiError::Forbidden(
            "signed link is invalid or has expired".to_string(),
        ));
    }
    let bytes = state.store.get(&key)?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}

/// Build download routes
pub fn download_routes() -> Router<AppState> {
    Router::new()
        .route("/download", get(download_artifact))
        .route("/signed/*key", get(serve_signed))
}
