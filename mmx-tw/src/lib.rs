//! mmx-tw library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use mmx_common::config::MmxConfig;
use mmx_common::store::ArtifactStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Artifact store backing every read and write
    pub store: Arc<dyn ArtifactStore>,
    pub config: Arc<MmxConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last training/extraction error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn ArtifactStore>, config: Arc<MmxConfig>) -> Self {
        Self {
            store,
            config,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::train_routes())
        .merge(api::run_routes())
        .merge(api::download_routes())
        .merge(api::health_routes())
        .with_state(state)
}
