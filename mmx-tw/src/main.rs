//! mmx-tw - Training Worker Microservice
//!
//! Accepts marketing-mix-model training requests from the web form, runs
//! the external training process one job at a time, and serves the stored
//! results back through signed URLs.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use mmx_common::config::MmxConfig;
use mmx_common::store::{FsArtifactStore, UrlSigner};
use mmx_tw::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting MMX Training Worker (mmx-tw) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = MmxConfig::load()?;
    info!("Storage root: {}", config.storage_root.display());
    info!("Trainer binary: {}", config.trainer_binary);

    let secret = match &config.signing_secret {
        Some(secret) => secret.clone().into_bytes(),
        None => {
            warn!("No signing secret configured; signed URLs will not survive a restart");
            UrlSigner::ephemeral_secret()
        }
    };
    let signer = UrlSigner::new(secret, config.effective_base_url());
    let store = FsArtifactStore::with_signer(&config.storage_root, signer)?;

    let bind = format!("{}:{}", config.bind_address, config.port);
    let state = AppState::new(Arc::new(store), Arc::new(config));
    let app = mmx_tw::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
