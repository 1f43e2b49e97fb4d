//! mmx-bf - Backfill & aggregation tool
//!
//! Sweeps the artifact store for runs missing a model summary, generates
//! them, and rebuilds per-segment aggregates. Designed to be re-run safely
//! on every deployment; per-run failures are tallied, not fatal.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use mmx_bf::{run_sweep, test_run, SweepOptions};
use mmx_common::config::MmxConfig;
use mmx_common::store::FsArtifactStore;

#[derive(Debug, Parser)]
#[command(name = "mmx-bf", about = "Backfill model summaries and rebuild aggregates")]
struct Args {
    /// Root directory of the artifact store (default: configured storage root)
    #[arg(long, env = "MMX_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Only process runs for this segment
    #[arg(long)]
    segment: Option<String>,

    /// Only process runs for this revision
    #[arg(long)]
    revision: Option<String>,

    /// Regenerate summaries even when they already exist
    #[arg(long)]
    force: bool,

    /// Skip extraction, only rebuild aggregates
    #[arg(long)]
    aggregate_only: bool,

    /// Dry-run diagnostics for one run prefix; mutates nothing
    #[arg(long, value_name = "PREFIX")]
    test_run: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = MmxConfig::load()?;
    let storage_root = args.storage_root.unwrap_or(config.storage_root);
    info!("Storage root: {}", storage_root.display());

    // A store that cannot be opened is the one fatal setup error
    let store = FsArtifactStore::new(&storage_root)?;

    if let Some(prefix) = args.test_run {
        let report = test_run(&store, &prefix)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let options = SweepOptions {
        segment: args.segment,
        revision: args.revision,
        force: args.force,
        aggregate_only: args.aggregate_only,
    };
    let report = run_sweep(&store, &options)?;

    for failure in &report.failures {
        warn!(run = %failure.run_prefix, error = %failure.error, "run failed");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    // A completed sweep exits 0 even when individual runs failed
    Ok(())
}
