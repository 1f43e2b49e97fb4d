//! Backfill sweep over stored runs
//!
//! Generates missing model summaries for historical runs and rebuilds the
//! per-segment aggregates. The sweep is idempotent and safe to re-run on
//! every deployment: existing summaries short-circuit, and each run is
//! processed independently so one bad run never aborts the rest.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

use mmx_common::aggregate::aggregate_segment;
use mmx_common::extract::{extract_summary, ExtractOutcome};
use mmx_common::paths::{self, RunId};
use mmx_common::store::ArtifactStore;
use mmx_common::Result;

/// Sweep scope and behavior flags
#[derive(Debug, Default, Clone)]
pub struct SweepOptions {
    pub segment: Option<String>,
    pub revision: Option<String>,
    /// Regenerate summaries even when already present
    pub force: bool,
    /// Skip extraction entirely, only rebuild aggregates
    pub aggregate_only: bool,
}

impl SweepOptions {
    fn matches(&self, run: &RunId) -> bool {
        self.segment.as_ref().map_or(true, |s| *s == run.segment)
            && self.revision.as_ref().map_or(true, |r| *r == run.revision)
    }
}

/// One per-run failure collected during a sweep
#[derive(Debug, Serialize)]
pub struct RunFailure {
    pub run_prefix: String,
    pub error: String,
}

/// End-of-sweep tally
#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub runs_seen: usize,
    pub summaries_written: usize,
    pub summaries_skipped: usize,
    pub aggregates_written: usize,
    pub failures: Vec<RunFailure>,
}

/// Every run in the store matching the sweep scope, in stable order
pub fn discover_runs(store: &dyn ArtifactStore, opts: &SweepOptions) -> Result<BTreeSet<RunId>> {
    let mut runs = BTreeSet::new();
    for key in store.list(paths::RUN_ROOT)? {
        if let Some(decoded) = paths::decode(&key) {
            if opts.matches(&decoded.run) {
                runs.insert(decoded.run);
            }
        }
    }
    Ok(runs)
}

/// Run one backfill/aggregation sweep
///
/// Per-run extraction failures are collected into the report, never
/// propagated; only a store-level setup failure returns `Err`.
pub fn run_sweep(store: &dyn ArtifactStore, opts: &SweepOptions) -> Result<SweepReport> {
    let runs = discover_runs(store, opts)?;
    let mut report = SweepReport {
        runs_seen: runs.len(),
        ..SweepReport::default()
    };

    if !opts.aggregate_only {
        for run in &runs {
            match extract_summary(store, run, opts.force) {
                Ok(ExtractOutcome::Written(_)) => report.summaries_written += 1,
                Ok(ExtractOutcome::Skipped) => report.summaries_skipped += 1,
                Err(e) => {
                    warn!(run = %run, error = %e, "run failed during sweep");
                    report.failures.push(RunFailure {
                        run_prefix: run.prefix(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    // An explicitly requested segment gets its aggregate rebuilt even when
    // no runs matched, so an emptied segment cannot keep a stale rollup.
    let segments: BTreeSet<String> = match &opts.segment {
        Some(segment) => BTreeSet::from([segment.clone()]),
        None => runs.iter().map(|r| r.segment.clone()).collect(),
    };
    for segment in segments {
        match aggregate_segment(store, &segment) {
            Ok(_) => report.aggregates_written += 1,
            Err(e) => {
                warn!(segment = %segment, error = %e, "aggregation failed during sweep");
                report.failures.push(RunFailure {
                    run_prefix: format!("{}/{}", paths::AGGREGATE_ROOT, segment),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        runs = report.runs_seen,
        written = report.summaries_written,
        skipped = report.summaries_skipped,
        aggregates = report.aggregates_written,
        failures = report.failures.len(),
        "sweep complete"
    );
    Ok(report)
}

/// Dry-run diagnostics for one run prefix (`--test-run`)
#[derive(Debug, Serialize)]
pub struct TestRunReport {
    pub prefix: String,
    /// Whether the prefix parses as a bare run prefix
    pub valid: bool,
    pub model_output_present: bool,
    pub summary_present: bool,
}

/// Report on a candidate run prefix without mutating anything
pub fn test_run(store: &dyn ArtifactStore, prefix: &str) -> Result<TestRunReport> {
    let run = match paths::decode(prefix) {
        Some(decoded) if decoded.remainder.is_none() => decoded.run,
        _ => {
            return Ok(TestRunReport {
                prefix: prefix.to_string(),
                valid: false,
                model_output_present: false,
                summary_present: false,
            })
        }
    };
    Ok(TestRunReport {
        prefix: prefix.to_string(),
        valid: true,
        model_output_present: store.exists(&run.model_output_key())?,
        summary_present: store.exists(&run.summary_key())?,
    })
}
