//! Per-segment summary aggregation
//!
//! Rebuilds `aggregated/{segment}/summary.json` wholesale from the model
//! summaries currently in the store. Partial updates are deliberately not
//! supported; the aggregate always reflects the full current summary set,
//! and a segment with zero summaries still gets an explicit empty aggregate.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::paths::{self, MODEL_SUMMARY_FILE};
use crate::store::ArtifactStore;
use crate::summary::{AggregatedEntry, AggregatedSummary, ModelSummary};
use crate::Result;

/// Rebuild and write the aggregate for one segment
///
/// A summary that fails to parse is logged and excluded rather than failing
/// the whole aggregate.
pub fn aggregate_segment(store: &dyn ArtifactStore, segment: &str) -> Result<AggregatedSummary> {
    let mut entries = Vec::new();
    for key in store.list(paths::RUN_ROOT)? {
        let Some(decoded) = paths::decode(&key) else {
            continue;
        };
        if decoded.run.segment != segment
            || decoded.remainder.as_deref() != Some(MODEL_SUMMARY_FILE)
        {
            continue;
        }
        let bytes = store.get(&key)?;
        match serde_json::from_slice::<ModelSummary>(&bytes) {
            Ok(summary) => entries.push(AggregatedEntry {
                run_prefix: decoded.run.prefix(),
                summary,
            }),
            Err(e) => warn!(key = %key, error = %e, "unreadable summary excluded from aggregate"),
        }
    }

    let aggregate = AggregatedSummary::build(segment, entries);
    store.put(
        &paths::aggregate_key(segment)?,
        &serde_json::to_vec_pretty(&aggregate)?,
    )?;
    info!(
        segment = %segment,
        runs = aggregate.run_count,
        status = ?aggregate.status,
        "aggregate written"
    );
    Ok(aggregate)
}

/// Every segment that has at least one run prefix in the store
pub fn segments_present(store: &dyn ArtifactStore) -> Result<BTreeSet<String>> {
    let mut segments = BTreeSet::new();
    for key in store.list(paths::RUN_ROOT)? {
        if let Some(decoded) = paths::decode(&key) {
            segments.insert(decoded.run.segment);
        }
    }
    Ok(segments)
}
