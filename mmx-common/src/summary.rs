//! Model summary schema and best-model selection
//!
//! The training process writes `model_output.json` with the full candidate
//! model list; this module distills it into the small `model_summary.json`
//! document and the per-segment aggregate. Selection is deterministic so
//! re-extraction over unchanged artifacts is byte-identical.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Parsed primary model artifact (`model_output.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCollection {
    pub revision: String,
    pub segment: String,
    pub timestamp: String,
    pub iterations: u32,
    pub trials: u32,
    pub models: Vec<CandidateModel>,
}

/// One candidate model produced by the hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateModel {
    pub id: String,
    /// Normalized root-mean-square error (fit)
    pub nrmse: f64,
    /// Decomposition distance (business plausibility)
    pub decomp_rssd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mape: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsq_train: Option<f64>,
}

impl CandidateModel {
    /// Combined error used for ranking
    pub fn combined_error(&self) -> f64 {
        self.nrmse + self.decomp_rssd
    }
}

/// Pick the best candidate: lowest combined error, ties broken by lowest
/// list index. `total_cmp` keeps NaN scores ordered after real ones, so the
/// result never depends on iteration quirks.
pub fn select_best(models: &[CandidateModel]) -> Option<(usize, &CandidateModel)> {
    let mut best: Option<(usize, &CandidateModel)> = None;
    for (idx, model) in models.iter().enumerate() {
        match best {
            Some((_, current))
                if model
                    .combined_error()
                    .total_cmp(&current.combined_error())
                    .is_lt() =>
            {
                best = Some((idx, model));
            }
            None => best = Some((idx, model)),
            _ => {}
        }
    }
    best
}

/// Derived per-run summary (`model_summary.json`)
///
/// A pure function of the run's primary artifact; field order is the
/// serialization order, so regeneration reproduces the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub revision: String,
    pub segment: String,
    pub timestamp: String,
    pub best_model_id: String,
    pub nrmse: f64,
    pub decomp_rssd: f64,
    pub combined_error: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mape: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsq_train: Option<f64>,
    pub model_count: usize,
    pub iterations: u32,
    pub trials: u32,
}

impl ModelSummary {
    /// Distill a model collection into its summary
    pub fn from_collection(collection: &ModelCollection) -> Result<Self> {
        let (_, best) = select_best(&collection.models).ok_or_else(|| {
            Error::Extraction(format!(
                "model output for {}/{}/{} contains no candidate models",
                collection.revision, collection.segment, collection.timestamp
            ))
        })?;
        Ok(Self {
            revision: collection.revision.clone(),
            segment: collection.segment.clone(),
            timestamp: collection.timestamp.clone(),
            best_model_id: best.id.clone(),
            nrmse: best.nrmse,
            decomp_rssd: best.decomp_rssd,
            combined_error: best.combined_error(),
            mape: best.mape,
            rsq_train: best.rsq_train,
            model_count: collection.models.len(),
            iterations: collection.iterations,
            trials: collection.trials,
        })
    }

    /// Canonical serialized form written to the store
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Status of a per-segment aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    Ok,
    /// No summaries existed under the segment at aggregation time
    Empty,
}

/// One run entry inside an aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedEntry {
    pub run_prefix: String,
    #[serde(flatten)]
    pub summary: ModelSummary,
}

/// Per-segment rollup (`aggregated/{segment}/summary.json`)
///
/// Always rebuilt wholesale from the current summary set; never patched
/// incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedSummary {
    pub segment: String,
    pub status: AggregateStatus,
    pub run_count: usize,
    /// Prefix of the run with the lowest combined error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_run: Option<String>,
    pub runs: Vec<AggregatedEntry>,
    pub generated_at: DateTime<Utc>,
}

impl AggregatedSummary {
    /// Build an aggregate from the summaries currently present
    ///
    /// Entries are ordered by run prefix so the document does not depend on
    /// enumeration order; the best-run pointer uses the same combined-error
    /// rule as per-run selection, ties broken by lexically first prefix.
    pub fn build(segment: &str, mut entries: Vec<AggregatedEntry>) -> Self {
        entries.sort_by(|a, b| a.run_prefix.cmp(&b.run_prefix));
        let best_run = entries
            .iter()
            .min_by(|a, b| {
                a.summary
                    .combined_error
                    .total_cmp(&b.summary.combined_error)
                    .then_with(|| a.run_prefix.cmp(&b.run_prefix))
            })
            .map(|e| e.run_prefix.clone());
        let status = if entries.is_empty() {
            AggregateStatus::Empty
        } else {
            AggregateStatus::Ok
        };
        Self {
            segment: segment.to_string(),
            status,
            run_count: entries.len(),
            best_run,
            runs: entries,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, nrmse: f64, decomp_rssd: f64) -> CandidateModel {
        CandidateModel {
            id: id.to_string(),
            nrmse,
            decomp_rssd,
            mape: None,
            rsq_train: None,
        }
    }

    fn collection(models: Vec<CandidateModel>) -> ModelCollection {
        ModelCollection {
            revision: "r100".to_string(),
            segment: "de".to_string(),
            timestamp: "0827_143022".to_string(),
            iterations: 2000,
            trials: 5,
            models,
        }
    }

    #[test]
    fn test_select_best_lowest_combined_error() {
        let models = vec![
            model("1_10_2", 0.30, 0.20),
            model("2_44_1", 0.10, 0.15),
            model("3_07_5", 0.40, 0.01),
        ];
        let (idx, best) = select_best(&models).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(best.id, "2_44_1");
    }

    #[test]
    fn test_select_best_tie_breaks_on_lowest_index() {
        let models = vec![
            model("first", 0.10, 0.10),
            model("second", 0.10, 0.10),
            model("third", 0.15, 0.05),
        ];
        let (idx, best) = select_best(&models).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(best.id, "first");
    }

    #[test]
    fn test_select_best_nan_never_wins() {
        let models = vec![model("nan", f64::NAN, 0.0), model("real", 0.9, 0.9)];
        let (_, best) = select_best(&models).unwrap();
        assert_eq!(best.id, "real");
    }

    #[test]
    fn test_select_best_empty_is_none() {
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn test_summary_serialization_is_deterministic() {
        let c = collection(vec![model("1_10_2", 0.2, 0.1), model("2_44_1", 0.3, 0.3)]);
        let a = ModelSummary::from_collection(&c).unwrap();
        let b = ModelSummary::from_collection(&c).unwrap();
        assert_eq!(
            a.to_canonical_json().unwrap(),
            b.to_canonical_json().unwrap()
        );
    }

    #[test]
    fn test_summary_from_empty_collection_fails() {
        let c = collection(vec![]);
        match ModelSummary::from_collection(&c) {
            Err(crate::Error::Extraction(_)) => {}
            other => panic!("expected Extraction error, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_best_run_is_order_independent() {
        let entry = |prefix: &str, score: f64| AggregatedEntry {
            run_prefix: prefix.to_string(),
            summary: ModelSummary {
                revision: "r100".to_string(),
                segment: "de".to_string(),
                timestamp: "0827_143022".to_string(),
                best_model_id: "m".to_string(),
                nrmse: score,
                decomp_rssd: 0.0,
                combined_error: score,
                mape: None,
                rsq_train: None,
                model_count: 1,
                iterations: 100,
                trials: 1,
            },
        };
        let forward = AggregatedSummary::build(
            "de",
            vec![entry("robyn/r100/de/a", 0.8), entry("robyn/r100/de/b", 0.6)],
        );
        let reverse = AggregatedSummary::build(
            "de",
            vec![entry("robyn/r100/de/b", 0.6), entry("robyn/r100/de/a", 0.8)],
        );
        assert_eq!(forward.best_run.as_deref(), Some("robyn/r100/de/b"));
        assert_eq!(forward.best_run, reverse.best_run);
        assert_eq!(forward.status, AggregateStatus::Ok);
    }

    #[test]
    fn test_empty_aggregate_is_marked_empty() {
        let agg = AggregatedSummary::build("de", vec![]);
        assert_eq!(agg.status, AggregateStatus::Empty);
        assert_eq!(agg.run_count, 0);
        assert!(agg.best_run.is_none());
        assert!(agg.runs.is_empty());
    }
}
