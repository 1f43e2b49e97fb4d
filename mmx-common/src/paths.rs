//! Canonical object-storage key layout for training runs
//!
//! Every run lives under `robyn/{revision}/{segment}/{timestamp}/` and every
//! component builds and parses keys through this module. Nothing else in the
//! workspace concatenates run keys by hand.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Root prefix for all run keys
pub const RUN_ROOT: &str = "robyn";

/// Root prefix for per-segment aggregate documents
pub const AGGREGATE_ROOT: &str = "aggregated";

/// Primary model artifact written by the training process
pub const MODEL_OUTPUT_FILE: &str = "model_output.json";

/// Derived per-run summary document
pub const MODEL_SUMMARY_FILE: &str = "model_summary.json";

/// Reproducibility copy of the job descriptor
pub const JOB_DESCRIPTOR_FILE: &str = "job_descriptor.json";

/// Captured combined stdout/stderr of the training process
pub const TRAINING_LOG_FILE: &str = "training.log";

/// Key separator (keys are storage keys, never native paths)
pub const SEP: char = '/';

/// Identity of one training run: `(revision, segment, timestamp)`
///
/// The tuple is globally unique per invocation and immutable once any
/// artifact has been written under its prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId {
    pub revision: String,
    pub segment: String,
    pub timestamp: String,
}

impl RunId {
    /// Create a run identity, validating every field
    pub fn new(revision: &str, segment: &str, timestamp: &str) -> Result<Self> {
        if !is_valid_field(revision) {
            return Err(Error::InvalidKey(format!("bad revision: {:?}", revision)));
        }
        if !is_valid_field(segment) {
            return Err(Error::InvalidKey(format!("bad segment: {:?}", segment)));
        }
        if !is_valid_timestamp(timestamp) {
            return Err(Error::InvalidKey(format!("bad timestamp: {:?}", timestamp)));
        }
        Ok(Self {
            revision: revision.to_string(),
            segment: segment.to_string(),
            timestamp: timestamp.to_string(),
        })
    }

    /// Canonical key prefix: `robyn/{revision}/{segment}/{timestamp}`
    pub fn prefix(&self) -> String {
        format!(
            "{}{SEP}{}{SEP}{}{SEP}{}",
            RUN_ROOT, self.revision, self.segment, self.timestamp
        )
    }

    /// Key of a named artifact under this run
    pub fn artifact_key(&self, name: &str) -> String {
        format!("{}{SEP}{}", self.prefix(), name)
    }

    /// Key of the primary model artifact
    pub fn model_output_key(&self) -> String {
        self.artifact_key(MODEL_OUTPUT_FILE)
    }

    /// Key of the derived summary document
    pub fn summary_key(&self) -> String {
        self.artifact_key(MODEL_SUMMARY_FILE)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// A key successfully parsed against the run layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    pub run: RunId,
    /// Artifact path below the run prefix, `None` for a bare run prefix
    pub remainder: Option<String>,
}

/// Encode a run key prefix from its identity fields
///
/// Fails on any field that would break the fixed segment layout.
pub fn encode(revision: &str, segment: &str, timestamp: &str) -> Result<String> {
    Ok(RunId::new(revision, segment, timestamp)?.prefix())
}

/// Parse a key or key prefix against the run layout
///
/// Returns `None` for anything that is not rooted at `robyn/`, has the wrong
/// segment count, contains an empty segment, or carries a malformed
/// timestamp. A malformed key must never group into a run.
pub fn decode(key: &str) -> Option<DecodedKey> {
    let mut parts = key.split(SEP);
    if parts.next()? != RUN_ROOT {
        return None;
    }
    let revision = parts.next()?;
    let segment = parts.next()?;
    let timestamp = parts.next()?;
    let run = RunId::new(revision, segment, timestamp).ok()?;

    let rest: Vec<&str> = parts.collect();
    if rest.iter().any(|s| s.is_empty()) {
        return None;
    }
    let remainder = if rest.is_empty() {
        None
    } else {
        Some(rest.join("/"))
    };
    Some(DecodedKey { run, remainder })
}

/// Validate a single key field (revision, segment, or artifact-name component)
///
/// Non-empty, not a relative-path component, and limited to URL-safe bytes
/// (ASCII alphanumeric plus `-._~`). The charset restriction means any
/// validated key can be embedded verbatim in a signed URL.
pub fn is_valid_field(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

/// Validate the run timestamp against the fixed `MMDD_HHMMSS` lexical shape
pub fn is_valid_timestamp(ts: &str) -> bool {
    let b = ts.as_bytes();
    b.len() == 11
        && b[4] == b'_'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || c.is_ascii_digit())
}

/// Current UTC time in run-timestamp form (second resolution)
pub fn timestamp_now() -> String {
    chrono::Utc::now().format("%m%d_%H%M%S").to_string()
}

/// Aggregate document key for a segment: `aggregated/{segment}/summary.json`
pub fn aggregate_key(segment: &str) -> Result<String> {
    if !is_valid_field(segment) {
        return Err(Error::InvalidKey(format!("bad segment: {:?}", segment)));
    }
    Ok(format!("{AGGREGATE_ROOT}{SEP}{segment}{SEP}summary.json"))
}
