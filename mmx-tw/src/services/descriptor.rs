//! Job descriptor assembly and validation
//!
//! Turns a user-supplied training request into the self-contained document
//! handed to the external training process. Every constraint is checked
//! here; a request that fails validation never spawns a process.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use mmx_common::paths::{self, RunId};
use mmx_common::{Error, Result};

/// Training window: fraction of the input data or an explicit date range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrainingWindow {
    Fraction(f64),
    DateRange { start: NaiveDate, end: NaiveDate },
}

impl Default for TrainingWindow {
    fn default() -> Self {
        TrainingWindow::Fraction(1.0)
    }
}

/// Variable role assignments for the modeling library
///
/// A column may carry at most one role; overlap handling beyond that is the
/// modeling library's concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableRoles {
    #[serde(default)]
    pub paid_media: Vec<String>,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub factor: Vec<String>,
    #[serde(default)]
    pub organic: Vec<String>,
}

impl VariableRoles {
    fn role_assignments(&self) -> impl Iterator<Item = (&str, &String)> {
        self.paid_media
            .iter()
            .map(|c| ("paid_media", c))
            .chain(self.context.iter().map(|c| ("context", c)))
            .chain(self.factor.iter().map(|c| ("factor", c)))
            .chain(self.organic.iter().map(|c| ("organic", c)))
    }
}

/// User-supplied training request (from the web form)
#[derive(Debug, Clone, Deserialize)]
pub struct TrainRequest {
    pub segment: String,
    pub revision: String,
    pub iterations: u32,
    pub trials: u32,
    #[serde(default)]
    pub training_window: TrainingWindow,
    #[serde(default)]
    pub variables: VariableRoles,
    /// Already-staged input dataset; must exist before launch
    pub input_data_ref: PathBuf,
    #[serde(default)]
    pub annotation_file: Option<PathBuf>,
}

/// Self-contained description of one training invocation
///
/// A copy is persisted under the run prefix for reproducibility; otherwise
/// the document is ephemeral and discarded once the process has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub revision: String,
    pub segment: String,
    pub timestamp: String,
    pub iterations: u32,
    pub trials: u32,
    pub training_window: TrainingWindow,
    pub variables: VariableRoles,
    pub input_data_ref: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_file: Option<PathBuf>,
    /// Produced by the path codec, never user-supplied
    pub output_prefix: String,
}

impl JobDescriptor {
    pub fn run_id(&self) -> Result<RunId> {
        RunId::new(&self.revision, &self.segment, &self.timestamp)
    }
}

/// Validate a request and assemble the descriptor for a fresh run
///
/// The run timestamp is taken at build time, so the caller owns uniqueness
/// of `(revision, segment)` within one second of resolution.
pub fn build_descriptor(request: &TrainRequest) -> Result<JobDescriptor> {
    build_descriptor_at(request, &paths::timestamp_now())
}

/// As [`build_descriptor`], with an explicit timestamp (tests, replays)
pub fn build_descriptor_at(request: &TrainRequest, timestamp: &str) -> Result<JobDescriptor> {
    let run = RunId::new(&request.revision, &request.segment, timestamp)
        .map_err(|e| Error::Validation(e.to_string()))?;

    if request.iterations == 0 {
        return Err(Error::Validation("iterations must be positive".to_string()));
    }
    if request.trials == 0 {
        return Err(Error::Validation("trials must be positive".to_string()));
    }
    match request.training_window {
        TrainingWindow::Fraction(f) => {
            if !(f > 0.0 && f <= 1.0) {
                return Err(Error::Validation(format!(
                    "training window fraction must lie in (0, 1], got {}",
                    f
                )));
            }
        }
        TrainingWindow::DateRange { start, end } => {
            if start > end {
                return Err(Error::Validation(format!(
                    "training window start {} is after end {}",
                    start, end
                )));
            }
        }
    }

    let mut roles_by_column: HashMap<&String, &str> = HashMap::new();
    for (role, column) in request.variables.role_assignments() {
        if let Some(previous) = roles_by_column.insert(column, role) {
            return Err(Error::Validation(format!(
                "column {:?} assigned to both {} and {}",
                column, previous, role
            )));
        }
    }

    if !request.input_data_ref.is_file() {
        return Err(Error::Validation(format!(
            "input data not found or not a file: {}",
            request.input_data_ref.display()
        )));
    }
    if let Some(annotation) = &request.annotation_file {
        if !annotation.is_file() {
            return Err(Error::Validation(format!(
                "annotation file not found: {}",
                annotation.display()
            )));
        }
    }

    Ok(JobDescriptor {
        revision: request.revision.clone(),
        segment: request.segment.clone(),
        timestamp: timestamp.to_string(),
        iterations: request.iterations,
        trials: request.trials,
        training_window: request.training_window.clone(),
        variables: request.variables.clone(),
        input_data_ref: request.input_data_ref.clone(),
        annotation_file: request.annotation_file.clone(),
        output_prefix: run.prefix(),
    })
}
