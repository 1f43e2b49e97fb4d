//! Service modules for the training worker

pub mod descriptor;
pub mod launcher;
pub mod retrieval;

pub use descriptor::{build_descriptor, JobDescriptor, TrainRequest, TrainingWindow, VariableRoles};
pub use launcher::{effective_parallelism, TrainOutcome, TrainerLauncher};
pub use retrieval::{list_runs, resolve_artifact, Resolution, RunNode};
