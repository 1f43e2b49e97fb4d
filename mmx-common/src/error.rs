//! Common error types for MMX

use thiserror::Error;

/// Common result type for MMX operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the MMX services
#[derive(Error, Debug)]
pub enum Error {
    /// Job configuration rejected before any process was spawned
    #[error("Validation error: {0}")]
    Validation(String),

    /// Training subprocess could not be started at all
    #[error("Launch error: {0}")]
    Launch(String),

    /// Storage key does not follow the run key convention
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Expected run artifact absent from the store
    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    /// Artifact present but unreadable or malformed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Signed-URL issuance not possible in this execution context
    #[error("Signing unavailable: {0}")]
    SigningUnavailable(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
