//! # MMX Common Library
//!
//! Shared code for the MMX training services including:
//! - Canonical object-storage key layout for runs
//! - Artifact store abstraction and filesystem backend
//! - Signed-URL issuance and verification
//! - Model summary schema and best-model selection
//! - Summary extraction and per-segment aggregation
//! - Configuration loading

pub mod aggregate;
pub mod config;
pub mod error;
pub mod extract;
pub mod paths;
pub mod store;
pub mod summary;

pub use error::{Error, Result};
pub use paths::RunId;
