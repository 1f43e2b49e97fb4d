//! Key-addressed artifact store abstraction
//!
//! Every component reads and writes run artifacts through [`ArtifactStore`];
//! nothing outside this module touches a concrete backend, so the backend can
//! be swapped without changing orchestration code.

mod fs;

pub use fs::FsArtifactStore;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::{Error, Result};

/// Time-bounded, read-only link to exactly one storage key
#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Object storage interface
///
/// Writes are whole-object only. `list` returns keys in a stable sorted
/// order so callers can reconstruct the run directory structure without a
/// separate index.
pub trait ArtifactStore: Send + Sync {
    /// Write an object, replacing any previous content at `key`
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the full content of an object
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// All keys under `prefix`, sorted lexicographically
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Whether an object exists at `key`
    fn exists(&self, key: &str) -> Result<bool>;

    /// Issue a short-lived signed URL for an existing object
    ///
    /// Fails with `NotFound` for a missing key and `SigningUnavailable`
    /// when the backend has no signing capability configured.
    fn sign(&self, key: &str, ttl: Duration) -> Result<SignedUrl>;

    /// Verify a signed-request token for `key` against its expiry
    fn verify(&self, key: &str, expires_unix: i64, token: &str) -> Result<bool>;
}

/// Token issuer for signed URLs
///
/// The token binds the key and expiry to the service secret; the serving
/// route recomputes it and compares.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base_url: String,
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>, base_url: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Generate a random secret for a single service lifetime
    ///
    /// URLs signed with it stop verifying after a restart, which is
    /// acceptable for short TTLs.
    pub fn ephemeral_secret() -> Vec<u8> {
        use rand::RngCore;
        let mut secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        secret
    }

    pub fn token(&self, key: &str, expires_unix: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(expires_unix.to_le_bytes());
        hex::encode(hasher.finalize())
    }

    /// Build the signed URL for a validated key
    ///
    /// The key is interpolated verbatim, which is safe because
    /// [`validate_key`] restricts keys to URL-safe bytes; callers must
    /// validate before signing.
    pub fn sign(&self, key: &str, ttl: Duration) -> SignedUrl {
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        let expires_unix = expires_at.timestamp();
        let token = self.token(key, expires_unix);
        SignedUrl {
            url: format!(
                "{}/signed/{}?expires={}&token={}",
                self.base_url, key, expires_unix, token
            ),
            expires_at,
        }
    }

    /// Check token match and expiry; expired links verify as false
    pub fn verify(&self, key: &str, expires_unix: i64, token: &str) -> bool {
        if expires_unix < Utc::now().timestamp() {
            return false;
        }
        let expected = self.token(key, expires_unix);
        constant_time_eq(expected.as_bytes(), token.as_bytes())
    }
}

/// Token comparison that does not leak the first mismatching byte through
/// timing. Length is not secret.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Validate a storage key before it reaches any backend
///
/// Keys are relative, `/`-separated, with no empty or dot components, and
/// every component is restricted to URL-safe bytes. This is both the
/// traversal guard for filesystem-backed stores and what lets [`UrlSigner`]
/// embed keys in URLs without escaping.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("empty key".to_string()));
    }
    for part in key.split(crate::paths::SEP) {
        if !crate::paths::is_valid_field(part) {
            return Err(Error::InvalidKey(format!(
                "bad component {:?} in key {:?}",
                part, key
            )));
        }
    }
    Ok(())
}
