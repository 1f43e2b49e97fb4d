//! Filesystem-backed artifact store
//!
//! Maps storage keys onto a root directory. Writes go through a temp file
//! and rename so a crashed writer never leaves a partial object behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use walkdir::WalkDir;

use crate::{Error, Result};

use super::{validate_key, ArtifactStore, SignedUrl, UrlSigner};

/// Artifact store rooted at a local directory
pub struct FsArtifactStore {
    root: PathBuf,
    signer: Option<UrlSigner>,
}

impl FsArtifactStore {
    /// Open a store without signing capability
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, signer: None })
    }

    /// Open a store that can issue signed URLs
    pub fn with_signer(root: impl Into<PathBuf>, signer: UrlSigner) -> Result<Self> {
        let mut store = Self::new(root)?;
        store.signer = Some(signer);
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        let mut path = self.root.clone();
        for part in key.split(crate::paths::SEP) {
            path.push(part);
        }
        Ok(path)
    }

    /// Prefix may name a directory level, so it gets the same component
    /// validation as a full key but may be empty (list everything).
    fn prefix_path(&self, prefix: &str) -> Result<PathBuf> {
        if prefix.is_empty() {
            return Ok(self.root.clone());
        }
        self.key_path(prefix)
    }
}

/// Staging name for an in-flight write of `name`
///
/// Unique per call so concurrent writes to keys sharing a directory (or a
/// stem, like `fit.png` and `fit.json`) never stage through the same file.
fn staging_name(name: &str) -> String {
    format!(".{}.{:08x}.tmp", name, rand::random::<u32>())
}

/// Whether a directory entry is a staging file left by `put`
///
/// A crashed writer can leave one behind; `list` must not surface it as an
/// artifact.
fn is_staging_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidKey(format!("key has no object name: {:?}", key)))?;
        let tmp = path.with_file_name(staging_name(name));
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        tracing::debug!(key = %key, bytes = bytes.len(), "artifact written");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.key_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.prefix_path(prefix)?;
        if !base.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&base).follow_links(false) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_str().map_or(true, is_staging_name) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| Error::InvalidKey(e.to_string()))?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            // Foreign files with names a key cannot express are invisible to
            // the store rather than unservable entries in a listing.
            if validate_key(&key).is_err() {
                continue;
            }
            keys.push(key);
        }
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.key_path(key)?.is_file())
    }

    fn sign(&self, key: &str, ttl: Duration) -> Result<SignedUrl> {
        if !self.exists(key)? {
            return Err(Error::NotFound(key.to_string()));
        }
        let signer = self.signer.as_ref().ok_or_else(|| {
            Error::SigningUnavailable("no signing secret configured".to_string())
        })?;
        Ok(signer.sign(key, ttl))
    }

    fn verify(&self, key: &str, expires_unix: i64, token: &str) -> Result<bool> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            Error::SigningUnavailable("no signing secret configured".to_string())
        })?;
        Ok(signer.verify(key, expires_unix, token))
    }
}
