//! Retrieval gateway: run listing and artifact resolution
//!
//! Read-only over the store. Listing groups keys into a navigable run tree
//! via the path codec; resolution produces either a signed URL or, under a
//! size guard, an inline base64 payload. The two forms are an explicit
//! tagged choice made once per request, never mixed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use mmx_common::paths::{self, MODEL_SUMMARY_FILE};
use mmx_common::store::{ArtifactStore, SignedUrl};
use mmx_common::{Error, Result};

/// One run and its artifacts, as shown in the results browser
#[derive(Debug, Clone, Serialize)]
pub struct RunNode {
    pub prefix: String,
    pub revision: String,
    pub segment: String,
    pub timestamp: String,
    /// Runs without a summary are shown distinctly, never hidden
    pub has_summary: bool,
    pub artifacts: Vec<String>,
}

/// Group every run key in the store into a run tree
///
/// Keys that do not decode against the run layout are ignored; optional
/// filters narrow by segment and revision.
pub fn list_runs(
    store: &dyn ArtifactStore,
    segment: Option<&str>,
    revision: Option<&str>,
) -> Result<Vec<RunNode>> {
    let mut grouped: BTreeMap<String, RunNode> = BTreeMap::new();
    for key in store.list(paths::RUN_ROOT)? {
        let Some(decoded) = paths::decode(&key) else {
            continue;
        };
        if segment.is_some_and(|s| s != decoded.run.segment) {
            continue;
        }
        if revision.is_some_and(|r| r != decoded.run.revision) {
            continue;
        }
        let node = grouped
            .entry(decoded.run.prefix())
            .or_insert_with(|| RunNode {
                prefix: decoded.run.prefix(),
                revision: decoded.run.revision.clone(),
                segment: decoded.run.segment.clone(),
                timestamp: decoded.run.timestamp.clone(),
                has_summary: false,
                artifacts: Vec::new(),
            });
        if let Some(artifact) = decoded.remainder {
            if artifact == MODEL_SUMMARY_FILE {
                node.has_summary = true;
            }
            node.artifacts.push(artifact);
        }
    }
    Ok(grouped.into_values().collect())
}

/// How a requested artifact is delivered to the caller
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Time-bounded link scoped to exactly this key
    Signed(SignedUrl),
    /// Small artifact returned through the serving process
    Inline {
        key: String,
        size: usize,
        content_base64: String,
    },
}

/// Resolve one artifact key to a delivery form
///
/// Signing is preferred; the inline fallback only engages when signing is
/// unavailable in this execution context, and only below `max_inline_bytes`
/// so large binaries never route through the web process.
pub fn resolve_artifact(
    store: &dyn ArtifactStore,
    key: &str,
    ttl: Duration,
    max_inline_bytes: usize,
) -> Result<Resolution> {
    match store.sign(key, ttl) {
        Ok(signed) => Ok(Resolution::Signed(signed)),
        Err(Error::SigningUnavailable(reason)) => {
            tracing::debug!(key = %key, reason = %reason, "signing unavailable, trying inline");
            let bytes = store.get(key)?;
            if bytes.len() > max_inline_bytes {
                return Err(Error::SigningUnavailable(format!(
                    "artifact is {} bytes, above the {} byte inline limit",
                    bytes.len(),
                    max_inline_bytes
                )));
            }
            Ok(Resolution::Inline {
                key: key.to_string(),
                size: bytes.len(),
                content_base64: BASE64.encode(bytes),
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmx_common::paths::RunId;
    use mmx_common::store::{FsArtifactStore, UrlSigner};

    #[test]
    fn test_list_runs_groups_and_flags_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        let with_summary = RunId::new("r100", "de", "0827_143022").unwrap();
        let without = RunId::new("r100", "de", "0828_090000").unwrap();
        store.put(&with_summary.artifact_key("fit.png"), b"png").unwrap();
        store.put(&with_summary.summary_key(), b"{}").unwrap();
        store.put(&without.artifact_key("fit.png"), b"png").unwrap();

        let runs = list_runs(&store, None, None).unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs[0].has_summary);
        assert_eq!(runs[0].artifacts, vec!["fit.png", "model_summary.json"]);
        assert!(!runs[1].has_summary);
    }

    #[test]
    fn test_list_runs_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        let de = RunId::new("r100", "de", "0827_143022").unwrap();
        let us = RunId::new("r101", "us", "0827_143022").unwrap();
        store.put(&de.artifact_key("a"), b"a").unwrap();
        store.put(&us.artifact_key("a"), b"a").unwrap();

        let runs = list_runs(&store, Some("us"), None).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].segment, "us");

        let runs = list_runs(&store, None, Some("r100")).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].revision, "r100");
    }

    #[test]
    fn test_resolve_prefers_signed_url() {
        let dir = tempfile::tempdir().unwrap();
        let signer = UrlSigner::new(b"secret".to_vec(), "http://localhost:5740");
        let store = FsArtifactStore::with_signer(dir.path(), signer).unwrap();
        store.put("robyn/r100/de/0827_143022/fit.png", b"png").unwrap();

        match resolve_artifact(
            &store,
            "robyn/r100/de/0827_143022/fit.png",
            Duration::from_secs(60),
            1024,
        )
        .unwrap()
        {
            Resolution::Signed(signed) => assert!(signed.url.contains("token=")),
            Resolution::Inline { .. } => panic!("expected signed URL"),
        }
    }

    #[test]
    fn test_resolve_falls_back_to_inline_under_size_guard() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        store.put("robyn/r100/de/0827_143022/fit.png", b"png").unwrap();

        match resolve_artifact(
            &store,
            "robyn/r100/de/0827_143022/fit.png",
            Duration::from_secs(60),
            1024,
        )
        .unwrap()
        {
            Resolution::Inline {
                size,
                content_base64,
                ..
            } => {
                assert_eq!(size, 3);
                assert_eq!(BASE64.decode(content_base64).unwrap(), b"png");
            }
            Resolution::Signed(_) => panic!("expected inline fallback"),
        }
    }

    #[test]
    fn test_inline_fallback_refuses_large_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        store
            .put("robyn/r100/de/0827_143022/model.bin", &[0u8; 2048])
            .unwrap();

        match resolve_artifact(
            &store,
            "robyn/r100/de/0827_143022/model.bin",
            Duration::from_secs(60),
            1024,
        ) {
            Err(Error::SigningUnavailable(msg)) => assert!(msg.contains("inline limit")),
            other => panic!("expected SigningUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let signer = UrlSigner::new(b"secret".to_vec(), "http://localhost:5740");
        let store = FsArtifactStore::with_signer(dir.path(), signer).unwrap();

        match resolve_artifact(
            &store,
            "robyn/r100/de/0827_143022/missing.png",
            Duration::from_secs(60),
            1024,
        ) {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
