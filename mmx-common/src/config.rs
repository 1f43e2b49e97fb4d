//! Configuration loading and resolution
//!
//! Resolution priority per setting: environment variable, then TOML config
//! file, then compiled default. Environment variables use the `MMX_` prefix.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{Error, Result};

/// Shared configuration for the MMX services
#[derive(Debug, Clone)]
pub struct MmxConfig {
    /// Root directory backing the artifact store
    pub storage_root: PathBuf,
    /// Bind address for the training worker HTTP service
    pub bind_address: String,
    pub port: u16,
    /// External training binary invoked per job
    pub trainer_binary: String,
    /// Per-job wall-clock limit before the subprocess is terminated
    pub training_timeout_secs: u64,
    /// Nominally requested core count, checked against effective parallelism
    pub requested_cores: Option<usize>,
    /// Secret for signed-URL tokens; a random one is generated when absent
    pub signing_secret: Option<String>,
    /// Base URL signed links are issued under
    pub public_base_url: Option<String>,
    /// Largest artifact served inline when signing is unavailable
    pub max_inline_bytes: usize,
    /// Signed-URL lifetime
    pub signed_url_ttl_secs: u64,
}

impl Default for MmxConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            bind_address: "127.0.0.1".to_string(),
            port: 5740,
            trainer_binary: "mmx-robyn-runner".to_string(),
            training_timeout_secs: 3600,
            requested_cores: None,
            signing_secret: None,
            public_base_url: None,
            max_inline_bytes: 1024 * 1024,
            signed_url_ttl_secs: 600,
        }
    }
}

/// TOML file shape (all fields optional, defaults fill the gaps)
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub storage_root: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub trainer_binary: Option<String>,
    pub training_timeout_secs: Option<u64>,
    pub requested_cores: Option<usize>,
    pub signing_secret: Option<String>,
    pub public_base_url: Option<String>,
    pub max_inline_bytes: Option<usize>,
    pub signed_url_ttl_secs: Option<u64>,
}

impl MmxConfig {
    /// Load configuration with env > TOML > default resolution
    pub fn load() -> Result<Self> {
        let toml_config = match config_file_path() {
            Some(path) if path.exists() => read_toml_config(&path)?,
            _ => TomlConfig::default(),
        };
        Ok(Self::resolve(toml_config))
    }

    /// Apply one TOML layer plus environment overrides onto the defaults
    pub fn resolve(toml: TomlConfig) -> Self {
        let defaults = Self::default();
        let mut config = Self {
            storage_root: toml.storage_root.unwrap_or(defaults.storage_root),
            bind_address: toml.bind_address.unwrap_or(defaults.bind_address),
            port: toml.port.unwrap_or(defaults.port),
            trainer_binary: toml.trainer_binary.unwrap_or(defaults.trainer_binary),
            training_timeout_secs: toml
                .training_timeout_secs
                .unwrap_or(defaults.training_timeout_secs),
            requested_cores: toml.requested_cores.or(defaults.requested_cores),
            signing_secret: toml.signing_secret.or(defaults.signing_secret),
            public_base_url: toml.public_base_url.or(defaults.public_base_url),
            max_inline_bytes: toml.max_inline_bytes.unwrap_or(defaults.max_inline_bytes),
            signed_url_ttl_secs: toml
                .signed_url_ttl_secs
                .unwrap_or(defaults.signed_url_ttl_secs),
        };

        if let Ok(v) = std::env::var("MMX_STORAGE_ROOT") {
            config.storage_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MMX_BIND_ADDRESS") {
            config.bind_address = v;
        }
        if let Ok(v) = std::env::var("MMX_PORT") {
            match v.parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!("Ignoring unparseable MMX_PORT value: {}", v),
            }
        }
        if let Ok(v) = std::env::var("MMX_TRAINER_BINARY") {
            config.trainer_binary = v;
        }
        if let Ok(v) = std::env::var("MMX_TRAINING_TIMEOUT_SECS") {
            match v.parse() {
                Ok(secs) => config.training_timeout_secs = secs,
                Err(_) => warn!("Ignoring unparseable MMX_TRAINING_TIMEOUT_SECS value: {}", v),
            }
        }
        if let Ok(v) = std::env::var("MMX_REQUESTED_CORES") {
            match v.parse() {
                Ok(cores) => config.requested_cores = Some(cores),
                Err(_) => warn!("Ignoring unparseable MMX_REQUESTED_CORES value: {}", v),
            }
        }
        if let Ok(v) = std::env::var("MMX_SIGNING_SECRET") {
            config.signing_secret = Some(v);
        }
        if let Ok(v) = std::env::var("MMX_PUBLIC_BASE_URL") {
            config.public_base_url = Some(v);
        }
        if let Ok(v) = std::env::var("MMX_MAX_INLINE_BYTES") {
            match v.parse() {
                Ok(bytes) => config.max_inline_bytes = bytes,
                Err(_) => warn!("Ignoring unparseable MMX_MAX_INLINE_BYTES value: {}", v),
            }
        }
        if let Ok(v) = std::env::var("MMX_SIGNED_URL_TTL_SECS") {
            match v.parse() {
                Ok(secs) => config.signed_url_ttl_secs = secs,
                Err(_) => warn!("Ignoring unparseable MMX_SIGNED_URL_TTL_SECS value: {}", v),
            }
        }

        config
    }

    /// Base URL for signed links, derived from the bind address when not
    /// explicitly configured.
    pub fn effective_base_url(&self) -> String {
        self.public_base_url.clone().unwrap_or_else(|| {
            format!("http://{}:{}", self.bind_address, self.port)
        })
    }
}

/// Config file location: `MMX_CONFIG` override, else `~/.config/mmx/mmx.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MMX_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("mmx").join("mmx.toml"))
}

fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))
}

fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mmx").join("artifacts"))
        .unwrap_or_else(|| PathBuf::from("./mmx_artifacts"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_empty_toml() {
        let config = MmxConfig::resolve(TomlConfig::default());
        assert_eq!(config.port, 5740);
        assert_eq!(config.trainer_binary, "mmx-robyn-runner");
        assert_eq!(config.max_inline_bytes, 1024 * 1024);
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let toml: TomlConfig = toml::from_str(
            r#"
            port = 6000
            trainer_binary = "/opt/robyn/run.sh"
            training_timeout_secs = 120
            "#,
        )
        .unwrap();
        let config = MmxConfig::resolve(toml);
        assert_eq!(config.port, 6000);
        assert_eq!(config.trainer_binary, "/opt/robyn/run.sh");
        assert_eq!(config.training_timeout_secs, 120);
    }

    #[test]
    fn test_signed_url_ttl_env_override() {
        std::env::set_var("MMX_SIGNED_URL_TTL_SECS", "90");
        let config = MmxConfig::resolve(TomlConfig::default());
        std::env::remove_var("MMX_SIGNED_URL_TTL_SECS");
        assert_eq!(config.signed_url_ttl_secs, 90);
    }

    #[test]
    fn test_effective_base_url_falls_back_to_bind() {
        let config = MmxConfig::resolve(TomlConfig::default());
        assert_eq!(config.effective_base_url(), "http://127.0.0.1:5740");

        let toml: TomlConfig = toml::from_str(
            r#"public_base_url = "https://results.example.com""#,
        )
        .unwrap();
        let config = MmxConfig::resolve(toml);
        assert_eq!(config.effective_base_url(), "https://results.example.com");
    }
}
