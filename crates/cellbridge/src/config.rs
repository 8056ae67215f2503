//! Bridge configuration.
//!
//! ```yaml
//! limits:
//!   max_cells: 16384
//!   max_roots: 16
//!   max_depth: 8
//! log:
//!   level: info
//!   json: false
//!   components: {}
//! ```

use std::path::Path;

use cellbridge_core::DecodeLimits;
use cellbridge_observability::LogConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level configuration. Every field has a default, so an empty document
/// is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Resource bounds applied while decoding untrusted blobs
    #[serde(default)]
    pub limits: DecodeLimits,
    /// Logging, consumed by binaries via `init_tracing`
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // an empty YAML document deserializes as unit, not as an empty map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }
}
