// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk transport configuration file.
//!
//! This is a thin convenience layer over [`super::Configuration`]; it owns no
//! pipeline semantics of its own. Typically loaded once at process startup
//! from `~/.config/elastic-transport/config.yaml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Environment variable for overriding the config file path.
pub const ENV_TRANSPORT_CONFIG: &str = "ELASTIC_TRANSPORT_CONFIG";

/// Environment variable for overriding endpoints (comma-separated).
pub const ENV_TRANSPORT_ENDPOINTS: &str = "ELASTIC_TRANSPORT_ENDPOINTS";

/// The on-disk shape of transport configuration: endpoints, a handful of
/// hot-path timeouts, and the cloud-id/API-key pairing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TransportConfigFile {
    /// Control-plane endpoints (ignored when `cloud_id` is set).
    #[serde(default)]
    pub endpoints: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_timeout_secs: Option<u64>,

    #[serde(default)]
    pub disable_sniff: bool,

    #[serde(default)]
    pub disable_pings: bool,
}

impl TransportConfigFile {
    /// Load configuration from the default location (`~/.config/elastic-transport/config.yaml`),
    /// honoring [`ENV_TRANSPORT_CONFIG`].
    #[allow(clippy::result_large_err)]
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from_path(&path)
    }

    #[allow(clippy::result_large_err)]
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TransportError::Config(format!(
                "failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let mut config = Self::from_yaml(&content)?;
        if let Ok(endpoints) = std::env::var(ENV_TRANSPORT_ENDPOINTS) {
            config.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(config)
    }

    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TransportError::Config(format!("malformed config file: {e}")))
    }

    fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(ENV_TRANSPORT_CONFIG) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| TransportError::Config("could not determine home directory".to_string()))?;
        Ok(home.join(".config").join("elastic-transport").join("config.yaml"))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn ping_timeout(&self) -> Option<Duration> {
        self.ping_timeout_secs.map(Duration::from_secs)
    }
}
