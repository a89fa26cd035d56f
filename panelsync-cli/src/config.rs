//! Application configuration.
//!
//! A single TOML file, defaulting to the platform config directory; every
//! section falls back to defaults so a missing file still yields a working
//! (if credential-less) setup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use panels_api::PanelsConfig;
use serde::{Deserialize, Serialize};
use session_cache::SessionPolicies;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub panels: PanelsConfig,
    pub sessions: SessionsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub policies: SessionPolicies,
    /// Directory holding the persisted session records.
    pub store_dir: PathBuf,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            policies: SessionPolicies::default(),
            store_dir: data_dir().join("sessions"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Account directory document.
    pub accounts_file: PathBuf,
    /// Append-only audit log (JSON lines).
    pub audit_log: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            accounts_file: data_dir().join("accounts.json"),
            audit_log: data_dir().join("audit.jsonl"),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("panelsync")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("panelsync")
        .join("config.toml")
}

impl AppConfig {
    /// Load from the given path, or the default location. A missing file is
    /// not an error; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_config_with_defaults() {
        let raw = r#"
            [panels.vela]
            domain = "velaplayer.org"
            relay_url = "https://relay.example.workers.dev"

            [sessions.policies.astra]
            ttl_hours = 240
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.panels.vela.relay_url, "https://relay.example.workers.dev");
        assert_eq!(config.sessions.policies.astra.ttl_hours, 240);
        // Untouched sections keep their defaults.
        assert_eq!(config.sessions.policies.orbit.ttl_hours, 72);
        assert_eq!(config.panels.orbit.ocr_attempts, 10);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load(Some(Path::new("/nonexistent/panelsync.toml"))).unwrap();
        assert_eq!(config.panels.orbit.paid_attempts, 3);
    }
}
