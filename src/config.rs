//! Service configuration
//!
//! Loaded from TOML; every field has a default so a partial file (or none at
//! all) is valid. CLI flags override file values in `main`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served as static files for unmatched paths
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Allow cross-origin requests from any origin
    #[serde(default = "default_true")]
    pub cors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Accept events after a product reached Retail
    #[serde(default)]
    pub allow_post_retail_events: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Name reported in the network section of the status snapshot
    #[serde(default = "default_network_name")]
    pub network_name: String,

    /// Number of events in the recent activity view
    #[serde(default = "default_recent_activity_limit")]
    pub recent_activity_limit: usize,

    /// Probes slower than this mark the network degraded
    #[serde(default = "default_healthy_within_ms")]
    pub healthy_within_ms: u64,

    /// Probes slower than this fail the snapshot
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_true() -> bool { true }
fn default_network_name() -> String { "provenance-ledger".to_string() }
fn default_recent_activity_limit() -> usize { 10 }
fn default_healthy_within_ms() -> u64 { 250 }
fn default_timeout_ms() -> u64 { 2000 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            cors: true,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            network_name: default_network_name(),
            recent_activity_limit: default_recent_activity_limit(),
            healthy_within_ms: default_healthy_within_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StatusConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn healthy_within(&self) -> Duration {
        Duration::from_millis(self.healthy_within_ms)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.status.timeout_ms == 0 {
            return Err(ConfigError::Invalid("status.timeout_ms must be positive".into()));
        }
        if self.status.healthy_within_ms > self.status.timeout_ms {
            return Err(ConfigError::Invalid(
                "status.healthy_within_ms must not exceed status.timeout_ms".into(),
            ));
        }
        if self.status.recent_activity_limit == 0 {
            return Err(ConfigError::Invalid(
                "status.recent_activity_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
