//! Trader NPC plugin configuration.

use serde::{Deserialize, Serialize};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

fn default_role() -> String {
    // A role with interaction support but no built-in shop behaviour; the
    // plugin drives trades itself.
    "waypost_trader".to_string()
}

fn default_tolerance() -> f64 {
    1.0
}

fn default_data_file() -> String {
    "trader_npcs.json".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Read(PathBuf, IoError),

    #[error("Failed to parse config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderConfig {
    /// Host behaviour role the NPCs run under. Also what reconciliation
    /// scans for when host persistence resurrects an NPC without our marker.
    #[serde(default = "default_role")]
    pub role: String,
    /// Per-axis tolerance when matching markerless NPCs to records.
    #[serde(default = "default_tolerance")]
    pub position_tolerance: f64,
    /// Catalog file name under the plugin data directory.
    #[serde(default = "default_data_file")]
    pub data_file: String,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            position_tolerance: default_tolerance(),
            data_file: default_data_file(),
        }
    }
}

impl TraderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        info!("Loaded trader config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.role.is_empty() {
            return Err("role cannot be empty".to_string());
        }
        if self.position_tolerance <= 0.0 {
            return Err("position_tolerance must be positive".to_string());
        }
        if self.data_file.is_empty() {
            return Err("data_file cannot be empty".to_string());
        }
        Ok(())
    }
}
