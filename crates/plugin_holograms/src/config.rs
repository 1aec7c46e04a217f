//! Hologram plugin configuration, loaded from a TOML file in the plugin's
//! data directory.

use serde::{Deserialize, Serialize};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

fn default_model_id() -> String {
    // Tiny-scale carrier model; the host renders it near-invisibly and the
    // nameplate does the actual displaying.
    "Warp".to_string()
}

fn default_tolerance() -> f64 {
    1.0
}

fn default_data_file() -> String {
    "holograms.json".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Read(PathBuf, IoError),

    #[error("Failed to parse config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HologramConfig {
    /// Model asset the carrier entity uses.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Per-axis tolerance when matching scanned entities to records.
    #[serde(default = "default_tolerance")]
    pub position_tolerance: f64,
    /// Catalog file name under the plugin data directory.
    #[serde(default = "default_data_file")]
    pub data_file: String,
}

impl Default for HologramConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            position_tolerance: default_tolerance(),
            data_file: default_data_file(),
        }
    }
}

impl HologramConfig {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        info!("Loaded hologram config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model_id.is_empty() {
            return Err("model_id cannot be empty".to_string());
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
