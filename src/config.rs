//! Layered configuration: `atelier.toml`, then environment overrides, then
//! CLI flags applied by the binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtelierConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub channel_capacity: usize,
}

impl Default for AtelierConfig {
    fn default() -> Self {
        Self {
            port: 3111,
            db_path: PathBuf::from(".atelier/factory.db"),
            dev_mode: false,
            channel_capacity: 256,
        }
    }
}

impl AtelierConfig {
    /// Load configuration from the given file, or from the default location
    /// when `None`. A missing file yields the defaults. Environment
    /// variables `ATELIER_PORT` and `ATELIER_DB` override file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_config_path(),
        };

        let mut config = match candidate {
            Some(ref p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", p.display()))?
            }
            _ => Self::default(),
        };

        if let Ok(port) = std::env::var("ATELIER_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("Invalid ATELIER_PORT value '{}'", port))?;
        }
        if let Ok(db) = std::env::var("ATELIER_DB") {
            config.db_path = PathBuf::from(db);
        }

        Ok(config)
    }

    /// `atelier/atelier.toml` under the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("atelier").join("atelier.toml"))
    }
}
