//! JSON config file adapter.
//!
//! Implements [`ConfigPort`] over a single JSON document.
//!
//! - A missing file loads as [`ControllerConfig::default()`].
//! - Every load and save runs [`ControllerConfig::validate`].
//! - Saves go to a sibling temp file first, then rename over the target,
//!   so a crash never leaves half a config behind.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::ControllerConfig;

pub struct FileConfigAdapter {
    path: PathBuf,
}

impl FileConfigAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for FileConfigAdapter {
    fn load(&self) -> Result<ControllerConfig, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config: {} not found, using defaults", self.path.display());
                return Ok(ControllerConfig::default());
            }
            Err(e) => {
                warn!("Config: cannot read {}: {e}", self.path.display());
                return Err(ConfigError::IoError);
            }
        };
        let cfg: ControllerConfig = serde_json::from_str(&text).map_err(|e| {
            warn!("Config: {} is not valid: {e}", self.path.display());
            ConfigError::Corrupted
        })?;
        cfg.validate()?;
        info!("Config: loaded {}", self.path.display());
        Ok(cfg)
    }

    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_vec_pretty(config).map_err(|_| ConfigError::Corrupted)?;
        super::write_atomically(&self.path, &json).map_err(|e| {
            warn!("Config: cannot write {}: {e}", self.path.display());
            ConfigError::IoError
        })?;
        info!("Config: saved {}", self.path.display());
        Ok(())
    }
}
