//! Application configuration
//!
//! Resolution order, later wins: built-in defaults, the JSON config file,
//! command-line overrides. Analysis parameters are fixed and not configurable.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScreenError};

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Persisted classifier to load at startup
    pub model_path: PathBuf,
    /// Directory for staged uploads
    pub upload_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.json"),
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl AppConfig {
    /// Read a config file; missing keys take their defaults
    ///
    /// # Errors
    /// * `InvalidConfig` - the file is unreadable or not a valid config
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ScreenError::InvalidConfig {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| ScreenError::InvalidConfig {
            reason: format!("{}: {}", path.display(), e),
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults, or the file at `path` when one is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, model_path: Option<PathBuf>, upload_dir: Option<PathBuf>) -> Self {
        if let Some(p) = model_path {
            self.model_path = p;
        }
        if let Some(d) = upload_dir {
            self.upload_dir = d;
        }
        self
    }
}
