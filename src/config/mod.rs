//! Configuration management for bender

pub mod schema;

pub use schema::{Config, Environment};

use crate::error::{BenderError, BenderResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bender")
            .join("config.toml")
    }

    /// Find a project-local `bender.toml`, walking up from `start`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        let mut dir = Some(start);
        while let Some(current) = dir {
            let candidate = current.join("bender.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = current.parent();
        }
        None
    }

    /// Load configuration, preferring a project-local file over the default
    /// path, falling back to defaults when neither exists
    pub fn load(&self) -> BenderResult<Config> {
        if let Some(local) = Self::find_local_config(Path::new(".")) {
            debug!("Loading local config: {}", local.display());
            return Self::load_from_file(&local);
        }

        self.load_global()
    }

    /// Load configuration from the manager's path only, skipping local
    /// discovery
    pub fn load_global(&self) -> BenderResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        Self::load_from_file(&self.config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> BenderResult<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BenderError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| BenderError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
