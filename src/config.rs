//! Configuration management for recurring-tasks.
//!
//! This module handles the `.recurring-tasks/config.yaml` file which stores
//! project-specific settings for the tracker.

use crate::error::Result;
use crate::tasks::TaskId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file path relative to project root.
pub const CONFIG_FILE_PATH: &str = ".recurring-tasks/config.yaml";

const fn default_first_id() -> TaskId {
    1
}

/// Project configuration for the tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Lowest id handed out to new tasks.
    #[serde(default = "default_first_id")]
    pub first_id: TaskId,

    /// Whether every tracker operation is appended to the event log.
    #[serde(default)]
    pub debug_logging: bool,

    /// Database location. Relative paths are resolved against the project
    /// root. None means the per-user data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { first_id: default_first_id(), debug_logging: false, database: None }
    }
}

impl TrackerConfig {
    /// Load config from the current directory, returning None if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(Path::new("."))
    }

    /// Load config from a specific base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(base_dir: &Path) -> Result<Option<Self>> {
        let config_path = Self::config_path(base_dir);
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Load config from a base directory, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(base_dir: &Path) -> Result<Self> {
        Ok(Self::load_from(base_dir)?.unwrap_or_default())
    }

    /// Save config to a specific base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, base_dir: &Path) -> Result<()> {
        let config_path = Self::config_path(base_dir);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path for a base directory.
    pub fn config_path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE_PATH)
    }
}
