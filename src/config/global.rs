//! Global configuration for selfswap
//!
//! The global configuration file holds the settings of the `[update]` table,
//! see [`UpdateConfig`] for every key.
//!
//! # Location
//!
//! - **Unix/macOS**: `~/.selfswap/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\selfswap\config.toml`
//!
//! The `--config` flag points the CLI at a different file.
//!
//! # Example
//!
//! ```toml
//! [update]
//! manifest_url = "https://example.github.io/app/release.json"
//! check_interval = 3600
//! allow_unverified = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::update::UpdateConfig;

/// Contents of the global configuration file.
///
/// A missing file and a file without an `[update]` table both yield the
/// defaults of [`UpdateConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Self-update settings.
    #[serde(default)]
    pub update: UpdateConfig,
}

impl GlobalConfig {
    /// Load the configuration from the default location.
    ///
    /// # Errors
    ///
    /// Fails when the home directory cannot be determined or the file exists
    /// but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_with_optional(Some(path)).await
    }

    /// Load from `path`, or the default location when `None`.
    ///
    /// A file that does not exist is not an error; defaults are returned.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid TOML for this schema.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Save to the default location.
    ///
    /// # Errors
    ///
    /// See [`save_to`](Self::save_to).
    pub async fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path).await
    }

    /// Save to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Fails when the directory or file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))?;

        Ok(())
    }

    /// Default configuration file path for the current platform.
    ///
    /// # Errors
    ///
    /// Fails when the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("selfswap")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".selfswap")
        };

        Ok(config_dir.join("config.toml"))
    }
}
