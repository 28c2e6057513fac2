//! What is being updated: the running version and where it is installed.

use std::fmt;
use std::path::PathBuf;

use crate::core::{Result, UpdateError};
use crate::update::config::UpdateConfig;
use crate::update::version::VersionComparator;

/// The running application's version, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVersion(String);

impl InstalledVersion {
    /// Wrap a version string after checking it parses.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidVersion`] if `version` is not a semantic
    /// version.
    pub fn new(version: impl Into<String>) -> Result<Self> {
        let version = version.into();
        VersionComparator::parse(&version)?;
        Ok(Self(version))
    }

    /// The version this crate was built as.
    pub fn of_package() -> Self {
        Self(env!("CARGO_PKG_VERSION").to_string())
    }

    /// The version string as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstalledVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an update is installed and what is relaunched afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    /// Directory overwritten by the restart script
    pub install_dir: PathBuf,
    /// Executable relaunched after the swap, relative to `install_dir`
    pub executable_name: String,
    /// Interpreter used to relaunch non-native targets
    pub interpreter: Option<PathBuf>,
}

impl InstallTarget {
    /// Target describing the running executable.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ConfigError`] if the executable path is unknown.
    pub fn from_current_exe() -> Result<Self> {
        let exe = std::env::current_exe().map_err(|e| UpdateError::ConfigError {
            message: format!("cannot locate the running executable: {e}"),
        })?;
        let install_dir = exe.parent().map(PathBuf::from).ok_or_else(|| UpdateError::ConfigError {
            message: format!("executable {} has no parent directory", exe.display()),
        })?;
        let executable_name = exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UpdateError::ConfigError {
                message: format!("executable {} has no file name", exe.display()),
            })?;

        Ok(Self {
            install_dir,
            executable_name,
            interpreter: None,
        })
    }

    /// Target from configuration, falling back to the running executable for
    /// anything not configured.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ConfigError`] if a fallback is needed and the
    /// running executable cannot be located.
    pub fn from_config(config: &UpdateConfig) -> Result<Self> {
        let (install_dir, executable_name) = match (config.install_dir(), config.executable_name.clone()) {
            (Some(dir), Some(name)) => (dir, name),
            (dir, name) => {
                let current = Self::from_current_exe()?;
                (dir.unwrap_or(current.install_dir), name.unwrap_or(current.executable_name))
            }
        };

        Ok(Self {
            install_dir,
            executable_name,
            interpreter: config.interpreter(),
        })
    }
}
