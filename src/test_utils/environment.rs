//! Isolated update environment for integration and library tests.

use std::fs;
use std::io;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::update::{InstallTarget, UpdateConfig};

/// A throwaway installation:
///
/// ```text
/// <tmp>/
/// ├── install/   the "installed" application
/// ├── release/   where manifests and artifacts are published (file:// URLs)
/// └── tmp/       temp root for update sessions
/// ```
pub struct UpdateTestEnvironment {
    /// Owns the whole tree
    pub temp_dir: TempDir,
    /// Install directory
    pub install_dir: PathBuf,
    /// Published release files
    pub release_dir: PathBuf,
    /// Session temp root
    pub temp_root: PathBuf,
}

impl UpdateTestEnvironment {
    /// Create the directory layout.
    pub fn new() -> io::Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let install_dir = temp_dir.path().join("install");
        let release_dir = temp_dir.path().join("release");
        let temp_root = temp_dir.path().join("tmp");
        fs::create_dir_all(&install_dir)?;
        fs::create_dir_all(&release_dir)?;
        fs::create_dir_all(&temp_root)?;

        Ok(Self {
            temp_dir,
            install_dir,
            release_dir,
            temp_root,
        })
    }

    /// Put an "old" version of the application into the install directory.
    pub fn install_old_version(&self, executable: &str) -> io::Result<()> {
        fs::write(self.install_dir.join(executable), b"#!/bin/sh\necho old\n")?;
        fs::write(self.install_dir.join("settings.json"), br#"{"keep": true}"#)?;
        Ok(())
    }

    /// Configuration pointing at `manifest_url` with no timer, no startup
    /// check and no grace delay.
    pub fn config(&self, manifest_url: &str) -> UpdateConfig {
        UpdateConfig {
            manifest_url: Some(manifest_url.to_string()),
            check_interval: 0,
            check_on_startup: false,
            grace_delay: 0,
            app_name: "testapp".to_string(),
            temp_root: Some(self.temp_root.clone()),
            ..UpdateConfig::default()
        }
    }

    /// Install target for `executable` inside the install directory.
    pub fn target(&self, executable: &str) -> InstallTarget {
        InstallTarget {
            install_dir: self.install_dir.clone(),
            executable_name: executable.to_string(),
            interpreter: None,
        }
    }

    /// `file://` URL of a file in the release directory.
    pub fn release_url(&self, name: &str) -> String {
        format!("file://{}", self.release_dir.join(name).display())
    }

    /// Session directories currently present under the temp root.
    pub fn session_dirs(&self) -> Vec<PathBuf> {
        fs::read_dir(&self.temp_root)
            .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default()
    }
}
