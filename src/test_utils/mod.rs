//! Test utilities for selfswap
//!
//! Compiled for unit tests and, through the `test-utils` feature, for the
//! integration suite.
//!
//! - [`init_test_logging`]: one-time tracing setup using the test writer
//! - [`fixtures`]: release artifacts (zip, tar.gz, bare binaries) and manifests
//! - [`environment`]: an isolated install directory, temp root and release folder
//! - [`RecordingLauncher`]: a [`ProcessLauncher`] that records scripts instead of running them
//!
//! # Example
//!
//! ```rust,ignore
//! use selfswap::test_utils::{UpdateTestEnvironment, fixtures::ArchiveFixture};
//!
//! let env = UpdateTestEnvironment::new().unwrap();
//! let artifact = ArchiveFixture::wrapped("app-1.2.0").file("app", b"new").write_zip(&env.release_dir.join("app.zip")).unwrap();
//! ```

pub mod environment;
pub mod fixtures;

pub use environment::UpdateTestEnvironment;
pub use fixtures::{ArchiveFixture, ManifestFixture};

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::{Result, UpdateError};
use crate::update::{PlatformKind, ProcessLauncher};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=selfswap=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Lowercase SHA-256 hex of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Relative path → file contents for every file below `root`.
///
/// Two snapshots are equal exactly when the trees hold the same files with
/// the same bytes.
pub fn snapshot_dir(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?.to_path_buf();
            let contents = std::fs::read(entry.path()).ok()?;
            Some((relative, contents))
        })
        .collect()
}

/// Records launch requests without starting anything.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<(PlatformKind, PathBuf)>>,
    fail: bool,
}

impl RecordingLauncher {
    /// A launcher whose every launch fails with [`UpdateError::HandoffFailed`].
    pub fn failing() -> Self {
        Self {
            launches: Mutex::default(),
            fail: true,
        }
    }

    /// Scripts launched so far.
    pub fn launches(&self) -> Vec<PathBuf> {
        self.launches.lock().map(|l| l.iter().map(|(_, p)| p.clone()).collect()).unwrap_or_default()
    }

    /// Dialects of the scripts launched so far.
    pub fn kinds(&self) -> Vec<PlatformKind> {
        self.launches.lock().map(|l| l.iter().map(|(k, _)| *k).collect()).unwrap_or_default()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn launch(&self, kind: PlatformKind, script: &Path) -> Result<()> {
        if self.fail {
            return Err(UpdateError::HandoffFailed {
                path: script.display().to_string(),
                reason: "launch refused by test launcher".to_string(),
            });
        }
        if let Ok(mut launches) = self.launches.lock() {
            launches.push((kind, script.to_path_buf()));
        }
        Ok(())
    }
}
