use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::update::manifest::ManifestFormat;
use crate::update::stager::{ArchiveLayout, StageMode};

/// Configuration settings for self-update behavior.
///
/// `UpdateConfig` is the `[update]` table of the global configuration file. It
/// controls where manifests come from, how often they are checked, how much
/// trust an unverifiable manifest gets, and how artifacts are staged.
///
/// # Default Behavior
///
/// - Check once on startup, then every hour
/// - Manifest requests time out after 10 seconds
/// - Manifests without a checksum are rejected
/// - Artifact type detected from its content, archives must wrap a single root
///
/// # TOML Example
/// ```toml
/// [update]
/// manifest_url = "https://example.github.io/app/release.json"
/// check_interval = 3600
/// fetch_timeout = 10
/// allow_unverified = false
/// stage_mode = "auto"
/// archive_layout = "wrapped"
/// grace_delay = 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Where the release manifest is published (`https://` or `file://`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,

    /// Which manifest shape to expect.
    ///
    /// `auto` detects the shape from the keys present in the document.
    #[serde(default)]
    pub manifest_format: ManifestFormat,

    /// Interval between periodic manifest checks in seconds.
    ///
    /// # Default: `3600` (1 hour)
    ///
    /// `0` disables the periodic timer; checks then only happen on explicit
    /// request (and on startup when `check_on_startup` is set).
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Whether the first check fires immediately instead of after one interval.
    #[serde(default = "default_check_on_startup")]
    pub check_on_startup: bool,

    /// Bounded timeout for a single manifest request, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,

    /// Whether a manifest without a checksum may be installed.
    ///
    /// # Default: `false`
    ///
    /// Release API documents (`tag_name` / `zipball_url`) carry no checksum.
    /// Installing them skips integrity verification entirely, so it must be
    /// an explicit, auditable choice. When enabled every such update is logged
    /// as a reduced-trust install.
    #[serde(default)]
    pub allow_unverified: bool,

    /// How the downloaded artifact is turned into a staged tree.
    #[serde(default)]
    pub stage_mode: StageMode,

    /// Expected layout of archive artifacts.
    #[serde(default)]
    pub archive_layout: ArchiveLayout,

    /// Seconds the restart script waits for the host to exit and release locks.
    #[serde(default = "default_grace_delay")]
    pub grace_delay: u64,

    /// Prefix for per-session temp directories (`<app_name>_update_<id>`).
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Directory the update is installed into.
    ///
    /// Defaults to the directory of the running executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,

    /// File name of the executable relaunched after the swap.
    ///
    /// Defaults to the file name of the running executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_name: Option<String>,

    /// Interpreter used to relaunch targets that are not natively executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<PathBuf>,

    /// Root under which session temp directories are created.
    ///
    /// Defaults to the OS temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_root: Option<PathBuf>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            manifest_url: None,
            manifest_format: ManifestFormat::default(),
            check_interval: default_check_interval(),
            check_on_startup: default_check_on_startup(),
            fetch_timeout: default_fetch_timeout(),
            allow_unverified: false,
            stage_mode: StageMode::default(),
            archive_layout: ArchiveLayout::default(),
            grace_delay: default_grace_delay(),
            app_name: default_app_name(),
            install_dir: None,
            executable_name: None,
            interpreter: None,
            temp_root: None,
        }
    }
}

fn default_check_interval() -> u64 {
    3600
}

fn default_check_on_startup() -> bool {
    true
}

/// Longest periodic check interval honoured, in seconds (one year).
pub const MAX_CHECK_INTERVAL: u64 = 365 * 24 * 60 * 60;

fn default_fetch_timeout() -> u64 {
    10
}

fn default_grace_delay() -> u64 {
    2
}

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

impl UpdateConfig {
    /// Create a new `UpdateConfig` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// The periodic check interval, or `None` when the timer is disabled.
    ///
    /// Intervals longer than [`MAX_CHECK_INTERVAL`] are clamped to it.
    pub fn check_period(&self) -> Option<Duration> {
        (self.check_interval > 0).then(|| Duration::from_secs(self.check_interval.min(MAX_CHECK_INTERVAL)))
    }

    /// The manifest request timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout.max(1))
    }

    /// The restart script grace delay.
    pub fn grace_delay(&self) -> Duration {
        Duration::from_secs(self.grace_delay)
    }

    /// Root directory for session temp directories, with `~` expanded.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.as_deref().map(expand_path).unwrap_or_else(std::env::temp_dir)
    }

    /// Configured install directory, with `~` expanded.
    pub fn install_dir(&self) -> Option<PathBuf> {
        self.install_dir.as_deref().map(expand_path)
    }

    /// Configured interpreter, with `~` expanded.
    pub fn interpreter(&self) -> Option<PathBuf> {
        self.interpreter.as_deref().map(expand_path)
    }
}

/// Expand a leading `~` and environment variables in a configured path.
fn expand_path(path: &std::path::Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => path.to_path_buf(),
    }
}
