//! One check-to-restart cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::ErrorKind;
use crate::update::manifest::Manifest;

/// Orchestrator states.
///
/// ```text
/// Idle → Checking → UpToDate → Idle
///                 → UpdateAvailable → Prompting → Declined → Idle
///                                               → Confirmed → Downloading → Verifying
///                                                 → Staging → ReadyToRestart → HandedOff
/// any step → Failed(kind) → Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum UpdateState {
    /// Waiting for a timer tick or an explicit check
    Idle,
    /// Manifest fetch in flight
    Checking,
    /// The manifest offers nothing newer
    UpToDate,
    /// The manifest offers a newer version
    UpdateAvailable,
    /// Waiting for the user to confirm or decline
    Prompting,
    /// The user declined the offered version
    Declined,
    /// The user accepted the offered version
    Confirmed,
    /// Artifact download in flight
    Downloading,
    /// Artifact checksum being computed
    Verifying,
    /// Artifact being turned into a staged tree
    Staging,
    /// Restart script written, about to hand off
    ReadyToRestart,
    /// Restart script launched; the host must exit
    HandedOff,
    /// The session failed and is being discarded
    Failed(ErrorKind),
}

impl UpdateState {
    /// Whether a new check may start from this state.
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Checking => f.write_str("checking"),
            Self::UpToDate => f.write_str("up to date"),
            Self::UpdateAvailable => f.write_str("update available"),
            Self::Prompting => f.write_str("waiting for confirmation"),
            Self::Declined => f.write_str("declined"),
            Self::Confirmed => f.write_str("confirmed"),
            Self::Downloading => f.write_str("downloading"),
            Self::Verifying => f.write_str("verifying"),
            Self::Staging => f.write_str("staging"),
            Self::ReadyToRestart => f.write_str("ready to restart"),
            Self::HandedOff => f.write_str("handed off"),
            Self::Failed(kind) => write!(f, "failed ({kind})"),
        }
    }
}

/// State tracked for one discovered update.
///
/// Owned exclusively by the orchestrator task. Workers report results back
/// and never touch a session directly.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    /// Tags worker reports so stale ones can be dropped
    pub id: Uuid,
    /// The manifest that announced this update
    pub manifest: Manifest,
    /// Per-session working directory, created on confirmation
    pub temp_dir: PathBuf,
    /// Downloaded artifact
    pub artifact_path: Option<PathBuf>,
    /// Root of the staged tree
    pub staged_dir: Option<PathBuf>,
    /// Written restart script
    pub script_path: Option<PathBuf>,
    /// Download progress, never decreasing
    pub progress_percent: u8,
    /// Current position in the state machine
    pub state: UpdateState,
    /// When the update was discovered
    pub started_at: DateTime<Utc>,
}

impl UpdateSession {
    /// Start a session for `manifest`; the temp directory is only named here.
    pub fn new(manifest: Manifest, temp_root: &Path, app_name: &str) -> Self {
        let id = Uuid::new_v4();
        Self {
            temp_dir: temp_root.join(format!("{app_name}_update_{}", id.simple())),
            id,
            manifest,
            artifact_path: None,
            staged_dir: None,
            script_path: None,
            progress_percent: 0,
            state: UpdateState::UpdateAvailable,
            started_at: Utc::now(),
        }
    }

    /// Where the artifact is downloaded.
    pub fn download_dir(&self) -> PathBuf {
        self.temp_dir.join("download")
    }

    /// Record download progress. Returns the value to report, if it increased.
    pub fn record_progress(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        (percent > self.progress_percent).then(|| {
            self.progress_percent = percent;
            percent
        })
    }

    /// Remove the session temp directory, if it was created.
    pub async fn discard(&self) {
        match tokio::fs::remove_dir_all(&self.temp_dir).await {
            Ok(()) => debug!("Removed session directory {}", self.temp_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", self.temp_dir.display(), e),
        }
    }
}
