//! Command and event surface between the orchestrator and a presentation layer.
//!
//! The orchestrator never references UI code. A front end sends
//! [`UpdateCommand`]s (through [`crate::update::UpdateHandle`]) and renders the
//! [`UpdateEvent`]s it receives.

use serde::Serialize;
use std::path::PathBuf;

use crate::core::ErrorKind;
use crate::update::session::UpdateState;

/// Commands accepted by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCommand {
    /// Check for an update now, re-offering a previously declined version
    CheckNow,
    /// Accept the offered update
    ConfirmUpdate,
    /// Reject the offered update
    DeclineUpdate,
    /// Stop the orchestrator
    Shutdown,
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UpdateEvent {
    /// A manifest check started
    CheckStarted,
    /// The installed version is current
    UpToDate {
        /// The version the manifest offered
        version: String,
    },
    /// A newer version was found; confirmation is expected
    UpdateAvailable {
        /// Offered version
        version: String,
        /// Running version
        installed: String,
        /// Whether the artifact will be checked against a published digest
        verifiable: bool,
    },
    /// Download progress, non-decreasing within a session, 100 before staging
    DownloadProgress {
        /// 0..=100
        percent: u8,
    },
    /// The state machine moved
    StateChanged {
        /// The new state
        state: UpdateState,
    },
    /// A step failed; the session was discarded
    Error {
        /// Failure classification
        kind: ErrorKind,
        /// Human-readable message
        message: String,
    },
    /// Informational line for a log pane
    LogLine {
        /// The text
        text: String,
    },
    /// The restart script is running; the host should exit now
    AboutToRestart {
        /// Path of the launched script
        script: PathBuf,
    },
}

impl UpdateEvent {
    /// Shorthand for [`UpdateEvent::LogLine`].
    pub fn log(text: impl Into<String>) -> Self {
        Self::LogLine {
            text: text.into(),
        }
    }
}
