//! Starting the restart script as a process that outlives the host.

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

use crate::core::{Result, UpdateError};
use crate::update::script::PlatformKind;

/// Starts a written restart script.
///
/// Implementations must return as soon as the script is running; they never
/// wait for it. The orchestrator is generic over this seam so tests can record
/// launches instead of replacing a real installation.
pub trait ProcessLauncher: Send + Sync {
    /// Start `script` detached from the current process.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::HandoffFailed`] if the script cannot be started.
    fn launch(&self, kind: PlatformKind, script: &Path) -> Result<()>;
}

/// Launches scripts with the platform shell, detached from the host's
/// process group and standard streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLauncher;

/// Windows process creation flags.
#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

impl ProcessLauncher for DetachedLauncher {
    fn launch(&self, kind: PlatformKind, script: &Path) -> Result<()> {
        let handoff_failed = |reason: String| UpdateError::HandoffFailed {
            path: script.display().to_string(),
            reason,
        };

        if kind != PlatformKind::current() {
            return Err(handoff_failed(format!("cannot run a {kind} script on this platform")));
        }

        let mut command = match kind {
            PlatformKind::Posix => {
                let mut command = Command::new("/bin/sh");
                command.arg(script);
                command
            }
            PlatformKind::Windows => {
                let mut command = Command::new("cmd");
                command.arg("/C").arg(script);
                command
            }
        };
        command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        let child = command.spawn().map_err(|e| handoff_failed(e.to_string()))?;
        info!("Restart script running as pid {}", child.id());
        Ok(())
    }
}
