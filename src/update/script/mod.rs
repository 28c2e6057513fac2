//! Restart script generation.
//!
//! A running executable cannot overwrite itself on every platform, so the
//! final swap is delegated to a small script that outlives the host process:
//!
//! 1. wait a grace delay so the host can exit and release file locks
//! 2. copy the staged tree over the install directory
//! 3. relaunch the target executable, detached
//! 4. delete the session temp directory and the script itself
//!
//! Each platform gets its own [`ScriptBackend`]. Scripts are rendered from
//! templates with every interpolated value escaped for the target shell, and
//! values that cannot be escaped safely are rejected up front.

mod posix;
mod windows;

pub use posix::PosixShell;
pub use windows::WindowsBatch;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tera::{Context as TeraContext, Tera};
use tracing::{debug, info};

use crate::core::{Result, UpdateError};

/// Script dialect to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// `/bin/sh` script for Linux, macOS and other Unix systems
    Posix,
    /// `cmd.exe` batch file
    Windows,
}

impl PlatformKind {
    /// The dialect for the platform this binary was built for.
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Posix => f.write_str("posix"),
            Self::Windows => f.write_str("windows"),
        }
    }
}

impl FromStr for PlatformKind {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "posix" | "unix" | "sh" | "linux" | "macos" => Ok(Self::Posix),
            "windows" | "win" | "bat" | "cmd" => Ok(Self::Windows),
            other => Err(UpdateError::ConfigError {
                message: format!("unknown script platform '{other}' (expected posix or windows)"),
            }),
        }
    }
}

/// Everything a restart script needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptParams {
    /// Root of the staged tree to copy from
    pub staged_dir: PathBuf,
    /// Directory to copy into
    pub install_dir: PathBuf,
    /// Session temp directory, deleted by the script when done
    pub temp_dir: PathBuf,
    /// Executable to relaunch, relative to `install_dir`
    pub executable: String,
    /// Interpreter for targets that are not natively executable
    pub interpreter: Option<PathBuf>,
    /// Wait before touching the install directory
    pub grace_delay: Duration,
}

/// A platform-specific script dialect.
pub trait ScriptBackend: Send + Sync {
    /// The dialect this backend writes.
    fn kind(&self) -> PlatformKind;

    /// File name of the written script inside the temp directory.
    fn file_name(&self) -> &'static str;

    /// Render the script text.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ScriptGenerationFailed`] when a value cannot be
    /// represented safely in this dialect.
    fn render(&self, params: &ScriptParams) -> Result<String>;
}

/// Produces restart scripts for a chosen platform.
pub struct RestartScriptGenerator {
    backend: Box<dyn ScriptBackend>,
}

impl RestartScriptGenerator {
    /// Generator for an explicit dialect.
    pub fn new(kind: PlatformKind) -> Self {
        let backend: Box<dyn ScriptBackend> = match kind {
            PlatformKind::Posix => Box::new(PosixShell),
            PlatformKind::Windows => Box::new(WindowsBatch),
        };
        Self {
            backend,
        }
    }

    /// Generator for the platform this binary was built for.
    pub fn for_current_platform() -> Self {
        Self::new(PlatformKind::current())
    }

    /// Generator using a custom backend.
    pub fn with_backend(backend: Box<dyn ScriptBackend>) -> Self {
        Self {
            backend,
        }
    }

    /// The dialect produced.
    pub fn kind(&self) -> PlatformKind {
        self.backend.kind()
    }

    /// Render the script without writing it.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ScriptGenerationFailed`] for unsafe or
    /// inconsistent parameters.
    pub fn render(&self, params: &ScriptParams) -> Result<String> {
        validate_executable(&params.executable)?;
        self.backend.render(params)
    }

    /// Render the script and write it into `params.temp_dir`.
    ///
    /// The written file is executable on Unix. Returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ScriptGenerationFailed`] if rendering or writing
    /// fails.
    pub async fn generate(&self, params: &ScriptParams) -> Result<PathBuf> {
        let script = self.render(params)?;
        let path = params.temp_dir.join(self.backend.file_name());

        tokio::fs::create_dir_all(&params.temp_dir).await.map_err(|e| generation_failed(format!(
            "cannot create {}: {e}",
            params.temp_dir.display()
        )))?;
        tokio::fs::write(&path, script.as_bytes())
            .await
            .map_err(|e| generation_failed(format!("cannot write {}: {e}", path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| generation_failed(format!("cannot chmod {}: {e}", path.display())))?;
        }

        info!("Wrote {} restart script to {}", self.kind(), path.display());
        Ok(path)
    }
}

pub(crate) fn generation_failed(reason: impl Into<String>) -> UpdateError {
    UpdateError::ScriptGenerationFailed {
        reason: reason.into(),
    }
}

/// The executable must be a relative path that stays inside the install directory.
fn validate_executable(executable: &str) -> Result<()> {
    if executable.trim().is_empty() {
        return Err(generation_failed("executable name is empty"));
    }
    let escapes = executable
        .split(['/', '\\'])
        .any(|part| part == "..")
        || executable.starts_with(['/', '\\'])
        || executable.get(1..2) == Some(":");
    if escapes {
        return Err(generation_failed(format!(
            "executable '{executable}' must be a path inside the install directory"
        )));
    }
    Ok(())
}

/// A path as UTF-8 text, or a generation failure.
pub(crate) fn path_text<'a>(label: &str, path: &'a Path) -> Result<&'a str> {
    path.to_str().ok_or_else(|| generation_failed(format!("{label} is not valid UTF-8: {}", path.display())))
}

/// Reject a temp directory that is, or contains, the install directory.
///
/// The script deletes the temp directory recursively as its last step.
pub(crate) fn ensure_disjoint(install: &str, temp: &str, separator: char, ignore_case: bool) -> Result<()> {
    let normalize = |p: &str| {
        let mut s = p.trim_end_matches(separator).to_string();
        if ignore_case {
            s = s.to_lowercase();
        }
        s.push(separator);
        s
    };
    let install = normalize(install);
    let temp = normalize(temp);
    if install.starts_with(&temp) {
        return Err(generation_failed(format!(
            "temp directory {} contains the install directory",
            temp.trim_end_matches(separator)
        )));
    }
    Ok(())
}

/// Render `template` with `context`, reporting tera errors without its internal names.
pub(crate) fn render_template(template: &str, context: &TeraContext) -> Result<String> {
    let mut tera = Tera::default();
    tera.render_str(template, context).map_err(|e| {
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        debug!("Template rendering failed: {}", message);
        generation_failed(message.replace("'__tera_one_off'", "restart script template"))
    })
}
