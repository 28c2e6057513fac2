//! Restart script preview.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::CliConfig;
use crate::update::{PlatformKind, RestartScriptGenerator, ScriptParams};

/// Render the swap-and-relaunch script to stdout.
///
/// Either dialect can be rendered on any host. Relative paths are resolved
/// against the current directory when rendering for the host's own platform.
#[derive(Args, Debug)]
pub struct ScriptCommand {
    /// Script dialect: posix or windows. Defaults to the current platform.
    #[arg(long, value_name = "PLATFORM")]
    platform: Option<PlatformKind>,

    /// Directory holding the new files
    #[arg(long, value_name = "DIR")]
    staged_dir: PathBuf,

    /// Directory the files are copied into
    #[arg(long, value_name = "DIR")]
    install_dir: PathBuf,

    /// Session directory removed after the swap
    #[arg(long, value_name = "DIR")]
    temp_dir: PathBuf,

    /// Executable relaunched from the install directory
    #[arg(long, value_name = "NAME")]
    executable: String,

    /// Interpreter used to relaunch the executable
    #[arg(long, value_name = "PATH")]
    interpreter: Option<PathBuf>,

    /// Seconds to wait for the host process to exit
    #[arg(long, value_name = "SECONDS", default_value_t = 2)]
    grace_delay: u64,
}

impl ScriptCommand {
    pub async fn execute(self, _cli: &CliConfig) -> Result<()> {
        let kind = self.platform.unwrap_or_else(PlatformKind::current);
        let resolve = |path: PathBuf| -> Result<PathBuf> {
            if kind == PlatformKind::current() { absolutize(&path) } else { Ok(path) }
        };

        let params = ScriptParams {
            staged_dir: resolve(self.staged_dir)?,
            install_dir: resolve(self.install_dir)?,
            temp_dir: resolve(self.temp_dir)?,
            executable: self.executable,
            interpreter: self.interpreter,
            grace_delay: Duration::from_secs(self.grace_delay),
        };

        let script = RestartScriptGenerator::new(kind).render(&params)?;
        print!("{script}");
        Ok(())
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
    Ok(cwd.join(path))
}
