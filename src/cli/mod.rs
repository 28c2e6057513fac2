//! Command-line interface for selfswap
//!
//! The CLI is a front end over [`crate::update`]. Each subcommand maps onto
//! one engine component, plus `watch`, which runs the full orchestrator with a
//! terminal prompt.
//!
//! # Commands
//!
//! - `check` - fetch the manifest once and compare it with the installed version
//! - `watch` - run the update orchestrator, prompting before installing
//! - `verify` - SHA-256 check of a local file
//! - `script` - render a restart script for either platform
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - log level (`RUST_LOG` still wins when set)
//! - `--config` - alternate global configuration file
//! - `--no-progress` - no progress bars or spinners
//!
//! ```bash
//! selfswap check --manifest-url https://example.com/release.json
//! selfswap --verbose watch --yes
//! selfswap verify app.zip 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
//! selfswap script --platform windows --staged-dir 'C:\t\staged' --install-dir 'C:\app' --temp-dir 'C:\t' --executable app.exe
//! ```

mod check;
mod common;
mod script;
mod verify;
mod watch;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;
use crate::utils::ProgressBar;

/// Runtime configuration derived from the global flags.
///
/// Passed to every subcommand instead of being written into the process
/// environment.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter used when `RUST_LOG` is not set. `None` logs errors only.
    pub log_level: Option<String>,

    /// Whether progress bars and spinners are suppressed.
    pub no_progress: bool,

    /// Alternate global configuration file.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the tracing subscriber. Later calls are no-ops.
    ///
    /// Logs go to stderr so command output on stdout stays machine-readable.
    pub fn init_logging(&self) {
        let fallback = self.log_level.as_deref().unwrap_or("error");
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Load the global configuration, honoring `--config`.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub async fn load_global(&self) -> Result<GlobalConfig> {
        GlobalConfig::load_with_optional(self.config_path.clone()).await
    }

    /// A spinner, hidden under `--no-progress`.
    pub fn spinner(&self, msg: impl Into<String>) -> ProgressBar {
        ProgressBar::spinner(!self.no_progress, msg)
    }

    /// A percentage bar, hidden under `--no-progress`.
    pub fn percent_bar(&self) -> ProgressBar {
        ProgressBar::percent(!self.no_progress)
    }
}

/// Self-update engine for long-running applications.
#[derive(Parser)]
#[command(
    name = "selfswap",
    about = "Check, download, verify and install application updates",
    version,
    long_about = "selfswap fetches a release manifest, verifies the published artifact, stages it \
                  and hands off to a restart script that swaps the installation and relaunches it."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging).
    ///
    /// Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a custom global configuration file.
    ///
    /// Defaults to `~/.selfswap/config.toml` (`%LOCALAPPDATA%\selfswap\config.toml` on Windows).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable progress bars and spinners.
    ///
    /// Also available as the `SELFSWAP_NO_PROGRESS` environment variable.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the release manifest for a newer version
    Check(check::CheckCommand),

    /// Run the update orchestrator until an update is installed or interrupted
    Watch(watch::WatchCommand),

    /// Verify a file against a SHA-256 digest
    Verify(verify::VerifyCommand),

    /// Render a restart script
    Script(script::ScriptCommand),
}

impl Cli {
    /// Execute the parsed command.
    ///
    /// # Errors
    ///
    /// Returns the command's error for `main` to present.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Derive the runtime configuration from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("selfswap=debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("selfswap=warn".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress || self.quiet,
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns the command's error for `main` to present.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Check(cmd) => cmd.execute(&config).await,
            Commands::Watch(cmd) => cmd.execute(&config).await,
            Commands::Verify(cmd) => cmd.execute(&config).await,
            Commands::Script(cmd) => cmd.execute(&config).await,
        }
    }
}
