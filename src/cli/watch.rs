//! Interactive update loop.
//!
//! Runs [`UpdateOrchestrator`] in the background and renders its events on
//! the terminal. Offers are confirmed on stdin (or automatically with
//! `--yes`). When the restart script has been launched the process exits so
//! the script can replace the installation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::CliConfig;
use crate::cli::common::ReleaseArgs;
use crate::update::{
    InstallTarget, RunOutcome, UpdateEvent, UpdateHandle, UpdateOrchestrator, UpdateState,
};
use crate::utils::ProgressBar;

/// Watch for updates and install them after confirmation.
#[derive(Args, Debug)]
pub struct WatchCommand {
    #[command(flatten)]
    release: ReleaseArgs,

    /// Install offered updates without asking
    #[arg(short, long)]
    yes: bool,

    /// Stop after the first check unless it leads to an install
    #[arg(long)]
    once: bool,

    /// Seconds between checks, overriding `update.check_interval` (0 disables the timer, capped at one year)
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,
}

impl WatchCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let (mut config, installed) = self.release.resolve(cli).await?;
        if let Some(interval) = self.interval {
            config.check_interval = interval;
        }
        if self.once {
            config.check_on_startup = true;
        }

        let target = InstallTarget::from_config(&config)?;
        println!(
            "{} {} in {}",
            "Watching for updates to".cyan(),
            target.executable_name,
            target.install_dir.display()
        );

        let (handle, mut events, orchestrator) = UpdateOrchestrator::new(config, installed, target)?;
        let worker = tokio::spawn(orchestrator.run());
        let mut answers = spawn_stdin_reader();

        let mut presenter = Presenter {
            handle: handle.clone(),
            progress: cli.percent_bar(),
            bar_for: cli.clone(),
            auto_confirm: self.yes,
            once: self.once,
            awaiting_answer: false,
        };

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => presenter.render(event).await,
                    None => break,
                },
                line = answers.recv(), if presenter.awaiting_answer => {
                    // Closed stdin counts as "no".
                    presenter.answer(line.as_deref().unwrap_or_default()).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    handle.shutdown().await;
                }
            }
        }

        match worker.await.context("Update orchestrator task panicked")?? {
            RunOutcome::HandedOff {
                script,
            } => {
                debug!("Exiting for restart script {}", script.display());
                println!("{}", "Restarting to finish the update...".green());
                // The stdin reader thread may be blocked; leave without joining it.
                std::process::exit(0);
            }
            RunOutcome::Shutdown => Ok(()),
        }
    }
}

/// Terminal rendering of orchestrator events.
struct Presenter {
    handle: UpdateHandle,
    progress: ProgressBar,
    bar_for: CliConfig,
    auto_confirm: bool,
    once: bool,
    awaiting_answer: bool,
}

impl Presenter {
    async fn render(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::CheckStarted => debug!("Checking for updates"),
            UpdateEvent::UpToDate {
                version,
            } => {
                println!("{}", format!("Up to date (latest published: {version})").green());
                self.finish_if_once().await;
            }
            UpdateEvent::UpdateAvailable {
                version,
                installed,
                verifiable,
            } => {
                println!(
                    "{} {} -> {}",
                    "Update available:".green().bold(),
                    installed.yellow(),
                    version.green()
                );
                if !verifiable {
                    println!("  {}", "This release publishes no checksum and cannot be verified.".yellow());
                }
                if self.auto_confirm {
                    let _ = self.handle.confirm_update().await;
                } else {
                    print!("Install now? [y/N] ");
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                    self.awaiting_answer = true;
                }
            }
            UpdateEvent::DownloadProgress {
                percent,
            } => self.progress.set_position(u64::from(percent)),
            UpdateEvent::StateChanged {
                state,
            } => self.on_state(state),
            UpdateEvent::Error {
                kind,
                message,
            } => {
                self.progress.finish_and_clear();
                eprintln!("{} {message} ({kind})", "Update failed:".red().bold());
                self.finish_if_once().await;
            }
            UpdateEvent::LogLine {
                text,
            } => self.progress.println(text),
            UpdateEvent::AboutToRestart {
                script,
            } => {
                self.progress.finish_and_clear();
                println!("Launched restart script {}", script.display());
            }
        }
    }

    fn on_state(&mut self, state: UpdateState) {
        match state {
            UpdateState::Downloading => {
                self.progress = self.bar_for.percent_bar();
                self.progress.set_message("Downloading");
            }
            UpdateState::Verifying => self.progress.set_message("Verifying"),
            UpdateState::Staging => self.progress.set_message("Staging"),
            UpdateState::ReadyToRestart => self.progress.finish_with_message("Ready to restart"),
            other => debug!("Update state: {other}"),
        }
    }

    async fn answer(&mut self, line: &str) {
        self.awaiting_answer = false;
        if matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            let _ = self.handle.confirm_update().await;
        } else {
            println!("Update declined.");
            let _ = self.handle.decline_update().await;
            self.finish_if_once().await;
        }
    }

    async fn finish_if_once(&self) {
        if self.once {
            self.handle.shutdown().await;
        }
    }
}

/// Lines typed on stdin, read on a plain thread so a pending read never
/// holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
