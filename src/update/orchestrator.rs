//! The update state machine.
//!
//! [`UpdateOrchestrator::run`] is the single coordination task. It owns the
//! state and the [`UpdateSession`], reacts to commands from an
//! [`UpdateHandle`], timer ticks and worker reports, and emits
//! [`UpdateEvent`]s. Network transfers, hashing, extraction and script writing
//! run in short-lived worker tasks that only report results back; they never
//! touch the session.
//!
//! The state itself is the guard: a check only starts from
//! [`UpdateState::Idle`], so at most one session and one worker exist at any
//! time. The periodic timer keeps ticking during a download; such ticks are
//! ignored.
//!
//! # Example
//!
//! ```rust,no_run
//! use selfswap::update::{
//!     InstallTarget, InstalledVersion, RunOutcome, UpdateConfig, UpdateEvent, UpdateOrchestrator,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdateConfig {
//!     manifest_url: Some("https://example.com/release.json".to_string()),
//!     ..UpdateConfig::default()
//! };
//! let (handle, mut events, orchestrator) = UpdateOrchestrator::new(
//!     config,
//!     InstalledVersion::new("1.1.3")?,
//!     InstallTarget::from_current_exe()?,
//! )?;
//! let runner = tokio::spawn(orchestrator.run());
//!
//! while let Some(event) = events.recv().await {
//!     if let UpdateEvent::UpdateAvailable { .. } = event {
//!         handle.confirm_update().await?;
//!     }
//! }
//!
//! if let RunOutcome::HandedOff { .. } = runner.await?? {
//!     std::process::exit(0);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::{Result, UpdateError};
use crate::update::config::UpdateConfig;
use crate::update::download::ArtifactDownloader;
use crate::update::events::{UpdateCommand, UpdateEvent};
use crate::update::launcher::{DetachedLauncher, ProcessLauncher};
use crate::update::manifest::{Manifest, ManifestFetcher};
use crate::update::script::{RestartScriptGenerator, ScriptParams};
use crate::update::session::{UpdateSession, UpdateState};
use crate::update::stager::ArchiveStager;
use crate::update::target::{InstallTarget, InstalledVersion};
use crate::update::verification::{IntegrityVerifier, Verification};
use crate::update::version::VersionComparator;

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 16;

/// How [`UpdateOrchestrator::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The restart script is running; the host process must exit now
    HandedOff {
        /// The launched script
        script: PathBuf,
    },
    /// Shutdown was requested or every handle was dropped
    Shutdown,
}

/// Sends commands to a running orchestrator.
#[derive(Clone)]
pub struct UpdateHandle {
    sender: mpsc::Sender<UpdateCommand>,
}

impl UpdateHandle {
    async fn send(&self, command: UpdateCommand) -> Result<()> {
        self.sender.send(command).await.map_err(|_| UpdateError::ConfigError {
            message: "update orchestrator is not running".to_string(),
        })
    }

    /// Check for an update now.
    ///
    /// Ignored unless the orchestrator is idle. Unlike timer ticks, an explicit
    /// check re-offers a version that was declined earlier.
    ///
    /// # Errors
    ///
    /// Fails if the orchestrator has stopped.
    pub async fn check_now(&self) -> Result<()> {
        self.send(UpdateCommand::CheckNow).await
    }

    /// Accept the offered update. Ignored unless a prompt is outstanding.
    ///
    /// # Errors
    ///
    /// Fails if the orchestrator has stopped.
    pub async fn confirm_update(&self) -> Result<()> {
        self.send(UpdateCommand::ConfirmUpdate).await
    }

    /// Reject the offered update. Ignored unless a prompt is outstanding.
    ///
    /// # Errors
    ///
    /// Fails if the orchestrator has stopped.
    pub async fn decline_update(&self) -> Result<()> {
        self.send(UpdateCommand::DeclineUpdate).await
    }

    /// Stop the orchestrator, discarding any session in progress.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(UpdateCommand::Shutdown).await;
    }
}

/// Results sent back by worker tasks, tagged with the check or session they belong to.
#[derive(Debug)]
enum WorkerReport {
    Manifest {
        check: Uuid,
        explicit: bool,
        result: Result<Manifest>,
    },
    Progress {
        session: Uuid,
        percent: u8,
    },
    Downloaded {
        session: Uuid,
        result: Result<PathBuf>,
    },
    Verified {
        session: Uuid,
        result: Result<Verification>,
    },
    Staged {
        session: Uuid,
        result: Result<PathBuf>,
    },
    ScriptReady {
        session: Uuid,
        result: Result<PathBuf>,
    },
}

impl WorkerReport {
    fn session_id(&self) -> Option<Uuid> {
        match self {
            Self::Manifest {
                ..
            } => None,
            Self::Progress {
                session,
                ..
            }
            | Self::Downloaded {
                session,
                ..
            }
            | Self::Verified {
                session,
                ..
            }
            | Self::Staged {
                session,
                ..
            }
            | Self::ScriptReady {
                session,
                ..
            } => Some(*session),
        }
    }
}

/// Coordinates checks, downloads, staging and handoff.
pub struct UpdateOrchestrator {
    config: UpdateConfig,
    manifest_url: String,
    installed: InstalledVersion,
    target: InstallTarget,
    fetcher: ManifestFetcher,
    downloader: ArtifactDownloader,
    stager: ArchiveStager,
    scripts: Arc<RestartScriptGenerator>,
    launcher: Arc<dyn ProcessLauncher>,
    commands: mpsc::Receiver<UpdateCommand>,
    events: mpsc::UnboundedSender<UpdateEvent>,
    reports_tx: mpsc::UnboundedSender<WorkerReport>,
    reports_rx: mpsc::UnboundedReceiver<WorkerReport>,
    workers: JoinSet<()>,
    state: UpdateState,
    session: Option<UpdateSession>,
    pending_check: Option<Uuid>,
    declined: Option<String>,
}

impl UpdateOrchestrator {
    /// Build an orchestrator with its command handle and event stream.
    ///
    /// Scripts are generated for the current platform and launched with
    /// [`DetachedLauncher`]; both can be replaced before calling
    /// [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ConfigError`] when no manifest URL is configured
    /// or the HTTP clients cannot be built.
    pub fn new(
        config: UpdateConfig,
        installed: InstalledVersion,
        target: InstallTarget,
    ) -> Result<(UpdateHandle, mpsc::UnboundedReceiver<UpdateEvent>, Self)> {
        let manifest_url = config.manifest_url.clone().ok_or_else(|| UpdateError::ConfigError {
            message: "update.manifest_url is not set".to_string(),
        })?;

        let fetcher = ManifestFetcher::new(config.fetch_timeout(), config.manifest_format)?;
        let downloader = ArtifactDownloader::new(config.fetch_timeout())?;
        let stager = ArchiveStager::new(config.stage_mode, config.archive_layout);

        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (events, events_rx) = mpsc::unbounded_channel();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();

        let orchestrator = Self {
            config,
            manifest_url,
            installed,
            target,
            fetcher,
            downloader,
            stager,
            scripts: Arc::new(RestartScriptGenerator::for_current_platform()),
            launcher: Arc::new(DetachedLauncher),
            commands,
            events,
            reports_tx,
            reports_rx,
            workers: JoinSet::new(),
            state: UpdateState::Idle,
            session: None,
            pending_check: None,
            declined: None,
        };

        Ok((
            UpdateHandle {
                sender: command_tx,
            },
            events_rx,
            orchestrator,
        ))
    }

    /// Replace the process launcher used for the final handoff.
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Replace the restart script generator.
    pub fn with_script_generator(mut self, scripts: RestartScriptGenerator) -> Self {
        self.scripts = Arc::new(scripts);
        self
    }

    /// Run until handoff or shutdown.
    ///
    /// # Errors
    ///
    /// Session failures are reported as events and never end the loop; this
    /// only returns `Ok`.
    pub async fn run(mut self) -> Result<RunOutcome> {
        info!(
            "Update orchestrator started (installed {}, manifest {})",
            self.installed, self.manifest_url
        );

        let mut timer = self.config.check_period().and_then(|period| {
            let now = Instant::now();
            let start = if self.config.check_on_startup {
                now
            } else {
                now.checked_add(period)?
            };
            let mut timer = tokio::time::interval_at(start, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(timer)
        });
        if timer.is_none() && self.config.check_on_startup {
            self.start_check(false);
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(UpdateCommand::Shutdown) | None => {
                            info!("Update orchestrator shutting down");
                            self.workers.shutdown().await;
                            if let Some(session) = self.session.take() {
                                session.discard().await;
                            }
                            return Ok(RunOutcome::Shutdown);
                        }
                        Some(command) => self.handle_command(command),
                    }
                }
                Some(report) = self.reports_rx.recv() => {
                    if let Some(outcome) = self.handle_report(report).await {
                        return Ok(outcome);
                    }
                }
                Some(joined) = self.workers.join_next() => {
                    if let Err(e) = joined {
                        self.on_worker_failed(e).await;
                    }
                }
                () = next_tick(&mut timer) => {
                    self.start_check(false);
                }
            }
        }
    }

    fn emit(&self, event: UpdateEvent) {
        let _ = self.events.send(event);
    }

    fn log_line(&self, text: impl Into<String>) {
        self.emit(UpdateEvent::log(text));
    }

    fn transition(&mut self, state: UpdateState) {
        debug!("Update state: {} -> {}", self.state, state);
        self.state = state;
        if let Some(session) = self.session.as_mut() {
            session.state = state;
        }
        self.emit(UpdateEvent::StateChanged {
            state,
        });
    }

    fn handle_command(&mut self, command: UpdateCommand) {
        match command {
            UpdateCommand::CheckNow => self.start_check(true),
            UpdateCommand::ConfirmUpdate => self.confirm(),
            UpdateCommand::DeclineUpdate => self.decline(),
            UpdateCommand::Shutdown => {}
        }
    }

    fn start_check(&mut self, explicit: bool) {
        if !self.state.is_idle() {
            debug!("Ignoring update check while {}", self.state);
            return;
        }

        let check = Uuid::new_v4();
        self.pending_check = Some(check);
        self.transition(UpdateState::Checking);
        self.emit(UpdateEvent::CheckStarted);

        let fetcher = self.fetcher.clone();
        let url = self.manifest_url.clone();
        let reports = self.reports_tx.clone();
        self.workers.spawn(async move {
            let result = fetcher.fetch(&url).await;
            let _ = reports.send(WorkerReport::Manifest {
                check,
                explicit,
                result,
            });
        });
    }

    fn confirm(&mut self) {
        if self.state != UpdateState::Prompting {
            debug!("Ignoring confirmation while {}", self.state);
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let id = session.id;
        let url = session.manifest.artifact_url.clone();
        let dest = session.download_dir();
        info!("Update to {} confirmed", session.manifest.version);
        self.declined = None;
        self.transition(UpdateState::Confirmed);
        self.transition(UpdateState::Downloading);

        let downloader = self.downloader.clone();
        let reports = self.reports_tx.clone();
        self.workers.spawn(async move {
            let progress = reports.clone();
            let result = downloader
                .download(&url, &dest, move |percent| {
                    let _ = progress.send(WorkerReport::Progress {
                        session: id,
                        percent,
                    });
                })
                .await;
            let _ = reports.send(WorkerReport::Downloaded {
                session: id,
                result,
            });
        });
    }

    fn decline(&mut self) {
        if self.state != UpdateState::Prompting {
            debug!("Ignoring decline while {}", self.state);
            return;
        }
        if let Some(session) = self.session.take() {
            info!("Update to {} declined", session.manifest.version);
            self.declined = Some(session.manifest.version);
        }
        self.transition(UpdateState::Declined);
        self.transition(UpdateState::Idle);
    }

    async fn handle_report(&mut self, report: WorkerReport) -> Option<RunOutcome> {
        let current = self.session.as_ref().map(|s| s.id);
        if report.session_id().is_some() && report.session_id() != current {
            debug!("Dropping stale worker report");
            return None;
        }

        match report {
            WorkerReport::Manifest {
                check,
                explicit,
                result,
            } => {
                if self.pending_check != Some(check) || self.state != UpdateState::Checking {
                    debug!("Dropping stale manifest report");
                    return None;
                }
                self.pending_check = None;
                match result {
                    Ok(manifest) => self.on_manifest(manifest, explicit).await,
                    Err(e) => self.fail(e).await,
                }
            }
            WorkerReport::Progress {
                percent,
                ..
            } => {
                if self.state == UpdateState::Downloading {
                    self.report_progress(percent);
                }
            }
            WorkerReport::Downloaded {
                result,
                ..
            } => match result {
                Ok(path) => self.on_downloaded(path),
                Err(e) => self.fail(e).await,
            },
            WorkerReport::Verified {
                result,
                ..
            } => match result {
                Ok(verification) => self.on_verified(verification).await,
                Err(e) => self.fail(e).await,
            },
            WorkerReport::Staged {
                result,
                ..
            } => match result {
                Ok(root) => self.on_staged(root),
                Err(e) => self.fail(e).await,
            },
            WorkerReport::ScriptReady {
                result,
                ..
            } => match result {
                Ok(script) => return self.hand_off(script).await,
                Err(e) => self.fail(e).await,
            },
        }
        None
    }

    async fn on_manifest(&mut self, manifest: Manifest, explicit: bool) {
        let newer = match VersionComparator::try_is_newer(&manifest.version, self.installed.as_str()) {
            Ok(newer) => newer,
            Err(e) => return self.fail(e).await,
        };

        if !newer {
            info!("Installed version {} is up to date (latest {})", self.installed, manifest.version);
            self.transition(UpdateState::UpToDate);
            self.emit(UpdateEvent::UpToDate {
                version: manifest.version,
            });
            self.transition(UpdateState::Idle);
            return;
        }

        if !explicit && self.declined.as_deref() == Some(manifest.version.as_str()) {
            debug!("Version {} was declined, not offering it again", manifest.version);
            self.transition(UpdateState::Idle);
            return;
        }

        if !manifest.is_verifiable() && !self.config.allow_unverified {
            return self
                .fail(UpdateError::ChecksumUnavailable {
                    version: manifest.version,
                })
                .await;
        }

        info!("Update available: {} -> {}", self.installed, manifest.version);
        let verifiable = manifest.is_verifiable();
        let version = manifest.version.clone();
        self.session = Some(UpdateSession::new(manifest, &self.config.temp_root(), &self.config.app_name));
        self.transition(UpdateState::UpdateAvailable);
        self.emit(UpdateEvent::UpdateAvailable {
            version: version.clone(),
            installed: self.installed.to_string(),
            verifiable,
        });
        if !verifiable {
            warn!("Version {} has no published checksum; it will be installed unverified", version);
            self.log_line(format!(
                "Warning: release {version} publishes no checksum. Installing it skips integrity verification (reduced trust)."
            ));
        }
        self.transition(UpdateState::Prompting);
    }

    fn report_progress(&mut self, percent: u8) {
        let Some(reported) = self.session.as_mut().and_then(|s| s.record_progress(percent)) else {
            return;
        };
        self.emit(UpdateEvent::DownloadProgress {
            percent: reported,
        });
    }

    fn on_downloaded(&mut self, path: PathBuf) {
        self.report_progress(100);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.artifact_path = Some(path.clone());
        let id = session.id;
        let expected = session.manifest.checksum.clone();
        self.log_line(format!("Downloaded {}", path.display()));
        self.transition(UpdateState::Verifying);

        let reports = self.reports_tx.clone();
        self.workers.spawn(async move {
            let result = IntegrityVerifier::check(&path, expected.as_deref()).await;
            let _ = reports.send(WorkerReport::Verified {
                session: id,
                result,
            });
        });
    }

    async fn on_verified(&mut self, verification: Verification) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(artifact) = session.artifact_path.clone() else {
            return;
        };

        match verification {
            Verification::Verified {
                digest,
            } => self.log_line(format!("Checksum verified (sha256 {digest})")),
            Verification::Unverified {
                digest,
            } => {
                warn!("Installing unverified artifact {} (sha256 {})", artifact.display(), digest);
                self.log_line(format!("Artifact not verified, no published checksum (sha256 {digest})"));
            }
            Verification::Mismatch {
                expected,
                actual,
            } => {
                let name = artifact
                    .file_name()
                    .map_or_else(|| artifact.display().to_string(), |n| n.to_string_lossy().into_owned());
                return self
                    .fail(UpdateError::IntegrityMismatch {
                        name,
                        expected,
                        actual,
                    })
                    .await;
            }
        }

        let id = session.id;
        let temp_dir = session.temp_dir.clone();
        self.transition(UpdateState::Staging);

        let stager = self.stager;
        let executable = self.target.executable_name.clone();
        let reports = self.reports_tx.clone();
        self.workers.spawn(async move {
            let result = stager.stage(&artifact, &temp_dir, &executable).await;
            let _ = reports.send(WorkerReport::Staged {
                session: id,
                result,
            });
        });
    }

    fn on_staged(&mut self, staged_dir: PathBuf) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.staged_dir = Some(staged_dir.clone());
        let id = session.id;

        let params = ScriptParams {
            staged_dir,
            install_dir: self.target.install_dir.clone(),
            temp_dir: session.temp_dir.clone(),
            executable: self.target.executable_name.clone(),
            interpreter: self.target.interpreter.clone(),
            grace_delay: self.config.grace_delay(),
        };

        let scripts = Arc::clone(&self.scripts);
        let reports = self.reports_tx.clone();
        self.workers.spawn(async move {
            let result = scripts.generate(&params).await;
            let _ = reports.send(WorkerReport::ScriptReady {
                session: id,
                result,
            });
        });
    }

    async fn hand_off(&mut self, script: PathBuf) -> Option<RunOutcome> {
        if let Some(session) = self.session.as_mut() {
            session.script_path = Some(script.clone());
        }
        self.transition(UpdateState::ReadyToRestart);

        if let Err(e) = self.launcher.launch(self.scripts.kind(), &script) {
            self.fail(e).await;
            return None;
        }

        self.transition(UpdateState::HandedOff);
        self.emit(UpdateEvent::AboutToRestart {
            script: script.clone(),
        });
        info!("Handed off to {}", script.display());
        Some(RunOutcome::HandedOff {
            script,
        })
    }

    /// A worker ended without reporting. The phase it served can never
    /// complete, so the session fails from whatever state it was in.
    async fn on_worker_failed(&mut self, e: JoinError) {
        error!("Update worker task failed: {}", e);
        let reason = format!("worker task failed: {e}");
        let error = match self.state {
            UpdateState::Checking => UpdateError::NetworkError {
                operation: "fetch manifest".to_string(),
                reason,
            },
            UpdateState::Downloading => UpdateError::NetworkError {
                operation: "download artifact".to_string(),
                reason,
            },
            UpdateState::Verifying => UpdateError::IoError(std::io::Error::other(reason)),
            UpdateState::Staging if self.session.as_ref().is_some_and(|s| s.staged_dir.is_some()) => {
                UpdateError::ScriptGenerationFailed {
                    reason,
                }
            }
            UpdateState::Staging => UpdateError::ExtractFailed {
                archive: String::new(),
                reason,
            },
            _ => return,
        };
        self.pending_check = None;
        self.fail(error).await;
    }

    async fn fail(&mut self, error: UpdateError) {
        let kind = error.kind();
        if kind.is_transient() {
            warn!("Update check failed ({}): {}", kind, error);
        } else {
            error!("Update failed ({}): {}", kind, error);
        }

        self.transition(UpdateState::Failed(kind));
        self.emit(UpdateEvent::Error {
            kind,
            message: error.to_string(),
        });
        if let Some(session) = self.session.take() {
            session.discard().await;
        }
        self.transition(UpdateState::Idle);
    }
}

/// Next tick of an optional timer; pends forever when there is none.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
