//! selfswap - a self-update engine for long-running applications
//!
//! selfswap lets an installed program replace itself with a newer release
//! without a package manager. It checks a published release manifest, asks
//! the user, downloads and verifies the artifact, stages it next to the
//! running install and hands off to a small restart script that swaps the
//! files once the host has exited, then relaunches the new version.
//!
//! # Architecture Overview
//!
//! - [`update`] - the engine: fetcher, comparator, downloader, verifier,
//!   stager, restart scripts and the orchestrator state machine
//! - [`core`] - error types and their terminal presentation
//! - [`config`] - the global configuration file
//! - [`cli`] - the `selfswap` command-line front end
//! - [`utils`] - progress indicators
//!
//! # Embedding
//!
//! ```rust,no_run
//! use selfswap::update::{InstallTarget, InstalledVersion, UpdateConfig, UpdateEvent, UpdateOrchestrator};
//!
//! # async fn example() -> selfswap::core::Result<()> {
//! let config = UpdateConfig {
//!     manifest_url: Some("https://example.com/release.json".to_string()),
//!     ..UpdateConfig::default()
//! };
//! let target = InstallTarget::from_config(&config)?;
//! let (handle, mut events, orchestrator) =
//!     UpdateOrchestrator::new(config, InstalledVersion::new("1.0.0")?, target)?;
//!
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         if let UpdateEvent::UpdateAvailable { .. } = event {
//!             let _ = handle.confirm_update().await;
//!         }
//!     }
//! });
//!
//! orchestrator.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Platform Support
//!
//! Restart scripts are generated as POSIX `sh` on Linux and macOS and as
//! batch files on Windows. Both dialects can be rendered on any host, which
//! is what `selfswap script --platform` does.

pub mod cli;
pub mod config;
pub mod core;
pub mod update;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
