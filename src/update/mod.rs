//! The self-update engine.
//!
//! Lets a long-running application replace itself with a newer release
//! without a package manager, on Windows and POSIX systems alike.
//!
//! # Architecture Overview
//!
//! - **[`ManifestFetcher`]**: retrieves the release manifest with a bounded timeout
//! - **[`VersionComparator`]**: semantic-version precedence, never string order
//! - **[`ArtifactDownloader`]**: streams the artifact to disk, reporting progress
//! - **[`IntegrityVerifier`]**: streaming SHA-256 against the published checksum
//! - **[`ArchiveStager`]**: unpacks or places the artifact into a staged tree
//! - **[`RestartScriptGenerator`]**: writes the swap-and-relaunch script per platform
//! - **[`ProcessLauncher`]**: starts that script detached from the host
//! - **[`UpdateOrchestrator`]**: the state machine tying it all together
//!
//! ## Update Flow
//!
//! ```text
//! 1. Check
//!    ├── Fetch manifest (timer tick or explicit check)
//!    └── Compare offered version with the installed one
//!
//! 2. Prompt
//!    └── Presentation layer confirms or declines
//!
//! 3. Prepare (inside <temp_root>/<app>_update_<id>/)
//!    ├── Download artifact
//!    ├── Verify checksum
//!    ├── Stage: extract archive or place binary
//!    └── Write restart script
//!
//! 4. Hand off
//!    ├── Launch restart script detached
//!    └── Host exits; script waits, copies, relaunches, cleans up
//! ```
//!
//! # Safety
//!
//! The running process never writes into the install directory. Every step
//! before the restart script's copy is confined to the session temp
//! directory, so any failure up to handoff leaves the installation untouched
//! and only costs a discarded temp directory.
//!
//! Manifests without a checksum are refused unless
//! [`UpdateConfig::allow_unverified`] is set; accepted ones are reported as
//! reduced-trust installs.

pub mod config;
pub mod download;
pub mod events;
pub mod launcher;
pub mod manifest;
pub mod orchestrator;
pub mod script;
pub mod session;
pub mod stager;
pub mod target;
pub mod verification;
pub mod version;

pub use config::UpdateConfig;
pub use download::ArtifactDownloader;
pub use events::{UpdateCommand, UpdateEvent};
pub use launcher::{DetachedLauncher, ProcessLauncher};
pub use manifest::{Manifest, ManifestFetcher, ManifestFormat};
pub use orchestrator::{RunOutcome, UpdateHandle, UpdateOrchestrator};
pub use script::{PlatformKind, PosixShell, RestartScriptGenerator, ScriptBackend, ScriptParams, WindowsBatch};
pub use session::{UpdateSession, UpdateState};
pub use stager::{ArchiveLayout, ArchiveStager, StageMode};
pub use target::{InstallTarget, InstalledVersion};
pub use verification::{IntegrityVerifier, Verification};
pub use version::VersionComparator;
