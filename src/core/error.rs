//! Error handling for selfswap
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`UpdateError`]) so the update orchestrator can
//!    decide how to recover from each failure
//! 2. **User-friendly messages** ([`ErrorContext`]) with actionable suggestions
//!    for the terminal front end
//!
//! # Recovery Policy
//!
//! Every [`UpdateError`] maps to an [`ErrorKind`] through [`UpdateError::kind`].
//! The kind carries the recovery policy the orchestrator applies:
//!
//! - [`ErrorKind::Network`], [`ErrorKind::Timeout`], [`ErrorKind::Parse`] are
//!   transient: logged, the session returns to idle and the next periodic check
//!   retries automatically.
//! - Every other kind is user-visible: the presentation layer shows it and the
//!   check/retry affordance is re-enabled.
//!
//! No kind ever implies a partially written install directory, because all
//! destructive writes happen inside the detached restart script.
//!
//! # Examples
//!
//! ```rust,no_run
//! use selfswap::core::{ErrorKind, UpdateError, user_friendly_error};
//!
//! let error = UpdateError::IntegrityMismatch {
//!     name: "app-1.2.0.zip".to_string(),
//!     expected: "aa".repeat(32),
//!     actual: "bb".repeat(32),
//! };
//! assert_eq!(error.kind(), ErrorKind::IntegrityMismatch);
//! assert!(!error.kind().is_transient());
//!
//! user_friendly_error(anyhow::Error::from(error)).display();
//! ```

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The main error type for update operations.
///
/// Each variant names a specific failure mode of the self-update pipeline and
/// carries the details needed to explain it to a user.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Manifest or artifact transfer failed
    #[error("Network error: {operation}")]
    NetworkError {
        /// What was being transferred (e.g., "fetch manifest")
        operation: String,
        /// Underlying reason reported by the HTTP client or the server
        reason: String,
    },

    /// The manifest request exceeded its bounded timeout
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// The configured timeout in seconds
        seconds: u64,
    },

    /// The manifest document could not be understood
    #[error("Malformed manifest from {source_url}: {reason}")]
    ParseError {
        /// Where the manifest came from
        source_url: String,
        /// What was wrong with it
        reason: String,
    },

    /// A version string is not a usable semantic version
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion {
        /// The offending version string
        version: String,
        /// Parser message
        reason: String,
    },

    /// The manifest provides no checksum and unverified updates are not allowed
    #[error("Manifest for version {version} carries no checksum")]
    ChecksumUnavailable {
        /// The version offered by the manifest
        version: String,
    },

    /// The downloaded artifact does not hash to the manifest checksum
    #[error("Checksum mismatch for '{name}': expected {expected}, got {actual}")]
    IntegrityMismatch {
        /// File name of the artifact
        name: String,
        /// Digest announced by the manifest
        expected: String,
        /// Digest computed locally
        actual: String,
    },

    /// The artifact could not be unpacked
    #[error("Failed to extract {archive}: {reason}")]
    ExtractFailed {
        /// Path of the archive
        archive: String,
        /// What went wrong
        reason: String,
    },

    /// The unpacked archive has no unambiguous root to install from
    #[error("No usable layout in {archive}: {reason}")]
    LayoutNotFound {
        /// Path of the archive
        archive: String,
        /// Why the layout was rejected
        reason: String,
    },

    /// The restart script could not be produced
    #[error("Failed to generate restart script: {reason}")]
    ScriptGenerationFailed {
        /// What went wrong
        reason: String,
    },

    /// The restart script could not be started
    #[error("Failed to launch restart script {path}: {reason}")]
    HandoffFailed {
        /// Path of the script
        path: String,
        /// Spawn error
        reason: String,
    },

    /// Configuration problem
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// File system operation failed
    #[error("File system error: {operation} ({path})")]
    FileSystemError {
        /// The operation that failed
        operation: String,
        /// Path involved
        path: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification of [`UpdateError`]s, reported to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Manifest or artifact transfer failed
    Network,
    /// Manifest fetch exceeded its timeout
    Timeout,
    /// Malformed manifest or version string
    Parse,
    /// Unverifiable manifest rejected by configuration
    ChecksumUnavailable,
    /// Downloaded artifact failed checksum verification
    IntegrityMismatch,
    /// Archive could not be unpacked
    ExtractFailed,
    /// Archive has no unambiguous root directory
    LayoutNotFound,
    /// Restart script could not be written
    ScriptGenerationFailed,
    /// Restart script could not be launched
    HandoffFailed,
    /// Local file system or configuration failure
    Local,
}

impl ErrorKind {
    /// Whether the next periodic check is expected to clear this failure.
    ///
    /// Transient failures are logged rather than shown to the user.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Parse)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Parse => "parse",
            Self::ChecksumUnavailable => "checksum-unavailable",
            Self::IntegrityMismatch => "integrity-mismatch",
            Self::ExtractFailed => "extract-failed",
            Self::LayoutNotFound => "layout-not-found",
            Self::ScriptGenerationFailed => "script-generation-failed",
            Self::HandoffFailed => "handoff-failed",
            Self::Local => "local",
        };
        f.write_str(name)
    }
}

impl UpdateError {
    /// Classify this error for the orchestrator and the presentation layer.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkError {
                ..
            } => ErrorKind::Network,
            Self::Timeout {
                ..
            } => ErrorKind::Timeout,
            Self::ParseError {
                ..
            }
            | Self::InvalidVersion {
                ..
            } => ErrorKind::Parse,
            Self::ChecksumUnavailable {
                ..
            } => ErrorKind::ChecksumUnavailable,
            Self::IntegrityMismatch {
                ..
            } => ErrorKind::IntegrityMismatch,
            Self::ExtractFailed {
                ..
            } => ErrorKind::ExtractFailed,
            Self::LayoutNotFound {
                ..
            } => ErrorKind::LayoutNotFound,
            Self::ScriptGenerationFailed {
                ..
            } => ErrorKind::ScriptGenerationFailed,
            Self::HandoffFailed {
                ..
            } => ErrorKind::HandoffFailed,
            Self::ConfigError {
                ..
            }
            | Self::FileSystemError {
                ..
            }
            | Self::IoError(_) => ErrorKind::Local,
        }
    }

    /// Shorthand for a [`UpdateError::FileSystemError`] on `path`.
    pub fn fs(operation: impl Into<String>, path: impl AsRef<std::path::Path>) -> Self {
        Self::FileSystemError {
            operation: operation.into(),
            path: path.as_ref().display().to_string(),
        }
    }
}

impl Clone for UpdateError {
    fn clone(&self) -> Self {
        match self {
            Self::NetworkError {
                operation,
                reason,
            } => Self::NetworkError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::Timeout {
                operation,
                seconds,
            } => Self::Timeout {
                operation: operation.clone(),
                seconds: *seconds,
            },
            Self::ParseError {
                source_url,
                reason,
            } => Self::ParseError {
                source_url: source_url.clone(),
                reason: reason.clone(),
            },
            Self::InvalidVersion {
                version,
                reason,
            } => Self::InvalidVersion {
                version: version.clone(),
                reason: reason.clone(),
            },
            Self::ChecksumUnavailable {
                version,
            } => Self::ChecksumUnavailable {
                version: version.clone(),
            },
            Self::IntegrityMismatch {
                name,
                expected,
                actual,
            } => Self::IntegrityMismatch {
                name: name.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::ExtractFailed {
                archive,
                reason,
            } => Self::ExtractFailed {
                archive: archive.clone(),
                reason: reason.clone(),
            },
            Self::LayoutNotFound {
                archive,
                reason,
            } => Self::LayoutNotFound {
                archive: archive.clone(),
                reason: reason.clone(),
            },
            Self::ScriptGenerationFailed {
                reason,
            } => Self::ScriptGenerationFailed {
                reason: reason.clone(),
            },
            Self::HandoffFailed {
                path,
                reason,
            } => Self::HandoffFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::FileSystemError {
                operation,
                path,
            } => Self::FileSystemError {
                operation: operation.clone(),
                path: path.clone(),
            },
            // io::Error is not Clone; keep kind and message
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// When displayed, errors show:
/// 1. **Error**: the main error message in red
/// 2. **Details**: additional context in yellow (optional)
/// 3. **Suggestion**: actionable steps in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error, if one was recognized
    pub error: Option<UpdateError>,
    /// Message shown when no typed error is available
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from an [`UpdateError`]
    #[must_use]
    pub fn new(error: UpdateError) -> Self {
        Self {
            message: error.to_string(),
            error: Some(error),
            suggestion: None,
            details: None,
        }
    }

    /// Create a context for an error that has no typed counterpart.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: None,
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`UpdateError`] (anywhere in the chain), [`std::io::Error`] and
/// [`toml::de::Error`]; everything else is shown with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.chain().find_map(|e| e.downcast_ref::<UpdateError>()) {
        return create_error_context(update_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::message(error.to_string())
                    .with_suggestion("Check ownership of the install and temp directories, or run with elevated permissions")
                    .with_details("selfswap could not read or write a file it needs");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::message(error.to_string())
                    .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::message(format!("Invalid configuration file: {toml_error}"))
            .with_suggestion("Check the TOML syntax of your selfswap config.toml")
            .with_details("Values under [update] must match the documented types");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::message(message)
}

/// Map each [`UpdateError`] variant to tailored suggestions.
fn create_error_context(error: UpdateError) -> ErrorContext {
    match &error {
        UpdateError::NetworkError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check your network connection and the manifest URL")
            .with_details("The next periodic check retries automatically"),
        UpdateError::Timeout {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Raise update.fetch_timeout if the release server is slow"),
        UpdateError::ParseError {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "The manifest must be {\"version\", \"download_url\", \"checksum\"} or a release document with \"tag_name\" and \"zipball_url\"",
        ),
        UpdateError::InvalidVersion {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Use semantic versions such as 1.4.2 or v1.4.2"),
        UpdateError::ChecksumUnavailable {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Publish a checksum in the manifest, or set update.allow_unverified = true to accept unverified updates")
            .with_details("Updates without a checksum are rejected unless explicitly allowed"),
        UpdateError::IntegrityMismatch {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Retry the update; if it keeps failing, download the release manually")
            .with_details("The install directory was not modified"),
        UpdateError::ExtractFailed {
            ..
        }
        | UpdateError::LayoutNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check update.stage_mode and update.archive_layout against the published artifact")
            .with_details("The install directory was not modified"),
        UpdateError::ScriptGenerationFailed {
            ..
        }
        | UpdateError::HandoffFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check that the temp directory is writable, then retry the update"),
        UpdateError::ConfigError {
            ..
        } => ErrorContext::new(error).with_suggestion("Review the [update] table of your config file"),
        UpdateError::FileSystemError {
            ..
        }
        | UpdateError::IoError(_) => ErrorContext::new(error)
            .with_suggestion("Check free disk space and permissions of the temp directory"),
    }
}
