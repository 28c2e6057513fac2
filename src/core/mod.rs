//! Core types shared by every part of selfswap
//!
//! Currently this is the error system:
//! - [`UpdateError`] - typed failures of the update pipeline
//! - [`ErrorKind`] - coarse classification carrying the recovery policy
//! - [`ErrorContext`] / [`user_friendly_error`] - terminal presentation of errors
//!
//! Engine functions return [`Result`]; the binary works with [`anyhow::Result`]
//! and converts at the edge with [`user_friendly_error`].

pub mod error;

pub use error::{ErrorContext, ErrorKind, UpdateError, user_friendly_error};

/// Result alias used throughout the update engine.
pub type Result<T> = std::result::Result<T, UpdateError>;
