//! Configuration management for selfswap
//!
//! selfswap reads a single user-wide TOML file, [`GlobalConfig`], whose
//! `[update]` table deserializes into [`crate::update::UpdateConfig`]. Every
//! key has a default, so an absent file is a valid configuration apart from
//! the manifest URL, which commands may also take on the command line.

pub mod global;

pub use global::GlobalConfig;
