//! Integration test suite for selfswap
//!
//! End-to-end tests of the update engine and the `selfswap` binary. Release
//! servers are simulated with `wiremock` or with `file://` URLs into a
//! throwaway directory; restart scripts are recorded rather than launched,
//! except in `posix_script`, which runs one for real on Unix hosts.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! RUST_LOG=selfswap=debug cargo test --test integration -- --nocapture
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `selfswap` binary via `assert_cmd`
//! - **end_to_end**: check, confirm, download, verify, stage and hand off
//! - **fetcher**: manifest requests against a mock server
//! - **guard**: commands arriving while a session is in flight
//! - **posix_script**: a generated restart script swapping a real install
//! - **staging**: failed staging leaves the installation untouched

mod common;

mod cli;
mod end_to_end;
mod fetcher;
mod guard;
mod posix_script;
