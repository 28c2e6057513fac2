//! Standalone integrity check.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::CliConfig;
use crate::update::{IntegrityVerifier, Verification};

/// Check a file against an expected SHA-256 digest.
///
/// Without a digest, prints the file's digest instead. Fails on mismatch.
#[derive(Args, Debug)]
pub struct VerifyCommand {
    /// File to hash
    file: PathBuf,

    /// Expected digest, hex, optionally prefixed with `sha256:`
    sha256: Option<String>,
}

impl VerifyCommand {
    pub async fn execute(self, _cli: &CliConfig) -> Result<()> {
        match IntegrityVerifier::check(&self.file, self.sha256.as_deref()).await? {
            Verification::Verified {
                digest,
            } => {
                println!("{} {}  {}", "OK".green().bold(), digest, self.file.display());
                Ok(())
            }
            Verification::Unverified {
                digest,
            } => {
                println!("{digest}  {}", self.file.display());
                Ok(())
            }
            Verification::Mismatch {
                expected,
                actual,
            } => {
                println!("{} {}", "MISMATCH".red().bold(), self.file.display());
                println!("  expected: {expected}");
                println!("  actual:   {actual}");
                bail!("Checksum mismatch for {}", self.file.display())
            }
        }
    }
}
