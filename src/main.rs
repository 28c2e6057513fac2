//! selfswap command-line entry point
//!
//! Commands:
//! - `check` - fetch the release manifest and report whether an update exists
//! - `watch` - run the update orchestrator with a terminal prompt
//! - `verify` - check a file against a SHA-256 digest
//! - `script` - render a restart script for inspection

use anyhow::Result;
use clap::Parser;
use selfswap::cli;
use selfswap::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
