//! One-shot update check.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::debug;

use crate::cli::CliConfig;
use crate::cli::common::ReleaseArgs;
use crate::update::{ManifestFetcher, VersionComparator};

/// Fetch the manifest and report whether a newer version is published.
///
/// Nothing is downloaded. Exits successfully whether or not an update exists.
#[derive(Args, Debug)]
pub struct CheckCommand {
    #[command(flatten)]
    release: ReleaseArgs,
}

impl CheckCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let (config, installed) = self.release.resolve(cli).await?;
        let url = config.manifest_url.clone().unwrap_or_default();

        let fetcher = ManifestFetcher::new(config.fetch_timeout(), config.manifest_format)?;
        let spinner = cli.spinner(format!("Checking {url}"));
        let result = fetcher.fetch(&url).await;
        spinner.finish_and_clear();
        let manifest = result?;
        debug!("Manifest offers {} ({:?})", manifest.version, manifest.format);

        if VersionComparator::try_is_newer(&manifest.version, installed.as_str())? {
            println!(
                "{} {} -> {}",
                "Update available:".green().bold(),
                installed.as_str().yellow(),
                manifest.version.green()
            );
            println!("  artifact: {}", manifest.artifact_url);
            match &manifest.checksum {
                Some(checksum) => println!("  sha256:   {checksum}"),
                None if config.allow_unverified => {
                    println!("  {}", "no checksum published; install would be unverified".yellow());
                }
                None => {
                    println!(
                        "  {}",
                        "no checksum published; installing requires --allow-unverified".yellow()
                    );
                }
            }
        } else {
            println!(
                "{}",
                format!("Up to date ({} installed, {} published)", installed, manifest.version).green()
            );
        }

        Ok(())
    }
}
