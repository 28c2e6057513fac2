//! Arguments shared by the commands that talk to a release manifest.

use anyhow::{Result, anyhow};
use clap::Args;
use std::path::PathBuf;

use crate::cli::CliConfig;
use crate::update::{InstalledVersion, UpdateConfig};

/// Where to look for releases and what counts as installed.
#[derive(Args, Debug, Clone, Default)]
pub struct ReleaseArgs {
    /// Manifest URL, overriding `update.manifest_url`.
    #[arg(long, value_name = "URL")]
    pub manifest_url: Option<String>,

    /// Installed version to compare against. Defaults to this binary's version.
    #[arg(long, value_name = "VERSION")]
    pub installed: Option<String>,

    /// Accept manifests that publish no checksum (reduced trust).
    #[arg(long)]
    pub allow_unverified: bool,

    /// Manifest request timeout in seconds, overriding `update.fetch_timeout`.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Install directory, overriding `update.install_dir`.
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<PathBuf>,

    /// Executable relaunched after the swap, overriding `update.executable_name`.
    #[arg(long, value_name = "NAME")]
    pub executable: Option<String>,
}

impl ReleaseArgs {
    /// Merge the global configuration with these flags.
    ///
    /// # Errors
    ///
    /// Fails when the configuration file is invalid, no manifest URL is
    /// known, or `--installed` is not a semantic version.
    pub async fn resolve(&self, cli: &CliConfig) -> Result<(UpdateConfig, InstalledVersion)> {
        let mut config = cli.load_global().await?.update;

        if let Some(url) = &self.manifest_url {
            config.manifest_url = Some(url.clone());
        }
        if config.manifest_url.is_none() {
            return Err(anyhow!(
                "No manifest URL configured; pass --manifest-url or set update.manifest_url in the config file"
            ));
        }
        if self.allow_unverified {
            config.allow_unverified = true;
        }
        if let Some(timeout) = self.timeout {
            config.fetch_timeout = timeout;
        }
        if let Some(dir) = &self.install_dir {
            config.install_dir = Some(dir.clone());
        }
        if let Some(name) = &self.executable {
            config.executable_name = Some(name.clone());
        }

        let installed = match &self.installed {
            Some(version) => InstalledVersion::new(version.clone())?,
            None => InstalledVersion::of_package(),
        };

        Ok((config, installed))
    }
}
