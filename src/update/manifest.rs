//! Release manifests and the fetcher that retrieves them.
//!
//! Two manifest shapes are accepted and normalized into [`Manifest`]:
//!
//! ```text
//! A) { "version": "1.2.0", "download_url": "https://…/app.zip", "checksum": "<sha256 hex>" }
//! B) { "tag_name": "v1.2.0", "zipball_url": "https://api.github.com/…/zipball/v1.2.0" }
//! ```
//!
//! Shape B (a hosted release API document) has no checksum. Such manifests are
//! flagged as unverifiable and the orchestrator decides, by configuration,
//! whether to accept them.

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::core::{Result, UpdateError};
use crate::update::verification::IntegrityVerifier;

/// Which manifest shape a deployment publishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestFormat {
    /// Detect the shape from the keys present
    #[default]
    Auto,
    /// `{version, download_url, checksum}`
    Direct,
    /// `{tag_name, zipball_url}`
    Release,
}

/// Remote description of the latest release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Version offered by the release source, as published
    pub version: String,
    /// Where the artifact can be downloaded
    pub artifact_url: String,
    /// Lowercase SHA-256 hex digest of the artifact, when published
    pub checksum: Option<String>,
    /// The shape this manifest was read from
    pub format: ManifestFormat,
}

#[derive(Deserialize)]
struct DirectManifest {
    version: String,
    download_url: String,
    #[serde(alias = "sha256")]
    checksum: Option<String>,
}

#[derive(Deserialize)]
struct ReleaseManifest {
    tag_name: String,
    zipball_url: String,
}

impl Manifest {
    /// Parse a manifest document.
    ///
    /// `source` only labels errors.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ParseError`] when the document is not JSON, does
    /// not match the expected shape, has empty fields, or carries a checksum
    /// that is not a SHA-256 hex digest.
    pub fn parse(body: &str, format: ManifestFormat, source: &str) -> Result<Self> {
        let parse_error = |reason: String| UpdateError::ParseError {
            source_url: source.to_string(),
            reason,
        };

        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| parse_error(e.to_string()))?;

        let format = match format {
            ManifestFormat::Auto if value.get("tag_name").is_some() => ManifestFormat::Release,
            ManifestFormat::Auto => ManifestFormat::Direct,
            explicit => explicit,
        };

        let manifest = match format {
            ManifestFormat::Release => {
                let raw: ReleaseManifest =
                    serde_json::from_value(value).map_err(|e| parse_error(e.to_string()))?;
                Self {
                    version: raw.tag_name,
                    artifact_url: raw.zipball_url,
                    checksum: None,
                    format,
                }
            }
            _ => {
                let raw: DirectManifest =
                    serde_json::from_value(value).map_err(|e| parse_error(e.to_string()))?;
                let checksum = match raw.checksum {
                    Some(digest) => Some(
                        IntegrityVerifier::normalize_digest(&digest)
                            .ok_or_else(|| parse_error(format!("invalid checksum '{digest}'")))?,
                    ),
                    None => None,
                };
                Self {
                    version: raw.version,
                    artifact_url: raw.download_url,
                    checksum,
                    format: ManifestFormat::Direct,
                }
            }
        };

        if manifest.version.trim().is_empty() {
            return Err(parse_error("empty version".to_string()));
        }
        if manifest.artifact_url.trim().is_empty() {
            return Err(parse_error("empty artifact URL".to_string()));
        }

        Ok(manifest)
    }

    /// Whether the artifact can be checked against a published digest.
    pub fn is_verifiable(&self) -> bool {
        self.checksum.is_some()
    }
}

/// Retrieves and parses manifests with a bounded timeout.
///
/// Every request bypasses HTTP caches: manifests are tiny and must reflect the
/// latest publish. `file://` URLs are read from disk, which serves offline
/// mirrors and local testing.
#[derive(Clone)]
pub struct ManifestFetcher {
    client: reqwest::Client,
    timeout: Duration,
    format: ManifestFormat,
}

impl ManifestFetcher {
    /// Create a fetcher with the given request timeout and expected shape.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ConfigError`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, format: ManifestFormat) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpdateError::ConfigError {
                message: format!("cannot build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            timeout,
            format,
        })
    }

    /// Fetch and parse the manifest at `url`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Timeout`] when the request exceeds the timeout
    /// - [`UpdateError::NetworkError`] for connection failures and non-2xx responses
    /// - [`UpdateError::ParseError`] for malformed documents
    pub async fn fetch(&self, url: &str) -> Result<Manifest> {
        debug!("Fetching manifest from {}", url);

        let body = match url.strip_prefix("file://") {
            Some(path) => read_local(PathBuf::from(path), self.timeout).await?,
            None => self.fetch_remote(url).await?,
        };

        let manifest = Manifest::parse(&body, self.format, url)?;
        debug!(
            "Manifest offers {} ({})",
            manifest.version,
            if manifest.is_verifiable() {
                "checksum present"
            } else {
                "no checksum"
            }
        );
        Ok(manifest)
    }

    async fn fetch_remote(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| self.transfer_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::NetworkError {
                operation: "fetch manifest".to_string(),
                reason: format!("HTTP {status} from {url}"),
            });
        }

        response.text().await.map_err(|e| self.transfer_error(&e))
    }

    fn transfer_error(&self, error: &reqwest::Error) -> UpdateError {
        if error.is_timeout() {
            UpdateError::Timeout {
                operation: "fetch manifest".to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            UpdateError::NetworkError {
                operation: "fetch manifest".to_string(),
                reason: error.to_string(),
            }
        }
    }
}

async fn read_local(path: PathBuf, timeout: Duration) -> Result<String> {
    match tokio::time::timeout(timeout, tokio::fs::read_to_string(&path)).await {
        Ok(Ok(body)) => Ok(body),
        Ok(Err(e)) => Err(UpdateError::NetworkError {
            operation: "fetch manifest".to_string(),
            reason: format!("{}: {e}", path.display()),
        }),
        Err(_) => Err(UpdateError::Timeout {
            operation: "fetch manifest".to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}
