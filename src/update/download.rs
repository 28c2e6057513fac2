//! Streaming artifact download with percentage progress.

use futures::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::{Result, UpdateError};
use crate::update::verification::CHUNK_SIZE;

/// File name used when neither the response nor the URL suggests one.
const FALLBACK_NAME: &str = "artifact";

/// Progress reported while the total size is unknown never exceeds this.
const UNKNOWN_SIZE_CAP: u8 = 99;

/// Tracks download progress as a monotonic percentage.
///
/// Only increases are reported. Without a known total, progress grows with one
/// percent per 100 KiB received and stays below 100 until the transfer ends.
#[derive(Debug)]
struct ProgressTracker {
    total: Option<u64>,
    received: u64,
    last: u8,
}

impl ProgressTracker {
    fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            received: 0,
            last: 0,
        }
    }

    /// Record `len` more bytes; returns the new percentage if it increased.
    fn advance(&mut self, len: u64) -> Option<u8> {
        self.received += len;
        let pct = match self.total {
            Some(total) => (self.received.saturating_mul(100) / total).min(100) as u8,
            None => (self.received / (100 * 1024)).min(u64::from(UNKNOWN_SIZE_CAP)) as u8,
        };
        (pct > self.last).then(|| {
            self.last = pct;
            pct
        })
    }
}

/// Downloads release artifacts into a session directory.
#[derive(Clone)]
pub struct ArtifactDownloader {
    client: reqwest::Client,
}

impl ArtifactDownloader {
    /// Create a downloader.
    ///
    /// Artifact transfers have no overall timeout: they can legitimately take
    /// minutes. Only connecting is bounded.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ConfigError`] if the HTTP client cannot be built.
    pub fn new(connect_timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpdateError::ConfigError {
                message: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
        })
    }

    /// Download `url` into `dest_dir`, calling `on_progress` as percentages rise.
    ///
    /// Returns the path of the written file. The file is named from the
    /// `Content-Disposition` header when present, else from the last URL path
    /// segment.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::NetworkError`] for transfer failures and non-2xx
    /// statuses, and file system errors when the destination cannot be written.
    pub async fn download<F>(&self, url: &str, dest_dir: &Path, mut on_progress: F) -> Result<PathBuf>
    where
        F: FnMut(u8) + Send,
    {
        info!("Downloading artifact from {}", url);
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|_| UpdateError::fs("create download directory", dest_dir))?;

        if let Some(local) = url.strip_prefix("file://") {
            return copy_local(Path::new(local), dest_dir, &mut on_progress).await;
        }

        let response = self.client.get(url).send().await.map_err(|e| network_error(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::NetworkError {
                operation: "download artifact".to_string(),
                reason: format!("HTTP {status} from {url}"),
            });
        }

        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| filename_from_url(url));
        let dest = dest_dir.join(name);

        let mut tracker = ProgressTracker::new(response.content_length());
        let mut file =
            File::create(&dest).await.map_err(|_| UpdateError::fs("create artifact file", &dest))?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| network_error(&e))?;
            file.write_all(&chunk).await?;
            if let Some(pct) = tracker.advance(chunk.len() as u64) {
                on_progress(pct);
            }
        }
        file.flush().await?;

        debug!("Downloaded {} bytes to {}", tracker.received, dest.display());
        Ok(dest)
    }
}

async fn copy_local<F>(source: &Path, dest_dir: &Path, on_progress: &mut F) -> Result<PathBuf>
where
    F: FnMut(u8) + Send,
{
    use tokio::io::AsyncReadExt;

    let mut input = File::open(source).await.map_err(|e| UpdateError::NetworkError {
        operation: "download artifact".to_string(),
        reason: format!("{}: {e}", source.display()),
    })?;
    let total = input.metadata().await.ok().map(|m| m.len());

    let name = source
        .file_name()
        .map_or_else(|| FALLBACK_NAME.to_string(), |n| n.to_string_lossy().into_owned());
    let dest = dest_dir.join(name);
    let mut output =
        File::create(&dest).await.map_err(|_| UpdateError::fs("create artifact file", &dest))?;

    let mut tracker = ProgressTracker::new(total);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = input.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        output.write_all(&buffer[..read]).await?;
        if let Some(pct) = tracker.advance(read as u64) {
            on_progress(pct);
        }
    }
    output.flush().await?;
    Ok(dest)
}

fn network_error(error: &reqwest::Error) -> UpdateError {
    UpdateError::NetworkError {
        operation: "download artifact".to_string(),
        reason: error.to_string(),
    }
}

/// Extract `filename="…"` from a `Content-Disposition` value.
fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"'))
        .and_then(sanitize)
}

fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().and_then(sanitize).unwrap_or_else(|| FALLBACK_NAME.to_string())
}

/// Keep only the final path component; reject empty and dot names.
fn sanitize(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    (!base.is_empty() && base != "." && base != "..").then(|| base.to_string())
}
