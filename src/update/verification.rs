use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::core::{Result, UpdateError};

/// Read size used while hashing artifacts.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Outcome of checking an artifact against an optional published digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Computed digest equals the published one
    Verified {
        /// The matching digest
        digest: String,
    },
    /// Computed digest differs from the published one
    Mismatch {
        /// Digest from the manifest
        expected: String,
        /// Digest computed locally
        actual: String,
    },
    /// No digest was published; the file was hashed for the record only
    Unverified {
        /// Digest computed locally
        digest: String,
    },
}

impl Verification {
    /// Whether the artifact may be used.
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Self::Mismatch { .. })
    }
}

/// Verifies the integrity of a downloaded artifact using SHA-256.
///
/// Files are hashed incrementally in [`CHUNK_SIZE`] reads so memory use stays
/// flat regardless of artifact size. Digests are lowercase hex without any
/// prefix; published digests may carry a `sha256:` prefix and any case.
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Compute the SHA-256 digest of a file as lowercase hex.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use selfswap::update::IntegrityVerifier;
    /// use std::path::Path;
    ///
    /// # async fn example() -> selfswap::core::Result<()> {
    /// let digest = IntegrityVerifier::compute_sha256(Path::new("/tmp/app-1.2.0.zip")).await?;
    /// println!("sha256: {digest}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compute_sha256(path: &Path) -> Result<String> {
        debug!("Computing SHA256 checksum for: {:?}", path);

        let mut file = File::open(path).await.map_err(|_| UpdateError::fs("open artifact", path))?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Normalize a published digest to lowercase hex.
    ///
    /// Accepts an optional `sha256:` prefix and surrounding whitespace.
    /// Returns `None` unless exactly 64 hex digits remain.
    pub fn normalize_digest(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        let hex_part = trimmed
            .get(..7)
            .filter(|prefix| prefix.eq_ignore_ascii_case("sha256:"))
            .map_or(trimmed, |_| &trimmed[7..]);

        (hex_part.len() == 64 && hex_part.bytes().all(|b| b.is_ascii_hexdigit()))
            .then(|| hex_part.to_ascii_lowercase())
    }

    /// Hash `path` and compare it with `expected`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ParseError`] when `expected` is not a SHA-256
    /// digest, or an I/O error when the file cannot be read. A digest mismatch
    /// is reported as [`Verification::Mismatch`], not as an error.
    pub async fn check(path: &Path, expected: Option<&str>) -> Result<Verification> {
        let actual = Self::compute_sha256(path).await?;

        let Some(raw) = expected else {
            warn!("No checksum published for {}, integrity not verified", path.display());
            return Ok(Verification::Unverified {
                digest: actual,
            });
        };

        let expected = Self::normalize_digest(raw).ok_or_else(|| UpdateError::ParseError {
            source_url: path.display().to_string(),
            reason: format!("'{raw}' is not a SHA-256 digest"),
        })?;

        if expected == actual {
            info!("Checksum verification successful for {}", path.display());
            Ok(Verification::Verified {
                digest: actual,
            })
        } else {
            warn!("Checksum mismatch for {}: expected {}, got {}", path.display(), expected, actual);
            Ok(Verification::Mismatch {
                expected,
                actual,
            })
        }
    }

    /// Whether `path` hashes to `expected`.
    ///
    /// Any mismatch, including an `expected` value that is not a SHA-256
    /// digest, yields `false`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the file cannot be read.
    pub async fn verify(path: &Path, expected: &str) -> Result<bool> {
        let Some(expected) = Self::normalize_digest(expected) else {
            warn!("Refusing to verify {} against malformed digest '{}'", path.display(), expected);
            return Ok(false);
        };
        Ok(matches!(Self::check(path, Some(&expected)).await?, Verification::Verified { .. }))
    }
}
