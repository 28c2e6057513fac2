//! Semantic version comparison for update decisions.

use semver::Version;
use std::cmp::Ordering;
use tracing::warn;

use crate::core::{Result, UpdateError};

/// Decides whether a candidate version supersedes the installed one.
///
/// Comparison follows semantic-version precedence: numeric `major.minor.patch`
/// first, then pre-release identifiers (a release outranks its pre-releases).
/// Build metadata never affects precedence. Version strings are never compared
/// lexicographically, so `10.0.0` is correctly newer than `2.0.0`.
///
/// Inputs are read leniently: a leading `v`/`V` is dropped (release tags) and
/// missing minor/patch fields count as zero (`1.2` reads as `1.2.0`).
///
/// # Examples
///
/// ```rust
/// use selfswap::update::VersionComparator;
///
/// assert!(VersionComparator::is_newer("1.2.0", "1.1.3"));
/// assert!(VersionComparator::is_newer("v10.0.0", "v2.0.0"));
/// assert!(!VersionComparator::is_newer("2.0.0", "10.0.0"));
/// assert!(!VersionComparator::is_newer("1.1.3", "1.1.3"));
/// ```
pub struct VersionComparator;

impl VersionComparator {
    /// Parse a version string leniently.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidVersion`] when the string is not a
    /// semantic version even after normalization.
    pub fn parse(raw: &str) -> Result<Version> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

        Version::parse(stripped).or_else(|first_err| {
            Version::parse(&pad_core(stripped)).map_err(|_| UpdateError::InvalidVersion {
                version: raw.to_string(),
                reason: first_err.to_string(),
            })
        })
    }

    /// Compare two versions by semantic-version precedence.
    pub fn compare(a: &Version, b: &Version) -> Ordering {
        (a.major, a.minor, a.patch).cmp(&(b.major, b.minor, b.patch)).then_with(|| a.pre.cmp(&b.pre))
    }

    /// Whether `candidate` supersedes `installed`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidVersion`] if either side cannot be parsed.
    pub fn try_is_newer(candidate: &str, installed: &str) -> Result<bool> {
        let candidate = Self::parse(candidate)?;
        let installed = Self::parse(installed)?;
        Ok(Self::compare(&candidate, &installed) == Ordering::Greater)
    }

    /// Whether `candidate` supersedes `installed`; `false` if either is unparseable.
    pub fn is_newer(candidate: &str, installed: &str) -> bool {
        match Self::try_is_newer(candidate, installed) {
            Ok(newer) => newer,
            Err(e) => {
                warn!("Cannot compare versions: {}", e);
                false
            }
        }
    }
}

/// Pad `1` / `1.2` to `1.0.0` / `1.2.0`, keeping any pre-release or build suffix.
fn pad_core(version: &str) -> String {
    let split = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(split);
    let missing = 2usize.saturating_sub(core.matches('.').count());
    let mut padded = core.to_string();
    for _ in 0..missing {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    padded
}
