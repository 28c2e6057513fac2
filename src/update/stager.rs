//! Turns a verified artifact into a staged directory tree ready to be copied
//! over the install directory.
//!
//! Staging never touches the install directory. Everything is written below
//! the session temp directory:
//!
//! ```text
//! <session>/
//! ├── download/<artifact>
//! ├── extracted/…          archive artifacts
//! └── staged/<executable>  binary artifacts
//! ```

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::core::{Result, UpdateError};

const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Top-level names some archivers add beside the real content.
const IGNORED_TOP_LEVEL: &[&str] = &["__MACOSX", "pax_global_header"];

/// How the downloaded artifact becomes a staged tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageMode {
    /// Zip and gzip-tar artifacts are extracted, anything else is a binary
    #[default]
    Auto,
    /// The artifact is the executable itself
    Binary,
    /// The artifact is an archive; unreadable archives fail staging
    Archive,
}

/// Expected structure of an archive artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveLayout {
    /// Content sits inside exactly one top-level directory (source zipballs)
    #[default]
    Wrapped,
    /// Content sits at the archive root
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Zip,
    TarGz,
}

/// Stages artifacts according to the configured mode and layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveStager {
    mode: StageMode,
    layout: ArchiveLayout,
}

impl ArchiveStager {
    /// Create a stager.
    pub fn new(mode: StageMode, layout: ArchiveLayout) -> Self {
        Self {
            mode,
            layout,
        }
    }

    /// Stage `artifact` below `session_dir` and return the staged root.
    ///
    /// Binary artifacts are copied to `staged/<executable_name>` and marked
    /// executable. Archives are extracted to `extracted/` and the staged root
    /// is chosen by the configured [`ArchiveLayout`].
    ///
    /// # Errors
    ///
    /// - [`UpdateError::ExtractFailed`] for unreadable archives and entries
    ///   that would escape the extraction directory
    /// - [`UpdateError::LayoutNotFound`] when the extracted tree does not
    ///   match the expected layout
    pub async fn stage(
        &self,
        artifact: &Path,
        session_dir: &Path,
        executable_name: &str,
    ) -> Result<PathBuf> {
        let stager = *self;
        let artifact = artifact.to_path_buf();
        let session_dir = session_dir.to_path_buf();
        let executable_name = executable_name.to_string();

        tokio::task::spawn_blocking(move || {
            stager.stage_blocking(&artifact, &session_dir, &executable_name)
        })
        .await
        .map_err(|e| UpdateError::ExtractFailed {
            archive: String::new(),
            reason: format!("staging task failed: {e}"),
        })?
    }

    fn stage_blocking(&self, artifact: &Path, session_dir: &Path, executable_name: &str) -> Result<PathBuf> {
        let detected = detect_archive(artifact)?;
        let kind = match (self.mode, detected) {
            (StageMode::Binary, _) | (StageMode::Auto, None) => {
                return stage_binary(artifact, &session_dir.join("staged"), executable_name);
            }
            (_, Some(kind)) => kind,
            // Let the zip reader report what is wrong with it
            (StageMode::Archive, None) => ArchiveKind::Zip,
        };

        let extracted = session_dir.join("extracted");
        fs::create_dir_all(&extracted).map_err(|_| UpdateError::fs("create extraction directory", &extracted))?;

        info!("Extracting {} ({:?})", artifact.display(), kind);
        match kind {
            ArchiveKind::Zip => extract_zip(artifact, &extracted)?,
            ArchiveKind::TarGz => extract_tar_gz(artifact, &extracted)?,
        }

        let root = select_root(&extracted, self.layout).map_err(|reason| UpdateError::LayoutNotFound {
            archive: artifact.display().to_string(),
            reason,
        })?;
        debug!("Staged root: {}", root.display());
        Ok(root)
    }
}

fn detect_archive(path: &Path) -> Result<Option<ArchiveKind>> {
    let mut file = File::open(path).map_err(|_| UpdateError::fs("open artifact", path))?;
    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        let read = file.read(&mut magic[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    Ok(if filled >= 4 && magic == ZIP_MAGIC {
        Some(ArchiveKind::Zip)
    } else if filled >= 2 && magic[..2] == GZIP_MAGIC {
        Some(ArchiveKind::TarGz)
    } else {
        None
    })
}

fn stage_binary(artifact: &Path, staged: &Path, executable_name: &str) -> Result<PathBuf> {
    let target = staged.join(executable_name);
    let parent = target.parent().unwrap_or(staged);
    fs::create_dir_all(parent).map_err(|_| UpdateError::fs("create staging directory", parent))?;
    fs::copy(artifact, &target).map_err(|_| UpdateError::fs("stage binary", &target))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&target, fs::Permissions::from_mode(0o755))?;
    }

    debug!("Staged binary artifact as {}", target.display());
    Ok(staged.to_path_buf())
}

fn extract_failed(archive: &Path, reason: impl ToString) -> UpdateError {
    UpdateError::ExtractFailed {
        archive: archive.display().to_string(),
        reason: reason.to_string(),
    }
}

fn extract_zip(archive_path: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|_| UpdateError::fs("open artifact", archive_path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| extract_failed(archive_path, e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| extract_failed(archive_path, e))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(extract_failed(
                archive_path,
                format!("entry '{}' escapes the extraction directory", entry.name()),
            ));
        };
        let outpath = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| extract_failed(archive_path, e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|e| extract_failed(archive_path, e))?;
        }
        let mut outfile = File::create(&outpath).map_err(|e| extract_failed(archive_path, e))?;
        io::copy(&mut entry, &mut outfile).map_err(|e| extract_failed(archive_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))
                    .map_err(|e| extract_failed(archive_path, e))?;
            }
        }
    }

    Ok(())
}

fn extract_tar_gz(archive_path: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|_| UpdateError::fs("open artifact", archive_path))?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));

    for entry in archive.entries().map_err(|e| extract_failed(archive_path, e))? {
        let mut entry = entry.map_err(|e| extract_failed(archive_path, e))?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_pax_global_extensions() || entry_type.is_pax_local_extensions() {
            continue;
        }

        let path = entry.path().map_err(|e| extract_failed(archive_path, e))?.into_owned();
        if path.components().any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))) {
            return Err(extract_failed(
                archive_path,
                format!("entry '{}' escapes the extraction directory", path.display()),
            ));
        }

        let unpacked = entry.unpack_in(destination).map_err(|e| extract_failed(archive_path, e))?;
        if !unpacked {
            return Err(extract_failed(
                archive_path,
                format!("entry '{}' escapes the extraction directory", path.display()),
            ));
        }
    }

    Ok(())
}

/// Choose the staged root inside `extracted`; `Err` carries the reason.
fn select_root(extracted: &Path, layout: ArchiveLayout) -> std::result::Result<PathBuf, String> {
    let entries: Vec<PathBuf> = fs::read_dir(extracted)
        .map_err(|e| e.to_string())?
        .filter_map(std::result::Result::ok)
        .filter(|e| !IGNORED_TOP_LEVEL.iter().any(|ignored| e.file_name() == *ignored))
        .map(|e| e.path())
        .collect();

    match layout {
        ArchiveLayout::Flat if entries.is_empty() => Err("archive is empty".to_string()),
        ArchiveLayout::Flat => Ok(extracted.to_path_buf()),
        ArchiveLayout::Wrapped => match entries.as_slice() {
            [single] if single.is_dir() => Ok(single.clone()),
            [single] => Err(format!(
                "expected a single top-level directory, found file '{}'",
                single.file_name().unwrap_or_default().to_string_lossy()
            )),
            [] => Err("archive is empty".to_string()),
            many => Err(format!("expected a single top-level directory, found {} entries", many.len())),
        },
    }
}
