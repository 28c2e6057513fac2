//! Test fixtures for release artifacts and manifests

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Builder for zip and tar.gz release archives.
#[derive(Clone, Debug, Default)]
pub struct ArchiveFixture {
    prefix: Option<String>,
    files: Vec<(String, Vec<u8>, u32)>,
}

impl ArchiveFixture {
    /// Archive whose entries sit inside one top-level directory, like a source zipball.
    pub fn wrapped(root: &str) -> Self {
        Self {
            prefix: Some(root.trim_end_matches('/').to_string()),
            files: Vec::new(),
        }
    }

    /// Archive whose entries sit at the root.
    pub fn flat() -> Self {
        Self::default()
    }

    /// Add a regular file (mode 0644).
    pub fn file(self, path: &str, contents: &[u8]) -> Self {
        self.entry(path, contents, 0o644)
    }

    /// Add an executable file (mode 0755).
    pub fn executable(self, path: &str, contents: &[u8]) -> Self {
        self.entry(path, contents, 0o755)
    }

    fn entry(mut self, path: &str, contents: &[u8], mode: u32) -> Self {
        let full = match &self.prefix {
            Some(prefix) => format!("{prefix}/{path}"),
            None => path.to_string(),
        };
        self.files.push((full, contents.to_vec(), mode));
        self
    }

    /// Write a zip archive to `path` and return its bytes.
    pub fn write_zip(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(File::create(path)?);
        if let Some(prefix) = &self.prefix {
            writer
                .add_directory(format!("{prefix}/"), zip::write::SimpleFileOptions::default())
                .map_err(io::Error::other)?;
        }
        for (name, contents, mode) in &self.files {
            let options = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
            writer.start_file(name.as_str(), options).map_err(io::Error::other)?;
            writer.write_all(contents)?;
        }
        writer.finish().map_err(io::Error::other)?;
        fs::read(path)
    }

    /// Write a gzip-compressed tar archive to `path` and return its bytes.
    pub fn write_tar_gz(&self, path: &Path) -> io::Result<Vec<u8>> {
        let encoder = flate2::write::GzEncoder::new(File::create(path)?, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents, mode) in &self.files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, name, contents.as_slice())?;
        }
        builder.into_inner()?.finish()?;
        fs::read(path)
    }
}

/// Release manifest documents.
#[derive(Clone, Debug)]
pub struct ManifestFixture {
    /// JSON text
    pub content: String,
}

impl ManifestFixture {
    /// `{version, download_url, checksum}` document.
    pub fn direct(version: &str, download_url: &str, checksum: &str) -> Self {
        Self {
            content: serde_json::json!({
                "version": version,
                "download_url": download_url,
                "checksum": checksum,
            })
            .to_string(),
        }
    }

    /// Release API document with `tag_name` and `zipball_url`, no checksum.
    pub fn release(tag: &str, zipball_url: &str) -> Self {
        Self {
            content: serde_json::json!({
                "tag_name": tag,
                "name": format!("Release {tag}"),
                "zipball_url": zipball_url,
                "tarball_url": zipball_url.replace("zipball", "tarball"),
                "draft": false,
                "prerelease": false,
            })
            .to_string(),
        }
    }

    /// Write the document to `path`.
    pub fn write_to(&self, path: &Path) -> io::Result<PathBuf> {
        fs::write(path, &self.content)?;
        Ok(path.to_path_buf())
    }
}
