//! The on-disk library: a flat directory of downloaded assets.
//!
//! Files are only ever added. A new asset is written to a hidden temporary
//! file inside the library and renamed into place, so a reader never sees a
//! half-written file under its final name.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use mime_guess::MimeGuess;
use serde::Serialize;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::config::LIBRARY_URL_PREFIX;

/// Public descriptor of a file that now exists in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAsset {
    pub path: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime: String,
}

/// One row of the library listing.
#[derive(Debug, Clone, Serialize)]
pub struct AssetEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Library {
    dir: PathBuf,
}

impl Library {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// URL under which a library file is served.
    pub fn public_path(name: &str) -> String {
        format!("{LIBRARY_URL_PREFIX}{name}")
    }

    /// Atomically writes `bytes` as `name` and returns the final path.
    pub fn store(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let target = self.dir.join(name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|err| err.error)?;
        Ok(target)
    }

    /// Describes an existing file in the library.
    pub fn describe(&self, path: &Path, mime: &str) -> io::Result<StoredAsset> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unusable file name {}", path.display()),
                )
            })?;
        let size = path.metadata()?.len();
        Ok(StoredAsset {
            path: Self::public_path(name),
            size,
            mime: mime.to_string(),
        })
    }

    /// Lists every visible file, sorted by name. Hidden entries (including
    /// in-flight temporary files) and subdirectories are skipped.
    pub fn list(&self) -> io::Result<Vec<AssetEntry>> {
        let mut assets = Vec::new();
        let walker = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata()?;
            assets.push(AssetEntry {
                name: name.to_string(),
                path: Self::public_path(name),
                size: metadata.len(),
                mime: MimeGuess::from_path(entry.path())
                    .first_or_octet_stream()
                    .to_string(),
                modified: metadata.modified().ok().map(format_timestamp),
            });
        }
        Ok(assets)
    }
}

fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}
