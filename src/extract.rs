//! Downloads through an external extraction tool (yt-dlp).
//!
//! The tool is hidden behind [`Extractor`] so the server can be built with a
//! stand-in. [`ExtractionFetcher`] owns the part that does not depend on the
//! tool: the availability check, locating the file the tool actually wrote,
//! and describing it.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::{FetchError, FetchResult},
    library::{Library, StoredAsset},
    naming::mime_for_path,
};

/// Stream selection: best video plus best audio, else the best single file.
pub const FORMAT_SELECTOR: &str = "bv*+ba/b";
/// Container used when separate tracks are merged.
pub const MERGE_FORMAT: &str = "mp4";
/// Extensions probed when the reported filename does not exist.
const FALLBACK_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".webm", ".mov"];

/// What the extraction tool reports after a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The filename the tool computed for the item. After merging, the file
    /// on disk may carry a different extension.
    pub filename: PathBuf,
    pub title: Option<String>,
}

/// An external capability that turns a media page URL into a file on disk.
pub trait Extractor: Send + Sync {
    /// Whether the capability can be used at all.
    fn available(&self) -> bool;

    /// Downloads exactly one item from `url` into `library_dir`.
    fn extract(&self, url: &str, library_dir: &Path) -> FetchResult<Extraction>;
}

/// Success payload of the extraction endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedAsset {
    #[serde(flatten)]
    pub asset: StoredAsset,
    pub title: Option<String>,
}

pub struct ExtractionFetcher {
    library: Library,
    extractor: Arc<dyn Extractor>,
}

impl ExtractionFetcher {
    pub fn new(library: Library, extractor: Arc<dyn Extractor>) -> Self {
        Self { library, extractor }
    }

    pub fn fetch(&self, url: &str) -> FetchResult<ExtractedAsset> {
        if !self.extractor.available() {
            warn!("extraction requested but yt-dlp is unavailable");
            return Err(FetchError::ExtractorUnavailable);
        }

        let extraction = self.extractor.extract(url, self.library.dir())?;
        let path = resolve_output(&extraction.filename).ok_or_else(|| {
            warn!(filename = %extraction.filename.display(), "extractor output missing");
            FetchError::NotFoundAfterDownload
        })?;

        let asset = self.library.describe(&path, mime_for_path(&path))?;
        info!(url, path = %asset.path, size = asset.size, "extracted media");
        Ok(ExtractedAsset {
            asset,
            title: extraction.title,
        })
    }
}

/// Finds the file the extractor really produced for `filename`.
///
/// Order: the merged container next to it, the name itself, then a few common
/// containers.
pub fn resolve_output(filename: &Path) -> Option<PathBuf> {
    let base = filename.with_extension("");
    let merged = with_suffix(&base, &format!(".{MERGE_FORMAT}"));
    if merged.is_file() {
        return Some(merged);
    }
    if filename.is_file() {
        return Some(filename.to_path_buf());
    }
    FALLBACK_EXTENSIONS
        .iter()
        .map(|ext| with_suffix(&base, ext))
        .find(|candidate| candidate.is_file())
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = base.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// [`Extractor`] backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

/// Subset of yt-dlp's info JSON that we read back.
#[derive(Debug, Deserialize)]
struct InfoJson {
    id: Option<String>,
    title: Option<String>,
    ext: Option<String>,
    #[serde(rename = "_filename")]
    prepared_filename: Option<String>,
    filename: Option<String>,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, url: &str, library_dir: &Path) -> Command {
        let template = library_dir.join("%(id)s.%(ext)s");
        let mut command = Command::new(&self.program);
        command
            .arg("--format")
            .arg(FORMAT_SELECTOR)
            .arg("--merge-output-format")
            .arg(MERGE_FORMAT)
            .arg("--output")
            .arg(template)
            .arg("--no-playlist")
            .arg("--restrict-filenames")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--dump-single-json")
            .arg("--no-simulate")
            .arg("--")
            .arg(url)
            .stdin(Stdio::null());
        command
    }
}

impl Extractor for YtDlp {
    fn available(&self) -> bool {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                debug!(program = %self.program.display(), %status, "yt-dlp --version failed");
                false
            }
            Err(err) => {
                debug!(program = %self.program.display(), error = %err, "yt-dlp not runnable");
                false
            }
        }
    }

    fn extract(&self, url: &str, library_dir: &Path) -> FetchResult<Extraction> {
        info!(url, "running yt-dlp");
        let output = self
            .command(url, library_dir)
            .output()
            .map_err(|err| FetchError::upstream(format!("running yt-dlp: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            let message = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("yt-dlp failed ({})", output.status));
            return Err(FetchError::Upstream(message));
        }

        let info: InfoJson = serde_json::from_slice(&output.stdout)
            .map_err(|err| FetchError::upstream(format!("parsing yt-dlp output: {err}")))?;
        parse_extraction(info, library_dir)
    }
}

fn parse_extraction(info: InfoJson, library_dir: &Path) -> FetchResult<Extraction> {
    let filename = match (info.prepared_filename, info.filename, &info.id, &info.ext) {
        (Some(prepared), _, _, _) => PathBuf::from(prepared),
        (None, Some(filename), _, _) => PathBuf::from(filename),
        (None, None, Some(id), Some(ext)) => library_dir.join(format!("{id}.{ext}")),
        _ => {
            return Err(FetchError::upstream(
                "yt-dlp did not report an output filename",
            ));
        }
    };
    Ok(Extraction {
        filename,
        title: info.title,
    })
}
