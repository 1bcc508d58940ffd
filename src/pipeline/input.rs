//! Input handling: caller file handles, type classification, and resolution
//! of CLI arguments (local paths or URLs) into [`InputFile`]s.
//!
//! Classification is by file-name extension only, never by content. A file
//! named `notes.docx` is reported as unsupported even if it holds a PNG.

use crate::error::{BatchError, PageError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Raster extensions accepted for direct extraction (lower-case, no dot).
pub const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "bmp", "gif"];

/// Where an input file's bytes live.
#[derive(Debug, Clone)]
pub enum InputContent {
    /// Read from disk when the batch reaches this file.
    Path(PathBuf),
    /// Already in memory (uploads, downloads).
    Bytes(Vec<u8>),
}

/// A caller-supplied file: a name carrying the extension, plus its content.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Name as supplied by the caller; may include directories.
    pub name: String,
    pub content: InputContent,
}

impl InputFile {
    /// An input backed by a file on disk, named after its path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.to_string_lossy().into_owned(),
            content: InputContent::Path(path),
        }
    }

    /// An in-memory input.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content: InputContent::Bytes(bytes),
        }
    }

    /// The final path component of [`Self::name`].
    pub fn file_name(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }

    /// Classify by extension.
    pub fn kind(&self) -> FileKind {
        FileKind::from_name(&self.name)
    }

    /// Read the full content.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, PageError> {
        match &self.content {
            InputContent::Bytes(b) => Ok(b.clone()),
            InputContent::Path(p) => tokio::fs::read(p).await.map_err(|e| PageError::Read {
                detail: format!("{}: {}", p.display(), e),
            }),
        }
    }
}

/// What the batch does with a file, resolved once from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Expanded into one page image per PDF page.
    Pdf,
    /// Normalised and extracted as a single image.
    RasterImage,
    /// Recorded as unsupported; no extraction attempted.
    Unsupported,
}

impl FileKind {
    /// Classify a file name by its case-insensitive extension.
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("pdf") => FileKind::Pdf,
            Some(e) if RASTER_EXTENSIONS.contains(&e) => FileKind::RasterImage,
            _ => FileKind::Unsupported,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a CLI argument to an [`InputFile`].
///
/// URLs are downloaded into memory; local paths are validated for existence
/// and read permission but read lazily by the batch.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<InputFile, BatchError> {
    if input.trim().is_empty() {
        return Err(BatchError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and readability.
fn resolve_local(path_str: &str) -> Result<InputFile, BatchError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(BatchError::InputNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BatchError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(BatchError::InputNotFound { path });
        }
    }

    debug!("Resolved local input: {}", path.display());
    Ok(InputFile::from_path(path))
}

/// Download a URL into memory, naming the input after the URL's last path
/// segment so extension-based classification still applies.
async fn download_url(url: &str, timeout_secs: u64) -> Result<InputFile, BatchError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            BatchError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            BatchError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(BatchError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| BatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let name = filename_from_url(url);
    info!("Downloaded {} bytes as '{}'", bytes.len(), name);

    Ok(InputFile::from_bytes(name, bytes.to_vec()))
}

/// Extract a reasonable file name from a URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}
