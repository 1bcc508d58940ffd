//! Error types for the handwriting-ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BatchError`]: **Fatal**: the batch cannot proceed at all (no
//!   extraction service configured, report artefact unwritable, a CLI input
//!   that does not exist). Returned as `Err(BatchError)` from
//!   [`crate::batch::BatchProcessor::process`] and the input resolvers.
//!
//! * [`PageError`]: **Non-fatal**: a single file or page failed (undecodable
//!   image, corrupt PDF, rate-limited API call) but every other item is fine.
//!   Stored inside [`crate::report::ExtractionResult::Failure`] so one bad
//!   page never sinks the whole batch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the handwriting-ocr library.
///
/// Per-item failures use [`PageError`] and are recorded in the report
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Service errors ────────────────────────────────────────────────────
    /// No credential is available, so no extraction service exists.
    #[error("Please set up your API key first.\n{hint}")]
    ServiceNotConfigured { hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or overwrite the durable report artefact.
    #[error("Failed to write report file '{path}': {source}")]
    ReportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classification of a per-item failure, as shown in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The input file's bytes could not be read.
    Read,
    /// Image bytes could not be parsed (or re-encoded).
    Decode,
    /// The PDF is malformed or could not be opened.
    PdfDecode,
    /// A single PDF page failed to rasterise.
    Render,
    /// No usable credential reached the extraction service.
    ServiceNotConfigured,
    /// The service rejected the call because a quota was exhausted.
    RateLimited,
    /// Network-level or 5xx-class failure, including call timeouts.
    TransientService,
    /// Any other service failure.
    Other,
}

impl ErrorKind {
    /// Short human-readable name used in report lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Read => "read error",
            ErrorKind::Decode => "decode error",
            ErrorKind::PdfDecode => "PDF decode error",
            ErrorKind::Render => "render error",
            ErrorKind::ServiceNotConfigured => "service not configured",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::TransientService => "transient service error",
            ErrorKind::Other => "service error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal error for a single file or page.
///
/// The batch records it as a failure entry and moves on to the next item.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum PageError {
    /// Reading the input bytes failed.
    #[error("could not read input: {detail}")]
    Read { detail: String },

    /// Image bytes were not a decodable image.
    #[error("could not decode image: {detail}")]
    Decode { detail: String },

    /// The PDF could not be opened at all.
    #[error("could not open PDF: {detail}")]
    PdfDecode { detail: String },

    /// Page rasterisation failed.
    #[error("page {page}: rasterisation failed: {detail}")]
    Render { page: usize, detail: String },

    /// The extractor has no service (or the service rejected the credential).
    #[error("extraction service is not configured: {detail}")]
    ServiceNotConfigured { detail: String },

    /// Quota exhausted on the service side.
    #[error("rate limit exceeded: {detail}")]
    RateLimited { detail: String },

    /// Network or 5xx failure; resubmitting later may succeed.
    #[error("transient service failure: {detail}")]
    TransientService { detail: String },

    /// Unclassified service failure.
    #[error("service failure: {detail}")]
    Other { detail: String },
}

impl PageError {
    /// The report-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PageError::Read { .. } => ErrorKind::Read,
            PageError::Decode { .. } => ErrorKind::Decode,
            PageError::PdfDecode { .. } => ErrorKind::PdfDecode,
            PageError::Render { .. } => ErrorKind::Render,
            PageError::ServiceNotConfigured { .. } => ErrorKind::ServiceNotConfigured,
            PageError::RateLimited { .. } => ErrorKind::RateLimited,
            PageError::TransientService { .. } => ErrorKind::TransientService,
            PageError::Other { .. } => ErrorKind::Other,
        }
    }

    /// The free-form detail carried by this error.
    pub fn detail(&self) -> &str {
        match self {
            PageError::Read { detail }
            | PageError::Decode { detail }
            | PageError::PdfDecode { detail }
            | PageError::Render { detail, .. }
            | PageError::ServiceNotConfigured { detail }
            | PageError::RateLimited { detail }
            | PageError::TransientService { detail }
            | PageError::Other { detail } => detail,
        }
    }
}
