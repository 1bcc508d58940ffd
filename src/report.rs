//! Batch report: ordered, provenance-labelled extraction results.
//!
//! A [`BatchReport`] is built incrementally while the batch runs (input
//! order, then page order within each PDF), rendered once to plain text with
//! [`BatchReport::render`], and persisted with [`write_report`].
//!
//! ## Text format
//!
//! ```text
//! Page page_1.jpg:
//! <text>
//!
//! File scan.png:
//! <text>
//!
//! Unsupported file type: letter.docx
//!
//! ```

use crate::error::{BatchError, ErrorKind, PageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Which source an entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Provenance {
    /// One page of a PDF input.
    Page {
        /// Name of the PDF as supplied by the caller.
        source: String,
        /// 1-based page number.
        page_num: usize,
        /// Page image file name, e.g. `page_2.jpg`.
        image_name: String,
    },
    /// A whole input file (single image, unsupported file, or a PDF that
    /// could not be opened).
    File { name: String },
}

impl Provenance {
    /// The label written in front of the entry's text.
    pub fn label(&self) -> String {
        match self {
            Provenance::Page { image_name, .. } => format!("Page {image_name}"),
            Provenance::File { name } => format!("File {name}"),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Outcome for one page image or input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionResult {
    Success { text: String },
    Failure { reason: ErrorKind, detail: String },
    /// The file's extension is not one the batch handles.
    Unsupported,
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success { .. })
    }
}

impl From<Result<String, PageError>> for ExtractionResult {
    fn from(r: Result<String, PageError>) -> Self {
        match r {
            Ok(text) => ExtractionResult::Success { text },
            Err(e) => ExtractionResult::Failure {
                reason: e.kind(),
                detail: e.detail().to_string(),
            },
        }
    }
}

/// One line item of the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub provenance: Provenance,
    pub result: ExtractionResult,
    /// Wall-clock time spent on this item (normalise + extract).
    pub duration_ms: u64,
}

impl ReportEntry {
    /// Render this entry in the durable text format, including the
    /// trailing blank line.
    pub fn render(&self) -> String {
        match (&self.result, &self.provenance) {
            (ExtractionResult::Unsupported, Provenance::File { name }) => {
                format!("Unsupported file type: {name}\n\n")
            }
            (ExtractionResult::Unsupported, p) => format!("Unsupported file type: {p}\n\n"),
            (ExtractionResult::Success { text }, p) => format!("{p}:\n{text}\n\n"),
            (ExtractionResult::Failure { reason, detail }, p) => {
                format!("{p}:\n{}\n\n", failure_line(*reason, detail))
            }
        }
    }
}

/// The bracketed line that replaces text for a failed item.
fn failure_line(reason: ErrorKind, detail: &str) -> String {
    match reason {
        ErrorKind::RateLimited => format!(
            "[Extraction failed ({reason}): the service quota is exhausted; wait a while and resubmit this item. {detail}]"
        ),
        _ => format!("[Extraction failed ({reason}): {detail}]"),
    }
}

/// Aggregate counts for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Input files supplied.
    pub total_files: usize,
    /// Report entries produced.
    pub total_entries: usize,
    /// Entries carrying extracted text.
    pub succeeded: usize,
    /// Entries carrying a failure.
    pub failed: usize,
    /// Entries for unsupported files.
    pub unsupported: usize,
    /// Entries whose failure was a rate limit.
    pub rate_limited: usize,
    pub total_duration_ms: u64,
}

/// Ordered results of one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub entries: Vec<ReportEntry>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn new(total_files: usize) -> Self {
        Self {
            entries: Vec::new(),
            stats: BatchStats {
                total_files,
                ..Default::default()
            },
        }
    }

    /// Append an entry, keeping counts current.
    pub fn push(&mut self, entry: ReportEntry) {
        let s = &mut self.stats;
        s.total_entries += 1;
        match &entry.result {
            ExtractionResult::Success { .. } => s.succeeded += 1,
            ExtractionResult::Unsupported => s.unsupported += 1,
            ExtractionResult::Failure { reason, .. } => {
                s.failed += 1;
                if *reason == ErrorKind::RateLimited {
                    s.rate_limited += 1;
                }
            }
        }
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels in order, e.g. for assertions and summaries.
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.provenance.label()).collect()
    }

    /// Concatenate every entry, in order, into the report text.
    pub fn render(&self) -> String {
        self.entries.iter().map(ReportEntry::render).collect()
    }
}

/// Persist `text` to `path`, replacing whatever was there.
///
/// Uses atomic write (temp file + rename) so a reader never observes a
/// half-written report.
pub async fn write_report(path: &Path, text: &str) -> Result<(), BatchError> {
    let fail = |source| BatchError::ReportWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, text).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}
