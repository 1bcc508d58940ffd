//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! events as the batch processes each file and page.
//!
//! # Example
//!
//! ```rust
//! use handwriting_ocr::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, label: &str, text_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{done} {label}: {text_len} chars");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::batch::BatchProcessor`] as it works through a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Items are processed sequentially, so events for one
/// batch never interleave.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file is touched.
    ///
    /// # Arguments
    /// * `total_files`: number of input files in the batch
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before an item (a single image or one PDF page) is sent
    /// to the extraction service.
    ///
    /// # Arguments
    /// * `label`: provenance label, e.g. `Page page_2.jpg` or `File scan.png`
    fn on_item_start(&self, label: &str) {
        let _ = label;
    }

    /// Called when an item's text was extracted.
    ///
    /// # Arguments
    /// * `label`: provenance label
    /// * `text_len`: byte length of the extracted text
    fn on_item_complete(&self, label: &str, text_len: usize) {
        let _ = (label, text_len);
    }

    /// Called when an item failed or was skipped as unsupported.
    ///
    /// # Arguments
    /// * `label`: provenance label
    /// * `error`: human-readable description
    fn on_item_error(&self, label: &str, error: &str) {
        let _ = (label, error);
    }

    /// Called once after every input has been attempted.
    ///
    /// # Arguments
    /// * `total_entries`: report entries produced
    /// * `success_count`: entries that carry extracted text
    fn on_batch_complete(&self, total_entries: usize, success_count: usize) {
        let _ = (total_entries, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
