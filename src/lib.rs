//! # handwriting-ocr
//!
//! Extract handwritten text from scanned images and PDFs using Vision
//! Language Models (VLMs).
//!
//! ## Pipeline Overview
//!
//! ```text
//! files (PDF / PNG / JPEG / TIFF / BMP / GIF)
//!  │
//!  ├─ 1. Classify  by extension; anything else is reported as unsupported
//!  ├─ 2. Expand    PDF pages → page_N.jpg via pdfium (spawn_blocking)
//!  ├─ 3. Normalise any image → RGB JPEG (alpha flattened onto white)
//!  ├─ 4. Extract   one VLM call per image, sequentially
//!  └─ 5. Report    ordered, labelled entries → extracted_text_results.txt
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use handwriting_ocr::{BatchConfig, BatchProcessor, EnvKey, InputFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::default();
//!     let processor = BatchProcessor::from_credentials(config, &EnvKey::new("GEMINI_API_KEY"));
//!     let files = vec![
//!         InputFile::from_path("notebook.pdf"),
//!         InputFile::from_path("postcard.png"),
//!     ];
//!     let output = processor.process(&files).await?;
//!     println!("{}", output.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `hwocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! handwriting-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod credentials;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{build_extractor, provider_key_var, BatchOutput, BatchProcessor};
pub use config::{BatchConfig, BatchConfigBuilder};
pub use credentials::{ChainedCredentials, CredentialProvider, EnvKey, KeyFile, StaticKey};
pub use error::{BatchError, ErrorKind, PageError};
pub use pipeline::extract::{PageExtractor, TextExtractionService, VisionLlmService};
pub use pipeline::input::{resolve_input, FileKind, InputFile};
pub use pipeline::normalize::{normalize_bytes, NormalizedImage};
pub use pipeline::render::{PdfExpander, PdfiumExpander, RenderedPage};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{BatchReport, BatchStats, ExtractionResult, Provenance, ReportEntry};
