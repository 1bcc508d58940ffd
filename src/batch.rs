//! Batch orchestration: files in, one ordered report out.
//!
//! [`BatchProcessor`] walks the caller's files in order. PDFs are expanded
//! into page images inside a per-batch scratch directory; every page image
//! and every raster input is normalised and sent to the extraction service
//! one at a time. Each outcome, good or bad, becomes one
//! [`ReportEntry`]; the rendered report replaces the durable artefact at
//! [`BatchConfig::report_path`].
//!
//! ## Failure boundaries
//!
//! Only two things stop a batch: a missing extraction service (checked
//! before any file is touched) and a report that cannot be written. Every
//! other problem is local to the file or page it happened on.

use crate::config::BatchConfig;
use crate::credentials::CredentialProvider;
use crate::error::{BatchError, PageError};
use crate::pipeline::extract::{PageExtractor, VisionLlmService};
use crate::pipeline::input::{FileKind, InputContent, InputFile};
use crate::pipeline::normalize::normalize_bytes;
use crate::pipeline::render::{expand_async, PdfExpander, PdfiumExpander};
use crate::prompts::instruction_or_default;
use crate::report::{write_report, BatchReport, ExtractionResult, Provenance, ReportEntry};
use edgequake_llm::{
    AnthropicProvider, GeminiProvider, LLMProvider, OpenAIProvider, OpenRouterProvider,
    ProviderFactory, ProviderType,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

/// Result of a completed batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    /// Rendered report, identical to what was written to disk.
    pub text: String,
    /// Structured entries and counts.
    pub report: BatchReport,
    /// Where the report was written.
    pub report_path: PathBuf,
}

/// Sequential batch driver.
///
/// The extraction service is injected through the [`PageExtractor`]; the
/// PDF backend defaults to pdfium and can be swapped with
/// [`BatchProcessor::with_expander`].
pub struct BatchProcessor {
    config: BatchConfig,
    extractor: PageExtractor,
    expander: Arc<dyn PdfExpander>,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig, extractor: PageExtractor) -> Self {
        let expander = Arc::new(PdfiumExpander::new(config.dpi, config.jpeg_quality));
        Self {
            config,
            extractor,
            expander,
        }
    }

    /// Build the extractor from `credentials` (see [`build_extractor`]).
    pub fn from_credentials(config: BatchConfig, credentials: &dyn CredentialProvider) -> Self {
        let extractor = build_extractor(&config, credentials);
        Self::new(config, extractor)
    }

    /// Replace the PDF backend.
    pub fn with_expander(mut self, expander: Arc<dyn PdfExpander>) -> Self {
        self.expander = expander;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.extractor.is_configured()
    }

    /// Process `files` in order and persist the report.
    ///
    /// # Errors
    /// * [`BatchError::ServiceNotConfigured`]: nothing was read, no scratch
    ///   directory was created and the report file was left untouched.
    /// * [`BatchError::ReportWriteFailed`]: every file was processed but the
    ///   report could not be saved.
    pub async fn process(&self, files: &[InputFile]) -> Result<BatchOutput, BatchError> {
        let report = self.run(files).await?;
        let text = report.render();
        write_report(&self.config.report_path, &text).await?;
        info!(
            "Report written to {} ({} entries)",
            self.config.report_path.display(),
            report.len()
        );
        Ok(BatchOutput {
            text,
            report,
            report_path: self.config.report_path.clone(),
        })
    }

    /// Like [`process`](Self::process), but always yields a displayable
    /// string.
    ///
    /// An unconfigured service yields its explanatory message. A report that
    /// could not be saved is logged and its text is still returned.
    pub async fn process_to_string(&self, files: &[InputFile]) -> String {
        let report = match self.run(files).await {
            Ok(report) => report,
            Err(e) => return e.to_string(),
        };
        let text = report.render();
        if let Err(e) = write_report(&self.config.report_path, &text).await {
            error!("{}", e);
        }
        text
    }

    async fn run(&self, files: &[InputFile]) -> Result<BatchReport, BatchError> {
        if let Some(reason) = self.extractor.unconfigured_reason() {
            return Err(BatchError::ServiceNotConfigured {
                hint: reason.to_string(),
            });
        }

        let batch_start = Instant::now();
        let scratch = self.scratch_dir()?;
        debug!("Scratch directory: {}", scratch.path().display());
        info!("Starting batch: {} file(s)", files.len());

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(files.len());
        }

        let mut report = BatchReport::new(files.len());
        for (index, file) in files.iter().enumerate() {
            match file.kind() {
                FileKind::Pdf => self.process_pdf(index, file, scratch.path(), &mut report).await,
                FileKind::RasterImage => {
                    let provenance = Provenance::File {
                        name: file.file_name().to_string(),
                    };
                    self.notify_start(&provenance);
                    let start = Instant::now();
                    let result = self.extract_raster(file).await;
                    self.record(&mut report, provenance, result.into(), start);
                }
                FileKind::Unsupported => {
                    let provenance = Provenance::File {
                        name: file.name.clone(),
                    };
                    self.record(&mut report, provenance, ExtractionResult::Unsupported, Instant::now());
                }
            }
        }

        report.stats.total_duration_ms = batch_start.elapsed().as_millis() as u64;
        info!(
            "Batch complete: {}/{} entries extracted in {}ms",
            report.stats.succeeded, report.stats.total_entries, report.stats.total_duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(report.stats.total_entries, report.stats.succeeded);
        }

        if let Err(e) = scratch.close() {
            warn!("Could not remove scratch directory: {}", e);
        }
        Ok(report)
    }

    fn scratch_dir(&self) -> Result<TempDir, BatchError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("hwocr-");
        let dir = match self.config.temp_root {
            Some(ref root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|e| BatchError::Internal(format!("cannot create scratch directory: {e}")))
    }

    /// Expand one PDF and extract each of its pages.
    ///
    /// Each document gets its own `doc_<index>` directory so identically
    /// named page images from different PDFs never overwrite each other.
    async fn process_pdf(&self, index: usize, file: &InputFile, scratch: &Path, report: &mut BatchReport) {
        let start = Instant::now();
        let doc_dir = scratch.join(format!("doc_{index}"));

        let expanded = match materialise_pdf(file, &doc_dir).await {
            Ok(pdf_path) => expand_async(Arc::clone(&self.expander), pdf_path, doc_dir.join("pages")).await,
            Err(e) => Err(e),
        };

        let pages = match expanded {
            Ok(pages) => pages,
            Err(e) => {
                let provenance = Provenance::File {
                    name: file.file_name().to_string(),
                };
                let result = ExtractionResult::Failure {
                    reason: e.kind(),
                    detail: e.detail().to_string(),
                };
                self.record(report, provenance, result, start);
                return;
            }
        };

        if pages.is_empty() {
            warn!("{}: PDF has no pages", file.name);
        }
        info!("{}: {} page(s)", file.name, pages.len());

        for page in pages {
            let provenance = Provenance::Page {
                source: file.name.clone(),
                page_num: page.page_num,
                image_name: page.image_name,
            };
            self.notify_start(&provenance);
            let start = Instant::now();
            let result = match page.outcome {
                Ok(path) => self.extract_page_file(&path).await,
                Err(e) => Err(e),
            };
            self.record(report, provenance, result.into(), start);
        }
    }

    async fn extract_raster(&self, file: &InputFile) -> Result<String, PageError> {
        let bytes = file.read_bytes().await?;
        self.normalise_and_extract(&bytes).await
    }

    async fn extract_page_file(&self, path: &Path) -> Result<String, PageError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| PageError::Read {
            detail: format!("{}: {}", path.display(), e),
        })?;
        self.normalise_and_extract(&bytes).await
    }

    async fn normalise_and_extract(&self, bytes: &[u8]) -> Result<String, PageError> {
        let image = normalize_bytes(bytes, self.config.jpeg_quality)?;
        debug!(
            "Normalised {}x{} image ({} bytes)",
            image.width,
            image.height,
            image.bytes.len()
        );
        self.extractor.extract(&image).await
    }

    fn notify_start(&self, provenance: &Provenance) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_item_start(&provenance.label());
        }
    }

    /// Log, notify and append one entry.
    fn record(
        &self,
        report: &mut BatchReport,
        provenance: Provenance,
        result: ExtractionResult,
        start: Instant,
    ) {
        let label = provenance.label();
        let cb = self.config.progress_callback.as_ref();
        match &result {
            ExtractionResult::Success { text } => {
                debug!("{}: {} chars", label, text.len());
                if let Some(cb) = cb {
                    cb.on_item_complete(&label, text.len());
                }
            }
            ExtractionResult::Failure { reason, detail } => {
                warn!("{}: {} ({})", label, reason, detail);
                if let Some(cb) = cb {
                    cb.on_item_error(&label, &format!("{reason}: {detail}"));
                }
            }
            ExtractionResult::Unsupported => {
                warn!("{}: unsupported file type", label);
                if let Some(cb) = cb {
                    cb.on_item_error(&label, "unsupported file type");
                }
            }
        }
        report.push(ReportEntry {
            provenance,
            result,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }
}

/// Return a path to the PDF on disk, writing in-memory bytes into
/// `doc_dir` first.
async fn materialise_pdf(file: &InputFile, doc_dir: &Path) -> Result<PathBuf, PageError> {
    match file.content {
        InputContent::Path(ref path) => Ok(path.clone()),
        InputContent::Bytes(ref bytes) => {
            let read_err = |e: std::io::Error| PageError::Read {
                detail: format!("{}: {}", file.name, e),
            };
            tokio::fs::create_dir_all(doc_dir).await.map_err(read_err)?;
            let path = doc_dir.join("source.pdf");
            tokio::fs::write(&path, bytes).await.map_err(read_err)?;
            Ok(path)
        }
    }
}

/// Environment variable a user keeps the provider's key in, or `None` for
/// providers that take no key from us.
///
/// Names are matched the way the provider factory matches them, so aliases
/// such as `google` or `claude` resolve to their family's variable. Only
/// families built directly from a resolved key are listed; every other
/// provider reads its own variables inside the factory.
pub fn provider_key_var(provider: &str) -> Option<&'static str> {
    match ProviderType::from_str(provider)? {
        ProviderType::Gemini => Some("GEMINI_API_KEY"),
        ProviderType::OpenAI => Some("OPENAI_API_KEY"),
        ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
        ProviderType::OpenRouter => Some("OPENROUTER_API_KEY"),
        _ => None,
    }
}

/// Resolve credentials and create the vision provider.
///
/// Keyed families get the key from `credentials` handed straight to their
/// constructor; the process environment is never written. Everything else
/// goes through [`ProviderFactory`]. Returns an unconfigured extractor when a
/// keyed provider has no key, or when the factory rejects the provider.
pub fn build_extractor(config: &BatchConfig, credentials: &dyn CredentialProvider) -> PageExtractor {
    let provider = config.provider_name.to_ascii_lowercase();
    let model = config.effective_model();

    let created: Result<Arc<dyn LLMProvider>, String> = match provider_key_var(&provider) {
        Some(var) => {
            let Some(key) = credentials.api_key() else {
                return PageExtractor::unconfigured(format!(
                    "No API key for provider '{provider}'. Pass --api-key, set {var}, or store one with --save-key."
                ));
            };
            Ok(keyed_provider(&provider, key, model))
        }
        None => ProviderFactory::create_llm_provider(&provider, model).map_err(|e| e.to_string()),
    };

    match created {
        Ok(llm) => {
            info!("Using provider {}/{}", provider, model);
            let service = VisionLlmService::new(llm, format!("{provider}/{model}"))
                .with_options(config.temperature, config.max_tokens);
            PageExtractor::new(
                Arc::new(service),
                instruction_or_default(config.instruction.as_deref()),
                Duration::from_secs(config.api_timeout_secs),
            )
        }
        Err(e) => {
            warn!("Provider '{}' unavailable: {}", provider, e);
            PageExtractor::unconfigured(format!("Provider '{provider}' could not be created: {e}"))
        }
    }
}

/// Construct a keyed provider. Callers have already checked that
/// `provider` has a key variable.
fn keyed_provider(provider: &str, key: String, model: &str) -> Arc<dyn LLMProvider> {
    match ProviderType::from_str(provider) {
        Some(ProviderType::OpenAI) => Arc::new(OpenAIProvider::new(key).with_model(model)),
        Some(ProviderType::Anthropic) => Arc::new(AnthropicProvider::new(key).with_model(model)),
        Some(ProviderType::OpenRouter) => Arc::new(OpenRouterProvider::new(key).with_model(model)),
        _ => Arc::new(GeminiProvider::new(key).with_model(model)),
    }
}
