//! Configuration types for batch handwriting extraction.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The builder lets callers set only what they care
//! about and rely on documented defaults for the rest.

use crate::error::BatchError;
use crate::progress::ProgressCallback;
use edgequake_llm::ProviderType;
use std::fmt;
use std::path::PathBuf;

/// File name of the durable report written after every batch.
pub const DEFAULT_REPORT_FILE: &str = "extracted_text_results.txt";

/// Provider used when none is named.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used with [`DEFAULT_PROVIDER`] when none is named.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for a batch extraction.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use handwriting_ocr::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .dpi(200)
///     .report_path("out/notes.txt")
///     .model("gemini-2.5-pro")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Rasterisation DPI for PDF pages. Range: 72–600. Default: 300.
    ///
    /// Handwriting strokes are thin; 300 DPI keeps them legible to the
    /// vision model on a typical notebook page.
    pub dpi: u32,

    /// JPEG quality used when normalising page images. Range: 1–100. Default: 75.
    pub jpeg_quality: u8,

    /// Instruction sent with every image. If None, uses
    /// [`crate::prompts::HANDWRITING_INSTRUCTION`].
    pub instruction: Option<String>,

    /// Where the combined report is written (overwritten on every batch).
    /// Default: `extracted_text_results.txt` in the working directory.
    pub report_path: PathBuf,

    /// Parent directory for the per-batch scratch directory.
    /// If None, the system temp directory is used.
    pub temp_root: Option<PathBuf>,

    /// Per-extraction-call timeout in seconds. Default: 60.
    ///
    /// An expired call is reported as a transient service failure for that
    /// item only.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic"). Default: "gemini".
    pub provider_name: String,

    /// LLM model identifier. If None, see [`BatchConfig::effective_model`].
    pub model: Option<String>,

    /// Sampling temperature for the LLM completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per image. Default: 4096.
    pub max_tokens: usize,

    /// Optional per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            jpeg_quality: 75,
            instruction: None,
            report_path: PathBuf::from(DEFAULT_REPORT_FILE),
            temp_root: None,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: None,
            temperature: 0.1,
            max_tokens: 4096,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("dpi", &self.dpi)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("instruction", &self.instruction)
            .field("report_path", &self.report_path)
            .field("temp_root", &self.temp_root)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request: the configured one, else a vision-capable
    /// default for the provider.
    pub fn effective_model(&self) -> &str {
        if let Some(ref m) = self.model {
            return m;
        }
        match ProviderType::from_str(&self.provider_name) {
            Some(ProviderType::Gemini) => DEFAULT_MODEL,
            Some(ProviderType::Anthropic) => "claude-sonnet-4-20250514",
            Some(ProviderType::Mistral) => "pixtral-12b-2409",
            Some(ProviderType::Ollama) => "llama3.2-vision",
            _ => "gpt-4.1-nano",
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report_path = path.into();
        self
    }

    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(dir.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(BatchError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(BatchError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(BatchError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.report_path.as_os_str().is_empty() {
            return Err(BatchError::InvalidConfig("Report path must not be empty".into()));
        }
        if c.provider_name.trim().is_empty() {
            return Err(BatchError::InvalidConfig("Provider name must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = BatchConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.jpeg_quality, 75);
        assert_eq!(c.report_path, PathBuf::from("extracted_text_results.txt"));
        assert_eq!(c.provider_name, "gemini");
        assert_eq!(c.effective_model(), DEFAULT_MODEL);
    }

    #[test]
    fn builder_rejects_out_of_range_dpi() {
        assert!(BatchConfig::builder().dpi(50).build().is_err());
        assert!(BatchConfig::builder().dpi(1200).build().is_err());
        assert!(BatchConfig::builder().dpi(150).build().is_ok());
    }

    #[test]
    fn builder_rejects_zero_quality_and_timeout() {
        assert!(BatchConfig::builder().jpeg_quality(0).build().is_err());
        assert!(BatchConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn effective_model_per_provider() {
        let c = BatchConfig::builder().provider_name("openai").build().unwrap();
        assert_eq!(c.effective_model(), "gpt-4.1-nano");
        let c = BatchConfig::builder().provider_name("Mistral").build().unwrap();
        assert_eq!(c.effective_model(), "pixtral-12b-2409");

        let c = BatchConfig::builder()
            .provider_name("openai")
            .model("gpt-4.1-mini")
            .build()
            .unwrap();
        assert_eq!(c.effective_model(), "gpt-4.1-mini");
    }

    #[test]
    fn debug_hides_callback() {
        let c = BatchConfig::builder()
            .progress_callback(std::sync::Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let s = format!("{c:?}");
        assert!(s.contains("<dyn BatchProgressCallback>"));
    }

    #[test]
    fn debug_lists_download_timeout() {
        let c = BatchConfig::builder().download_timeout_secs(17).build().unwrap();
        let s = format!("{c:?}");
        assert!(s.contains("download_timeout_secs: 17"), "{s}");
    }

    #[test]
    fn effective_model_follows_provider_aliases() {
        let c = BatchConfig::builder().provider_name("google").build().unwrap();
        assert_eq!(c.effective_model(), DEFAULT_MODEL);
        let c = BatchConfig::builder().provider_name("claude").build().unwrap();
        assert_eq!(c.effective_model(), "claude-sonnet-4-20250514");
    }
}
