//! CLI binary for handwriting-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `BatchConfig`, resolves credentials and inputs, and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use handwriting_ocr::config::{DEFAULT_PROVIDER, DEFAULT_REPORT_FILE};
use handwriting_ocr::credentials::DEFAULT_KEY_FILE;
use handwriting_ocr::{
    build_extractor, provider_key_var, resolve_input, BatchConfig, BatchError, BatchProcessor,
    BatchProgressCallback, ChainedCredentials, EnvKey, InputFile, KeyFile, ProgressCallback,
    StaticKey,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner with a running item count plus one log line
/// per page or file. The number of items is not known up front because PDFs
/// expand into pages as the batch reaches them.
struct CliProgressCallback {
    bar: ProgressBar,
    item_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {pos:>3} items  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            item_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn item_elapsed(&self) -> f64 {
        self.item_started
            .lock()
            .ok()
            .and_then(|mut g| g.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting handwriting from {total_files} file(s)…"))
        ));
    }

    fn on_item_start(&self, label: &str) {
        if let Ok(mut g) = self.item_started.lock() {
            *g = Some(Instant::now());
        }
        self.bar.set_message(label.to_string());
    }

    fn on_item_complete(&self, label: &str, text_len: usize) {
        let secs = self.item_elapsed();
        self.bar.println(format!(
            "  {} {:<32}  {:<8}  {}",
            green("✓"),
            label,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, label: &str, error: &str) {
        let secs = self.item_elapsed();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            label,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_entries: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} item(s) extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} item(s) extracted  ({} not extracted)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_entries,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract from a notebook scan and a photo
  hwocr notebook.pdf postcard.jpg

  # Save a key once, then run without --api-key
  hwocr --api-key AIza... --save-key
  hwocr letters/*.png

  # Write the report somewhere else
  hwocr --report out/notes.txt diary.pdf

  # Another provider and model
  hwocr --provider openai --model gpt-4.1-mini page.png

  # Download and extract
  hwocr https://example.com/scans/letter.pdf

  # Structured JSON (entries + stats) on stdout
  hwocr --json notebook.pdf > notebook.json

SUPPORTED INPUTS:
  .pdf .png .jpg .jpeg .tiff .bmp .gif (case-insensitive)
  Anything else is listed as "Unsupported file type" in the report.

ENVIRONMENT VARIABLES:
  HWOCR_API_KEY           API key (same as --api-key)
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  OPENROUTER_API_KEY      OpenRouter API key
  MISTRAL_API_KEY         Mistral API key (read directly; --api-key does not apply)
  PDFIUM_LIB_PATH         Path to libpdfium; otherwise the system library is used

KEY LOOKUP ORDER:
  --api-key / HWOCR_API_KEY, then the provider's variable, then --key-file
  (gemini, openai, anthropic, openrouter and their aliases such as google or claude)
"#;

/// Extract handwritten text from images and PDFs using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "hwocr",
    version,
    about = "Extract handwritten text from images and PDFs using Vision LLMs",
    long_about = "Extract handwritten text from scanned images and PDF documents (local files \
or URLs). Every PDF page and image is sent to a vision model one at a time; the results are \
written, in order, to a plain-text report.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs, processed in order.
    #[arg(required_unless_present = "save_key")]
    inputs: Vec<String>,

    /// API key for the extraction service.
    #[arg(long, env = "HWOCR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Store --api-key in the key file for later runs.
    #[arg(long, requires = "api_key")]
    save_key: bool,

    /// Location of the stored key.
    #[arg(long, env = "HWOCR_KEY_FILE", default_value = DEFAULT_KEY_FILE)]
    key_file: PathBuf,

    /// LLM provider: gemini, openai, anthropic, mistral, ollama.
    #[arg(long, env = "HWOCR_PROVIDER", default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "HWOCR_MODEL")]
    model: Option<String>,

    /// PDF rendering DPI (72–600).
    #[arg(long, env = "HWOCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Where to write the report (overwritten each run).
    #[arg(long, env = "HWOCR_REPORT", default_value = DEFAULT_REPORT_FILE)]
    report: PathBuf,

    /// Instruction sent with every image.
    #[arg(long, env = "HWOCR_PROMPT")]
    prompt: Option<String>,

    /// Per-image LLM call timeout in seconds.
    #[arg(long, env = "HWOCR_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "HWOCR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output structured JSON (entries and stats) instead of the report text.
    #[arg(long, env = "HWOCR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "HWOCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HWOCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HWOCR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so library
    // INFO logs are suppressed while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Key storage ──────────────────────────────────────────────────────
    let key_file = KeyFile::new(&cli.key_file);
    if cli.save_key {
        let key = cli.api_key.as_deref().unwrap_or_default();
        key_file
            .save(key)
            .with_context(|| format!("Failed to save API key to {}", cli.key_file.display()))?;
        if !cli.quiet {
            eprintln!("{} API key saved to {}", green("✔"), bold(&cli.key_file.display().to_string()));
        }
        if cli.inputs.is_empty() {
            return Ok(());
        }
    }

    // ── Resolve inputs ───────────────────────────────────────────────────
    let mut files: Vec<InputFile> = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let file = resolve_input(input, cli.download_timeout)
            .await
            .with_context(|| format!("Cannot use input '{input}'"))?;
        files.push(file);
    }

    // ── Build config and processor ───────────────────────────────────────
    let config = build_config(&cli, None)?;

    let mut credentials = ChainedCredentials::new().with(StaticKey(cli.api_key.clone()));
    if let Some(var) = provider_key_var(&cli.provider) {
        credentials = credentials.with(EnvKey::new(var));
    }
    let credentials = credentials.with(key_file);

    // Fail before the spinner exists so nothing is left drawn on stderr.
    let extractor = build_extractor(&config, &credentials);
    if let Some(reason) = extractor.unconfigured_reason() {
        return Err(BatchError::ServiceNotConfigured {
            hint: reason.to_string(),
        }
        .into());
    }

    let config = if show_progress {
        build_config(&cli, Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>))?
    } else {
        config
    };
    let processor = BatchProcessor::new(config, extractor);

    // ── Run batch ────────────────────────────────────────────────────────
    let output = processor.process(&files).await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.text.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        let stats = &output.report.stats;
        if !show_progress {
            eprintln!(
                "Extracted {}/{} item(s) from {} file(s) in {}ms",
                stats.succeeded, stats.total_entries, stats.total_files, stats.total_duration_ms
            );
        }
        if stats.rate_limited > 0 {
            eprintln!(
                "{} {} item(s) hit the service quota; wait a while and resubmit them",
                cyan("⚠"),
                stats.rate_limited
            );
        }
        eprintln!(
            "   report  →  {}",
            dim(&output.report_path.display().to_string())
        );
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder()
        .dpi(cli.dpi)
        .report_path(&cli.report)
        .provider_name(&cli.provider)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref prompt) = cli.prompt {
        builder = builder.instruction(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
