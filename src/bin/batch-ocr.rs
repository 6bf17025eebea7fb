//! CLI binary for edgequake-batch-ocr.
//!
//! A thin shim over the library crate: expands the input list, maps CLI
//! flags (on top of an optional JSON config file) to `BatchConfig`, runs the
//! orchestrator and prints the results.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use edgequake_batch_ocr::pipeline::input::{is_url, list_directory, load_source};
use edgequake_batch_ocr::{
    BackendKind, BatchConfig, BatchConfigBuilder, BatchReport, ConfigFile, CorrectionConfig,
    DirectorySink, MemorySink, Orchestrator, PageSeparator, ProgressRenderer, ProgressSnapshot,
    RateLimitConfig, Sink, SinkError, SourceDocument, SourceResult, TransformSpec,
};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

// ── Terminal progress renderer using indicatif ───────────────────────────────

/// One bar per pipeline phase, stacked in a [`MultiProgress`].
///
/// Bars are created lazily on the first tick of a phase, so phases that
/// never start (zero units, correction disabled) never show up.
struct BarRenderer {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl BarRenderer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        })
    }

    fn bar(&self, phase: &str) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.entry(phase.to_string())
            .or_insert_with(|| {
                let style = ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold:>10}  \
                     [{bar:40.green/238}] {pos:>4}/{len:<4} {msg}  ⏱ {elapsed_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
                let bar = self.multi.add(ProgressBar::new(0));
                bar.set_style(style);
                bar.set_prefix(phase.to_string());
                bar.enable_steady_tick(Duration::from_millis(80));
                bar
            })
            .clone()
    }

    fn update(bar: &ProgressBar, s: &ProgressSnapshot) {
        bar.set_length(s.total);
        bar.set_position(s.done());
        if s.failed > 0 {
            bar.set_message(red(&format!("{} failed", s.failed)));
        }
    }
}

impl ProgressRenderer for BarRenderer {
    fn render(&self, phase: &str, snapshot: &ProgressSnapshot) {
        Self::update(&self.bar(phase), snapshot);
    }

    fn finish(&self, phase: &str, snapshot: &ProgressSnapshot, message: &str) {
        if snapshot.total == 0 {
            return;
        }
        let bar = self.bar(phase);
        Self::update(&bar, snapshot);
        let mark = if snapshot.failed == 0 {
            green("✓")
        } else {
            cyan("⚠")
        };
        bar.finish_with_message(format!("{mark} {}", dim(message)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise a folder of scans into ./out (one .txt per input)
  batch-ocr scans/ -o out/

  # Mixed inputs, throttled to 2 requests/s with bursts of 4
  batch-ocr a.png b.jpg report.pdf --rps 2 --burst 4 -o out/

  # Local OCR, no API key needed
  batch-ocr --backend tesseract --language deu scans/ -o out/

  # Preprocess and proofread with a second model
  batch-ocr --grayscale --downscale 1600 --correct --correction-model gpt-4.1-mini scans/

  # Gemini reads PDFs natively; skip local rendering
  batch-ocr --provider gemini --model gemini-2.0-flash --native-pdf true book.pdf

  # Machine-readable report
  batch-ocr --json scans/ -o out/ > report.json

CONFIG FILE (--config batch.json):
  {
    "recognition_concurrency": 6,
    "recognition_rate_limit": { "requests_per_second": 2.0, "burst": 4 },
    "backend": { "kind": "vision", "provider": "openai", "model": "gpt-4.1-mini" },
    "transforms": [{ "op": "grayscale" }, { "op": "downscale", "max_edge": 1600 }],
    "correction": { "enabled": true, "concurrency": 2,
                    "rate_limit": { "requests_per_second": 1.0, "burst": 1 },
                    "model": null, "prompt": null }
  }
  Command-line flags override values from the file.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium used to render PDF pages
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Recognise text in batches of images and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "batch-ocr",
    version,
    about = "Recognise text in batches of images and PDFs",
    long_about = "Recognise text in many images and PDFs at once using a vision LLM or a \
local tesseract binary. Pages are processed with bounded concurrency and an optional \
rate limit; each input yields one text, pages in order, even when some pages fail.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files, directories (non-recursive) or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// JSON config file; flags override its values.
    #[arg(long, env = "BATCH_OCR_CONFIG")]
    config: Option<PathBuf>,

    /// Write one file per input into this directory instead of stdout.
    #[arg(short, long, env = "BATCH_OCR_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Extension of files written to --output-dir.
    #[arg(long, env = "BATCH_OCR_EXTENSION", default_value = "txt")]
    extension: String,

    // ── Backend ──────────────────────────────────────────────────────────
    /// Recognition backend.
    #[arg(long, env = "BATCH_OCR_BACKEND", value_enum)]
    backend: Option<BackendArg>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, gemini-2.0-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Path to the tesseract binary.
    #[arg(long, env = "BATCH_OCR_TESSERACT_BIN")]
    tesseract_bin: Option<PathBuf>,

    /// Tesseract language code(s), e.g. eng or eng+deu.
    #[arg(long, env = "BATCH_OCR_LANGUAGE")]
    language: Option<String>,

    /// Send PDFs to the backend whole (true) or always render pages (false).
    /// Unset asks the backend.
    #[arg(long, env = "BATCH_OCR_NATIVE_PDF")]
    native_pdf: Option<bool>,

    // ── Throughput ───────────────────────────────────────────────────────
    /// Concurrent recognition calls.
    #[arg(short, long, env = "BATCH_OCR_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Concurrent render / transform workers.
    #[arg(long, env = "BATCH_OCR_PREPROCESS_CONCURRENCY")]
    preprocess_concurrency: Option<usize>,

    /// Recognition requests per second (0 disables the limit).
    #[arg(long, env = "BATCH_OCR_RPS")]
    rps: Option<f64>,

    /// Recognition burst size.
    #[arg(long, env = "BATCH_OCR_BURST")]
    burst: Option<u32>,

    /// Per-unit recognition timeout in seconds (0 disables).
    #[arg(long, env = "BATCH_OCR_TIMEOUT")]
    timeout: Option<u64>,

    /// Retries per call on a transient backend failure.
    #[arg(long, env = "BATCH_OCR_MAX_RETRIES")]
    max_retries: Option<u32>,

    // ── Rendering & preprocessing ────────────────────────────────────────
    /// Rendering DPI for PDF pages (72–400).
    #[arg(long, env = "BATCH_OCR_DPI",
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: Option<u32>,

    /// Longest rendered page edge in pixels.
    #[arg(long, env = "BATCH_OCR_MAX_PIXELS")]
    max_pixels: Option<u32>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "BATCH_OCR_PASSWORD")]
    password: Option<String>,

    /// Convert images to grayscale before recognition.
    #[arg(long)]
    grayscale: bool,

    /// Shrink images so the longest edge is at most N pixels.
    #[arg(long, value_name = "N")]
    downscale: Option<u32>,

    /// Posterise to N grey levels (2–256).
    #[arg(long, value_name = "N")]
    quantize: Option<u16>,

    /// Adjust contrast by this amount (negative lowers it).
    #[arg(long, allow_hyphen_values = true)]
    contrast: Option<f32>,

    // ── Output shaping ───────────────────────────────────────────────────
    /// Page separator: blank, hr, comment, or a custom string.
    #[arg(long, env = "BATCH_OCR_SEPARATOR")]
    separator: Option<String>,

    /// Path to a text file containing a custom recognition prompt.
    #[arg(long, env = "BATCH_OCR_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "BATCH_OCR_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "BATCH_OCR_TEMPERATURE")]
    temperature: Option<f32>,

    // ── Correction ───────────────────────────────────────────────────────
    /// Proofread each stitched text with an LLM.
    #[arg(long, env = "BATCH_OCR_CORRECT")]
    correct: bool,

    /// Concurrent correction calls.
    #[arg(long, env = "BATCH_OCR_CORRECTION_CONCURRENCY")]
    correction_concurrency: Option<usize>,

    /// Correction requests per second (0 disables the limit).
    #[arg(long, env = "BATCH_OCR_CORRECTION_RPS")]
    correction_rps: Option<f64>,

    /// Correction burst size.
    #[arg(long, env = "BATCH_OCR_CORRECTION_BURST")]
    correction_burst: Option<u32>,

    /// Model for the correction pass (defaults to the recognition model).
    #[arg(long, env = "BATCH_OCR_CORRECTION_MODEL")]
    correction_model: Option<String>,

    /// Path to a text file containing a custom correction prompt.
    #[arg(long, env = "BATCH_OCR_CORRECTION_PROMPT")]
    correction_prompt: Option<PathBuf>,

    // ── Misc ─────────────────────────────────────────────────────────────
    /// HTTP download timeout in seconds.
    #[arg(long, env = "BATCH_OCR_DOWNLOAD_TIMEOUT")]
    download_timeout: Option<u64>,

    /// Print a JSON report to stdout instead of the texts.
    #[arg(long, env = "BATCH_OCR_JSON")]
    json: bool,

    /// Disable progress bars.
    #[arg(long, env = "BATCH_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BATCH_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BATCH_OCR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackendArg {
    Vision,
    Tesseract,
}

/// Forwards to the output directory (if any) and keeps a copy for stdout
/// and the JSON report.
struct CliSink {
    directory: Option<DirectorySink>,
    delivered: MemorySink,
}

#[async_trait]
impl Sink for CliSink {
    async fn deliver(&self, index: usize, result: SourceResult) -> Result<(), SinkError> {
        if let Some(dir) = &self.directory {
            dir.deliver(index, result.clone()).await?;
        }
        self.delivered.deliver(index, result).await
    }
}

/// An input that could not be loaded.
#[derive(Debug, Serialize)]
struct LoadFailure {
    input: String,
    error: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    report: &'a BatchReport,
    load_failures: &'a [LoadFailure],
    outputs: Vec<JsonOutput>,
}

#[derive(Serialize)]
struct JsonOutput {
    index: usize,
    name: String,
    path: Option<PathBuf>,
    chars: usize,
    corrected: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bars are active;
    // the bars provide all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli).await?;

    // ── Resolve and load inputs ──────────────────────────────────────────
    let inputs = expand_inputs(&cli.inputs)?;
    if inputs.is_empty() {
        anyhow::bail!("No supported inputs found (PDF, PNG, JPEG, TIFF, WebP)");
    }
    let (docs, load_failures) = load_all(&inputs, config.download_timeout_secs).await;
    for failure in &load_failures {
        eprintln!("{} {}: {}", red("✗"), failure.input, failure.error);
    }
    if docs.is_empty() {
        anyhow::bail!("None of the {} inputs could be loaded", inputs.len());
    }
    let names: Vec<String> = docs.iter().map(|d| d.name.clone()).collect();

    // ── Orchestrate ──────────────────────────────────────────────────────
    let mut orchestrator = Orchestrator::from_config(config).context("Failed to set up backend")?;
    if show_progress {
        orchestrator = orchestrator.with_progress(BarRenderer::new());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} interrupted, finishing what completed…", cyan("⚠"));
            on_interrupt.cancel();
        }
    });

    let sink = CliSink {
        directory: cli
            .output_dir
            .as_ref()
            .map(|dir| DirectorySink::new(dir, &names, &cli.extension)),
        delivered: MemorySink::new(),
    };

    let report = orchestrator
        .run(docs, &sink, &cancel)
        .await
        .context("Batch failed")?;

    // ── Output ───────────────────────────────────────────────────────────
    let delivered = sink.delivered.results();
    if cli.json {
        let outputs = delivered
            .iter()
            .map(|(i, r)| JsonOutput {
                index: *i,
                name: names[*i].clone(),
                path: sink
                    .directory
                    .as_ref()
                    .and_then(|d| d.path_for(*i))
                    .map(Path::to_path_buf),
                chars: r.text.chars().count(),
                corrected: r.is_corrected(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&JsonReport {
            report: &report,
            load_failures: &load_failures,
            outputs,
        })
        .context("Failed to serialise report")?;
        println!("{json}");
    } else if sink.directory.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for (i, result) in &delivered {
            if delivered.len() > 1 {
                writeln!(handle, "==> {} <==", names[*i]).context("Failed to write to stdout")?;
            }
            handle
                .write_all(result.text.as_bytes())
                .context("Failed to write to stdout")?;
            if !result.text.ends_with('\n') {
                handle.write_all(b"\n").context("Failed to write to stdout")?;
            }
        }
    }

    if !cli.quiet {
        print_summary(&report, &load_failures, cli.output_dir.as_deref());
    }

    let total = inputs.len();
    let succeeded = report.succeeded;
    if succeeded == 0 {
        anyhow::bail!("No input produced any text ({total} inputs)");
    }
    Ok(())
}

fn print_summary(report: &BatchReport, load_failures: &[LoadFailure], output_dir: Option<&Path>) {
    for error in report.aggregate_error().errors {
        if !error.is_cancelled() {
            eprintln!("  {} {}", red("✗"), error);
        }
    }
    let total = report.inputs + load_failures.len();
    let mark = if report.failed == 0 && load_failures.is_empty() {
        green("✔")
    } else if report.succeeded == 0 {
        red("✘")
    } else {
        cyan("⚠")
    };
    let destination = output_dir
        .map(|d| format!("  →  {}", bold(&d.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{mark}  {}/{} inputs  {} units  {}ms{destination}",
        report.succeeded,
        total,
        report.units,
        report.elapsed_ms,
    );
    if report.corrected > 0 {
        eprintln!("   {} corrected", dim(&report.corrected.to_string()));
    }
    if report.cancelled {
        eprintln!("   {}", cyan("cancelled before completion"));
    }
}

/// Expand directories into their supported files; keep files and URLs as-is.
fn expand_inputs(raw: &[String]) -> Result<Vec<String>> {
    let mut inputs = Vec::new();
    for input in raw {
        let path = Path::new(input);
        if !is_url(input) && path.is_dir() {
            let files = list_directory(path)
                .with_context(|| format!("Failed to list directory {}", path.display()))?;
            inputs.extend(files.into_iter().map(|p| p.to_string_lossy().into_owned()));
        } else {
            inputs.push(input.clone());
        }
    }
    Ok(inputs)
}

/// Load every input, a few at a time, keeping input order.
async fn load_all(inputs: &[String], timeout_secs: u64) -> (Vec<SourceDocument>, Vec<LoadFailure>) {
    let loaded: Vec<_> = stream::iter(inputs.iter().map(|input| async move {
        (input, load_source(input, timeout_secs).await)
    }))
    .buffered(8)
    .collect()
    .await;

    let mut docs = Vec::new();
    let mut failures = Vec::new();
    for (input, result) in loaded {
        match result {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                warn!("skipping {}: {}", input, e);
                failures.push(LoadFailure {
                    input: input.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    (docs, failures)
}

/// Map the config file plus CLI flags to `BatchConfig`.
async fn build_config(cli: &Cli) -> Result<BatchConfig> {
    let file = match &cli.config {
        Some(path) => ConfigFile::load(path).context("Failed to load config file")?,
        None => ConfigFile::default(),
    };
    // Captured before `into_builder` consumes the file.
    let base_backend = file.backend.clone().unwrap_or_default();
    let base_correction = file.correction.clone().unwrap_or_default();
    let base_recognition_limit = file.recognition_rate_limit.unwrap_or_default();
    let base_transforms = file.transforms.clone().unwrap_or_default();

    let mut b: BatchConfigBuilder = file.into_builder();

    if let Some(v) = cli.concurrency {
        b = b.recognition_concurrency(v);
    }
    if let Some(v) = cli.preprocess_concurrency {
        b = b.preprocess_concurrency(v);
    }
    if cli.rps.is_some() || cli.burst.is_some() {
        b = b.recognition_rate_limit(RateLimitConfig::new(
            cli.rps.unwrap_or(base_recognition_limit.requests_per_second),
            cli.burst.unwrap_or(base_recognition_limit.burst),
        ));
    }
    if let Some(v) = cli.timeout {
        b = b.recognition_timeout_secs(v);
    }
    if let Some(v) = cli.max_retries {
        b = b.max_retries(v);
    }
    if let Some(v) = cli.dpi {
        b = b.dpi(v);
    }
    if let Some(v) = cli.max_pixels {
        b = b.max_rendered_pixels(v);
    }
    if let Some(ref v) = cli.password {
        b = b.password(v.clone());
    }
    if cli.native_pdf.is_some() {
        b = b.native_multi_page(cli.native_pdf);
    }
    if let Some(ref s) = cli.separator {
        b = b.page_separator(parse_separator(s));
    }
    if let Some(v) = cli.max_tokens {
        b = b.max_tokens(v);
    }
    if let Some(v) = cli.temperature {
        b = b.temperature(v);
    }
    if let Some(v) = cli.download_timeout {
        b = b.download_timeout_secs(v);
    }
    if let Some(ref path) = cli.system_prompt {
        b = b.system_prompt(read_prompt(path).await?);
    }

    b = b.backend(backend_from_cli(cli, base_backend));

    let transforms = transforms_from_cli(cli);
    if !transforms.is_empty() {
        let mut all = base_transforms;
        all.extend(transforms);
        b = b.transforms(all);
    }

    let mut correction: CorrectionConfig = base_correction;
    correction.enabled |= cli.correct;
    if let Some(v) = cli.correction_concurrency {
        correction.concurrency = v;
    }
    if cli.correction_rps.is_some() || cli.correction_burst.is_some() {
        correction.rate_limit = RateLimitConfig::new(
            cli.correction_rps
                .unwrap_or(correction.rate_limit.requests_per_second),
            cli.correction_burst.unwrap_or(correction.rate_limit.burst),
        );
    }
    if let Some(ref m) = cli.correction_model {
        correction.model = Some(m.clone());
    }
    if let Some(ref path) = cli.correction_prompt {
        correction.prompt = Some(read_prompt(path).await?);
    }
    b = b.correction(correction);

    b.build().context("Invalid configuration")
}

async fn read_prompt(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt from {:?}", path))
}

/// Flags refine the file's backend; `--backend` switches kind.
fn backend_from_cli(cli: &Cli, base: BackendKind) -> BackendKind {
    let kind = cli.backend.unwrap_or(match base {
        BackendKind::Vision { .. } => BackendArg::Vision,
        BackendKind::Tesseract { .. } => BackendArg::Tesseract,
    });
    match (kind, base) {
        (BackendArg::Vision, BackendKind::Vision { provider, model }) => BackendKind::Vision {
            provider: cli.provider.clone().or(provider),
            model: cli.model.clone().or(model),
        },
        (BackendArg::Vision, BackendKind::Tesseract { .. }) => BackendKind::Vision {
            provider: cli.provider.clone(),
            model: cli.model.clone(),
        },
        (BackendArg::Tesseract, base) => {
            let (binary, language) = match base {
                BackendKind::Tesseract { binary, language } => (binary, language),
                BackendKind::Vision { .. } => (PathBuf::from("tesseract"), "eng".to_string()),
            };
            BackendKind::Tesseract {
                binary: cli.tesseract_bin.clone().unwrap_or(binary),
                language: cli.language.clone().unwrap_or(language),
            }
        }
    }
}

fn transforms_from_cli(cli: &Cli) -> Vec<TransformSpec> {
    let mut transforms = Vec::new();
    if cli.grayscale {
        transforms.push(TransformSpec::Grayscale);
    }
    if let Some(amount) = cli.contrast {
        transforms.push(TransformSpec::Contrast { amount });
    }
    if let Some(max_edge) = cli.downscale {
        transforms.push(TransformSpec::Downscale { max_edge });
    }
    if let Some(levels) = cli.quantize {
        transforms.push(TransformSpec::Quantize { levels });
    }
    transforms
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "blank" | "none" => PageSeparator::Blank,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
