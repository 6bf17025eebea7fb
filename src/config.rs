//! Configuration types for batch text recognition.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share a config across phases, log it, and diff two runs.
//!
//! The CLI can additionally load a [`ConfigFile`] (JSON) and apply command
//! line flags on top of it.

use crate::error::BatchError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for one batch run.
///
/// # Example
/// ```rust
/// use edgequake_batch_ocr::{BatchConfig, RateLimitConfig};
///
/// let config = BatchConfig::builder()
///     .recognition_concurrency(8)
///     .recognition_rate_limit(RateLimitConfig::new(2.0, 4))
///     .dpi(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.recognition_concurrency, 8);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Workers in the expansion and preprocessing phases. Default: 4.
    ///
    /// Both phases are CPU-bound (pdfium rendering, image transforms) and run
    /// on the blocking thread pool, so a value near the core count is right.
    pub preprocess_concurrency: usize,

    /// Concurrent recognition calls. Default: 10.
    ///
    /// Recognition is network-bound. Lower this if the backend answers with
    /// 429s; use [`BatchConfig::recognition_rate_limit`] for a hard request rate.
    pub recognition_concurrency: usize,

    /// Token bucket shared by every recognition worker. Default: disabled.
    pub recognition_rate_limit: RateLimitConfig,

    /// Optional second pass that refines each stitched text.
    pub correction: CorrectionConfig,

    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Maximum rendered page dimension in pixels. Default: 2000.
    ///
    /// Caps memory independently of DPI: an A0 poster at 200 DPI would
    /// otherwise produce a 13 000 × 18 000 px page.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Which recognition backend to construct. Default: vision LLM, auto-detected.
    pub backend: BackendKind,

    /// Override the backend's answer to "do you read whole PDFs natively?".
    ///
    /// `None` asks the backend; `Some(true)` sends PDFs unrendered;
    /// `Some(false)` always renders pages first.
    pub native_multi_page: Option<bool>,

    /// Ordered image transforms applied before recognition. Default: none.
    pub transforms: Vec<TransformSpec>,

    /// Marker inserted between page texts of one input. Default: horizontal rule.
    pub page_separator: PageSeparator,

    /// Deadline for one unit's recognition, retries included, in seconds.
    /// 0 disables it. Default: 60.
    pub recognition_timeout_secs: u64,

    /// Maximum retry attempts on a transient backend failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Sampling temperature for LLM calls. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens an LLM may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Custom recognition system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// How often running progress trackers re-render, in milliseconds. Default: 250.
    pub progress_interval_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Pre-constructed LLM provider. Takes precedence over provider names.
    pub provider: Option<Arc<dyn LLMProvider>>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            preprocess_concurrency: 4,
            recognition_concurrency: 10,
            recognition_rate_limit: RateLimitConfig::disabled(),
            correction: CorrectionConfig::default(),
            dpi: 150,
            max_rendered_pixels: 2000,
            password: None,
            backend: BackendKind::default(),
            native_multi_page: None,
            transforms: Vec::new(),
            page_separator: PageSeparator::default(),
            recognition_timeout_secs: 60,
            max_retries: 3,
            retry_backoff_ms: 500,
            temperature: 0.1,
            max_tokens: 4096,
            system_prompt: None,
            progress_interval_ms: 250,
            download_timeout_secs: 120,
            provider: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("preprocess_concurrency", &self.preprocess_concurrency)
            .field("recognition_concurrency", &self.recognition_concurrency)
            .field("recognition_rate_limit", &self.recognition_rate_limit)
            .field("correction", &self.correction)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("backend", &self.backend)
            .field("native_multi_page", &self.native_multi_page)
            .field("transforms", &self.transforms)
            .field("page_separator", &self.page_separator)
            .field("recognition_timeout_secs", &self.recognition_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
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
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn preprocess_concurrency(mut self, n: usize) -> Self {
        self.config.preprocess_concurrency = n.max(1);
        self
    }

    pub fn recognition_concurrency(mut self, n: usize) -> Self {
        self.config.recognition_concurrency = n.max(1);
        self
    }

    pub fn recognition_rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.config.recognition_rate_limit = limit;
        self
    }

    pub fn correction(mut self, correction: CorrectionConfig) -> Self {
        self.config.correction = correction;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn native_multi_page(mut self, v: Option<bool>) -> Self {
        self.config.native_multi_page = v;
        self
    }

    pub fn transforms(mut self, transforms: Vec<TransformSpec>) -> Self {
        self.config.transforms = transforms;
        self
    }

    pub fn transform(mut self, transform: TransformSpec) -> Self {
        self.config.transforms.push(transform);
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn recognition_timeout_secs(mut self, secs: u64) -> Self {
        self.config.recognition_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
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

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_interval_ms(mut self, ms: u64) -> Self {
        self.config.progress_interval_ms = ms.max(10);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(BatchError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.preprocess_concurrency == 0
            || c.recognition_concurrency == 0
            || c.correction.concurrency == 0
        {
            return Err(BatchError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        c.recognition_rate_limit.validate("recognition")?;
        c.correction.rate_limit.validate("correction")?;
        for t in &c.transforms {
            t.validate()?;
        }
        Ok(self.config)
    }
}

// ── Rate limiting ────────────────────────────────────────────────────────

/// Token-bucket parameters for one pipeline phase.
///
/// `requests_per_second <= 0` disables the limiter; that is a valid state,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    /// Bucket capacity. Values below 1 are treated as 1.
    pub burst: u32,
}

impl RateLimitConfig {
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        Self {
            requests_per_second,
            burst,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0.0, 1)
    }

    pub fn is_enabled(&self) -> bool {
        self.requests_per_second > 0.0
    }

    fn validate(&self, phase: &str) -> Result<(), BatchError> {
        if self.requests_per_second.is_nan() || self.requests_per_second.is_infinite() {
            return Err(BatchError::InvalidConfig(format!(
                "{phase} rate limit must be a finite number, got {}",
                self.requests_per_second
            )));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

// ── Correction pass ──────────────────────────────────────────────────────

/// Settings for the optional text-refinement pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Run the pass at all. Default: false.
    pub enabled: bool,
    /// Concurrent correction calls. Default: 4.
    pub concurrency: usize,
    /// Independent token bucket for the correction service. Default: disabled.
    pub rate_limit: RateLimitConfig,
    /// Model for the correction provider. If None, the recognition model is used.
    pub model: Option<String>,
    /// Custom correction system prompt. If None, uses the built-in default.
    pub prompt: Option<String>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            concurrency: 4,
            rate_limit: RateLimitConfig::disabled(),
            model: None,
            prompt: None,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The closed set of recognition backends, selected once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    /// Vision LLM via edgequake-llm (OpenAI, Anthropic, Gemini, Ollama, …).
    Vision {
        /// Provider name; auto-detected from API key variables when None.
        provider: Option<String>,
        /// Model identifier; provider default when None.
        model: Option<String>,
    },
    /// Local `tesseract` binary.
    Tesseract {
        binary: PathBuf,
        language: String,
    },
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Vision {
            provider: None,
            model: None,
        }
    }
}

impl BackendKind {
    pub fn tesseract() -> Self {
        BackendKind::Tesseract {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
        }
    }
}

/// One preprocessing step, in configuration form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformSpec {
    /// Convert to 8-bit luminance.
    Grayscale,
    /// Shrink so the longest edge is at most `max_edge` pixels.
    Downscale { max_edge: u32 },
    /// Posterise luminance to `levels` evenly spaced values (2–256).
    Quantize { levels: u16 },
    /// Adjust contrast; positive increases, negative decreases.
    Contrast { amount: f32 },
}

impl TransformSpec {
    fn validate(&self) -> Result<(), BatchError> {
        match *self {
            TransformSpec::Downscale { max_edge } if max_edge == 0 => Err(
                BatchError::InvalidConfig("downscale max_edge must be ≥ 1".into()),
            ),
            TransformSpec::Quantize { levels } if !(2..=256).contains(&levels) => {
                Err(BatchError::InvalidConfig(format!(
                    "quantize levels must be 2–256, got {levels}"
                )))
            }
            TransformSpec::Contrast { amount } if !amount.is_finite() => Err(
                BatchError::InvalidConfig("contrast amount must be finite".into()),
            ),
            _ => Ok(()),
        }
    }
}

/// How to separate page texts inside one stitched result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Blank line: "\n\n"
    Blank,
    /// Horizontal rule: "\n\n---\n\n" (default)
    #[default]
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before the page with 0-based index `page`.
    pub fn render(&self, page: usize) -> String {
        match self {
            PageSeparator::Blank => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page + 1),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

// ── Config file ──────────────────────────────────────────────────────────

/// JSON configuration file; every field optional, unset fields keep defaults.
///
/// ```json
/// {
///   "recognition_concurrency": 6,
///   "recognition_rate_limit": { "requests_per_second": 2.0, "burst": 4 },
///   "backend": { "kind": "vision", "provider": "openai", "model": "gpt-4.1-mini" },
///   "transforms": [{ "op": "grayscale" }, { "op": "downscale", "max_edge": 1600 }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub preprocess_concurrency: Option<usize>,
    pub recognition_concurrency: Option<usize>,
    pub recognition_rate_limit: Option<RateLimitConfig>,
    pub correction: Option<CorrectionConfig>,
    pub dpi: Option<u32>,
    pub max_rendered_pixels: Option<u32>,
    pub backend: Option<BackendKind>,
    pub native_multi_page: Option<bool>,
    pub transforms: Option<Vec<TransformSpec>>,
    pub page_separator: Option<PageSeparator>,
    pub recognition_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl ConfigFile {
    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BatchError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|e| BatchError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Start a builder from these values, falling back to defaults.
    pub fn into_builder(self) -> BatchConfigBuilder {
        let mut b = BatchConfig::builder();
        if let Some(v) = self.preprocess_concurrency {
            b = b.preprocess_concurrency(v);
        }
        if let Some(v) = self.recognition_concurrency {
            b = b.recognition_concurrency(v);
        }
        if let Some(v) = self.recognition_rate_limit {
            b = b.recognition_rate_limit(v);
        }
        if let Some(v) = self.correction {
            b = b.correction(v);
        }
        if let Some(v) = self.dpi {
            b = b.dpi(v);
        }
        if let Some(v) = self.max_rendered_pixels {
            b = b.max_rendered_pixels(v);
        }
        if let Some(v) = self.backend {
            b = b.backend(v);
        }
        if self.native_multi_page.is_some() {
            b = b.native_multi_page(self.native_multi_page);
        }
        if let Some(v) = self.transforms {
            b = b.transforms(v);
        }
        if let Some(v) = self.page_separator {
            b = b.page_separator(v);
        }
        if let Some(v) = self.recognition_timeout_secs {
            b = b.recognition_timeout_secs(v);
        }
        if let Some(v) = self.max_retries {
            b = b.max_retries(v);
        }
        if let Some(v) = self.temperature {
            b = b.temperature(v);
        }
        if let Some(v) = self.max_tokens {
            b = b.max_tokens(v);
        }
        b
    }
}
