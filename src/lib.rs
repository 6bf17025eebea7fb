//! # edgequake-batch-ocr
//!
//! Batch text recognition for images and PDFs with a pluggable backend.
//!
//! ## Why this crate?
//!
//! Recognising one page is easy; recognising ten thousand pages from a mix
//! of scans and multi-page PDFs is not. Calls must be bounded and throttled
//! to respect provider quotas, one corrupt file or flaky request must not
//! sink the batch, and pages finishing in any order must still come back as
//! one text per input, in page order. This crate is that orchestration layer.
//!
//! ## Pipeline Overview
//!
//! ```text
//! inputs
//!  │
//!  ├─ 1. Expand      PDF → one unit per page (pdfium), image → one unit
//!  ├─ 2. Preprocess  grayscale / downscale / quantize / contrast
//!  ├─ 3. Execute     bounded concurrency + token bucket + per-unit timeout
//!  ├─ 4. Stitch      regroup by input, pages ascending, joined by a separator
//!  ├─ 5. Correct     optional LLM proofreading pass (own rate limit)
//!  └─ 6. Deliver     each non-empty result to a Sink
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_batch_ocr::pipeline::input::load_source;
//! use edgequake_batch_ocr::{BatchConfig, MemorySink, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = BatchConfig::builder().recognition_concurrency(8).build()?;
//!     let orchestrator = Orchestrator::from_config(config)?;
//!
//!     let docs = vec![
//!         load_source("scan-001.png", 120).await?,
//!         load_source("contract.pdf", 120).await?,
//!     ];
//!     let sink = MemorySink::new();
//!     let report = orchestrator.run(docs, &sink, &CancellationToken::new()).await?;
//!     eprintln!("{}/{} inputs recognised", report.succeeded, report.inputs);
//!     for (index, result) in sink.results() {
//!         println!("── input {index} ──\n{}", result.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `batch-ocr` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-batch-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod limiter;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{Backend, Corrector, LlmCorrector, Recognizer};
pub use config::{
    BackendKind, BatchConfig, BatchConfigBuilder, ConfigFile, CorrectionConfig, PageSeparator,
    RateLimitConfig, TransformSpec,
};
pub use error::{AggregateError, BackendError, BatchError, UnitError};
pub use limiter::RateLimiter;
pub use model::{
    DocumentKind, Outcome, Payload, Recognition, SourceDocument, SourceResult, Unit, UnitId,
};
pub use orchestrator::{BatchOutput, BatchReport, Orchestrator};
pub use progress::{
    LogRenderer, NoopRenderer, ProgressRenderer, ProgressSnapshot, ProgressTracker,
};
pub use sink::{DirectorySink, MemorySink, Sink, SinkError};
