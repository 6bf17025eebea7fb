//! Batch orchestration: sequence every phase and deliver the results.
//!
//! ```text
//! Loaded ──▶ Expanded ──▶ Executed ──▶ Stitched ──▶ (Corrected) ──▶ Delivered
//!            expand       preprocess   stitch        correct         sink
//!                         + execute
//! ```
//!
//! Each phase runs to completion before the next starts; preprocessing fully
//! drains before recognition begins. A failure anywhere is attributed to one
//! unit (or one input) and collected into the [`BatchReport`]; only an
//! invalid setup returns `Err`. Cancelling the token makes queued and
//! in-flight work fail fast, after which whatever finished is still stitched
//! and delivered.

use crate::backend::{Backend, Corrector, LlmCorrector, Recognizer};
use crate::config::BatchConfig;
use crate::error::{AggregateError, BatchError, UnitError};
use crate::limiter::RateLimiter;
use crate::model::{DocumentKind, Outcome, SourceDocument, SourceResult, UnitId};
use crate::pipeline::correct::correct_all;
use crate::pipeline::execute::{execute, ExecuteOptions};
use crate::pipeline::expand::Expander;
use crate::pipeline::preprocess::{build_chain, preprocess_all};
use crate::pipeline::render::{PageRenderer, PdfiumRenderer, RenderOptions};
use crate::pipeline::stitch::stitch;
use crate::progress::{NoopRenderer, ProgressTracker, SharedRenderer};
use crate::sink::Sink;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Summary of one batch run.
///
/// Errors are kept per phase so callers can tell a corrupt input from a
/// flaky backend from a full disk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Number of inputs submitted.
    pub inputs: usize,
    /// Units produced by expansion.
    pub units: usize,
    /// Inputs with a result.
    pub succeeded: usize,
    /// Inputs without a result.
    pub failed: usize,
    /// Results rewritten by the correction pass.
    pub corrected: usize,
    /// Results accepted by the sink.
    pub delivered: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,

    pub expansion_errors: Vec<UnitError>,
    pub preprocess_errors: Vec<UnitError>,
    pub recognition_errors: Vec<UnitError>,
    pub correction_errors: Vec<UnitError>,
    pub delivery_errors: Vec<UnitError>,
}

impl BatchReport {
    /// Every unit-level failure of every phase, in phase order.
    pub fn aggregate_error(&self) -> AggregateError {
        self.expansion_errors
            .iter()
            .chain(&self.preprocess_errors)
            .chain(&self.recognition_errors)
            .chain(&self.correction_errors)
            .chain(&self.delivery_errors)
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    pub fn has_errors(&self) -> bool {
        !(self.expansion_errors.is_empty()
            && self.preprocess_errors.is_empty()
            && self.recognition_errors.is_empty()
            && self.correction_errors.is_empty()
            && self.delivery_errors.is_empty())
    }

    /// Treat any unit failure as an error.
    pub fn into_result(self) -> Result<Self, BatchError> {
        if !self.has_errors() {
            return Ok(self);
        }
        Err(BatchError::PartialFailure {
            succeeded: self.succeeded,
            failed: self.failed,
            total: self.inputs,
            errors: self.aggregate_error(),
        })
    }
}

/// Stitched (and possibly corrected) results plus the run report.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// Index-aligned with the submitted documents; `None` when every unit of
    /// that input failed.
    pub results: Vec<Option<SourceResult>>,
    pub report: BatchReport,
}

/// Runs batches against one recognition backend.
pub struct Orchestrator {
    config: BatchConfig,
    recognizer: Arc<dyn Recognizer>,
    renderer: Option<Arc<dyn PageRenderer>>,
    corrector: Option<Arc<dyn Corrector>>,
    progress: SharedRenderer,
}

impl Orchestrator {
    /// Build with explicit collaborators. Pages are rendered with pdfium
    /// unless [`Orchestrator::with_renderer`] supplies another renderer.
    pub fn new(config: BatchConfig, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            config,
            recognizer,
            renderer: None,
            corrector: None,
            progress: Arc::new(NoopRenderer),
        }
    }

    /// Build the backend (and corrector, when enabled) named by `config`.
    pub fn from_config(config: BatchConfig) -> Result<Self, BatchError> {
        let recognizer: Arc<dyn Recognizer> = Arc::new(Backend::from_config(&config)?);
        let corrector: Option<Arc<dyn Corrector>> = if config.correction.enabled {
            Some(Arc::new(LlmCorrector::from_config(&config)?))
        } else {
            None
        };
        let mut orchestrator = Self::new(config, recognizer);
        orchestrator.corrector = corrector;
        Ok(orchestrator)
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_corrector(mut self, corrector: Arc<dyn Corrector>) -> Self {
        self.corrector = Some(corrector);
        self
    }

    pub fn with_progress(mut self, progress: SharedRenderer) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Whether PDFs go to the backend whole instead of being rendered.
    pub fn native_multi_page(&self) -> bool {
        self.config
            .native_multi_page
            .unwrap_or_else(|| self.recognizer.supports_native_multi_page())
    }

    fn tracker(&self, phase: &str, total: usize) -> ProgressTracker {
        ProgressTracker::new(
            phase,
            total as u64,
            Arc::clone(&self.progress),
            Duration::from_millis(self.config.progress_interval_ms),
        )
    }

    /// Pick the page renderer, binding pdfium only when a PDF needs rendering.
    fn page_renderer(
        &self,
        docs: &[SourceDocument],
        native: bool,
    ) -> Result<Option<Arc<dyn PageRenderer>>, BatchError> {
        if let Some(renderer) = &self.renderer {
            return Ok(Some(Arc::clone(renderer)));
        }
        let needs_rendering = !native && docs.iter().any(|d| d.kind == DocumentKind::Pdf);
        if !needs_rendering {
            return Ok(None);
        }
        Ok(Some(Arc::new(PdfiumRenderer::new()?)))
    }

    /// Run every phase up to (and including) correction.
    pub async fn process(
        &self,
        docs: Vec<SourceDocument>,
        cancel: &CancellationToken,
    ) -> Result<BatchOutput, BatchError> {
        let start = Instant::now();
        let n = docs.len();
        let names: Vec<Arc<str>> = docs.iter().map(|d| Arc::from(d.name.as_str())).collect();
        let mut report = BatchReport {
            inputs: n,
            ..Default::default()
        };
        info!(
            "Starting batch: {} inputs, backend {}",
            n,
            self.recognizer.name()
        );

        // ── Expand ───────────────────────────────────────────────────────
        let native = self.native_multi_page();
        let expander = Expander {
            renderer: self.page_renderer(&docs, native)?,
            options: RenderOptions {
                dpi: self.config.dpi,
                max_pixels: self.config.max_rendered_pixels,
                password: self.config.password.clone(),
            },
            native_multi_page: native,
        };

        // Shows per-document progress until expansion reveals the unit count.
        let recognize = self.tracker("recognize", n);
        recognize.start();

        let expand = self.tracker("expand", n);
        expand.start();
        let expansion = expander
            .expand_all(docs, self.config.preprocess_concurrency, &expand)
            .await;
        expand.stop("expansion finished").await;
        report.units = expansion.units.len();
        report.expansion_errors = expansion.errors;
        recognize.set_total(report.units as u64);
        info!(
            "Expanded {} inputs into {} units ({} failed)",
            n,
            report.units,
            report.expansion_errors.len()
        );

        // ── Preprocess ───────────────────────────────────────────────────
        let chain: Arc<[_]> = Arc::from(build_chain(&self.config.transforms));
        let preprocess = self.tracker("preprocess", report.units);
        preprocess.start();
        let preprocessed = preprocess_all(
            chain,
            expansion.units,
            self.config.preprocess_concurrency,
            &preprocess,
        )
        .await;
        preprocess.stop("preprocessing finished").await;

        // A unit that failed preprocessing is a failed outcome of this batch.
        let mut outcomes: Vec<Outcome> = Vec::with_capacity(report.units);
        for error in &preprocessed.errors {
            recognize.increment_failed();
            outcomes.push(Outcome::failure(error.clone()));
        }
        report.preprocess_errors = preprocessed.errors;

        // ── Execute ──────────────────────────────────────────────────────
        let limiter = RateLimiter::new(&self.config.recognition_rate_limit);
        let executed = execute(
            self.recognizer.as_ref(),
            preprocessed.units,
            &limiter,
            &recognize,
            ExecuteOptions {
                concurrency: self.config.recognition_concurrency,
                timeout_secs: self.config.recognition_timeout_secs,
            },
            cancel,
        )
        .await;
        report.recognition_errors = executed.iter().filter_map(Outcome::error).cloned().collect();
        outcomes.extend(executed);
        recognize.stop("recognition finished").await;

        // ── Stitch ───────────────────────────────────────────────────────
        let mut results = stitch(n, &outcomes, &self.config.page_separator);

        // ── Correct ──────────────────────────────────────────────────────
        if let Some(corrector) = self.correction_gate(&results) {
            let limiter = RateLimiter::new(&self.config.correction.rate_limit);
            let correct = self.tracker("correct", results.iter().flatten().count());
            correct.start();
            let corrected = correct_all(
                corrector.as_ref(),
                results,
                &names,
                &limiter,
                &correct,
                self.config.correction.concurrency,
                cancel,
            )
            .await;
            correct.stop("correction finished").await;
            results = corrected.results;
            report.correction_errors = corrected.errors;
            report.corrected = results
                .iter()
                .flatten()
                .filter(|r| r.is_corrected())
                .count();
        }

        report.succeeded = results.iter().filter(|r| r.is_some()).count();
        report.failed = n - report.succeeded;
        report.cancelled = cancel.is_cancelled();
        report.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            "Batch finished: {}/{} inputs succeeded in {}ms",
            report.succeeded, n, report.elapsed_ms
        );
        Ok(BatchOutput { results, report })
    }

    fn correction_gate(&self, results: &[Option<SourceResult>]) -> Option<&Arc<dyn Corrector>> {
        if !self.config.correction.enabled {
            return None;
        }
        let Some(corrector) = &self.corrector else {
            warn!("correction enabled but no corrector configured; skipping");
            return None;
        };
        results.iter().any(Option::is_some).then_some(corrector)
    }

    /// Process the batch and hand every present result to `sink`.
    ///
    /// Results are delivered in input order after all phases finish; a
    /// delivery failure is recorded and the remaining results still go out.
    pub async fn run(
        &self,
        docs: Vec<SourceDocument>,
        sink: &dyn Sink,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        let names: Vec<Arc<str>> = docs.iter().map(|d| Arc::from(d.name.as_str())).collect();
        let BatchOutput {
            results,
            mut report,
        } = self.process(docs, cancel).await?;

        for (index, result) in results.into_iter().enumerate() {
            let Some(result) = result else {
                continue;
            };
            match sink.deliver(index, result).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    let error = UnitError::Delivery {
                        id: UnitId::new(index, None, Arc::clone(&names[index])),
                        detail: e.to_string(),
                    };
                    warn!("{}", error);
                    report.delivery_errors.push(error);
                }
            }
        }
        Ok(report)
    }

    /// Synchronous wrapper around [`Orchestrator::process`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn process_sync(&self, docs: Vec<SourceDocument>) -> Result<BatchOutput, BatchError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process(docs, &CancellationToken::new()))
    }
}
