//! Whole-batch tests driven through the orchestrator with in-process stubs.
//!
//! No network, no pdfium: PDFs are "rendered" by a fake renderer and pages
//! are "recognised" by a stub that echoes the unit identity.

use async_trait::async_trait;
use edgequake_batch_ocr::pipeline::render::{PageRenderer, RenderOptions};
use edgequake_batch_ocr::{
    BackendError, BatchConfig, BatchConfigBuilder, CorrectionConfig, Corrector, DocumentKind,
    MemorySink, Orchestrator, ProgressRenderer, ProgressSnapshot, RateLimitConfig, Recognition,
    Recognizer, SourceDocument, Unit, UnitError, UnitId,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

// ── Stubs ────────────────────────────────────────────────────────────────────

/// Answers `"<name> p<page>"`; page 0 of multi-page inputs is slow so later
/// pages complete first.
#[derive(Default)]
struct EchoRecognizer {
    /// `(name, page)` pairs that fail.
    failing: Vec<(String, Option<usize>)>,
    /// Cancel this token once this many units have succeeded.
    cancel_after: Option<(usize, CancellationToken)>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    succeeded: AtomicUsize,
}

impl EchoRecognizer {
    fn failing(pairs: &[(&str, Option<usize>)]) -> Self {
        Self {
            failing: pairs.iter().map(|(n, p)| (n.to_string(), *p)).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Recognizer for EchoRecognizer {
    fn name(&self) -> &str {
        "echo"
    }

    async fn recognize(&self, unit: &Unit) -> Result<Recognition, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = if unit.id.page == Some(0) { 60 } else { 5 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key = (unit.id.name.to_string(), unit.id.page);
        if self.failing.contains(&key) {
            return Err(BackendError::Provider {
                provider: "echo".into(),
                retries: 0,
                detail: "simulated outage".into(),
            });
        }
        let done = self.succeeded.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = &self.cancel_after {
            if done == *after {
                token.cancel();
            }
        }
        Ok(Recognition::text(match unit.id.page {
            Some(page) => format!("{} p{}", unit.id.name, page),
            None => unit.id.name.to_string(),
        }))
    }
}

/// Every PDF has `pages` blank pages unless it contains `CORRUPT`.
struct FakeRenderer {
    pages: usize,
}

impl PageRenderer for FakeRenderer {
    fn render(&self, pdf: &[u8], _options: &RenderOptions) -> Result<Vec<DynamicImage>, String> {
        if pdf.windows(7).any(|w| w == b"CORRUPT") {
            return Err("corrupt PDF: bad xref".into());
        }
        Ok((0..self.pages)
            .map(|_| DynamicImage::new_luma8(16, 16))
            .collect())
    }
}

/// Upper-cases text; fails on anything containing `reject`.
struct ShoutingCorrector;

#[async_trait]
impl Corrector for ShoutingCorrector {
    async fn complete(&self, text: &str) -> Result<String, BackendError> {
        if text.contains("reject") {
            return Err(BackendError::Provider {
                provider: "shout".into(),
                retries: 0,
                detail: "refused".into(),
            });
        }
        Ok(text.to_uppercase())
    }
}

/// Keeps the final snapshot of every phase.
#[derive(Default)]
struct RecordingRenderer {
    finished: Mutex<HashMap<String, ProgressSnapshot>>,
    renders: AtomicUsize,
    violations: AtomicUsize,
}

impl RecordingRenderer {
    fn check(&self, s: &ProgressSnapshot) {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if s.completed + s.failed + s.in_flight != s.total {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl ProgressRenderer for RecordingRenderer {
    fn render(&self, _phase: &str, s: &ProgressSnapshot) {
        self.check(s);
    }

    fn finish(&self, phase: &str, s: &ProgressSnapshot, _message: &str) {
        self.check(s);
        self.finished
            .lock()
            .unwrap()
            .insert(phase.to_string(), *s);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn png(name: &str) -> SourceDocument {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([200, 200, 200, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    SourceDocument::new(name, DocumentKind::Image, buf)
}

fn pdf(name: &str) -> SourceDocument {
    SourceDocument::new(name, DocumentKind::Pdf, b"%PDF-1.7 fake".to_vec())
}

fn corrupt_pdf(name: &str) -> SourceDocument {
    SourceDocument::new(name, DocumentKind::Pdf, b"%PDF-1.7 CORRUPT".to_vec())
}

fn abc() -> Vec<SourceDocument> {
    vec![png("a.png"), png("b.png"), pdf("c.pdf")]
}

fn base() -> BatchConfigBuilder {
    BatchConfig::builder()
        .recognition_concurrency(4)
        .preprocess_concurrency(2)
        .recognition_timeout_secs(10)
        .progress_interval_ms(10)
}

fn orchestrator(config: BatchConfig, recognizer: Arc<EchoRecognizer>) -> Orchestrator {
    Orchestrator::new(config, recognizer).with_renderer(Arc::new(FakeRenderer { pages: 2 }))
}

fn texts(results: &[Option<edgequake_batch_ocr::SourceResult>]) -> Vec<Option<String>> {
    results
        .iter()
        .map(|r| r.as_ref().map(|r| r.text.clone()))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn results_follow_input_and_page_order() {
    let recognizer = Arc::new(EchoRecognizer::default());
    let orch = orchestrator(base().build().unwrap(), recognizer.clone());

    let output = orch.process(abc(), &CancellationToken::new()).await.unwrap();

    assert_eq!(
        texts(&output.results),
        vec![
            Some("a.png".to_string()),
            Some("b.png".to_string()),
            Some("c.pdf p0\n\n---\n\nc.pdf p1".to_string()),
        ]
    );
    assert_eq!(output.report.units, 4);
    assert_eq!(output.report.succeeded, 3);
    assert_eq!(output.report.failed, 0);
    assert!(!output.report.has_errors());
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn failed_page_leaves_remaining_pages() {
    let recognizer = Arc::new(EchoRecognizer::failing(&[("c.pdf", Some(0))]));
    let orch = orchestrator(base().build().unwrap(), recognizer);

    let output = orch.process(abc(), &CancellationToken::new()).await.unwrap();

    assert_eq!(output.results.len(), 3);
    assert_eq!(output.results[2].as_ref().unwrap().text, "c.pdf p1");
    assert_eq!(output.report.succeeded, 3);

    let aggregate = output.report.aggregate_error();
    assert_eq!(aggregate.len(), 1);
    assert_eq!(aggregate.errors[0].id(), &UnitId::new(2, Some(0), "c.pdf"));
    assert!(matches!(aggregate.errors[0], UnitError::Recognition { .. }));
}

#[tokio::test]
async fn input_without_any_success_has_no_result() {
    let recognizer = Arc::new(EchoRecognizer::failing(&[
        ("c.pdf", Some(0)),
        ("c.pdf", Some(1)),
    ]));
    let orch = orchestrator(base().build().unwrap(), recognizer);
    let sink = MemorySink::new();

    let report = orch
        .run(abc(), &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.recognition_errors.len(), 2);
    let delivered: Vec<usize> = sink.results().into_keys().collect();
    assert_eq!(delivered, vec![0, 1]);
    assert!(report.into_result().is_err());
}

#[tokio::test]
async fn corrupt_pdf_fails_only_its_input() {
    let recognizer = Arc::new(EchoRecognizer::default());
    let orch = orchestrator(base().build().unwrap(), recognizer);
    let docs = vec![png("a.png"), corrupt_pdf("broken.pdf"), png("b.png")];

    let output = orch.process(docs, &CancellationToken::new()).await.unwrap();

    assert_eq!(
        texts(&output.results),
        vec![Some("a.png".to_string()), None, Some("b.png".to_string())]
    );
    assert_eq!(output.report.expansion_errors.len(), 1);
    assert_eq!(output.report.expansion_errors[0].id().origin, 1);
    assert_eq!(output.report.units, 2);
}

#[tokio::test]
async fn output_length_matches_input_count() {
    let recognizer = Arc::new(EchoRecognizer::default());
    let orch = orchestrator(base().build().unwrap(), recognizer);
    let docs: Vec<_> = (0..12).map(|i| png(&format!("img-{i}.png"))).collect();

    let output = orch.process(docs, &CancellationToken::new()).await.unwrap();

    assert_eq!(output.results.len(), 12);
    for (i, result) in output.results.iter().enumerate() {
        assert_eq!(result.as_ref().unwrap().text, format!("img-{i}.png"));
    }
}

#[tokio::test]
async fn empty_batch_is_not_an_error() {
    let orch = orchestrator(base().build().unwrap(), Arc::new(EchoRecognizer::default()));
    let output = orch
        .process(Vec::new(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(output.results.is_empty());
    assert_eq!(output.report.units, 0);
    assert!(!output.report.has_errors());
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let recognizer = Arc::new(EchoRecognizer::default());
    let config = base().recognition_concurrency(3).build().unwrap();
    let orch = orchestrator(config, recognizer.clone());
    let docs: Vec<_> = (0..10).map(|i| pdf(&format!("doc-{i}.pdf"))).collect();

    let output = orch.process(docs, &CancellationToken::new()).await.unwrap();

    assert_eq!(output.report.units, 20);
    assert_eq!(output.report.succeeded, 10);
    let peak = recognizer.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight {peak} exceeded 3");
    assert!(peak >= 2, "expected some overlap, got {peak}");
}

#[tokio::test]
async fn rate_limit_spaces_requests() {
    let recognizer = Arc::new(EchoRecognizer::default());
    let config = base()
        .recognition_concurrency(8)
        .recognition_rate_limit(RateLimitConfig::new(20.0, 1))
        .build()
        .unwrap();
    let orch = orchestrator(config, recognizer);
    let docs: Vec<_> = (0..5).map(|i| png(&format!("{i}.png"))).collect();

    let start = Instant::now();
    let output = orch.process(docs, &CancellationToken::new()).await.unwrap();

    assert_eq!(output.report.succeeded, 5);
    // Burst 1 at 20/s: four waits of 50 ms after the first permit.
    assert!(
        start.elapsed() >= Duration::from_millis(190),
        "finished too fast: {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn progress_accounts_for_every_unit() {
    let progress = Arc::new(RecordingRenderer::default());
    let recognizer = Arc::new(EchoRecognizer::failing(&[("b.png", None)]));
    let orch = orchestrator(base().build().unwrap(), recognizer).with_progress(progress.clone());
    let docs = vec![png("a.png"), png("b.png"), pdf("c.pdf"), corrupt_pdf("d.pdf")];

    let output = orch.process(docs, &CancellationToken::new()).await.unwrap();

    let finished = progress.finished.lock().unwrap().clone();
    let recognize = &finished["recognize"];
    assert_eq!(recognize.total, output.report.units as u64);
    assert_eq!(recognize.total, 4);
    assert_eq!(recognize.completed, 3);
    assert_eq!(recognize.failed, 1);
    assert_eq!(recognize.done(), recognize.total);

    let expand = &finished["expand"];
    assert_eq!((expand.completed, expand.failed), (3, 1));
    assert_eq!(recognize.in_flight, 0);
    assert!(progress.renders.load(Ordering::SeqCst) >= finished.len());
    assert_eq!(progress.violations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reprocessing_is_deterministic() {
    let first = orchestrator(base().build().unwrap(), Arc::new(EchoRecognizer::default()))
        .process(abc(), &CancellationToken::new())
        .await
        .unwrap();
    let second = orchestrator(
        base().recognition_concurrency(1).build().unwrap(),
        Arc::new(EchoRecognizer::default()),
    )
    .process(abc(), &CancellationToken::new())
    .await
    .unwrap();
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn cancelled_batch_returns_partial_report() {
    let recognizer = Arc::new(EchoRecognizer::default());
    let orch = orchestrator(base().build().unwrap(), recognizer.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let output = orch.process(abc(), &cancel).await.unwrap();

    assert!(output.report.cancelled);
    assert_eq!(output.report.succeeded, 0);
    assert!(output.results.iter().all(Option::is_none));
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    assert!(output
        .report
        .recognition_errors
        .iter()
        .all(UnitError::is_cancelled));
}

#[tokio::test]
async fn cancellation_mid_batch_keeps_finished_work() {
    let cancel = CancellationToken::new();
    // Images and page 1 finish in ~5 ms; page 0 of c.pdf takes 60 ms.
    let recognizer = Arc::new(EchoRecognizer {
        cancel_after: Some((3, cancel.clone())),
        ..Default::default()
    });
    let orch = orchestrator(base().build().unwrap(), recognizer);

    let output = orch.process(abc(), &cancel).await.unwrap();

    assert!(output.report.cancelled);
    assert_eq!(output.results[0].as_ref().unwrap().text, "a.png");
    assert_eq!(output.results[1].as_ref().unwrap().text, "b.png");
    assert_eq!(output.results[2].as_ref().unwrap().text, "c.pdf p1");
    assert_eq!(output.report.recognition_errors.len(), 1);
    assert!(output.report.recognition_errors[0].is_cancelled());
}

#[tokio::test]
async fn correction_refines_best_effort() {
    let config = base()
        .correction(CorrectionConfig {
            enabled: true,
            concurrency: 2,
            ..Default::default()
        })
        .build()
        .unwrap();
    let orch = orchestrator(config, Arc::new(EchoRecognizer::default()))
        .with_corrector(Arc::new(ShoutingCorrector));
    let docs = vec![png("a.png"), png("reject.png")];

    let output = orch.process(docs, &CancellationToken::new()).await.unwrap();

    let a = output.results[0].as_ref().unwrap();
    assert_eq!(a.text, "A.PNG");
    assert!(a.is_corrected());

    let kept = output.results[1].as_ref().unwrap();
    assert_eq!(kept.text, "reject.png");
    assert!(!kept.is_corrected());

    assert_eq!(output.report.corrected, 1);
    assert_eq!(output.report.succeeded, 2);
    assert_eq!(output.report.correction_errors.len(), 1);
    assert_eq!(
        output.report.correction_errors[0].id(),
        &UnitId::new(1, None, "reject.png")
    );
}

#[tokio::test]
async fn correction_disabled_leaves_text_alone() {
    let orch = orchestrator(base().build().unwrap(), Arc::new(EchoRecognizer::default()))
        .with_corrector(Arc::new(ShoutingCorrector));

    let output = orch
        .process(vec![png("a.png")], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(output.results[0].as_ref().unwrap().text, "a.png");
    assert_eq!(output.report.corrected, 0);
}

#[tokio::test]
async fn native_pdf_is_one_unit() {
    let config = base().native_multi_page(Some(true)).build().unwrap();
    let recognizer = Arc::new(EchoRecognizer::default());
    let orch = Orchestrator::new(config, recognizer.clone());

    let output = orch
        .process(vec![pdf("whole.pdf")], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(output.report.units, 1);
    assert_eq!(output.results[0].as_ref().unwrap().text, "whole.pdf");
}
