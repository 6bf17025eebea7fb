//! Live progress accounting for one pipeline phase.
//!
//! A [`ProgressTracker`] holds four counters (`total`, `completed`,
//! `failed`, `in_flight`) behind one lock, so every observation satisfies
//! `completed + failed + in_flight == total`. While running it re-renders on
//! a fixed interval through a [`ProgressRenderer`]; the library ships
//! [`LogRenderer`] (tracing) and the CLI plugs in an indicatif bar.
//!
//! Trackers are explicit values handed to each stage. There is no global
//! spinner: two batches in one process never share counters.
//!
//! ```text
//! Idle ──start()──▶ Running ──stop()──▶ Stopped
//!   └──────────────stop()──────────────────┘
//! ```
//!
//! `total` may be raised after `start()`: expansion only discovers how many
//! pages a PDF has once it has rendered it.

use futures::StreamExt;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A consistent view of a tracker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub in_flight: u64,
}

impl ProgressSnapshot {
    /// `completed + failed`.
    pub fn done(&self) -> u64 {
        self.completed + self.failed
    }
}

/// Draws tracker state somewhere: a log line, a terminal bar, a socket.
///
/// Implementations must be `Send + Sync`; `render` is called from the
/// tracker's ticker task while workers keep mutating the counters.
pub trait ProgressRenderer: Send + Sync {
    /// Called on every tick while the tracker is running.
    fn render(&self, phase: &str, snapshot: &ProgressSnapshot);

    /// Called once when the tracker stops.
    fn finish(&self, phase: &str, snapshot: &ProgressSnapshot, message: &str);
}

/// Renders nothing. Default for library callers that do not care.
pub struct NoopRenderer;

impl ProgressRenderer for NoopRenderer {
    fn render(&self, _phase: &str, _snapshot: &ProgressSnapshot) {}
    fn finish(&self, _phase: &str, _snapshot: &ProgressSnapshot, _message: &str) {}
}

/// Renders progress as `tracing` info events.
pub struct LogRenderer;

impl ProgressRenderer for LogRenderer {
    fn render(&self, phase: &str, s: &ProgressSnapshot) {
        info!(
            "{phase}: {}/{} done ({} failed, {} in flight)",
            s.done(),
            s.total,
            s.failed,
            s.in_flight
        );
    }

    fn finish(&self, phase: &str, s: &ProgressSnapshot, message: &str) {
        info!(
            "{phase}: {message} — {} completed, {} failed of {}",
            s.completed, s.failed, s.total
        );
    }
}

/// Convenience alias for the renderer handle stored by the orchestrator.
pub type SharedRenderer = Arc<dyn ProgressRenderer>;

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    completed: u64,
    failed: u64,
}

impl Counters {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            in_flight: self.total.saturating_sub(self.completed + self.failed),
        }
    }
}

enum State {
    Idle,
    Running {
        stop: CancellationToken,
        ticker: JoinHandle<()>,
    },
    Stopped,
}

struct Inner {
    phase: String,
    counters: Mutex<Counters>,
    state: Mutex<State>,
    renderer: SharedRenderer,
    interval: Duration,
}

impl Inner {
    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Concurrency-safe progress counters with periodic rendering.
///
/// Cloning yields another handle to the same counters.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

impl ProgressTracker {
    pub fn new(
        phase: impl Into<String>,
        total: u64,
        renderer: SharedRenderer,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                phase: phase.into(),
                counters: Mutex::new(Counters {
                    total,
                    ..Default::default()
                }),
                state: Mutex::new(State::Idle),
                renderer,
                interval,
            }),
        }
    }

    /// A tracker that renders nothing; handy in tests and one-off calls.
    pub fn silent(phase: impl Into<String>, total: u64) -> Self {
        Self::new(phase, total, Arc::new(NoopRenderer), Duration::from_secs(1))
    }

    pub fn phase(&self) -> &str {
        &self.inner.phase
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.counters().snapshot()
    }

    /// Begin periodic rendering. No-op when `total` is 0 or already started.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.snapshot().total == 0 {
            return;
        }
        let mut state = self.inner.state();
        if !matches!(*state, State::Idle) {
            return;
        }
        let stop = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let token = stop.clone();
        let ticker = tokio::spawn(async move {
            let mut ticks = IntervalStream::new(tokio::time::interval(inner.interval));
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    tick = ticks.next() => {
                        if tick.is_none() {
                            break;
                        }
                        let snapshot = inner.counters().snapshot();
                        inner.renderer.render(&inner.phase, &snapshot);
                    }
                }
            }
        });
        *state = State::Running { stop, ticker };
    }

    /// Retarget the tracker; clamped so it never drops below `completed + failed`.
    pub fn set_total(&self, new_total: u64) {
        let mut c = self.inner.counters();
        c.total = new_total.max(c.completed + c.failed);
    }

    pub fn increment_completed(&self) {
        let mut c = self.inner.counters();
        c.completed += 1;
        c.total = c.total.max(c.completed + c.failed);
    }

    pub fn increment_failed(&self) {
        let mut c = self.inner.counters();
        c.failed += 1;
        c.total = c.total.max(c.completed + c.failed);
    }

    /// Halt the ticker and render a final status line.
    ///
    /// Idempotent; safe to call on a tracker that was never started.
    pub async fn stop(&self, message: &str) {
        let previous = std::mem::replace(&mut *self.inner.state(), State::Stopped);
        match previous {
            State::Stopped => return,
            State::Idle => {}
            State::Running { stop, ticker } => {
                stop.cancel();
                // The ticker only exits; a join error means it panicked mid-render.
                let _ = ticker.await;
            }
        }
        let snapshot = self.snapshot();
        self.inner.renderer.finish(&self.inner.phase, &snapshot, message);
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.inner.state(), State::Running { .. })
    }
}
