//! Batch executor: run recognition over every unit with bounded concurrency.
//!
//! At most `concurrency` calls are in flight. Each call first takes a token
//! from the shared rate limiter, then races the backend against the
//! cancellation token under a per-unit deadline. The returned outcomes are
//! index-aligned with the submitted units regardless of completion order.
//!
//! A failing unit never stops its siblings; its error becomes a failure
//! [`Outcome`] attributed to the unit's identity.

use crate::backend::Recognizer;
use crate::error::UnitError;
use crate::limiter::RateLimiter;
use crate::model::{Outcome, Unit};
use crate::progress::ProgressTracker;
use futures::stream::{self, StreamExt};
use governor::clock::Clock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-batch execution settings.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    pub concurrency: usize,
    /// Deadline per unit, retries included. `0` disables it.
    pub timeout_secs: u64,
}

/// Recognise every unit, returning one outcome per unit in submission order.
pub async fn execute<R, C>(
    recognizer: &R,
    units: Vec<Unit>,
    limiter: &RateLimiter<C>,
    tracker: &ProgressTracker,
    options: ExecuteOptions,
    cancel: &CancellationToken,
) -> Vec<Outcome>
where
    R: Recognizer + ?Sized,
    C: Clock,
{
    let mut slots: Vec<(usize, Outcome)> =
        stream::iter(units.into_iter().enumerate().map(move |(slot, unit)| async move {
            let outcome = run_one(recognizer, unit, limiter, options.timeout_secs, cancel).await;
            match &outcome.result {
                Ok(_) => {
                    debug!("{} recognised", outcome.id);
                    tracker.increment_completed();
                }
                Err(e) => {
                    if !e.is_cancelled() {
                        warn!("{}", e);
                    }
                    tracker.increment_failed();
                }
            }
            (slot, outcome)
        }))
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    slots.sort_by_key(|(slot, _)| *slot);
    slots.into_iter().map(|(_, outcome)| outcome).collect()
}

async fn run_one<R, C>(
    recognizer: &R,
    unit: Unit,
    limiter: &RateLimiter<C>,
    timeout_secs: u64,
    cancel: &CancellationToken,
) -> Outcome
where
    R: Recognizer + ?Sized,
    C: Clock,
{
    let id = unit.id.clone();
    if cancel.is_cancelled() || limiter.wait(cancel).await.is_err() {
        return Outcome::failure(UnitError::Cancelled { id });
    }

    let call = async {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = recognizer.recognize(&unit) => Some(result),
        }
    };

    let raced = if timeout_secs == 0 {
        Ok(call.await)
    } else {
        tokio::time::timeout(Duration::from_secs(timeout_secs), call).await
    };

    match raced {
        Err(_elapsed) => Outcome::failure(UnitError::Timeout {
            id,
            secs: timeout_secs,
        }),
        Ok(None) => Outcome::failure(UnitError::Cancelled { id }),
        Ok(Some(Err(source))) => Outcome::failure(UnitError::Recognition { id, source }),
        Ok(Some(Ok(recognition))) => Outcome::success(id, recognition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::model::{Payload, Recognition, UnitId};
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps longer for lower indices so completion order is reversed.
    struct Reversing {
        n: usize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Recognizer for Reversing {
        fn name(&self) -> &str {
            "reversing"
        }

        async fn recognize(&self, unit: &Unit) -> Result<Recognition, BackendError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = (self.n - unit.id.origin) as u64 * 5;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if unit.id.origin == 2 {
                return Err(BackendError::Process {
                    program: "stub".into(),
                    detail: "bad page".into(),
                });
            }
            Ok(Recognition::text(format!("text {}", unit.id.origin)))
        }
    }

    struct Hanging;

    #[async_trait]
    impl Recognizer for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn recognize(&self, _unit: &Unit) -> Result<Recognition, BackendError> {
            std::future::pending().await
        }
    }

    fn units(n: usize) -> Vec<Unit> {
        (0..n)
            .map(|i| {
                Unit::new(
                    UnitId::new(i, None, format!("{i}.png")),
                    Payload::Image(DynamicImage::new_luma8(1, 1)),
                )
            })
            .collect()
    }

    fn options(concurrency: usize, timeout_secs: u64) -> ExecuteOptions {
        ExecuteOptions {
            concurrency,
            timeout_secs,
        }
    }

    #[tokio::test]
    async fn outcomes_are_index_aligned_and_bounded() {
        let recognizer = Reversing {
            n: 8,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let tracker = ProgressTracker::silent("recognize", 8);
        let out = execute(
            &recognizer,
            units(8),
            &RateLimiter::disabled(),
            &tracker,
            options(3, 10),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(out.len(), 8);
        for (i, o) in out.iter().enumerate() {
            assert_eq!(o.id.origin, i);
        }
        assert_eq!(out[0].result.as_ref().unwrap().text, "text 0");
        assert!(matches!(
            out[2].error(),
            Some(UnitError::Recognition { .. })
        ));
        assert!(recognizer.peak.load(Ordering::SeqCst) <= 3);

        let s = tracker.snapshot();
        assert_eq!((s.completed, s.failed, s.in_flight), (7, 1, 0));
    }

    #[tokio::test]
    async fn empty_batch_returns_empty() {
        let tracker = ProgressTracker::silent("recognize", 0);
        let out = execute(
            &Hanging,
            Vec::new(),
            &RateLimiter::disabled(),
            &tracker,
            options(4, 1),
            &CancellationToken::new(),
        )
        .await;
        assert!(out.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_call_times_out() {
        let tracker = ProgressTracker::silent("recognize", 2);
        let out = execute(
            &Hanging,
            units(2),
            &RateLimiter::disabled(),
            &tracker,
            options(2, 5),
            &CancellationToken::new(),
        )
        .await;
        assert!(out
            .iter()
            .all(|o| matches!(o.error(), Some(UnitError::Timeout { secs: 5, .. }))));
        assert_eq!(tracker.snapshot().failed, 2);
    }

    #[tokio::test]
    async fn cancellation_fails_every_unit() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let tracker = ProgressTracker::silent("recognize", 5);
        let out = execute(
            &Hanging,
            units(5),
            &RateLimiter::disabled(),
            &tracker,
            options(2, 0),
            &cancel,
        )
        .await;
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|o| o.error().is_some_and(UnitError::is_cancelled)));
        let s = tracker.snapshot();
        assert_eq!(s.failed + s.completed, s.total);
    }
}
