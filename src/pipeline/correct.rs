//! Optional correction pass over stitched results.
//!
//! Runs the same bounded, rate-limited map as recognition, but over whole
//! documents and against its own limiter. A failed correction is reported
//! and the uncorrected text is kept; it never turns a result into `None`.

use crate::backend::Corrector;
use crate::error::{BackendError, UnitError};
use crate::limiter::RateLimiter;
use crate::model::{SourceResult, UnitId, CORRECTED_KEY};
use crate::progress::ProgressTracker;
use futures::stream::{self, StreamExt};
use governor::clock::Clock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Results after correction, plus one error per result left uncorrected.
#[derive(Debug, Default)]
pub struct Corrected {
    pub results: Vec<Option<SourceResult>>,
    pub errors: Vec<UnitError>,
}

/// Refine every present result with at most `concurrency` calls in flight.
///
/// `names[i]` is the display name of input `i`, used for error attribution.
pub async fn correct_all<K, C>(
    corrector: &K,
    results: Vec<Option<SourceResult>>,
    names: &[Arc<str>],
    limiter: &RateLimiter<C>,
    tracker: &ProgressTracker,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Corrected
where
    K: Corrector + ?Sized,
    C: Clock,
{
    let present = results.iter().filter(|r| r.is_some()).count();
    tracker.set_total(present as u64);

    let mut slots: Vec<(usize, Option<SourceResult>, Option<UnitError>)> =
        stream::iter(results.into_iter().enumerate().map(move |(origin, result)| {
            let name = names
                .get(origin)
                .cloned()
                .unwrap_or_else(|| Arc::from("?"));
            async move {
                let Some(result) = result else {
                    return (origin, None, None);
                };
                let id = UnitId::new(origin, None, name);
                let (result, error) = correct_one(corrector, result, id, limiter, cancel).await;
                match &error {
                    None => tracker.increment_completed(),
                    Some(e) => {
                        if !e.is_cancelled() {
                            warn!("{}", e);
                        }
                        tracker.increment_failed();
                    }
                }
                (origin, Some(result), error)
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    slots.sort_by_key(|(origin, _, _)| *origin);

    let mut out = Corrected::default();
    for (_, result, error) in slots {
        out.results.push(result);
        out.errors.extend(error);
    }
    out
}

async fn correct_one<K, C>(
    corrector: &K,
    result: SourceResult,
    id: UnitId,
    limiter: &RateLimiter<C>,
    cancel: &CancellationToken,
) -> (SourceResult, Option<UnitError>)
where
    K: Corrector + ?Sized,
    C: Clock,
{
    if cancel.is_cancelled() || limiter.wait(cancel).await.is_err() {
        return (result, Some(UnitError::Cancelled { id }));
    }

    let reply = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        reply = corrector.complete(&result.text) => Some(reply),
    };

    match reply {
        None => (result, Some(UnitError::Cancelled { id })),
        Some(reply) => apply_reply(result, id, reply),
    }
}

fn apply_reply(
    mut result: SourceResult,
    id: UnitId,
    reply: Result<String, BackendError>,
) -> (SourceResult, Option<UnitError>) {
    match reply {
        Ok(text) => {
            debug!("{} corrected", id);
            result.text = text;
            result
                .metadata
                .insert(CORRECTED_KEY.to_string(), "true".to_string());
            (result, None)
        }
        Err(source) => (result, Some(UnitError::Correction { id, source })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl Corrector for Upper {
        async fn complete(&self, text: &str) -> Result<String, BackendError> {
            if text.contains("reject") {
                return Err(BackendError::Provider {
                    provider: "stub".into(),
                    retries: 0,
                    detail: "refused".into(),
                });
            }
            Ok(text.to_uppercase())
        }
    }

    fn result(text: &str) -> Option<SourceResult> {
        Some(SourceResult {
            text: text.into(),
            ..Default::default()
        })
    }

    fn names(n: usize) -> Vec<Arc<str>> {
        (0..n).map(|i| Arc::from(format!("in{i}"))).collect()
    }

    #[tokio::test]
    async fn corrects_present_results_and_keeps_gaps() {
        let tracker = ProgressTracker::silent("correct", 0);
        let out = correct_all(
            &Upper,
            vec![result("abc"), None, result("please reject"), result("x")],
            &names(4),
            &RateLimiter::disabled(),
            &tracker,
            2,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(out.results.len(), 4);
        let r0 = out.results[0].as_ref().unwrap();
        assert_eq!(r0.text, "ABC");
        assert!(r0.is_corrected());
        assert!(out.results[1].is_none());

        let r2 = out.results[2].as_ref().unwrap();
        assert_eq!(r2.text, "please reject");
        assert!(!r2.is_corrected());

        assert_eq!(out.errors.len(), 1);
        let msg = out.errors[0].to_string();
        assert!(msg.contains("input 2 (in2)"), "got: {msg}");
        assert!(msg.contains("refused"), "got: {msg}");

        let s = tracker.snapshot();
        assert_eq!((s.total, s.completed, s.failed), (3, 2, 1));
    }

    #[tokio::test]
    async fn cancelled_pass_keeps_original_text() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let tracker = ProgressTracker::silent("correct", 0);
        let out = correct_all(
            &Upper,
            vec![result("abc")],
            &names(1),
            &RateLimiter::disabled(),
            &tracker,
            1,
            &cancel,
        )
        .await;
        assert_eq!(out.results[0].as_ref().unwrap().text, "abc");
        assert!(out.errors[0].is_cancelled());
    }
}
