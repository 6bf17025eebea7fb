//! Token-bucket admission gate shared by every worker of one phase.
//!
//! Recognition calls share one [`RateLimiter`]; the correction pass gets its
//! own so the two external services are throttled independently.
//!
//! The bucket itself is a [`governor`] GCRA limiter, which is lock-free and
//! safe to hit from many workers at once. It is generic over the clock so
//! admission can be checked deterministically with
//! [`governor::clock::FakeRelativeClock`].

use crate::config::RateLimitConfig;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Longest bucket span (`period * burst`) handed to governor, whose
/// nanosecond arithmetic overflows past ~584 years. Slower rates are clamped.
const MAX_SPAN: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

type Bucket<C> =
    governor::RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Returned by [`RateLimiter::wait`] when the shared context was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limiter wait cancelled")]
pub struct WaitCancelled;

/// A token bucket, or a no-op when disabled.
pub struct RateLimiter<C: Clock = DefaultClock> {
    bucket: Option<Bucket<C>>,
    clock: C,
}

impl RateLimiter<DefaultClock> {
    /// Build a limiter on the monotonic system clock.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }

    /// A limiter that admits everything immediately.
    pub fn disabled() -> Self {
        Self::new(&RateLimitConfig::disabled())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Build a limiter reading time from `clock`.
    ///
    /// The bucket starts full: `burst` calls are admitted at once, then one
    /// every `1 / requests_per_second` seconds.
    pub fn with_clock(config: &RateLimitConfig, clock: C) -> Self
    where
        C: Clone,
    {
        let bucket = quota_for(config)
            .map(|quota| governor::RateLimiter::new(quota, InMemoryState::default(), clock.clone()));
        Self { bucket, clock }
    }

    pub fn is_enabled(&self) -> bool {
        self.bucket.is_some()
    }

    /// Take a token if one is available, otherwise report how long until one is.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        match &self.bucket {
            None => Ok(()),
            Some(bucket) => bucket
                .check()
                .map_err(|not_until| not_until.wait_time_from(self.clock.now())),
        }
    }

    /// Block until a token is available or `cancel` fires.
    ///
    /// A disabled limiter returns immediately without looking at `cancel`.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), WaitCancelled> {
        if self.bucket.is_none() {
            return Ok(());
        }
        loop {
            if cancel.is_cancelled() {
                return Err(WaitCancelled);
            }
            match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(delay) => {
                    debug!("rate limited, next token in {:?}", delay);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(WaitCancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Translate the configured rate into a GCRA quota.
fn quota_for(config: &RateLimitConfig) -> Option<Quota> {
    if !config.is_enabled() {
        return None;
    }
    let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
    let max_period = MAX_SPAN / burst.get();
    let secs = 1.0 / config.requests_per_second;
    let period = if secs < max_period.as_secs_f64() {
        Duration::from_secs_f64(secs)
    } else {
        warn!(
            "rate {} req/s with burst {} exceeds the bucket range; clamped to one per {:?}",
            config.requests_per_second, burst, max_period
        );
        max_period
    };
    let Some(quota) = Quota::with_period(period) else {
        warn!(
            "rate {} req/s is too high to represent; limiter disabled",
            config.requests_per_second
        );
        return None;
    };
    Some(quota.allow_burst(burst))
}
