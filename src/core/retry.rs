//! Retry policies for resolvability polling and publish retries
//!
//! Two independent budgets live here. A [`RetryPolicy`] decides how long to
//! wait between resolvability polls and when to give up. A [`RetryManager`]
//! re-runs a publish call that failed with a transient error.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::error::PublishError;

/// Default pause between resolvability polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default deadline for a package to become resolvable
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10 * 60);

// ============================================================================
// Resolvability policies
// ============================================================================

/// What to do after a failed resolvability poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Wait(Duration),
    GiveUp,
}

/// Pure mapping from poll count and elapsed time to the next step
///
/// `attempt` is the number of polls already made (1 after the first failed
/// poll). `elapsed` is measured from the moment the package was accepted by
/// the registry.
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    fn next(&self, attempt: u32, elapsed: Duration) -> RetryDecision;
}

/// Poll at a fixed interval until a deadline
///
/// # Examples
///
/// ```
/// use release_publisher::core::{FixedInterval, RetryDecision, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = FixedInterval::new(Duration::from_secs(5), Duration::from_secs(12));
/// assert_eq!(policy.next(1, Duration::ZERO), RetryDecision::Wait(Duration::from_secs(5)));
/// assert_eq!(policy.next(3, Duration::from_secs(10)), RetryDecision::Wait(Duration::from_secs(2)));
/// assert_eq!(policy.next(4, Duration::from_secs(12)), RetryDecision::GiveUp);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_WAIT)
    }
}

impl RetryPolicy for FixedInterval {
    fn next(&self, _attempt: u32, elapsed: Duration) -> RetryDecision {
        clamp_to_deadline(self.interval, elapsed, self.max_wait)
    }
}

/// Exponential backoff between polls, capped per wait and by a deadline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_wait: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2.0,
            max_interval: Duration::from_secs(60),
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next(&self, attempt: u32, elapsed: Duration) -> RetryDecision {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_interval.as_secs_f64());
        let delay = if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_interval
        };

        clamp_to_deadline(delay, elapsed, self.max_wait)
    }
}

/// Largest fraction [`Jittered`] may take off a wait
pub const MAX_JITTER: f64 = 0.9;

/// Shortens each wait of an inner policy by a random fraction
///
/// The wait is drawn from `[d * (1 - ratio), d]`, so jitter never pushes a
/// poll past the inner policy's deadline. `ratio` is capped at
/// [`MAX_JITTER`], so every wait keeps at least a tenth of its length.
#[derive(Debug, Clone)]
pub struct Jittered<P> {
    inner: P,
    ratio: f64,
}

impl<P: RetryPolicy> Jittered<P> {
    pub fn new(inner: P, ratio: f64) -> Self {
        Self {
            inner,
            ratio: ratio.clamp(0.0, MAX_JITTER),
        }
    }
}

impl<P: RetryPolicy> RetryPolicy for Jittered<P> {
    fn next(&self, attempt: u32, elapsed: Duration) -> RetryDecision {
        match self.inner.next(attempt, elapsed) {
            RetryDecision::Wait(delay) if self.ratio > 0.0 && !delay.is_zero() => {
                let factor = rand::rng().random_range((1.0 - self.ratio)..=1.0);
                RetryDecision::Wait(delay.mul_f64(factor))
            }
            other => other,
        }
    }
}

fn clamp_to_deadline(delay: Duration, elapsed: Duration, max_wait: Duration) -> RetryDecision {
    if elapsed >= max_wait {
        return RetryDecision::GiveUp;
    }

    RetryDecision::Wait(delay.min(max_wait - elapsed))
}

// ============================================================================
// Poll diagnostics
// ============================================================================

/// Result of one resolvability poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    Resolvable,
    NotResolvable,
}

/// One resolvability poll, kept for the report's diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryAttempt {
    pub package: String,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub outcome: PollOutcome,
}

// ============================================================================
// Publish retries
// ============================================================================

/// Options for retrying a publish call
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Errors that may succeed when the same call is repeated
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for PublishError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Final result of a retried operation together with how many tries it took
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Retry manager for executing operations with exponential backoff
///
/// # Examples
///
/// ```no_run
/// use release_publisher::core::{PublishError, RetryManager, RetryOptions};
///
/// # async fn example() {
/// let manager = RetryManager::new(RetryOptions::default());
///
/// let outcome = manager
///     .retry(|| async { Ok::<_, PublishError>("uploaded") })
///     .await;
///
/// assert_eq!(outcome.attempts, 1);
/// # }
/// ```
pub struct RetryManager {
    options: RetryOptions,
    cancel: Option<CancellationToken>,
}

impl RetryManager {
    pub fn new(options: RetryOptions) -> Self {
        Self {
            options,
            cancel: None,
        }
    }

    /// Stop waiting between attempts once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Execute the given async operation with retry logic
    ///
    /// Non-retryable errors are returned immediately. Cancellation during a
    /// backoff returns the last error without another attempt.
    pub async fn retry<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let max_attempts = self.options.max_attempts.max(1);
        let mut delay = self.options.initial_delay;
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(error) => error,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                };
            }

            tracing::warn!(
                attempt,
                max_attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "retryable failure"
            );

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = token.cancelled() => {
                            return RetryOutcome {
                                result: Err(error),
                                attempts: attempt,
                            };
                        }
                    }
                }
                None => sleep(delay).await,
            }

            delay = Duration::from_secs_f64(delay.as_secs_f64() * self.options.backoff_multiplier)
                .min(self.options.max_delay);
            attempt += 1;
        }
    }
}
