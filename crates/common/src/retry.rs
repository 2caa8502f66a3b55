//! Bounded retry with exponential backoff and jitter.
//!
//! API calls against the spreadsheet host are retried on transient
//! failures (5xx, rate-limit, timeouts) up to a small attempt ceiling;
//! exhausting the ceiling or hitting a non-retryable error propagates to
//! the caller. The error type of the operation is preserved end to end.

use std::borrow::Cow;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of a failed retry operation, generic over the caller's error type.
#[derive(Debug)]
pub enum RetryOutcome<E> {
    /// Cancelled via the cancellation token.
    Cancelled,

    /// The final attempt exceeded its timeout.
    Timeout { action: Cow<'static, str> },

    /// All attempts used; carries the last error seen.
    Exhausted { attempts: u32, last_error: E },

    /// A non-retryable error; returned immediately without backoff.
    Failed(E),
}

impl<E: Display> Display for RetryOutcome<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Timeout { action } => write!(f, "timeout: {}", action),
            Self::Exhausted {
                attempts,
                last_error,
            } => write!(f, "exhausted after {} attempts: {}", attempts, last_error),
            Self::Failed(e) => write!(f, "non-retryable error: {}", e),
        }
    }
}

impl<E: Display + std::fmt::Debug> std::error::Error for RetryOutcome<E> {}

impl<E> RetryOutcome<E> {
    /// Returns the inner error for `Exhausted` and `Failed`.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error),
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Exponential backoff policy with jitter and a mandatory attempt ceiling.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Initial backoff interval.
    pub initial: Duration,

    /// Maximum backoff interval (caps exponential growth).
    pub max: Duration,

    /// Jitter factor in `[0.0, 1.0]`, applied as ±jitter to each delay.
    pub jitter: f64,

    /// Maximum attempts before giving up.
    pub max_attempts: u32,

    current_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 0.2, 5)
    }
}

impl RetryPolicy {
    pub fn new(
        initial: Duration,
        max: Duration,
        jitter: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial,
            max,
            jitter: jitter.clamp(0.0, 1.0),
            max_attempts: max_attempts.max(1),
            current_backoff: initial,
        }
    }

    /// Fixed-interval policy: same delay between every attempt.
    pub fn constant(interval: Duration, max_attempts: u32) -> Self {
        Self::new(interval, interval, 0.0, max_attempts)
    }

    /// Next delay, advancing the internal doubling state.
    pub fn next_backoff(&mut self) -> Duration {
        let current = self.current_backoff;
        self.current_backoff = current.saturating_mul(2).min(self.max);

        if self.jitter > 0.0 {
            let factor = 1.0 + rand::rng().random_range(-self.jitter..self.jitter);
            current.mul_f64(factor).max(Duration::from_nanos(1))
        } else {
            current
        }
    }

    /// Reset the doubling state to the initial interval.
    pub fn reset(&mut self) {
        self.current_backoff = self.initial;
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

/// Errors that can classify themselves as transient.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Run `op` until it succeeds, fails permanently, or the policy is spent.
///
/// `op` receives the 1-based attempt number. Each attempt is bounded by
/// `attempt_timeout`; a timed-out attempt counts as retryable. Cancellation
/// is honored before each attempt and during backoff sleeps.
pub async fn retry_async<T, E, Fut, Op, IsRetryable>(
    mut op: Op,
    is_retryable: IsRetryable,
    attempt_timeout: Duration,
    mut policy: RetryPolicy,
    cancel: &CancellationToken,
    label: &'static str,
) -> Result<T, RetryOutcome<E>>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
    Op: FnMut(u32) -> Fut,
    IsRetryable: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    let mut last_error: Option<E> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryOutcome::Cancelled);
        }

        attempt += 1;
        if !policy.should_retry(attempt) {
            return Err(match last_error {
                Some(e) => RetryOutcome::Exhausted {
                    attempts: attempt - 1,
                    last_error: e,
                },
                None => RetryOutcome::Timeout {
                    action: Cow::Borrowed(label),
                },
            });
        }

        debug!(label, attempt, "starting attempt");

        match timeout(attempt_timeout, op(attempt)).await {
            Ok(Ok(value)) => return Ok(value),

            Ok(Err(e)) => {
                if is_retryable(&e) {
                    let backoff = policy.next_backoff();
                    warn!(
                        label,
                        attempt,
                        error = %e,
                        backoff_ms = backoff.as_millis(),
                        "retryable error, backing off"
                    );
                    last_error = Some(e);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(RetryOutcome::Cancelled),
                        _ = sleep(backoff) => {}
                    }
                } else {
                    warn!(label, attempt, error = %e, "non-retryable error, giving up");
                    return Err(RetryOutcome::Failed(e));
                }
            }

            Err(_elapsed) => {
                let backoff = policy.next_backoff();
                warn!(
                    label,
                    attempt,
                    timeout_ms = attempt_timeout.as_millis(),
                    backoff_ms = backoff.as_millis(),
                    "attempt timed out, backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryOutcome::Cancelled),
                    _ = sleep(backoff) => {}
                }
            }
        }
    }
}
