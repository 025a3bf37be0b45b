//! Bounded retry with backoff.
//!
//! Every store and cache call goes through [`RetryPolicy`]. The policy owns
//! the attempt budget and backoff curve; the [`Criticality`] passed at the
//! call site decides what happens once the budget is spent:
//!
//! - `Critical` calls return the last error to the caller.
//! - `BestEffort` calls log it and yield `None`.
//!
//! Only errors for which [`SubledgerError::is_retryable`] holds are retried.
//! A `NotFound` or `Conflict` returns on the first attempt.

use crate::error::{Result, SubledgerError};
use std::future::Future;
use std::time::Duration;
use tracing::Instrument;

/// Delay curve between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `initial * factor^(n-1)` after the n-th failed attempt
    Exponential { initial: Duration, factor: u32 },
    Fixed(Duration),
}

impl Backoff {
    /// Delay to wait after `failed_attempt` (1-based) before trying again
    pub fn delay(&self, failed_attempt: u32) -> Duration {
        match *self {
            Backoff::Exponential { initial, factor } => {
                let exponent = failed_attempt.saturating_sub(1);
                let multiplier = factor.checked_pow(exponent).unwrap_or(u32::MAX);
                initial.saturating_mul(multiplier)
            }
            Backoff::Fixed(delay) => delay,
        }
    }
}

/// What a call site does with an error once retries are exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// The operation's primary read or write. Failure propagates.
    Critical,
    /// A side effect the operation can live without, such as a cache write.
    BestEffort,
}

/// Attempt budget plus backoff curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    /// Three attempts, 100ms then 200ms between them
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(100),
                factor: 2,
            },
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Backoff) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no waiting. Useful in tests that exercise failure paths.
    pub fn no_retry() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Run `op` under this policy, handling exhaustion according to `criticality`
    ///
    /// For `BestEffort` the error is logged and converted to `Ok(None)`; for
    /// `Critical` it is returned. Prefer [`critical`](Self::critical) and
    /// [`best_effort`](Self::best_effort), which fix the return shape.
    pub async fn execute<T, F, Fut>(
        &self,
        criticality: Criticality,
        what: &str,
        op: F,
    ) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let backoff = self.backoff;
        let outcome = retry(self.attempts, move |n| backoff.delay(n), op)
            .instrument(tracing::debug_span!("retry", op = %what))
            .await;

        match (outcome, criticality) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(err), Criticality::Critical) => {
                if err.is_retryable() {
                    tracing::error!(
                        op = %what,
                        attempts = self.attempts,
                        error = %err,
                        "Retries exhausted"
                    );
                }
                Err(err)
            }
            (Err(err), Criticality::BestEffort) => {
                tracing::warn!(op = %what, error = %err, "Best-effort operation failed, continuing");
                Ok(None)
            }
        }
    }

    /// Run a critical operation; the last error propagates
    pub async fn critical<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.execute(Criticality::Critical, what, op).await? {
            Some(value) => Ok(value),
            None => Err(SubledgerError::internal(format!(
                "{} produced no value",
                what
            ))),
        }
    }

    /// Run a best-effort operation; failures are logged and swallowed
    pub async fn best_effort<T, F, Fut>(&self, what: &str, op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute(Criticality::BestEffort, what, op)
            .await
            .ok()
            .flatten()
    }
}

/// Call `op` up to `attempts` times, sleeping `backoff(n)` after the n-th failure
///
/// Stops early on success or on an error that is not retryable. Returns the
/// last error when the budget runs out.
pub async fn retry<T, F, Fut, B>(attempts: u32, backoff: B, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    B: Fn(u32) -> Duration,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && err.is_retryable() => {
                let delay = backoff(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
