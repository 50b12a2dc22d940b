//! Retry adapter for platform calls
//!
//! Every outward platform call goes through [`RetryPolicy::call`]. This is
//! the only place where sleeps intentionally block forward progress:
//! flood-wait directives are honoured exactly as instructed, transient
//! faults get bounded exponential backoff, everything else propagates.
//! The adapter is reentrant and carries no state between calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Backoff parameters for transient faults
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Transient retries before promotion to permanent
    pub max_retries: u32,
    /// Initial backoff duration
    pub base: Duration,
    /// Backoff ceiling
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base: Duration::from_secs(2),
            cap: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff for the given retry index: `base * 2^retry`, capped.
    /// Jitter is added separately so this stays deterministic for tests.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(retry));
        exp.min(self.cap)
    }

    /// Run `f` until it succeeds, the failure is not retryable, or the
    /// transient budget is exhausted.
    ///
    /// - `RateLimited(n)`: sleep `n` seconds plus jitter and retry; the
    ///   server dictates the wait and the retry counter does not advance.
    /// - `Transient`: retry with exponential backoff plus jitter; after
    ///   `max_retries` the failure is promoted to `Permanent`.
    /// - Anything else propagates immediately.
    ///
    /// Sleeps race the cancellation token; cancellation surfaces as
    /// [`Error::Interrupted`] at the next boundary.
    pub async fn call<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        op: &str,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }

            match f().await {
                Ok(value) => return Ok(value),
                Err(Error::RateLimited(seconds)) => {
                    tracing::warn!(op, seconds, "flood wait, complying");
                    sleep_or_cancel(cancel, Duration::from_secs(seconds) + jitter()).await?;
                }
                Err(e) if e.is_transient() => {
                    if retries >= self.max_retries {
                        return Err(Error::Permanent(format!(
                            "{} failed after {} transient retries: {}",
                            op, self.max_retries, e
                        )));
                    }
                    let wait = self.backoff_delay(retries) + jitter();
                    retries += 1;
                    tracing::warn!(
                        op,
                        retry = retries,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "transient failure, backing off"
                    );
                    sleep_or_cancel(cancel, wait).await?;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

/// Additive jitter in `[0, 1s)`.
fn jitter() -> Duration {
    Duration::from_millis(rand::rng().random_range(0..1000))
}

/// Sleep, returning `Interrupted` if the token fires first.
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Interrupted),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
