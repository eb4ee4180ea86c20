// SPDX-License-Identifier: MIT

//! Retry-with-backoff helper for calls against the hosted backend.
//!
//! Re-invokes an async operation up to a fixed attempt count with an
//! exponentially increasing delay between attempts, and returns the last
//! error once attempts are exhausted. An optional connectivity probe is
//! consulted between attempts so transient disconnects show up in the logs
//! rather than as silent repeated failures.

use std::future::Future;
use std::time::Duration;

/// Retry policy: attempt count and base delay.
///
/// The delay before attempt `n` (1-indexed) is `base_delay * 2^(n-1)`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Run `op`, retrying on error per this policy.
    ///
    /// All errors are treated identically; the final failure is returned to
    /// the caller unchanged.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_with_probe(|| true, op).await
    }

    /// Run `op` with a connectivity probe checked between attempts.
    ///
    /// The probe does not block retries (last observed status wins); it only
    /// controls whether the retry is logged as a reconnect wait.
    pub async fn run_with_probe<T, E, P, F, Fut>(&self, probe: P, mut op: F) -> Result<T, E>
    where
        P: Fn() -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut delay = self.base_delay;

        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt == attempts => {
                    tracing::warn!(attempt, error = %err, "Operation failed, retries exhausted");
                    return Err(err);
                }
                Err(err) => {
                    if probe() {
                        tracing::debug!(attempt, error = %err, "Operation failed, retrying");
                    } else {
                        tracing::debug!(
                            attempt,
                            error = %err,
                            "Operation failed while backend disconnected, retrying"
                        );
                    }
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        unreachable!("retry loop returns on the final attempt")
    }
}
