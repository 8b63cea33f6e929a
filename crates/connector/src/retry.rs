//! Bounded exponential backoff for store and topology requests.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::duration_ms;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// How often and how patiently a failing request is retried.
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Coefficient to multiply initial_interval with for every past attempt.
    pub backoff_coefficient: u32,
    /// The backoff interval for the first retry.
    #[serde(rename = "initial_interval_ms", with = "duration_ms")]
    pub initial_interval: Duration,
    /// The maximum possible backoff between retries.
    #[serde(rename = "maximum_interval_ms", with = "duration_ms")]
    pub maximum_interval: Duration,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        backoff_coefficient: u32,
        initial_interval: Duration,
        maximum_interval: Duration,
    ) -> Self {
        Self {
            max_attempts,
            backoff_coefficient,
            initial_interval,
            maximum_interval,
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, 1, Duration::ZERO, Duration::ZERO)
    }

    /// Backoff before the retry that follows `attempt` failed attempts.
    pub fn time_until_next_retry(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_coefficient
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_interval
            .checked_mul(factor)
            .map_or(self.maximum_interval, |d| d.min(self.maximum_interval))
    }

    pub(crate) fn validate(&self, what: &str) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err(format!("{what}: max_attempts must be at least 1"));
        }
        if self.backoff_coefficient == 0 {
            return Err(format!("{what}: backoff_coefficient must be at least 1"));
        }
        if self.initial_interval > self.maximum_interval {
            return Err(format!(
                "{what}: initial interval {:?} exceeds maximum interval {:?}",
                self.initial_interval, self.maximum_interval
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_coefficient: 2,
            initial_interval: Duration::from_millis(100),
            maximum_interval: Duration::from_secs(10),
        }
    }
}

/// The last error of an operation that ran out of attempts, or failed with
/// an error that retrying cannot fix.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: E,
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. `op` receives the 1-based attempt number.
///
/// Dropping the returned future cancels both the in-flight attempt and any
/// pending backoff.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                let backoff = policy.time_until_next_retry(attempt);
                warn!(
                    operation = what,
                    attempt,
                    max_attempts = policy.max_attempts,
                    ?backoff,
                    error = %err,
                    "request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(RetryError {
                    attempts: attempt,
                    last: err,
                })
            }
        }
    }
}
