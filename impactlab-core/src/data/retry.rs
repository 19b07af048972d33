//! Bounded retry with a fixed delay.
//!
//! Only transient failures (see `DataError::is_transient`) are retried; any
//! other error is returned on the attempt that produced it.

use super::provider::DataError;
use std::time::Duration;

/// Retry policy: up to `max_attempts` tries, sleeping `delay` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts, five seconds apart.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Retry immediately, without sleeping. Intended for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, label: &str, op: F) -> Result<T, DataError>
    where
        F: FnMut(u32) -> Result<T, DataError>,
    {
        self.run_observed(label, op, |_, _| {})
    }

    /// Like `run`, calling `on_retry(attempt, error)` after each transient failure.
    pub fn run_observed<T, F, O>(&self, label: &str, mut op: F, mut on_retry: O) -> Result<T, DataError>
    where
        F: FnMut(u32) -> Result<T, DataError>,
        O: FnMut(u32, &DataError),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        target: "impactlab::retry",
                        label,
                        attempt,
                        max_attempts,
                        error = %e,
                        "transient failure"
                    );
                    on_retry(attempt, &e);
                    last_error = Some(e);
                    if attempt < max_attempts && !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
                Err(e) => {
                    tracing::error!(target: "impactlab::retry", label, attempt, error = %e, "fatal failure");
                    return Err(e);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".into());
        tracing::error!(target: "impactlab::retry", label, attempts = max_attempts, "retries exhausted");
        Err(DataError::RetriesExhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}
