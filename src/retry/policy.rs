//! Retry Mechanism Module
//!
//! Bounded retry with exponential backoff for backend calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{ImageGenError, Result};
use crate::utils::cancel::CancelHandle;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Backoff multiplier (for exponential backoff)
    pub backoff_multiplier: f64,
    /// Custom retry condition function
    pub retry_condition: Option<fn(&ImageGenError) -> bool>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: 2.0,
            retry_condition: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_retry_condition(mut self, condition: fn(&ImageGenError) -> bool) -> Self {
        self.retry_condition = Some(condition);
        self
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Check if an error should be retried
    pub fn should_retry(&self, error: &ImageGenError) -> bool {
        if error.is_cancelled() {
            return false;
        }
        match self.retry_condition {
            Some(condition) => condition(error),
            None => error.is_retryable(),
        }
    }

    /// Delay slept after the failure of attempt `retry_index` (0-based).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let millis = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(retry_index.min(i32::MAX as u32) as i32);
        let max_millis = self.max_delay.as_millis() as f64;
        Duration::from_millis(millis.min(max_millis) as u64)
    }

    /// Every delay this policy can sleep, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|i| self.delay_for(i))
    }
}

/// Retry executor that handles the actual retry logic
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation` with the configured policy.
    pub async fn execute<F, Fut, T>(&self, cancel: &CancelHandle, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_attempts(self.policy.max_attempts(), cancel, operation)
            .await
    }

    /// Execute `operation` at most `max_attempts` times.
    ///
    /// Non-retryable errors are returned unchanged. When every attempt fails
    /// with a retryable error the last one is wrapped in
    /// [`ImageGenError::RetriesExhausted`]. No sleep follows the final attempt.
    pub async fn execute_with_attempts<F, Fut, T>(
        &self,
        max_attempts: u32,
        cancel: &CancelHandle,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            match cancel.guard(operation()).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.policy.should_retry(&error) {
                        return Err(error);
                    }

                    tracing::debug!(
                        target: "pixelrelay::retry",
                        attempt = attempt + 1,
                        max_attempts,
                        err = %error,
                        "attempt failed"
                    );
                    last_error = Some(error);

                    if attempt + 1 == max_attempts {
                        break;
                    }

                    cancel.sleep(self.policy.delay_for(attempt)).await?;
                }
            }
        }

        let source = last_error.unwrap_or_else(|| {
            ImageGenError::HttpError("retry executor finished without an error".to_string())
        });
        Err(ImageGenError::RetriesExhausted {
            attempts: max_attempts,
            source: Box::new(source),
        })
    }
}
