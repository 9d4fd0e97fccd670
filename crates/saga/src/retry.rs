//! Bounded timeouts and exponential backoff for store and directory calls.

use std::future::Future;
use std::time::Duration;

use store::StoreError;

use crate::directory::DirectoryError;
use crate::error::SagaError;

/// Errors that know whether a retry may help.
pub trait RetryableError: std::fmt::Display {
    fn is_transient(&self) -> bool;
}

impl RetryableError for StoreError {
    fn is_transient(&self) -> bool {
        StoreError::is_transient(self)
    }
}

impl RetryableError for DirectoryError {
    fn is_transient(&self) -> bool {
        DirectoryError::is_transient(self)
    }
}

/// How long a single I/O call may take and how often it is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on every further attempt.
    pub initial_backoff: Duration,
    /// Upper bound for the delay between attempts.
    pub max_backoff: Duration,
    /// Deadline for a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt per call.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `call` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// Timeouts and transient errors are retried; anything else is returned
    /// immediately. Exhausting the attempts yields [`SagaError::Transient`].
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, SagaError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Into<SagaError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let reason = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_transient() => return Err(e.into()),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", self.timeout),
            };

            if attempt >= max_attempts {
                tracing::warn!(operation, attempt, %reason, "I/O retries exhausted");
                return Err(SagaError::Transient {
                    operation,
                    attempts: attempt,
                    reason,
                });
            }

            let delay = self.backoff(attempt);
            metrics::counter!("saga_io_retries_total", "operation" => operation).increment(1);
            tracing::warn!(operation, attempt, ?delay, %reason, "transient I/O failure, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}
