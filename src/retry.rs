//! Retrying execution for store calls.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial call + retries).
//! - Only classified [`StoreError`]s are candidates for retry; a circuit-open
//!   rejection returns immediately (never hammer an open circuit locally).
//! - `should_retry` decides whether a given error is worth another attempt;
//!   the default accepts transient kinds only (connection, timeout, internal).
//! - When attempts run out, the last classified error is returned as-is.
//! - Each call starts fresh; there is no cross-call memory.

use crate::time::{Sleeper, TokioSleeper};
use crate::{Backoff, ResilienceError, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Retry policy combining attempt budget, backoff, and a retry predicate.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Backoff,
    should_retry: Arc<dyn Fn(&StoreError) -> bool + Send + Sync>,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("should_retry", &"<predicate>")
            .finish()
    }
}

impl Default for RetryPolicy {
    /// Store-call defaults: 3 attempts, exponential backoff from 1 s
    /// doubling up to 30 s, retrying transient kinds only.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: default_backoff(),
            should_retry: Arc::new(StoreError::is_transient),
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

fn default_backoff() -> Backoff {
    // Infallible for these constants; fall back to the uncapped schedule
    // rather than panicking if they ever drift.
    Backoff::exponential(Duration::from_millis(1000))
        .with_max(Duration::from_millis(30_000))
        .unwrap_or_else(|_| Backoff::exponential(Duration::from_millis(1000)))
}

impl RetryPolicy {
    /// Start a builder preloaded with the defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Execute `operation`, retrying per policy.
    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, ResilienceError>
    where
        T: Send,
        Fut: Future<Output = Result<T, ResilienceError>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(ResilienceError::Store(e)) => {
                    if attempt == self.max_attempts || !(self.should_retry)(&e) {
                        return Err(ResilienceError::Store(e));
                    }
                    let delay = self.backoff.delay(attempt);
                    tracing::warn!(
                        target: "boardcast::retry",
                        attempt,
                        max_attempts = self.max_attempts,
                        kind = %e.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "store call failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                }
                // circuit-open is temporarily-unavailable, not a store error
                Err(other) => return Err(other),
            }
        }
        // Each loop iteration either returns or sleeps; the last iteration
        // always returns.
        debug_assert!(false, "retry loop must return within max_attempts");
        unreachable!()
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

/// Errors from retry policy construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryBuildError {
    /// `max_attempts` must be > 0.
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(usize),
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    /// Total attempts, initial call included. Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    /// Delay schedule between attempts.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.policy.backoff = backoff;
        self
    }

    /// Replace the default transient-only retry predicate.
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StoreError) -> bool + Send + Sync + 'static,
    {
        self.policy.should_retry = Arc::new(predicate);
        self
    }

    /// Inject a sleeper (tests use `InstantSleeper`/`TrackingSleeper`).
    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.policy.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> Result<RetryPolicy, RetryBuildError> {
        if self.policy.max_attempts == 0 {
            return Err(RetryBuildError::InvalidMaxAttempts(0));
        }
        Ok(self.policy)
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
