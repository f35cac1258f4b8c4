//! Composition of retry and circuit breaking for store calls.
//!
//! Order: retry wraps the breaker, which wraps the operation. The breaker's
//! fail-fast rejection is not a store error, so an open circuit stops the
//! retry loop immediately instead of burning attempts against it.

use crate::{CircuitBreakerPolicy, ResilienceError, RetryPolicy};
use std::future::Future;
use std::sync::{Arc, Mutex};

/// A retry policy layered over a circuit breaker.
#[derive(Debug, Clone)]
pub struct ResilienceStack {
    retry: RetryPolicy,
    breaker: CircuitBreakerPolicy,
}

impl ResilienceStack {
    /// Start a builder with default retry and breaker parameters.
    pub fn builder() -> ResilienceStackBuilder {
        ResilienceStackBuilder::new()
    }

    /// Execute `operation` with retries under circuit-breaker protection.
    pub async fn execute<T, Fut, Op>(&self, operation: Op) -> Result<T, ResilienceError>
    where
        T: Send,
        Fut: Future<Output = Result<T, ResilienceError>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        let operation = Arc::new(Mutex::new(operation));
        self.retry
            .execute(|| {
                let breaker = self.breaker.clone();
                let operation = operation.clone();
                async move {
                    breaker
                        .execute(|| {
                            let mut op = operation.lock().expect("operation mutex poisoned");
                            op()
                        })
                        .await
                }
            })
            .await
    }

    /// The breaker backing this stack; clones share its state.
    pub fn breaker(&self) -> &CircuitBreakerPolicy {
        &self.breaker
    }
}

impl Default for ResilienceStack {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ResilienceStack`].
#[derive(Debug, Default)]
pub struct ResilienceStackBuilder {
    retry: Option<RetryPolicy>,
    breaker: Option<CircuitBreakerPolicy>,
}

impl ResilienceStackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Replace the default breaker; pass a registry-held breaker to share
    /// circuit state across callers of the same resource.
    pub fn circuit_breaker(mut self, breaker: CircuitBreakerPolicy) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn build(self) -> ResilienceStack {
        ResilienceStack {
            retry: self.retry.unwrap_or_default(),
            breaker: self.breaker.unwrap_or_else(CircuitBreakerPolicy::with_defaults),
        }
    }
}
