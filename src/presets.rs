//! Default wiring for store-facing calls.
//!
//! The board service guards every external-store call with the same
//! parameters; these constructors keep that wiring in one place.

use crate::{CircuitBreakerPolicy, ResilienceStack, RetryPolicy};

/// Retry policy used for store calls: 3 attempts, 1 s exponential backoff
/// doubling up to 30 s, transient kinds only.
pub fn store_retry() -> RetryPolicy {
    RetryPolicy::default()
}

/// Breaker used per store dependency: opens after 5 consecutive failures,
/// cools down for 60 s.
pub fn store_breaker() -> CircuitBreakerPolicy {
    CircuitBreakerPolicy::with_defaults()
}

/// The full store-call stack with the defaults above.
pub fn store_stack() -> ResilienceStack {
    ResilienceStack::builder().retry(store_retry()).circuit_breaker(store_breaker()).build()
}
