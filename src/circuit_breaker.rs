//! Circuit breaker guarding calls to a failing dependency.
//!
//! State machine: CLOSED → OPEN → HALF_OPEN → CLOSED | OPEN. While OPEN and
//! within `reset_timeout` of the last failure, calls are rejected without
//! invoking the operation. Once the timeout elapses, the first caller moves
//! the breaker to HALF_OPEN and runs a single trial; success closes the
//! circuit, failure reopens it. In CLOSED, each success pays down one
//! recorded failure (floored at zero) rather than wiping the count.
//!
//! State lives in atomics shared through `Arc`, so clones of a policy
//! observe and drive the same circuit. State is process-local by design;
//! breakers are not coordinated across instances.

use crate::time::{Clock, MonotonicClock};
use crate::ResilienceError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are being counted.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// A trial call is probing whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    #[allow(dead_code)]
    fn to_u8(self) -> u8 {
        match self {
            CircuitState::Closed => STATE_CLOSED,
            CircuitState::Open => STATE_OPEN,
            CircuitState::HalfOpen => STATE_HALF_OPEN,
        }
    }

    fn from_u8(raw: u8) -> CircuitState {
        match raw {
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Validated breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    failure_threshold: usize,
    reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Validate and build a config.
    pub fn new(
        failure_threshold: usize,
        reset_timeout: Duration,
    ) -> Result<Self, CircuitBreakerError> {
        if failure_threshold == 0 {
            return Err(CircuitBreakerError::InvalidFailureThreshold { provided: 0 });
        }
        if reset_timeout.is_zero() {
            return Err(CircuitBreakerError::InvalidResetTimeout(reset_timeout));
        }
        Ok(Self { failure_threshold, reset_timeout })
    }

    /// Consecutive-failure budget before the circuit opens.
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// Cooldown before a half-open trial is allowed.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(60) }
    }
}

/// Errors from breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CircuitBreakerError {
    /// Threshold must be > 0.
    #[error("failure_threshold must be > 0 (got {provided})")]
    InvalidFailureThreshold {
        /// Value the caller provided.
        provided: usize,
    },
    /// Reset timeout must be > 0.
    #[error("reset_timeout must be > 0 (got {0:?})")]
    InvalidResetTimeout(Duration),
}

/// Point-in-time view of a breaker, for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Recorded failure count (≥ 0, floored on success).
    pub failure_count: usize,
    /// Clock millis of the last failure, 0 if none since the last close.
    pub last_failure_millis: u64,
}

#[derive(Debug)]
pub(crate) struct BreakerShared {
    state: AtomicU8,
    failure_count: AtomicUsize,
    last_failure_millis: AtomicU64,
}

impl BreakerShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            failure_count: AtomicUsize::new(0),
            last_failure_millis: AtomicU64::new(0),
        }
    }

    pub(crate) fn reset(&self) {
        self.state.store(STATE_CLOSED, Ordering::Release);
        self.failure_count.store(0, Ordering::Release);
        self.last_failure_millis.store(0, Ordering::Release);
    }
}

/// Circuit breaker policy guarding an async operation.
///
/// Clones share the same underlying state via `Arc`; construct one breaker
/// per logical dependency and hand clones to callers (see
/// [`crate::breaker_registry::BreakerRegistry`]).
#[derive(Debug, Clone)]
pub struct CircuitBreakerPolicy {
    shared: Arc<BreakerShared>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerPolicy {
    /// Build a breaker with an explicit threshold and cooldown.
    pub fn new(
        failure_threshold: usize,
        reset_timeout: Duration,
    ) -> Result<Self, CircuitBreakerError> {
        Ok(Self::from_config(CircuitBreakerConfig::new(failure_threshold, reset_timeout)?))
    }

    /// Build a breaker with the default config (threshold 5, cooldown 60 s).
    pub fn with_defaults() -> Self {
        Self::from_config(CircuitBreakerConfig::default())
    }

    /// Build from a validated config.
    pub fn from_config(config: CircuitBreakerConfig) -> Self {
        Self {
            shared: Arc::new(BreakerShared::new()),
            config,
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    /// Swap the clock; tests drive the cooldown with a manual clock.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Execute `operation` under the breaker.
    ///
    /// Returns [`ResilienceError::CircuitOpen`] without invoking the
    /// operation while the circuit is open and cooling down; otherwise runs
    /// the operation and records its outcome. The operation's own error is
    /// re-raised unchanged.
    pub async fn execute<T, Fut, Op>(&self, operation: Op) -> Result<T, ResilienceError>
    where
        T: Send,
        Fut: Future<Output = Result<T, ResilienceError>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        loop {
            match CircuitState::from_u8(self.shared.state.load(Ordering::Acquire)) {
                CircuitState::Open => {
                    let last = self.shared.last_failure_millis.load(Ordering::Acquire);
                    let elapsed = self.clock.now_millis().saturating_sub(last);
                    if elapsed > self.reset_timeout_millis() {
                        match self.shared.state.compare_exchange(
                            STATE_OPEN,
                            STATE_HALF_OPEN,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        ) {
                            Ok(_) => {
                                tracing::info!(
                                    target: "boardcast::circuit_breaker",
                                    "circuit half-open, allowing trial call"
                                );
                                break;
                            }
                            // lost the race; re-read the state
                            Err(_) => continue,
                        }
                    }
                    return Err(ResilienceError::CircuitOpen {
                        failure_count: self.shared.failure_count.load(Ordering::Acquire),
                        open_for: Duration::from_millis(elapsed),
                    });
                }
                CircuitState::HalfOpen | CircuitState::Closed => break,
            }
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }
        result
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Recorded failure count.
    pub fn failure_count(&self) -> usize {
        self.shared.failure_count.load(Ordering::Acquire)
    }

    /// Full observable view.
    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state(),
            failure_count: self.failure_count(),
            last_failure_millis: self.shared.last_failure_millis.load(Ordering::Acquire),
        }
    }

    /// Force the breaker back to CLOSED with zeroed counters. Operational
    /// hook, exposed through the registry.
    pub fn reset(&self) {
        self.shared.reset();
    }

    fn on_success(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                if self
                    .shared
                    .state
                    .compare_exchange(
                        STATE_HALF_OPEN,
                        STATE_CLOSED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    self.shared.failure_count.store(0, Ordering::Release);
                    self.shared.last_failure_millis.store(0, Ordering::Release);
                    tracing::info!(target: "boardcast::circuit_breaker", "circuit closed");
                }
            }
            CircuitState::Closed => {
                // one success pays down one failure; never below zero
                let _ = self
                    .shared
                    .failure_count
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let failures = self.shared.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.last_failure_millis.store(self.clock.now_millis(), Ordering::Release);

        match self.state() {
            CircuitState::HalfOpen => {
                if self
                    .shared
                    .state
                    .compare_exchange(
                        STATE_HALF_OPEN,
                        STATE_OPEN,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    tracing::warn!(
                        target: "boardcast::circuit_breaker",
                        failures,
                        "trial call failed, circuit reopened"
                    );
                }
            }
            CircuitState::Closed => {
                if failures >= self.config.failure_threshold
                    && self
                        .shared
                        .state
                        .compare_exchange(
                            STATE_CLOSED,
                            STATE_OPEN,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                {
                    tracing::error!(
                        target: "boardcast::circuit_breaker",
                        failures,
                        threshold = self.config.failure_threshold,
                        "circuit opened"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    fn reset_timeout_millis(&self) -> u64 {
        u64::try_from(self.config.reset_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}
