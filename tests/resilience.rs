//! Retry, classification, and breaker behavior as a caller sees it.

use boardcast::time::{Clock, InstantSleeper};
use boardcast::{
    Backoff, CircuitBreakerPolicy, CircuitState, ErrorKind, ResilienceError, RetryPolicy,
    StoreError,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn fast_retry(attempts: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(attempts)
        .backoff(Backoff::constant(Duration::from_millis(1)))
        .with_sleeper(InstantSleeper)
        .build()
        .expect("valid policy")
}

#[derive(Debug, Clone)]
struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    fn new() -> Self {
        Self { now: Arc::new(AtomicU64::new(0)) }
    }

    fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn two_transient_failures_then_success_takes_three_attempts() {
    let policy = fast_retry(3);
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();

    let result = policy
        .execute(|| {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::classify(None, "connection refused").into())
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn validation_failure_is_not_retried() {
    let policy = fast_retry(3);
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();

    let result: Result<(), _> = policy
        .execute(|| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::classify(Some("23502"), "null value in column").into())
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let err = result.unwrap_err().into_store().expect("store error");
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn exhausted_retries_surface_the_classified_error() {
    let policy = fast_retry(3);
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();

    let result: Result<(), _> = policy
        .execute(|| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::classify(None, "connection timeout").into())
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let err = result.unwrap_err().into_store().expect("store error");
    // "connection timeout" is a timeout, not a connection failure
    assert_eq!(err.kind(), ErrorKind::TimeoutError);
}

#[tokio::test]
async fn breaker_walks_the_documented_transition_sequence() {
    let clock = ManualClock::new();
    let breaker = CircuitBreakerPolicy::new(2, Duration::from_millis(500))
        .expect("valid")
        .with_clock(clock.clone());

    let fail = || async {
        Err::<(), _>(StoreError::new(ErrorKind::ConnectionError, "connection refused").into())
    };

    // call 1 fails: still closed
    let _ = breaker.execute(fail).await;
    assert_eq!(breaker.state(), CircuitState::Closed);

    // call 2 fails: opens
    let _ = breaker.execute(fail).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    // call 3 before the cooldown: rejected without invoking the operation
    let invoked = Arc::new(AtomicUsize::new(0));
    let i = invoked.clone();
    let rejected = breaker
        .execute(|| {
            let i = i.clone();
            async move {
                i.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ResilienceError>(())
            }
        })
        .await;
    assert!(rejected.unwrap_err().is_circuit_open());
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    // after the cooldown a successful trial closes the circuit
    clock.advance(501);
    breaker.execute(|| async { Ok::<_, ResilienceError>(()) }).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn open_circuit_rejection_is_not_a_store_error() {
    let breaker = CircuitBreakerPolicy::new(1, Duration::from_secs(60)).expect("valid");
    let _ = breaker
        .execute(|| async {
            Err::<(), _>(StoreError::new(ErrorKind::TimeoutError, "timed out").into())
        })
        .await;

    let err = breaker
        .execute(|| async { Ok::<_, ResilienceError>(()) })
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
    assert!(err.as_store().is_none());
}

#[test]
fn surfaced_error_shape_is_stable() {
    let err = StoreError::classify(Some("23505"), "duplicate key value violates unique constraint");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["name"], "DatabaseError");
    assert_eq!(json["code"], "DUPLICATE_ENTRY");
    assert_eq!(json["message"], "duplicate key value violates unique constraint");
    assert!(json["timestamp"].is_number());
}
