#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Boardcast
//!
//! Real-time change notification and resilience core for a collaborative
//! topic-board service: an append-only per-channel event log over an ordered
//! stream store, Postgres change capture that turns row mutations into
//! channel-scoped notify events, and the fault-tolerance layer (error
//! taxonomy, retry, circuit breaker) every store call passes through.
//!
//! ## Features
//!
//! - **Event log** keyed per channel, with field filtering and cursor-based
//!   range reads ([`log`])
//! - **Change capture** trigger contract and [`ChangeFeed`](capture::ChangeFeed)
//!   consumer seam ([`capture`])
//! - **Error classification** into a stable eleven-kind taxonomy ([`classify`])
//! - **Retry policies** with bounded exponential backoff ([`retry`])
//! - **Circuit breakers** with half-open recovery, lock-free via atomics
//!   ([`circuit_breaker`]), shareable by name through a [`BreakerRegistry`]
//!
//! Store backends live in companion crates: `boardcast-redis` implements
//! [`log::StreamStore`] over Redis Streams and `boardcast-postgres`
//! implements [`capture::SqlRunner`] over a sqlx pool.
//!
//! ## Quick Start
//!
//! ```rust
//! use boardcast::log::{channel_topics_key, EventLog, MemoryStreamStore};
//! use boardcast::presets::store_stack;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), boardcast::ResilienceError> {
//!     let log = EventLog::new(MemoryStreamStore::new());
//!     let key = channel_topics_key("42");
//!     let stack = store_stack();
//!
//!     let id = stack
//!         .execute(|| {
//!             let log = log.clone();
//!             let key = key.clone();
//!             async move {
//!                 log.append(&key, vec![("type", "INSERT"), ("id", "1")])
//!                     .await
//!                     .map_err(Into::into)
//!             }
//!         })
//!         .await?;
//!     println!("appended {id}");
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod breaker_registry;
pub mod capture;
pub mod circuit_breaker;
pub mod classify;
pub mod error;
pub mod log;
pub mod presets;
pub mod retry;
pub mod stack;
pub mod time;

// Re-exports
pub use backoff::Backoff;
pub use breaker_registry::BreakerRegistry;
pub use circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerPolicy, CircuitSnapshot, CircuitState,
};
pub use error::{ErrorKind, ResilienceError, StoreError};
pub use retry::{RetryPolicy, RetryPolicyBuilder};
pub use stack::{ResilienceStack, ResilienceStackBuilder};
pub use time::{Clock, InstantSleeper, MonotonicClock, Sleeper, TokioSleeper, TrackingSleeper};
