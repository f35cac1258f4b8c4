//! Registry of named circuit breakers.
//!
//! One breaker per logical resource ("event-log", "relational"), explicitly
//! constructed and injected rather than held in module-level statics, so
//! dependencies break independently and tests never leak state into each
//! other.

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerPolicy, CircuitSnapshot};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Errors from registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No breaker registered under this name.
    #[error("circuit breaker '{name}' not registered")]
    NotFound {
        /// Name that could not be resolved.
        name: String,
    },
}

/// Named breaker registry; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct BreakerRegistry {
    inner: Arc<RwLock<HashMap<String, CircuitBreakerPolicy>>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the breaker for `name`, creating it from `config` on first use.
    /// Returned policies share state with the registered one.
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> CircuitBreakerPolicy {
        if let Some(found) = self.get(name) {
            return found;
        }
        let mut map = self.inner.write().expect("breaker registry poisoned");
        map.entry(name.to_string())
            .or_insert_with(|| CircuitBreakerPolicy::from_config(config))
            .clone()
    }

    /// Look up a breaker without creating one.
    pub fn get(&self, name: &str) -> Option<CircuitBreakerPolicy> {
        self.inner.read().expect("breaker registry poisoned").get(name).cloned()
    }

    /// Register a breaker under `name`; the last registration wins.
    pub fn register(&self, name: impl Into<String>, breaker: CircuitBreakerPolicy) {
        let name = name.into();
        let mut map = self.inner.write().expect("breaker registry poisoned");
        if map.contains_key(&name) {
            tracing::warn!(
                target: "boardcast::breaker_registry",
                name = %name,
                "breaker replaced; last registration wins"
            );
        }
        map.insert(name, breaker);
    }

    /// Reset a breaker to CLOSED by name.
    pub fn reset(&self, name: &str) -> Result<(), RegistryError> {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                Ok(())
            }
            None => Err(RegistryError::NotFound { name: name.to_string() }),
        }
    }

    /// Snapshot every breaker, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, CircuitSnapshot)> {
        let map = self.inner.read().expect("breaker registry poisoned");
        let mut entries: Vec<_> =
            map.iter().map(|(name, b)| (name.clone(), b.snapshot())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
