//! Error taxonomy for store-facing operations.
//!
//! Every failure that crosses the resilience boundary is converted into a
//! [`StoreError`] carrying a stable [`ErrorKind`] code before calling code
//! sees it; raw driver errors never leak past the store adapters. The JSON
//! shape of a `StoreError` is fixed:
//! `{ name: "DatabaseError", message, code, details, timestamp }`.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Stable classification codes for store failures.
///
/// Wire strings are the SCREAMING_SNAKE_CASE form of the variant name
/// (`ConnectionError` → `CONNECTION_ERROR`) and are part of the external
/// contract; outer layers map them to user-visible outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The store could not be reached or the connection dropped.
    ConnectionError,
    /// The call exceeded a deadline (driver or store side).
    TimeoutError,
    /// The statement referenced something the store does not know.
    QueryError,
    /// The statement itself was malformed.
    SyntaxError,
    /// A constraint other than uniqueness/foreign-key was violated.
    ValidationError,
    /// The addressed row/entry/key does not exist.
    NotFound,
    /// A uniqueness constraint was violated.
    DuplicateEntry,
    /// A foreign-key constraint was violated.
    ForeignKeyViolation,
    /// The store rejected the call for lack of privilege.
    PermissionDenied,
    /// The store reported an internal fault.
    InternalError,
    /// Nothing above matched.
    UnknownError,
}

impl ErrorKind {
    /// Wire string for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ConnectionError => "CONNECTION_ERROR",
            ErrorKind::TimeoutError => "TIMEOUT_ERROR",
            ErrorKind::QueryError => "QUERY_ERROR",
            ErrorKind::SyntaxError => "SYNTAX_ERROR",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::DuplicateEntry => "DUPLICATE_ENTRY",
            ErrorKind::ForeignKeyViolation => "FOREIGN_KEY_VIOLATION",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Kinds expected to resolve on their own; only these are retried.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectionError | ErrorKind::TimeoutError | ErrorKind::InternalError
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified store failure, immutable once constructed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    kind: ErrorKind,
    message: String,
    details: Option<serde_json::Value>,
    timestamp_millis: u64,
}

impl StoreError {
    /// Build an error with an already-known kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), details: None, timestamp_millis: unix_millis() }
    }

    /// Build an error by running the classifier over an optional structured
    /// store code and the message text. See [`crate::classify`].
    pub fn classify(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(crate::classify::classify(code, &message), message)
    }

    /// Attach opaque context (driver detail, statement fragment, key name).
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Classification code.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Opaque context, if any was attached.
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// Construction time as epoch milliseconds.
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp_millis
    }

    /// Whether retrying may help.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

// The wire shape carries a constant `name` discriminator alongside the
// fields, so serialization is spelled out rather than derived.
impl Serialize for StoreError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StoreError", 5)?;
        s.serialize_field("name", "DatabaseError")?;
        s.serialize_field("message", &self.message)?;
        s.serialize_field("code", &self.kind)?;
        s.serialize_field("details", &self.details)?;
        s.serialize_field("timestamp", &self.timestamp_millis)?;
        s.end()
    }
}

/// Failure surfaced by the resilience layer.
///
/// A circuit-open rejection is deliberately distinct from a classified store
/// error: it means "temporarily unavailable" and must not be fed back into a
/// local retry loop.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResilienceError {
    /// The circuit breaker refused the call without invoking the operation.
    #[error("circuit breaker open ({failure_count} failures, open for {open_for:?})")]
    CircuitOpen {
        /// Failure count observed when the call was rejected.
        failure_count: usize,
        /// How long the circuit has been open.
        open_for: Duration,
    },
    /// The operation itself failed with a classified error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResilienceError {
    /// Whether this is a circuit-open rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Borrow the classified error if this wraps one.
    pub fn as_store(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }

    /// Extract the classified error if this wraps one.
    pub fn into_store(self) -> Option<StoreError> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_strings_are_stable() {
        assert_eq!(ErrorKind::ConnectionError.as_str(), "CONNECTION_ERROR");
        assert_eq!(ErrorKind::NotFound.as_str(), "NOT_FOUND");
        assert_eq!(ErrorKind::DuplicateEntry.as_str(), "DUPLICATE_ENTRY");
        assert_eq!(ErrorKind::ForeignKeyViolation.as_str(), "FOREIGN_KEY_VIOLATION");
        assert_eq!(ErrorKind::UnknownError.as_str(), "UNKNOWN_ERROR");
    }

    #[test]
    fn serde_matches_as_str() {
        for kind in [
            ErrorKind::ConnectionError,
            ErrorKind::TimeoutError,
            ErrorKind::QueryError,
            ErrorKind::SyntaxError,
            ErrorKind::ValidationError,
            ErrorKind::NotFound,
            ErrorKind::DuplicateEntry,
            ErrorKind::ForeignKeyViolation,
            ErrorKind::PermissionDenied,
            ErrorKind::InternalError,
            ErrorKind::UnknownError,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn transient_kinds() {
        assert!(ErrorKind::ConnectionError.is_transient());
        assert!(ErrorKind::TimeoutError.is_transient());
        assert!(ErrorKind::InternalError.is_transient());
        assert!(!ErrorKind::ValidationError.is_transient());
        assert!(!ErrorKind::NotFound.is_transient());
        assert!(!ErrorKind::DuplicateEntry.is_transient());
    }

    #[test]
    fn store_error_wire_shape() {
        let err = StoreError::new(ErrorKind::TimeoutError, "statement timeout")
            .with_details(serde_json::json!({ "statement": "XRANGE" }));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["name"], "DatabaseError");
        assert_eq!(value["code"], "TIMEOUT_ERROR");
        assert_eq!(value["message"], "statement timeout");
        assert_eq!(value["details"]["statement"], "XRANGE");
        assert!(value["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn resilience_error_predicates() {
        let open =
            ResilienceError::CircuitOpen { failure_count: 3, open_for: Duration::from_secs(1) };
        assert!(open.is_circuit_open());
        assert!(open.as_store().is_none());

        let store: ResilienceError = StoreError::new(ErrorKind::NotFound, "missing").into();
        assert!(!store.is_circuit_open());
        assert_eq!(store.as_store().unwrap().kind(), ErrorKind::NotFound);
        assert_eq!(store.into_store().unwrap().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = StoreError::new(ErrorKind::ConnectionError, "connection refused");
        assert_eq!(err.to_string(), "CONNECTION_ERROR: connection refused");
    }
}
