//! Mapping of raw store failures onto the [`ErrorKind`] taxonomy.
//!
//! Classification order: a structured store error code (SQLSTATE) wins when
//! present; otherwise the message text is scanned case-insensitively in a
//! fixed order. Timeout phrases are checked before connection phrases so
//! that "connection timeout" classifies as a timeout. The text heuristics
//! are a documented fallback inherited from the source system; keep them
//! exactly as pinned by the tests.
//!
//! Classification is idempotent: a [`crate::StoreError`] already carries its
//! kind, and re-classifying its message never changes a structured-code
//! verdict because codes are resolved before text.

use crate::ErrorKind;

/// Map a structured store error code (SQLSTATE) to a kind, if known.
pub fn classify_code(code: &str) -> Option<ErrorKind> {
    match code {
        // integrity constraint violations
        "23505" => Some(ErrorKind::DuplicateEntry),
        "23503" => Some(ErrorKind::ForeignKeyViolation),
        "23502" | "23514" => Some(ErrorKind::ValidationError),
        // undefined column / undefined function
        "42703" | "42883" => Some(ErrorKind::QueryError),
        "42601" => Some(ErrorKind::SyntaxError),
        "42501" => Some(ErrorKind::PermissionDenied),
        _ => None,
    }
}

/// Classify by message text alone. Fixed order; first match wins.
pub fn classify_message(message: &str) -> ErrorKind {
    let text = message.to_ascii_lowercase();

    // timeout before connection: "connection timeout" is a timeout
    const TIMEOUT: &[&str] = &["timeout", "timed out"];
    const CONNECTION: &[&str] =
        &["connection", "econnrefused", "broken pipe", "no route to host", "could not connect"];
    const PERMISSION: &[&str] = &["permission denied", "not authorized", "access denied"];
    const NOT_FOUND: &[&str] = &["not found", "no such key", "does not exist"];

    if contains_any(&text, TIMEOUT) {
        ErrorKind::TimeoutError
    } else if contains_any(&text, CONNECTION) {
        ErrorKind::ConnectionError
    } else if contains_any(&text, PERMISSION) {
        ErrorKind::PermissionDenied
    } else if contains_any(&text, NOT_FOUND) {
        ErrorKind::NotFound
    } else {
        ErrorKind::UnknownError
    }
}

/// Full classification: structured code first, message heuristics second.
pub fn classify(code: Option<&str>, message: &str) -> ErrorKind {
    code.and_then(classify_code).unwrap_or_else(|| classify_message(message))
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}
