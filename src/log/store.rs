//! The seam between the event log and the ordered-log store behind it.
//!
//! Implementations translate their driver's failures into [`StoreError`] at
//! this boundary; nothing above it sees a raw driver error. Ordering and id
//! assignment are the store's responsibility, including monotonicity under
//! concurrent appenders.

use crate::StoreError;
use async_trait::async_trait;

/// Store-assigned entry identifier, opaque and ordered per key
/// (`ms-seq` text in the Redis Streams form).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entry as the store hands it back: id plus the flat key/value items.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub id: EntryId,
    pub items: Vec<String>,
}

/// Snapshot summary of one key's stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStreamInfo {
    pub length: u64,
    pub last_generated_id: EntryId,
    pub consumer_group_count: u64,
    pub first_entry: Option<RawEntry>,
    pub last_entry: Option<RawEntry>,
}

/// Remote ordered per-key log store.
///
/// Range bounds use the store's cursor syntax: `"-"` for the minimum id,
/// `"+"` for the maximum, or a concrete entry id.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Append pre-encoded field pairs; returns the assigned id.
    async fn add(&self, key: &str, fields: &[(String, String)]) -> Result<EntryId, StoreError>;

    /// Entries within `[start, end]` in ascending id order, optionally
    /// capped at `count`. A missing key yields an empty vec.
    async fn range(
        &self,
        key: &str,
        start: &str,
        end: &str,
        count: Option<usize>,
    ) -> Result<Vec<RawEntry>, StoreError>;

    /// Remove one entry by id; returns the number removed (0 or 1).
    async fn delete(&self, key: &str, id: &EntryId) -> Result<u64, StoreError>;

    /// Drop the whole key; `true` if it existed.
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// Stream summary, or `None` if the key does not exist.
    async fn describe(&self, key: &str) -> Result<Option<RawStreamInfo>, StoreError>;
}
