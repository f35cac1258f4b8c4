//! Append-only per-channel event log over an ordered stream store.
//!
//! Each channel owns one log key ([`channel_topics_key`]). Entries are field
//! maps encoded to the store's flat key/value wire form ([`fields`]); ids are
//! store-assigned and monotonic per key, serving as both primary key and
//! pagination cursor. The log is resilience-agnostic: store failures surface
//! as [`StoreError`] and callers decide whether to wrap calls in
//! [`RetryPolicy`](crate::RetryPolicy) or a breaker.

pub mod fields;
pub mod memory;
pub mod store;

pub use fields::{decode_pairs, encode_fields, FieldValue};
pub use memory::MemoryStreamStore;
pub use store::{EntryId, RawEntry, RawStreamInfo, StreamStore};

use crate::StoreError;

/// Log key for a channel's topic events.
pub fn channel_topics_key(channel_id: &str) -> String {
    format!("channel:{channel_id}:topics")
}

/// One decoded log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: EntryId,
    /// Decoded fields in wire order.
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    fn from_raw(raw: RawEntry) -> Self {
        Self { id: raw.id, fields: decode_pairs(&raw.items) }
    }

    /// Value of the first field named `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Snapshot summary of one log key, boundary entries decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub length: u64,
    pub last_generated_id: EntryId,
    pub consumer_group_count: u64,
    pub first_entry: Option<LogEntry>,
    pub last_entry: Option<LogEntry>,
}

/// Outcome of [`EventLog::update`].
///
/// Update is delete-then-append, not an in-place mutation, and the two steps
/// are not atomic. The variants make that visible: a concurrent writer can
/// remove the entry between this call's read and its delete, in which case
/// nothing is appended and the outcome is `RaceLost`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The old entry was deleted and the replacement appended under a fresh
    /// id, carried here. The new id has no relation to the old one.
    Replaced(EntryId),
    /// No entry with that id exists; nothing was appended.
    NotFound,
    /// The entry existed when read but was gone by the time the delete ran;
    /// nothing was appended.
    RaceLost,
}

/// Outcome of [`EventLog::clear`]; a missing key is a no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    WasAbsent,
}

/// Client for an append-only per-key event log.
///
/// Generic over the backing [`StreamStore`]; use
/// [`MemoryStreamStore`] in tests and a remote store in production.
#[derive(Debug, Clone)]
pub struct EventLog<S> {
    store: S,
}

impl<S: StreamStore> EventLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append a field map as a new entry; returns the store-assigned id.
    ///
    /// Fields whose value is null or the empty string are dropped before
    /// encoding; `false` and `0` are kept as `"false"` and `"0"`. If every
    /// field is dropped the store sees an empty entry and rejects it with
    /// its own error, which is passed through unchanged.
    pub async fn append<K, V, I>(&self, key: &str, entry_fields: I) -> Result<EntryId, StoreError>
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let encoded = encode_fields(entry_fields);
        let id = self.store.add(key, &encoded).await?;
        tracing::debug!(target: "boardcast::log", key, id = %id, "appended entry");
        Ok(id)
    }

    /// Entries within `[start, end]` in ascending id order, optionally
    /// capped at `limit`. Missing key or empty range yields an empty vec.
    pub async fn range(
        &self,
        key: &str,
        start: &str,
        end: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let raw = self.store.range(key, start, end, limit).await?;
        Ok(raw.into_iter().map(LogEntry::from_raw).collect())
    }

    /// All entries for `key` in append order.
    pub async fn entries(&self, key: &str) -> Result<Vec<LogEntry>, StoreError> {
        self.range(key, "-", "+", None).await
    }

    /// Snapshot summary of `key`, or `None` if it does not exist.
    pub async fn info(&self, key: &str) -> Result<Option<StreamInfo>, StoreError> {
        let Some(raw) = self.store.describe(key).await? else {
            return Ok(None);
        };
        Ok(Some(StreamInfo {
            length: raw.length,
            last_generated_id: raw.last_generated_id,
            consumer_group_count: raw.consumer_group_count,
            first_entry: raw.first_entry.map(LogEntry::from_raw),
            last_entry: raw.last_entry.map(LogEntry::from_raw),
        }))
    }

    /// Replace `entry_id` with a freshly appended entry.
    ///
    /// Reads the entry, deletes it, then appends `new_fields`. The steps are
    /// not atomic; see [`UpdateOutcome`] for how concurrent deletion is
    /// reported. No append happens unless the delete removed the entry.
    pub async fn update<K, V, I>(
        &self,
        key: &str,
        entry_id: &EntryId,
        new_fields: I,
    ) -> Result<UpdateOutcome, StoreError>
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let existing =
            self.store.range(key, entry_id.as_str(), entry_id.as_str(), Some(1)).await?;
        if existing.is_empty() {
            return Ok(UpdateOutcome::NotFound);
        }
        if self.store.delete(key, entry_id).await? == 0 {
            tracing::debug!(
                target: "boardcast::log",
                key,
                id = %entry_id,
                "entry vanished between read and delete"
            );
            return Ok(UpdateOutcome::RaceLost);
        }
        let new_id = self.append(key, new_fields).await?;
        Ok(UpdateOutcome::Replaced(new_id))
    }

    /// Delete one entry by id; returns the number removed (0 or 1).
    /// Deleting a nonexistent id is not an error.
    pub async fn delete(&self, key: &str, entry_id: &EntryId) -> Result<u64, StoreError> {
        self.store.delete(key, entry_id).await
    }

    /// Drop the whole key and every entry under it.
    pub async fn clear(&self, key: &str) -> Result<ClearOutcome, StoreError> {
        let existed = self.store.remove(key).await?;
        tracing::debug!(target: "boardcast::log", key, existed, "cleared log");
        Ok(if existed { ClearOutcome::Cleared } else { ClearOutcome::WasAbsent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> EventLog<MemoryStreamStore> {
        EventLog::new(MemoryStreamStore::new())
    }

    #[test]
    fn channel_key_layout() {
        assert_eq!(channel_topics_key("42"), "channel:42:topics");
    }

    #[tokio::test]
    async fn append_filters_then_round_trips() {
        let log = log();
        log.append(
            "k",
            vec![
                ("a", FieldValue::from("x")),
                ("b", FieldValue::from("")),
                ("c", FieldValue::Null),
                ("d", FieldValue::from(0)),
                ("e", FieldValue::from(false)),
            ],
        )
        .await
        .unwrap();

        let entries = log.entries("k").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].fields,
            vec![
                ("a".to_string(), "x".to_string()),
                ("d".to_string(), "0".to_string()),
                ("e".to_string(), "false".to_string()),
            ]
        );
        assert_eq!(entries[0].get("d"), Some("0"));
        assert_eq!(entries[0].get("b"), None);
    }

    #[tokio::test]
    async fn entries_keep_append_order() {
        let log = log();
        for n in 0..10 {
            log.append("k", vec![("n", n.to_string())]).await.unwrap();
        }
        let entries = log.entries("k").await.unwrap();
        let ns: Vec<_> = entries.iter().map(|e| e.get("n").unwrap().to_string()).collect();
        assert_eq!(ns, (0..10).map(|n| n.to_string()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn range_with_cursor_and_limit() {
        let log = log();
        let mut ids = Vec::new();
        for n in 0..4 {
            ids.push(log.append("k", vec![("n", n.to_string())]).await.unwrap());
        }
        let tail = log.range("k", ids[2].as_str(), "+", None).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].id, ids[2]);

        let capped = log.range("k", "-", "+", Some(1)).await.unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, ids[0]);
    }

    #[tokio::test]
    async fn info_reports_boundaries_and_none_for_missing() {
        let log = log();
        assert!(log.info("missing").await.unwrap().is_none());

        let first = log.append("k", vec![("n", "1")]).await.unwrap();
        let last = log.append("k", vec![("n", "2")]).await.unwrap();
        let info = log.info("k").await.unwrap().unwrap();
        assert_eq!(info.length, 2);
        assert_eq!(info.last_generated_id, last);
        assert_eq!(info.first_entry.unwrap().id, first);
        assert_eq!(info.last_entry.unwrap().get("n"), Some("2"));
    }

    #[tokio::test]
    async fn update_replaces_under_fresh_id() {
        let log = log();
        let old = log.append("k", vec![("title", "draft")]).await.unwrap();
        let outcome = log.update("k", &old, vec![("title", "final")]).await.unwrap();

        let UpdateOutcome::Replaced(new_id) = outcome else {
            panic!("expected Replaced, got {outcome:?}");
        };
        assert_ne!(new_id, old);

        let entries = log.entries("k").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, new_id);
        assert_eq!(entries[0].get("title"), Some("final"));
    }

    #[tokio::test]
    async fn update_missing_id_appends_nothing() {
        let log = log();
        log.append("k", vec![("n", "1")]).await.unwrap();
        let outcome =
            log.update("k", &EntryId::from("bogus-id"), vec![("x", "1")]).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
        assert_eq!(log.entries("k").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let log = log();
        let id = log.append("k", vec![("n", "1")]).await.unwrap();
        assert_eq!(log.delete("k", &id).await.unwrap(), 1);
        assert_eq!(log.delete("k", &id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_twice_reports_absence_second_time() {
        let log = log();
        assert_eq!(log.clear("nope").await.unwrap(), ClearOutcome::WasAbsent);
        log.append("k", vec![("n", "1")]).await.unwrap();
        assert_eq!(log.clear("k").await.unwrap(), ClearOutcome::Cleared);
        assert_eq!(log.clear("k").await.unwrap(), ClearOutcome::WasAbsent);
    }
}
