//! In-memory [`StreamStore`] with Redis-compatible semantics.
//!
//! Backs unit and integration tests, and works as a process-local store for
//! single-node deployments. Ids are `ms-seq` pairs generated from wall-clock
//! millis with a sequence tiebreaker, monotonically increasing per key even
//! across deletes (the high-water mark survives until the key is removed).

use super::store::{EntryId, RawEntry, RawStreamInfo, StreamStore};
use crate::error::unix_millis;
use crate::{ErrorKind, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MemStream {
    // high-water mark for generated ids; never reset by deletes
    last: (u64, u64),
    entries: Vec<MemEntry>,
}

#[derive(Debug, Clone)]
struct MemEntry {
    id: (u64, u64),
    items: Vec<String>,
}

/// Thread-safe in-memory stream store; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStreamStore {
    inner: Arc<Mutex<HashMap<String, MemStream>>>,
}

impl MemoryStreamStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn format_id(id: (u64, u64)) -> EntryId {
    EntryId::new(format!("{}-{}", id.0, id.1))
}

fn parse_id(text: &str) -> Option<(u64, u64)> {
    match text.split_once('-') {
        Some((ms, seq)) => Some((ms.parse().ok()?, seq.parse().ok()?)),
        None => Some((text.parse().ok()?, 0)),
    }
}

// Range bounds follow the store syntax: "-" / "+" for the extremes, a bare
// millis value covers its whole sequence range on the end side. Unparseable
// ids match nothing rather than erroring, so a bogus id behaves like a
// missing one.
fn parse_bound(text: &str, is_start: bool) -> Option<(u64, u64)> {
    match text {
        "-" => Some((0, 0)),
        "+" => Some((u64::MAX, u64::MAX)),
        _ => match text.split_once('-') {
            Some((ms, seq)) => ms.parse().ok().zip(seq.parse().ok()),
            None => {
                let ms: u64 = text.parse().ok()?;
                Some(if is_start { (ms, 0) } else { (ms, u64::MAX) })
            }
        },
    }
}

#[async_trait]
impl StreamStore for MemoryStreamStore {
    async fn add(&self, key: &str, fields: &[(String, String)]) -> Result<EntryId, StoreError> {
        if fields.is_empty() {
            // mirror the remote store: an entry must carry at least one field
            return Err(StoreError::new(
                ErrorKind::QueryError,
                "wrong number of arguments for 'xadd' command",
            ));
        }
        let mut map = self.inner.lock().expect("memory stream store poisoned");
        let stream = map.entry(key.to_string()).or_default();

        let now = unix_millis();
        let id = if now > stream.last.0 { (now, 0) } else { (stream.last.0, stream.last.1 + 1) };
        stream.last = id;

        let mut items = Vec::with_capacity(fields.len() * 2);
        for (k, v) in fields {
            items.push(k.clone());
            items.push(v.clone());
        }
        stream.entries.push(MemEntry { id, items });
        Ok(format_id(id))
    }

    async fn range(
        &self,
        key: &str,
        start: &str,
        end: &str,
        count: Option<usize>,
    ) -> Result<Vec<RawEntry>, StoreError> {
        let (Some(lo), Some(hi)) = (parse_bound(start, true), parse_bound(end, false)) else {
            return Ok(Vec::new());
        };
        let map = self.inner.lock().expect("memory stream store poisoned");
        let Some(stream) = map.get(key) else {
            return Ok(Vec::new());
        };
        let mut out: Vec<RawEntry> = stream
            .entries
            .iter()
            .filter(|e| e.id >= lo && e.id <= hi)
            .map(|e| RawEntry { id: format_id(e.id), items: e.items.clone() })
            .collect();
        if let Some(limit) = count {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn delete(&self, key: &str, id: &EntryId) -> Result<u64, StoreError> {
        let Some(target) = parse_id(id.as_str()) else {
            return Ok(0);
        };
        let mut map = self.inner.lock().expect("memory stream store poisoned");
        let Some(stream) = map.get_mut(key) else {
            return Ok(0);
        };
        let before = stream.entries.len();
        stream.entries.retain(|e| e.id != target);
        Ok((before - stream.entries.len()) as u64)
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut map = self.inner.lock().expect("memory stream store poisoned");
        Ok(map.remove(key).is_some())
    }

    async fn describe(&self, key: &str) -> Result<Option<RawStreamInfo>, StoreError> {
        let map = self.inner.lock().expect("memory stream store poisoned");
        let Some(stream) = map.get(key) else {
            return Ok(None);
        };
        let as_raw =
            |e: &MemEntry| RawEntry { id: format_id(e.id), items: e.items.clone() };
        Ok(Some(RawStreamInfo {
            length: stream.entries.len() as u64,
            last_generated_id: format_id(stream.last),
            consumer_group_count: 0,
            first_entry: stream.entries.first().map(as_raw),
            last_entry: stream.entries.last().map(as_raw),
        }))
    }
}
