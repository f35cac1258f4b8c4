#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! Redis Streams backend for the boardcast event log.
//!
//! Implements [`StreamStore`] over a multiplexed connection manager, one
//! Redis stream per log key. Driver failures are classified into
//! [`StoreError`] at this boundary; nothing above it sees a `RedisError`.
//!
//! ```rust,no_run
//! use boardcast::log::{channel_topics_key, EventLog};
//! use boardcast_redis::RedisStreamStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), boardcast::StoreError> {
//!     let store = RedisStreamStore::connect("redis://127.0.0.1:6379").await?;
//!     let log = EventLog::new(store);
//!     log.append(&channel_topics_key("42"), vec![("type", "INSERT")]).await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use boardcast::log::{EntryId, RawEntry, RawStreamInfo, StreamStore};
use boardcast::StoreError;
use redis::aio::ConnectionManager;
use redis::streams::StreamInfoStreamReply;
use redis::RedisError;

/// [`StreamStore`] over Redis Streams.
///
/// Cheap to clone; clones share the underlying connection manager, which
/// reconnects on its own after connection loss.
#[derive(Clone)]
pub struct RedisStreamStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisStreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamStore").finish_non_exhaustive()
    }
}

impl RedisStreamStore {
    /// Connect to the given Redis URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(store_error)?;
        let conn = ConnectionManager::new(client).await.map_err(store_error)?;
        tracing::info!(target: "boardcast::redis", "connected to redis");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StreamStore for RedisStreamStore {
    async fn add(&self, key: &str, fields: &[(String, String)]) -> Result<EntryId, StoreError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(key).arg("*");
        for (k, v) in fields {
            cmd.arg(k).arg(v);
        }
        let id: String =
            cmd.query_async(&mut self.conn.clone()).await.map_err(store_error)?;
        Ok(EntryId::new(id))
    }

    async fn range(
        &self,
        key: &str,
        start: &str,
        end: &str,
        count: Option<usize>,
    ) -> Result<Vec<RawEntry>, StoreError> {
        let mut cmd = redis::cmd("XRANGE");
        cmd.arg(key).arg(start).arg(end);
        if let Some(limit) = count {
            cmd.arg("COUNT").arg(limit);
        }
        // each reply item is [id, [k1, v1, k2, v2, ...]]; the flat item list
        // is kept as-is so odd-length entries survive to the decoder
        let rows: Vec<(String, Vec<String>)> =
            cmd.query_async(&mut self.conn.clone()).await.map_err(store_error)?;
        Ok(rows
            .into_iter()
            .map(|(id, items)| RawEntry { id: EntryId::new(id), items })
            .collect())
    }

    async fn delete(&self, key: &str, id: &EntryId) -> Result<u64, StoreError> {
        redis::cmd("XDEL")
            .arg(key)
            .arg(id.as_str())
            .query_async(&mut self.conn.clone())
            .await
            .map_err(store_error)
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let removed: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(store_error)?;
        Ok(removed > 0)
    }

    async fn describe(&self, key: &str) -> Result<Option<RawStreamInfo>, StoreError> {
        // XINFO STREAM returns the boundary entries as unordered maps, which
        // would lose field order; fetch them through XRANGE instead.
        let reply: StreamInfoStreamReply = match redis::cmd("XINFO")
            .arg("STREAM")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await
        {
            Ok(reply) => reply,
            Err(e) if is_missing_key(&e) => return Ok(None),
            Err(e) => return Err(store_error(e)),
        };

        let first_entry = self.boundary_entry(key, "XRANGE").await?;
        let last_entry = self.boundary_entry(key, "XREVRANGE").await?;

        Ok(Some(RawStreamInfo {
            length: reply.length as u64,
            last_generated_id: EntryId::new(reply.last_generated_id),
            consumer_group_count: reply.groups as u64,
            first_entry,
            last_entry,
        }))
    }
}

impl RedisStreamStore {
    async fn boundary_entry(
        &self,
        key: &str,
        command: &str,
    ) -> Result<Option<RawEntry>, StoreError> {
        let (start, end) = if command == "XREVRANGE" { ("+", "-") } else { ("-", "+") };
        let rows: Vec<(String, Vec<String>)> = redis::cmd(command)
            .arg(key)
            .arg(start)
            .arg(end)
            .arg("COUNT")
            .arg(1)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().next().map(|(id, items)| RawEntry { id: EntryId::new(id), items }))
    }
}

/// Classify a driver failure into the shared taxonomy.
pub fn store_error(e: RedisError) -> StoreError {
    use boardcast::ErrorKind;
    let message = e.to_string();
    let err = if e.is_timeout() {
        StoreError::new(ErrorKind::TimeoutError, message)
    } else if e.is_connection_refusal() || e.is_io_error() || e.is_connection_dropped() {
        StoreError::new(ErrorKind::ConnectionError, message)
    } else {
        StoreError::classify(e.code(), message)
    };
    err.with_details(serde_json::json!({ "source": "redis" }))
}

fn is_missing_key(e: &RedisError) -> bool {
    e.to_string().contains("no such key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcast::ErrorKind;
    use redis::ErrorKind as RedisKind;

    fn driver_error(kind: RedisKind, detail: &str) -> RedisError {
        RedisError::from((kind, "", detail.to_string()))
    }

    #[test]
    fn io_failures_classify_as_connection() {
        let e = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused (os error 111)",
        ));
        assert_eq!(store_error(e).kind(), ErrorKind::ConnectionError);
    }

    #[test]
    fn response_errors_fall_through_to_text_heuristics() {
        let e = driver_error(RedisKind::ResponseError, "operation timed out");
        assert_eq!(store_error(e).kind(), ErrorKind::TimeoutError);

        let e = driver_error(RedisKind::ResponseError, "unexpected frame layout");
        assert_eq!(store_error(e).kind(), ErrorKind::UnknownError);
    }

    #[test]
    fn classified_errors_carry_driver_context() {
        let e = driver_error(RedisKind::ResponseError, "wrong number of arguments");
        let err = store_error(e);
        assert_eq!(err.details().unwrap()["source"], "redis");
    }

    #[test]
    fn missing_key_is_detected_from_the_reply() {
        let e = driver_error(RedisKind::ResponseError, "ERR no such key");
        assert!(is_missing_key(&e));
        let e = driver_error(RedisKind::ResponseError, "ERR something else");
        assert!(!is_missing_key(&e));
    }
}
