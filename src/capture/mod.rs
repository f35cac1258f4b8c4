//! Change capture: committed row mutations become channel-scoped events.
//!
//! The emitting side lives inside Postgres as a trigger/function pair
//! ([`sql`]); this module defines the wire contract those notifications
//! follow and the [`ChangeFeed`] seam an in-process consumer implements.
//! Payloads carry identity and timing only, never row content; consumers
//! re-fetch full state on receipt.

pub mod sql;

pub use sql::{ChangeCapture, SetupOutcome, SetupStep, SqlRunner};

use crate::error::unix_millis;
use crate::log::{EventLog, FieldValue, StreamStore};
use crate::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Notification address for one channel's topic mutations.
pub fn notify_channel(channel_id: i64) -> String {
    format!("topic_channel_{channel_id}")
}

/// Row operation that produced a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Insert => "INSERT",
            ChangeOp::Update => "UPDATE",
            ChangeOp::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed row mutation, as published on the notify channel.
///
/// `timestamp` is epoch seconds at publish time. `parent_id` is `null` for
/// top-level topics. The JSON field names match the trigger's payload
/// exactly, so this type deserializes a raw notification verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub op: ChangeOp,
    pub id: i64,
    pub channel_id: i64,
    pub parent_id: Option<i64>,
    pub timestamp: i64,
}

impl ChangeEvent {
    /// Build an event stamped with the current wall-clock time.
    pub fn now(op: ChangeOp, id: i64, channel_id: i64, parent_id: Option<i64>) -> Self {
        Self { op, id, channel_id, parent_id, timestamp: (unix_millis() / 1000) as i64 }
    }

    /// The notify address this event is published on.
    pub fn channel(&self) -> String {
        notify_channel(self.channel_id)
    }
}

/// Consumer seam for row-change events.
///
/// The trigger-based emitter is one producer; an outbox poller or logical
/// replication reader can feed the same interface without the rest of the
/// system noticing.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn on_row_changed(&self, event: &ChangeEvent) -> Result<(), StoreError>;
}

/// [`ChangeFeed`] that records each event in the channel's topic log.
#[derive(Debug, Clone)]
pub struct EventLogFeed<S> {
    log: EventLog<S>,
}

impl<S: StreamStore> EventLogFeed<S> {
    pub fn new(log: EventLog<S>) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &EventLog<S> {
        &self.log
    }
}

#[async_trait]
impl<S: StreamStore> ChangeFeed for EventLogFeed<S> {
    async fn on_row_changed(&self, event: &ChangeEvent) -> Result<(), StoreError> {
        let key = crate::log::channel_topics_key(&event.channel_id.to_string());
        self.log
            .append(
                &key,
                vec![
                    ("type", FieldValue::from(event.op.as_str())),
                    ("id", FieldValue::from(event.id)),
                    ("channelId", FieldValue::from(event.channel_id)),
                    ("parentId", FieldValue::from(event.parent_id)),
                    ("timestamp", FieldValue::from(event.timestamp)),
                ],
            )
            .await?;
        tracing::debug!(
            target: "boardcast::capture",
            op = %event.op,
            id = event.id,
            channel_id = event.channel_id,
            "recorded row change"
        );
        Ok(())
    }
}
