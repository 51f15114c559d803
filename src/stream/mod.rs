//! The stream bus: the external collaborator an agent pushes progress
//! events to (thought, tool start/retry/complete, playbook update, final
//! answer) so a UI or log tailer can follow a conversation live.
//!
//! This is treated as an outside system the runtime talks to, not something
//! it owns end-to-end — so this module is deliberately just a trait plus an
//! in-memory implementation for tests; see [`memory_bus::InMemoryStreamBus`].
//! `persist` additionally mirrors events into the KVS-backed
//! `chat_stream:<chat_id>` log so a late subscriber can replay history.

pub mod memory_bus;

use serde::Serialize;
use serde_json::Value;

use crate::kvs::Kvs;
use crate::utilities::errors::KvsError;

/// One message on the stream: an event kind plus a JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    pub event: String,
    pub data: Value,
}

impl StreamEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        StreamEvent {
            event: event.into(),
            data,
        }
    }
}

/// Anything that can receive live events for a chat.
pub trait StreamBus: Send + Sync {
    fn emit(&self, chat_id: &str, event: StreamEvent);
}

const STREAM_LOG_CAP: isize = 500;

/// Appends `event` to the bounded, replayable `chat_stream:<chat_id>` list,
/// trimming to the last [`STREAM_LOG_CAP`] entries.
pub async fn persist(kvs: &dyn Kvs, chat_id: &str, event: &StreamEvent) -> Result<(), KvsError> {
    let key = format!("chat_stream:{chat_id}");
    let serialized = serde_json::to_string(event).map_err(|e| KvsError::Operation {
        message: format!("failed to serialize stream event: {e}"),
    })?;
    kvs.rpush(&key, serialized).await?;
    kvs.ltrim(&key, -STREAM_LOG_CAP, -1).await
}
