//! Channel-based pub/sub for a streaming session (§4.5 "EventBus"),
//! grounded in the same `tokio::sync::broadcast` pattern the upstream
//! orchestrator's websocket handler uses for live fan-out — extended
//! here with an in-memory history buffer so a late subscriber can
//! "replay from a cursor" instead of only seeing messages sent after it
//! subscribes.

use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Ingress,
    Egress,
    Alerts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Ingress,
    Egress,
    Alert,
}

/// A record published on the event bus (§6 "Streaming wire messages").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub session_id: String,
    pub channel: Channel,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub payload: Value,
    pub timestamp_ms: i64,
    pub source: String,
    pub state_version: u64,
}

impl WireMessage {
    pub fn ingress(session_id: impl Into<String>, source: impl Into<String>, payload: Value, state_version: u64) -> Self {
        Self {
            session_id: session_id.into(),
            channel: Channel::Ingress,
            kind: MessageKind::Ingress,
            payload,
            timestamp_ms: Utc::now().timestamp_millis(),
            source: source.into(),
            state_version,
        }
    }

    pub fn egress(session_id: impl Into<String>, source: impl Into<String>, payload: Value, state_version: u64) -> Self {
        Self {
            session_id: session_id.into(),
            channel: Channel::Egress,
            kind: MessageKind::Egress,
            payload,
            timestamp_ms: Utc::now().timestamp_millis(),
            source: source.into(),
            state_version,
        }
    }

    pub fn alert(session_id: impl Into<String>, source: impl Into<String>, payload: Value, state_version: u64) -> Self {
        Self {
            session_id: session_id.into(),
            channel: Channel::Alerts,
            kind: MessageKind::Alert,
            payload,
            timestamp_ms: Utc::now().timestamp_millis(),
            source: source.into(),
            state_version,
        }
    }
}

/// Default ring-buffer capacity for the live broadcast channel. The
/// replay history itself is unbounded for the lifetime of the session —
/// `Shutdown` is what drains it into a trace file.
const DEFAULT_CAPACITY: usize = 256;

pub struct EventBus {
    sender: broadcast::Sender<WireMessage>,
    history: Mutex<Vec<WireMessage>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _rx) = broadcast::channel(DEFAULT_CAPACITY);
        Self { sender, history: Mutex::new(Vec::new()) }
    }

    pub fn publish(&self, message: WireMessage) {
        self.history.lock().unwrap().push(message.clone());
        // No subscribers yet is not an error — alerts published before a
        // reader attaches are still in `history` for replay.
        let _ = self.sender.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WireMessage> {
        self.sender.subscribe()
    }

    /// Every message recorded at or after `cursor` (an index into
    /// publish order, not a timestamp).
    pub fn replay_from(&self, cursor: usize) -> Vec<WireMessage> {
        self.history.lock().unwrap().iter().skip(cursor).cloned().collect()
    }

    pub fn cursor(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_from_cursor_skips_earlier_messages() {
        let bus = EventBus::new();
        bus.publish(WireMessage::ingress("s1", "user", Value::String("first".to_string()), 0));
        let cursor = bus.cursor();
        bus.publish(WireMessage::ingress("s1", "user", Value::String("second".to_string()), 1));

        let replayed = bus.replay_from(cursor);
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].payload, Value::String("second".to_string()));
    }

    #[tokio::test]
    async fn late_subscriber_sees_only_live_messages() {
        let bus = EventBus::new();
        bus.publish(WireMessage::ingress("s1", "user", Value::String("before".to_string()), 0));
        let mut rx = bus.subscribe();
        bus.publish(WireMessage::ingress("s1", "user", Value::String("after".to_string()), 1));

        let message = rx.recv().await.unwrap();
        assert_eq!(message.payload, Value::String("after".to_string()));
    }
}
