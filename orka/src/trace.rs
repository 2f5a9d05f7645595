//! Builds the persisted trace file (§6 "Trace file layout", §9 "Blob
//! deduplication"): one event per logged step (or, for a streaming
//! session, per bus message), large payloads replaced by content-hash
//! references once any blob is reused twice.

use chrono::{DateTime, Utc};
use orka_memory::blob::{deduplicate, BlobStore, DEFAULT_THRESHOLD_BYTES};
use orka_core::Status;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::scheduler::RunOutcome;
use crate::streaming::event_bus::{Channel, WireMessage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub step: u32,
    pub agent_id: String,
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceStats {
    pub total_events: usize,
    pub blobs_created: usize,
    pub blobs_reused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceMetadata {
    pub deduplication_enabled: bool,
    pub stats: TraceStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFile {
    #[serde(rename = "_metadata")]
    pub metadata: TraceMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_store: Option<HashMap<String, Value>>,
    pub events: Vec<TraceEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_report: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_analysis: Option<Value>,
}

fn finish(events: Vec<TraceEvent>, store: BlobStore) -> TraceFile {
    let deduplication_enabled = store.has_reused_blob();
    let blobs_created = store.len();
    let blob_store = if deduplication_enabled {
        Some(store.iter().map(|(hash, blob)| (hash.clone(), blob.clone())).collect())
    } else {
        None
    };

    TraceFile {
        metadata: TraceMetadata {
            deduplication_enabled,
            stats: TraceStats { total_events: events.len(), blobs_created, blobs_reused: deduplication_enabled },
        },
        blob_store,
        events,
        meta_report: None,
        cost_analysis: None,
    }
}

/// Builds a trace from a completed orchestrator run.
pub fn build_trace(outcome: &RunOutcome, threshold_bytes: usize) -> TraceFile {
    let mut store = BlobStore::new();
    let events = outcome
        .logs
        .iter()
        .map(|log| {
            let event_type = match log.payload.status {
                Status::Error => "error",
                Status::Partial => "partial",
                Status::Success => "success",
            };
            let payload = serde_json::to_value(&log.payload).unwrap_or(Value::Null);
            TraceEvent {
                step: log.step_index,
                agent_id: log.agent_id.clone(),
                event_type: event_type.to_string(),
                payload: deduplicate(&payload, &mut store, threshold_bytes),
                timestamp: log.timestamp,
            }
        })
        .collect();
    finish(events, store)
}

/// Builds a trace from a streaming session's event-bus history (§4.5
/// "Shutdown: persist trace to a file").
pub fn build_trace_from_events(messages: &[WireMessage], threshold_bytes: usize) -> TraceFile {
    let mut store = BlobStore::new();
    let events = messages
        .iter()
        .enumerate()
        .map(|(step, message)| {
            let event_type = match message.channel {
                Channel::Ingress => "ingress",
                Channel::Egress => "egress",
                Channel::Alerts => "alert",
            };
            TraceEvent {
                step: step as u32,
                agent_id: message.source.clone(),
                event_type: event_type.to_string(),
                payload: deduplicate(&message.payload, &mut store, threshold_bytes),
                timestamp: DateTime::from_timestamp_millis(message.timestamp_ms).unwrap_or_else(Utc::now),
            }
        })
        .collect();
    finish(events, store)
}

pub const DEFAULT_BLOB_THRESHOLD: usize = DEFAULT_THRESHOLD_BYTES;
