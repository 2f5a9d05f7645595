//! Blob deduplication for trace serialization (§4.3.6, Design Notes
//! "Blob deduplication"). Walks a JSON value; any string or object whose
//! serialized size exceeds `threshold_bytes` is replaced in place with a
//! `{ref, _type: "blob_reference"}` pointer, and the original body is
//! cached by its sha256 hash in a side table.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

pub const DEFAULT_THRESHOLD_BYTES: usize = 200;

#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: HashMap<String, Value>,
    usage_counts: HashMap<String, usize>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &str) -> Option<&Value> {
        self.blobs.get(hash)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.blobs.iter()
    }

    /// Blobs referenced at least twice are the ones worth deduplicating;
    /// §4.3.6 gates switching the trace to dedup format on this.
    pub fn has_reused_blob(&self) -> bool {
        self.usage_counts.values().any(|&count| count >= 2)
    }

    fn intern(&mut self, value: Value) -> String {
        let serialized = value.to_string();
        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        self.blobs.entry(hash.clone()).or_insert(value);
        *self.usage_counts.entry(hash.clone()).or_insert(0) += 1;
        hash
    }
}

fn approx_size(value: &Value) -> usize {
    value.to_string().len()
}

fn is_blob_reference(value: &Value) -> bool {
    matches!(value.get("_type"), Some(Value::String(t)) if t == "blob_reference")
}

/// Replace large values in `value` with blob references, tracking
/// visited object identities on the current path and emitting the
/// `"<circular_reference>"` sentinel for a revisited one. An owned
/// `serde_json::Value` tree can't actually contain a cycle — this path
/// can't be exercised today — but it costs one `Vec` and keeps the walk
/// safe if `Value` ever grows a way to alias (e.g. via `Arc`).
pub fn deduplicate(value: &Value, store: &mut BlobStore, threshold_bytes: usize) -> Value {
    let mut path_seen: Vec<*const Value> = Vec::new();
    walk(value, store, threshold_bytes, &mut path_seen)
}

fn walk(value: &Value, store: &mut BlobStore, threshold: usize, path_seen: &mut Vec<*const Value>) -> Value {
    let ptr = value as *const Value;
    if path_seen.contains(&ptr) {
        return Value::String("<circular_reference>".to_string());
    }

    match value {
        Value::Object(map) => {
            path_seen.push(ptr);
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), walk(v, store, threshold, path_seen));
            }
            path_seen.pop();
            let rebuilt = Value::Object(out);
            maybe_dedup(rebuilt, store, threshold)
        }
        Value::Array(items) => {
            path_seen.push(ptr);
            let out: Vec<Value> = items
                .iter()
                .map(|v| walk(v, store, threshold, path_seen))
                .collect();
            path_seen.pop();
            let rebuilt = Value::Array(out);
            maybe_dedup(rebuilt, store, threshold)
        }
        other => maybe_dedup(other.clone(), store, threshold),
    }
}

fn maybe_dedup(value: Value, store: &mut BlobStore, threshold: usize) -> Value {
    if is_blob_reference(&value) {
        return value;
    }
    if approx_size(&value) <= threshold {
        return value;
    }
    let hash = store.intern(value);
    json!({"ref": hash, "_type": "blob_reference"})
}

/// Resolve every blob reference in `value` back to its body. Used when
/// reading a trace file back for replay.
pub fn rehydrate(value: &Value, store: &BlobStore) -> Value {
    if is_blob_reference(value) {
        if let Some(Value::String(hash)) = value.get("ref") {
            if let Some(body) = store.get(hash) {
                return rehydrate(body, store);
            }
        }
        return value.clone();
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), rehydrate(v, store));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| rehydrate(v, store)).collect()),
        other => other.clone(),
    }
}
