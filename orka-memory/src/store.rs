//! The `MemoryStore` trait and its in-process reference implementation
//! (§4.3). All components reach the store through this single
//! connection-pool-shaped abstraction (Design Notes, "Global mutable
//! memory-store connection") — the orchestrator, nodes, and the decay
//! sweeper all hold a `Arc<dyn MemoryStore>`, never a concrete type.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use orka_core::PastLoop;

use crate::entry::MemoryEntry;
use crate::error::Result;
use crate::forkgroup::ForkGroup;

pub const GLOBAL_STREAM: &str = "orka:memory";

pub fn namespaced_stream(namespace: &str, session: &str) -> String {
    format!("orka:memory:{namespace}:{session}")
}

pub fn entry_key(uid: &str) -> String {
    format!("orka_memory:{uid}")
}

pub fn past_loops_key(node_id: &str) -> String {
    format!("past_loops:{node_id}")
}

/// Every access the rest of the runtime makes to persisted state. `init`
/// and `close` bracket the connection lifecycle (Design Notes); the
/// in-memory implementation treats both as no-ops.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn write_entry(&self, entry: MemoryEntry) -> Result<()>;
    async fn get_entry(&self, key: &str) -> Option<MemoryEntry>;
    async fn delete_entry(&self, key: &str) -> bool;
    async fn all_entries(&self) -> Vec<MemoryEntry>;

    async fn append_stream(&self, stream: &str, key: &str);
    async fn read_stream(&self, stream: &str) -> Vec<String>;

    async fn get_fork_group(&self, group_id: &str) -> Option<ForkGroup>;
    async fn put_fork_group(&self, group: ForkGroup);
    async fn delete_fork_group(&self, group_id: &str);

    async fn get_past_loops(&self, node_id: &str) -> Vec<PastLoop>;
    async fn put_past_loops(&self, node_id: &str, loops: Vec<PastLoop>);
}

/// Thread-safe in-memory implementation, modeled on the checkpoint
/// saver's `Arc<RwLock<HashMap>>` shape but using `DashMap` for
/// fine-grained locking across the store's several independent tables.
#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<String, MemoryEntry>,
    streams: DashMap<String, Vec<String>>,
    fork_groups: DashMap<String, ForkGroup>,
    past_loops: DashMap<String, Vec<PastLoop>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn write_entry(&self, entry: MemoryEntry) -> Result<()> {
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn get_entry(&self, key: &str) -> Option<MemoryEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    async fn delete_entry(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    async fn all_entries(&self) -> Vec<MemoryEntry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    async fn append_stream(&self, stream: &str, key: &str) {
        self.streams
            .entry(stream.to_string())
            .or_default()
            .push(key.to_string());
    }

    async fn read_stream(&self, stream: &str) -> Vec<String> {
        self.streams.get(stream).map(|v| v.clone()).unwrap_or_default()
    }

    async fn get_fork_group(&self, group_id: &str) -> Option<ForkGroup> {
        self.fork_groups.get(group_id).map(|g| g.clone())
    }

    async fn put_fork_group(&self, group: ForkGroup) {
        self.fork_groups.insert(group.group_id.clone(), group);
    }

    async fn delete_fork_group(&self, group_id: &str) {
        self.fork_groups.remove(group_id);
    }

    async fn get_past_loops(&self, node_id: &str) -> Vec<PastLoop> {
        self.past_loops.get(node_id).map(|v| v.clone()).unwrap_or_default()
    }

    async fn put_past_loops(&self, node_id: &str, loops: Vec<PastLoop>) {
        let trimmed = if loops.len() > 20 {
            loops[loops.len() - 20..].to_vec()
        } else {
            loops
        };
        self.past_loops.insert(node_id.to_string(), trimmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Category, MemoryType};
    use serde_json::Map;

    fn sample_entry(id: &str) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            content: "hello world".to_string(),
            node_id: "n1".to_string(),
            trace_id: "t1".to_string(),
            timestamp_ms: 0,
            importance_score: 0.5,
            memory_type: MemoryType::ShortTerm,
            category: Category::Log,
            metadata: Map::new(),
            vector: None,
            expire_at_ms: None,
        }
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = InMemoryStore::new();
        store.write_entry(sample_entry("a")).await.unwrap();
        let found = store.get_entry("a").await.unwrap();
        assert_eq!(found.content, "hello world");
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = InMemoryStore::new();
        store.write_entry(sample_entry("a")).await.unwrap();
        assert!(store.delete_entry("a").await);
        assert!(store.get_entry("a").await.is_none());
    }

    #[tokio::test]
    async fn fork_group_round_trips() {
        let store = InMemoryStore::new();
        let group = ForkGroup::new("g1", ["b1".to_string()]);
        store.put_fork_group(group).await;
        assert!(store.get_fork_group("g1").await.is_some());
        store.delete_fork_group("g1").await;
        assert!(store.get_fork_group("g1").await.is_none());
    }

    #[tokio::test]
    async fn past_loops_truncated_to_twenty_on_write() {
        let store = InMemoryStore::new();
        let loops: Vec<PastLoop> = (0..25)
            .map(|n| PastLoop {
                loop_number: n,
                score: 0.0,
                timestamp: chrono::Utc::now(),
                insights: String::new(),
                improvements: String::new(),
                mistakes: String::new(),
                result: serde_json::Value::Null,
            })
            .collect();
        store.put_past_loops("loop1", loops).await;
        let stored = store.get_past_loops("loop1").await;
        assert_eq!(stored.len(), 20);
        assert_eq!(stored.first().unwrap().loop_number, 5);
    }

    #[tokio::test]
    async fn streams_append_in_order() {
        let store = InMemoryStore::new();
        store.append_stream("orka:memory", "k1").await;
        store.append_stream("orka:memory", "k2").await;
        assert_eq!(store.read_stream("orka:memory").await, vec!["k1", "k2"]);
    }
}
