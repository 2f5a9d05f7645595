//! Memory reader and writer nodes (§4.3): the only nodes that touch the
//! `MemoryStore` directly. Everything else in a workflow sees memory only
//! through these two node types' inputs and outputs.

use std::sync::Arc;

use async_trait::async_trait;
use orka_core::{ComponentType, Node, Output, RunContext};
use orka_llm::Embedder;
use orka_memory::entry::{build_entry, now_ms, DecayConfig, WriteIntent};
use orka_memory::search::{search, SearchConfig, SearchFilters};
use orka_memory::MemoryStore;
use serde_json::Value;
use uuid::Uuid;

pub struct MemoryWriterNode {
    id: String,
    store: Arc<dyn MemoryStore>,
    decay: DecayConfig,
}

impl MemoryWriterNode {
    pub fn new(id: impl Into<String>, store: Arc<dyn MemoryStore>) -> Self {
        Self { id: id.into(), store, decay: DecayConfig::default() }
    }

    pub fn with_decay(mut self, decay: DecayConfig) -> Self {
        self.decay = decay;
        self
    }
}

fn object_field<'a>(input: &'a Value, key: &str) -> Option<&'a Value> {
    input.as_object().and_then(|m| m.get(key))
}

#[async_trait]
impl Node for MemoryWriterNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: RunContext) -> Output {
        let content = match object_field(&ctx.input, "content") {
            Some(Value::String(s)) => s.clone(),
            _ => ctx.input_as_str(),
        };
        if content.trim().is_empty() {
            return Output::error(&self.id, ComponentType::Node, "content is required for memory writing");
        }

        let metadata = object_field(&ctx.input, "metadata")
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();

        let event_type = object_field(&ctx.input, "event_type").and_then(|v| v.as_str()).map(str::to_string);
        let log_type = object_field(&ctx.input, "log_type").and_then(|v| v.as_str()).map(str::to_string);

        let intent = WriteIntent {
            event_type,
            agent_name: Some(self.id.clone()),
            log_type,
            has_error: false,
            carries_memory_payload: true,
        };

        let mut entry = build_entry(
            Uuid::new_v4().to_string(),
            content,
            self.id.clone(),
            ctx.trace_id.clone(),
            metadata,
            &intent,
            &self.decay,
            now_ms(),
        );

        if let Some(Value::Array(vec)) = object_field(&ctx.input, "vector") {
            entry.vector = Some(vec.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect());
        }

        let entry_id = entry.id.clone();
        match self.store.write_entry(entry).await {
            Ok(()) => {
                self.store.append_stream(orka_memory::store::GLOBAL_STREAM, &entry_id).await;
                Output::success(&self.id, ComponentType::Node, serde_json::json!({"status": "success", "id": entry_id}))
            }
            Err(e) => Output::error(&self.id, ComponentType::Node, e.to_string()),
        }
    }
}

pub struct MemoryReaderNode {
    id: String,
    store: Arc<dyn MemoryStore>,
    embedder: Option<Arc<dyn Embedder>>,
    config: SearchConfig,
}

impl MemoryReaderNode {
    pub fn new(id: impl Into<String>, store: Arc<dyn MemoryStore>) -> Self {
        Self { id: id.into(), store, embedder: None, config: SearchConfig::with_limit(5) }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl Node for MemoryReaderNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: RunContext) -> Output {
        let query = match object_field(&ctx.input, "query") {
            Some(Value::String(s)) => s.clone(),
            _ => ctx.input_as_str(),
        };
        if query.trim().is_empty() {
            return Output::error(&self.id, ComponentType::Node, "query is required for memory reading");
        }

        let query_vector = match &self.embedder {
            Some(embedder) => match embedder.embed(&query).await {
                Ok(v) => Some(v),
                Err(e) => return Output::error(&self.id, ComponentType::Node, format!("embedding failed: {e}")),
            },
            None => None,
        };

        let entries = self.store.all_entries().await;
        let results = search(
            &entries,
            &query,
            query_vector.as_deref(),
            &SearchFilters::default(),
            &self.config,
            &[],
            now_ms(),
        );

        let payload: Vec<Value> = results
            .into_iter()
            .map(|scored| {
                serde_json::json!({
                    "content": scored.entry.content,
                    "similarity": scored.composed_similarity,
                    "metadata": scored.entry.metadata,
                })
            })
            .collect();

        Output::success(&self.id, ComponentType::Node, serde_json::json!({"status": "success", "results": payload}))
    }
}
