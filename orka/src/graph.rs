//! Compiles a [`NodeConfig`] into a live `Arc<dyn Node>` (§4.4.1). Every
//! control node's type-specific configuration already lives in
//! `NodeConfig.extra` — YAML's flattened fields — so compiling one is
//! just a `serde_json::from_value` away from the config structs
//! `orka_core::config` already defines.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use orka_core::config::{ForkConfig, JoinConfig, LoopConfig, NodeConfig, RouterConfig};
use orka_core::json_extract::{FieldType, Schema};
use orka_core::scoring::Preset;
use orka_core::{CoreError, Node, Output, Result as CoreResult, RunContext};
use orka_llm::{CompletionClient, Embedder};
use orka_memory::entry::DecayConfig;
use orka_memory::search::SearchConfig;
use orka_memory::MemoryStore;
use orka_nodes::{
    EchoNode, FailingNode, FailoverNode, ForkNode, JoinNode, LlmAgentNode, LoopNode, MemoryReaderNode, MemoryWriterNode, RouterNode,
};
use serde::Deserialize;
use serde_json::Value;

use crate::scheduler::{Orchestrator, WorkflowNode};

/// The shared resources every compiled node may need: the memory store is
/// mandatory (§5 "the only cross-component shared resource"); the LLM
/// client and embedder are optional since a workflow built entirely of
/// control nodes needs neither.
#[derive(Clone)]
pub struct RuntimeDeps {
    pub store: Arc<dyn MemoryStore>,
    pub llm: Option<Arc<dyn CompletionClient>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub presets: Arc<Vec<Preset>>,
}

impl RuntimeDeps {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            llm: None,
            embedder: None,
            presets: Arc::new(orka_core::scoring::builtin_presets().into_values().collect()),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn CompletionClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

/// Delegates to an `Arc<dyn Node>` so it can sit inside a
/// `Box<dyn Node>` slot (Failover's children) without cloning the node.
struct ArcNode(Arc<dyn Node>);

#[async_trait]
impl Node for ArcNode {
    fn id(&self) -> &str {
        self.0.id()
    }

    async fn run(&self, ctx: RunContext) -> Output {
        self.0.run(ctx).await
    }

    async fn initialize(&self) {
        self.0.initialize().await
    }

    async fn cleanup(&self) {
        self.0.cleanup().await
    }
}

#[derive(Deserialize, Default)]
struct SchemaDto {
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    strict: bool,
    #[serde(default)]
    defaults: serde_json::Map<String, Value>,
    #[serde(default)]
    numeric: Vec<String>,
    #[serde(default)]
    boolean: Vec<String>,
}

fn schema_from_dto(dto: SchemaDto) -> Schema {
    let mut schema = Schema::new();
    for field in dto.required {
        schema = schema.require(field);
    }
    for field in dto.numeric {
        schema = schema.typed(field, FieldType::Number);
    }
    for field in dto.boolean {
        schema = schema.typed(field, FieldType::Bool);
    }
    for (field, value) in dto.defaults {
        schema = schema.default_value(field, value);
    }
    if dto.strict {
        schema = schema.strict();
    }
    schema
}

fn decay_config_from_value(value: &Value) -> DecayConfig {
    let defaults = DecayConfig::default();
    let enabled = value.get("enabled").and_then(Value::as_bool).unwrap_or(defaults.enabled);
    let short_term_hours = value.get("short_term_hours").and_then(Value::as_f64).unwrap_or(defaults.short_term_hours);
    let long_term_hours = value.get("long_term_hours").and_then(Value::as_f64).unwrap_or(defaults.long_term_hours);
    let long_term_events = value
        .get("long_term_events")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or(defaults.long_term_events);
    DecayConfig { enabled, short_term_hours, long_term_hours, long_term_events }
}

fn compile_memory_writer(config: &NodeConfig, deps: &RuntimeDeps) -> CoreResult<Arc<dyn Node>> {
    let mut node = MemoryWriterNode::new(config.id.clone(), deps.store.clone());
    if let Some(decay_value) = config.extra_get("decay") {
        node = node.with_decay(decay_config_from_value(decay_value));
    }
    Ok(Arc::new(node) as Arc<dyn Node>)
}

fn compile_memory_reader(config: &NodeConfig, deps: &RuntimeDeps) -> CoreResult<Arc<dyn Node>> {
    let mut node = MemoryReaderNode::new(config.id.clone(), deps.store.clone());
    if let Some(embedder) = &deps.embedder {
        node = node.with_embedder(embedder.clone());
    }
    if let Some(limit) = config.extra_get("config").and_then(|c| c.get("limit")).and_then(Value::as_u64) {
        node = node.with_config(SearchConfig::with_limit(limit as usize));
    }
    Ok(Arc::new(node) as Arc<dyn Node>)
}

type BoxedNodeFuture<'a> = Pin<Box<dyn Future<Output = CoreResult<Arc<dyn Node>>> + Send + 'a>>;

/// Boxed because it is mutually recursive with [`Orchestrator::compile`]
/// (a `loop` node's `internal_workflow` compiles a nested orchestrator,
/// which compiles its own agents through this same function) — an
/// ordinary `async fn` cannot express that cycle without an unbounded
/// future type.
pub fn compile_node<'a>(config: &'a NodeConfig, deps: &'a RuntimeDeps) -> BoxedNodeFuture<'a> {
    Box::pin(async move {
        match config.node_type.as_str() {
            "echo" => Ok(Arc::new(EchoNode::new(config.id.clone())) as Arc<dyn Node>),
            "echo-uppercase" => Ok(Arc::new(EchoNode::uppercase(config.id.clone())) as Arc<dyn Node>),
            "failing" => {
                let reason = config
                    .extra_get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("configured to fail")
                    .to_string();
                Ok(Arc::new(FailingNode::new(config.id.clone(), reason)) as Arc<dyn Node>)
            }
            "router" => {
                let router_config: RouterConfig = serde_json::from_value(Value::Object(config.extra.clone()))?;
                Ok(Arc::new(RouterNode::new(config.id.clone(), router_config)) as Arc<dyn Node>)
            }
            "fork" => {
                let fork_config: ForkConfig = serde_json::from_value(Value::Object(config.extra.clone()))?;
                Ok(Arc::new(ForkNode::new(config.id.clone(), fork_config, deps.store.clone())) as Arc<dyn Node>)
            }
            "join" => {
                let join_config: JoinConfig = serde_json::from_value(Value::Object(config.extra.clone()))?;
                Ok(Arc::new(JoinNode::new(config.id.clone(), join_config, deps.store.clone())) as Arc<dyn Node>)
            }
            "failover" => {
                let child_configs = config.children();
                let mut children: Vec<Box<dyn Node>> = Vec::with_capacity(child_configs.len());
                for child_config in &child_configs {
                    let compiled = compile_node(child_config, deps).await?;
                    children.push(Box::new(ArcNode(compiled)));
                }
                Ok(Arc::new(FailoverNode::new(config.id.clone(), children)) as Arc<dyn Node>)
            }
            "loop" => {
                let loop_config: LoopConfig = serde_json::from_value(Value::Object(config.extra.clone()))?;
                let past_loops_metadata = loop_config.past_loops_metadata.clone();
                let internal = loop_config.internal_workflow.clone();
                let inner = Orchestrator::compile(&internal, deps)
                    .await
                    .map_err(|e| CoreError::Configuration(e.to_string()))?;
                let body: Box<dyn Node> = Box::new(WorkflowNode::new(format!("{}.body", config.id), inner, past_loops_metadata));
                let node = LoopNode::new(config.id.clone(), loop_config, body)
                    .with_presets((*deps.presets).clone())
                    .with_store(deps.store.clone());
                Ok(Arc::new(node) as Arc<dyn Node>)
            }
            "memory-writer" => compile_memory_writer(config, deps),
            "memory-reader" => compile_memory_reader(config, deps),
            // `memory` is the generic form seen in some configs; `mode`
            // picks which half of the reader/writer pair it compiles to.
            "memory" if config.extra_get("mode").and_then(Value::as_str) == Some("read") => compile_memory_reader(config, deps),
            "memory" => compile_memory_writer(config, deps),
            "llm-agent" | "agent" => {
                let llm = deps
                    .llm
                    .clone()
                    .ok_or_else(|| CoreError::ResourceUnavailable("no LLM client configured for this orchestrator".to_string()))?;
                let prompt_template = config.prompt.clone().unwrap_or_default();
                let mut node = LlmAgentNode::new(config.id.clone(), llm, prompt_template);
                if let Some(schema_value) = config.extra_get("schema") {
                    let dto: SchemaDto = serde_json::from_value(schema_value.clone()).unwrap_or_default();
                    node = node.with_schema(schema_from_dto(dto));
                }
                Ok(Arc::new(node) as Arc<dyn Node>)
            }
            other => Err(CoreError::UnsupportedNodeType(other.to_string())),
        }
    })
}
