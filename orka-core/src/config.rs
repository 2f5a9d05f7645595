//! Declarative workflow configuration — the shape a YAML document (or any
//! other loader) is deserialized into before the scheduler compiles it
//! into a live graph (§4.4.1).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A successor list: YAML may write a single id or a list; both
/// deserialize into `Vec<String>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Queue {
    #[default]
    Empty,
    One(String),
    Many(Vec<String>),
}

impl Queue {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            Queue::Empty => Vec::new(),
            Queue::One(s) => vec![s.clone()],
            Queue::Many(v) => v.clone(),
        }
    }
}

/// Top-level document: `{orchestrator: {...}, agents: [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub orchestrator: OrchestratorSection,
    pub agents: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSection {
    pub id: String,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    pub agents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemorySection>,
}

fn default_strategy() -> String {
    "sequential".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySection {
    #[serde(default)]
    pub config: serde_json::Map<String, Value>,
}

/// One agent/node declaration. `extra` absorbs every type-specific field
/// (`max_loops`, `conditions`, `children`, memory config, …) so this
/// struct can deserialize *any* node type without a giant enum of
/// optional fields; individual node constructors pull what they need out
/// of `extra` by key, the same pattern the original `AgentFactory`
/// followed (pop id/type/prompt/queue, pass the rest through).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub queue: Queue,
    /// Per-invocation timeout; defaults to 30s per §4.4.2 step 4.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl NodeConfig {
    pub fn extra_get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn children(&self) -> Vec<NodeConfig> {
        self.extra_get("children")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn internal_workflow(&self) -> Option<WorkflowDocument> {
        self.extra_get("internal_workflow")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// `router` node's `conditions`: an opaque predicate surface (spec.md §9
/// Open Questions — "treat as a pluggable predicate surface"). Each
/// condition names the successors to enqueue when `when` matches a
/// simple key/equality test against `previous_outputs`; richer predicate
/// languages are expected to be supplied by callers that construct
/// `RouterConfig` programmatically rather than via this default parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterCondition {
    /// Dotted path into `previous_outputs`, e.g. `"classifier.result"`.
    pub path: String,
    /// Value the resolved path must equal (as JSON) for this branch to fire.
    pub equals: Value,
    pub then: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RouterConfig {
    #[serde(default)]
    pub conditions: Vec<RouterCondition>,
    /// Successors to take when no condition matched.
    #[serde(default)]
    pub default: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForkMode {
    #[default]
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkConfig {
    pub targets: Vec<Vec<String>>,
    #[serde(default)]
    pub mode: ForkMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JoinConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fork_group: Option<String>,
    #[serde(default)]
    pub mode: JoinMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreStrategy {
    DirectKey { key: String },
    AgentKey { agent: String, key: String },
    NestedPath { path: Vec<String> },
    Pattern { patterns: Vec<String> },
    /// Boolean-criterion scoring via the scoring engine preset.
    BooleanPreset { preset: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScoreExtractionConfig {
    #[serde(default)]
    pub strategies: Vec<ScoreStrategy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveExtractionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub extract_patterns: HashMap<String, Vec<String>>,
    #[serde(default = "default_max_length_per_category")]
    pub max_length_per_category: usize,
}

fn default_max_length_per_category() -> usize {
    500
}

impl Default for CognitiveExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            extract_patterns: HashMap::new(),
            max_length_per_category: default_max_length_per_category(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_max_loops")]
    pub max_loops: u32,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    #[serde(default)]
    pub score_extraction_config: ScoreExtractionConfig,
    pub internal_workflow: WorkflowDocument,
    #[serde(default)]
    pub cognitive_extraction: CognitiveExtractionConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub past_loops_metadata: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub persist_across_runs: bool,
}

fn default_max_loops() -> u32 {
    5
}

fn default_score_threshold() -> f64 {
    0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_scalar_and_list_both_parse() {
        let q: Queue = serde_json::from_value(Value::String("b".into())).unwrap();
        assert_eq!(q.as_vec(), vec!["b".to_string()]);
        let q: Queue = serde_json::from_value(serde_json::json!(["b", "c"])).unwrap();
        assert_eq!(q.as_vec(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn node_config_defaults_timeout() {
        let cfg: NodeConfig = serde_json::from_value(serde_json::json!({
            "id": "a", "type": "echo"
        }))
        .unwrap();
        assert_eq!(cfg.timeout_secs, 30);
    }
}
