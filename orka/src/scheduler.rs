//! The orchestrator's compile/run pair (§4.4.1, §4.4.2): turns a
//! [`WorkflowDocument`] into a graph of live nodes, then walks a FIFO
//! queue of node ids, rendering each step's prompt, invoking the node
//! under a per-step timeout, and deciding the next ids to enqueue from
//! the node's own output (a router's `next`, a fork's branch starts, a
//! join's "not ready" back-off) or, failing that, its static `queue`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orka_core::config::{NodeConfig, WorkflowDocument};
use orka_core::{CoreError, ComponentType, ConcurrencyManager, Node, Output, RunContext, Status};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::graph::{compile_node, RuntimeDeps};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub step_index: u32,
    pub agent_id: String,
    pub payload: Output,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub traceback: String,
}

/// One entry of an error report's `errors`/`critical_failures` lists
/// (§6 "Error report").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    #[serde(rename = "type")]
    pub kind: String,
    pub agent_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_action: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub logs: Vec<LogEntry>,
    pub previous_outputs: HashMap<String, Output>,
    pub errors: Vec<StepError>,
    pub critical_failures: Vec<StepError>,
    pub execution_status: ExecutionStatus,
}

/// A compiled, runnable workflow. Nodes are instantiated once at compile
/// time (§4.9 "Instantiate each node once") and addressed purely by id
/// thereafter — the scheduler never holds a direct reference cycle, only
/// a `HashMap<String, Arc<dyn Node>>`.
pub struct Orchestrator {
    id: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    configs: HashMap<String, NodeConfig>,
    start_queue: Vec<String>,
    concurrency: ConcurrencyManager,
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

impl Orchestrator {
    pub async fn compile(doc: &WorkflowDocument, deps: &RuntimeDeps) -> Result<Self> {
        if doc.orchestrator.agents.is_empty() {
            return Err(OrchestratorError::Core(CoreError::Configuration(
                "orchestrator.agents lists no agents".to_string(),
            )));
        }

        let mut nodes = HashMap::with_capacity(doc.agents.len());
        let mut configs = HashMap::with_capacity(doc.agents.len());
        for config in &doc.agents {
            let compiled = compile_node(config, deps).await?;
            nodes.insert(config.id.clone(), compiled);
            configs.insert(config.id.clone(), config.clone());
        }

        for declared in &doc.orchestrator.agents {
            if !nodes.contains_key(declared) {
                return Err(OrchestratorError::Core(CoreError::UnknownNode(declared.clone())));
            }
        }

        let start_queue = vec![doc
            .orchestrator
            .start_node
            .clone()
            .unwrap_or_else(|| doc.orchestrator.agents[0].clone())];

        Ok(Self {
            id: doc.orchestrator.id.clone(),
            nodes,
            configs,
            start_queue,
            concurrency: ConcurrencyManager::new(default_concurrency()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Runs the workflow to completion (§4.4.2). Never returns `Err` —
    /// every failure mode the scheduler itself can produce (unknown
    /// node, node error, timeout) is folded into the returned
    /// [`RunOutcome`] per §7's propagation policy: "the scheduler does
    /// not raise to the caller."
    pub async fn run(&self, input: Value) -> RunOutcome {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let mut ctx = RunContext::new(input).with_trace_id(run_id.clone());
        let mut queue: VecDeque<String> = self.start_queue.iter().cloned().collect();
        let mut logs = Vec::new();
        let mut errors = Vec::new();
        let mut critical_failures = Vec::new();
        let mut step_index: u32 = 0;

        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get(&id) else {
                critical_failures.push(StepError {
                    kind: "unknown_node".to_string(),
                    agent_id: id.clone(),
                    message: format!("queue referenced unconfigured node '{id}'"),
                    exception: None,
                    status_code: None,
                    recovery_action: None,
                    timestamp: Utc::now(),
                });
                step_index += 1;
                continue;
            };

            let config = self.configs.get(&id);
            ctx.formatted_prompt = config
                .and_then(|c| c.prompt.as_deref())
                .map(|prompt| orka_core::template::render(prompt, &ctx));

            let timeout_secs = config.map(|c| c.timeout_secs).unwrap_or(30);
            let timeout = Duration::from_secs(timeout_secs);

            let node = node.clone();
            let step_ctx = ctx.clone();
            let invocation = self
                .concurrency
                .run_with_timeout(async move { node.run(step_ctx).await }, Some(timeout))
                .await;

            let output = match invocation {
                Ok(output) => output,
                Err(_) => Output::error(&id, ComponentType::Node, format!("step '{id}' timed out after {timeout_secs}s")),
            };

            if output.status == Status::Error {
                errors.push(StepError {
                    kind: "node_error".to_string(),
                    agent_id: id.clone(),
                    message: output.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                    exception: None,
                    status_code: None,
                    recovery_action: None,
                    timestamp: Utc::now(),
                });
            }

            logs.push(LogEntry { step_index, agent_id: id.clone(), payload: output.clone(), timestamp: Utc::now() });
            ctx.merge_output(id.clone(), output.clone());
            step_index += 1;

            enqueue_successors(&id, config, &output, &mut queue);
        }

        let execution_status = if !critical_failures.is_empty() {
            ExecutionStatus::Failed
        } else if errors.is_empty() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Partial
        };

        RunOutcome {
            run_id,
            started_at,
            finished_at: Utc::now(),
            logs,
            previous_outputs: ctx.previous_outputs,
            errors,
            critical_failures,
            execution_status,
        }
    }
}

fn enqueue_successors(id: &str, config: Option<&NodeConfig>, output: &Output, queue: &mut VecDeque<String>) {
    let node_type = config.map(|c| c.node_type.as_str()).unwrap_or("");
    match node_type {
        "fork" => {
            if let Some(branches) = output.result.get("branches").and_then(Value::as_array) {
                for branch in branches {
                    if let Some(first) = branch.as_array().and_then(|list| list.first()).and_then(Value::as_str) {
                        queue.push_back(first.to_string());
                    }
                }
            }
        }
        // The join hasn't seen every expected branch yet; re-enqueuing
        // itself is the scheduler's cooperative back-off (§5 "the join's
        // back-off re-enqueue") — no thread blocks waiting on siblings.
        "join" if output.status == Status::Partial => queue.push_back(id.to_string()),
        _ => {
            if let Some(next) = output.result.get("next").and_then(Value::as_array) {
                for successor in next {
                    if let Some(s) = successor.as_str() {
                        queue.push_back(s.to_string());
                    }
                }
            } else if let Some(config) = config {
                for successor in config.queue.as_vec() {
                    queue.push_back(successor);
                }
            }
        }
    }
}

/// Adapts a nested [`Orchestrator`] into a `Box<dyn Node>` so it can sit
/// in a `loop` node's `body` slot unchanged — `LoopNode` knows nothing
/// about `internal_workflow`, only that its body is a `Node`.
pub struct WorkflowNode {
    id: String,
    inner: Orchestrator,
    past_loops_metadata: Option<serde_json::Map<String, Value>>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, inner: Orchestrator, past_loops_metadata: Option<serde_json::Map<String, Value>>) -> Self {
        Self { id: id.into(), inner, past_loops_metadata }
    }

    /// Renders `past_loops_metadata`'s string-valued entries as templates
    /// against the incoming context and merges them into the nested
    /// workflow's input object, so the body can see loop history that
    /// `Orchestrator::run`'s plain `Value` input otherwise wouldn't carry.
    fn build_input(&self, ctx: &RunContext) -> Value {
        let mut input = ctx.input.clone();
        let Some(template) = &self.past_loops_metadata else {
            return input;
        };
        let Value::Object(map) = &mut input else {
            return input;
        };
        for (key, value) in template {
            let rendered = match value {
                Value::String(s) => Value::String(orka_core::template::render(s, ctx)),
                other => other.clone(),
            };
            map.insert(key.clone(), rendered);
        }
        input
    }
}

#[async_trait]
impl Node for WorkflowNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: RunContext) -> Output {
        let input = self.build_input(&ctx);
        let outcome = self.inner.run(input).await;
        let result = serde_json::to_value(&outcome.previous_outputs).unwrap_or(Value::Null);
        if outcome.execution_status == ExecutionStatus::Completed {
            Output::success(&self.id, ComponentType::Node, result)
        } else {
            Output::partial(
                &self.id,
                ComponentType::Node,
                result,
                format!("internal workflow '{}' finished with {} step error(s)", self.inner.id(), outcome.errors.len()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orka_core::config::{OrchestratorSection, Queue};
    use orka_memory::InMemoryStore;

    fn echo_config(id: &str, queue: Queue) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            node_type: "echo".to_string(),
            prompt: None,
            queue,
            timeout_secs: 30,
            extra: serde_json::Map::new(),
        }
    }

    fn doc(agents: Vec<NodeConfig>, start: Option<&str>) -> WorkflowDocument {
        WorkflowDocument {
            orchestrator: OrchestratorSection {
                id: "test".to_string(),
                strategy: "sequential".to_string(),
                agents: agents.iter().map(|a| a.id.clone()).collect(),
                start_node: start.map(str::to_string),
                memory: None,
            },
            agents,
        }
    }

    #[tokio::test]
    async fn linear_workflow_runs_to_completion() {
        let agents = vec![echo_config("a", Queue::One("b".to_string())), echo_config("b", Queue::Empty)];
        let document = doc(agents, None);
        let deps = RuntimeDeps::new(InMemoryStore::new());
        let orchestrator = Orchestrator::compile(&document, &deps).await.unwrap();

        let outcome = orchestrator.run(Value::String("hello".to_string())).await;
        assert_eq!(outcome.logs.len(), 2);
        assert_eq!(outcome.execution_status, ExecutionStatus::Completed);
        assert_eq!(outcome.previous_outputs["b"].result, Value::String("hello".to_string()));
    }

    #[tokio::test]
    async fn unknown_queue_target_is_a_critical_failure() {
        let agents = vec![echo_config("a", Queue::One("missing".to_string()))];
        let document = doc(agents, None);
        let deps = RuntimeDeps::new(InMemoryStore::new());
        let orchestrator = Orchestrator::compile(&document, &deps).await.unwrap();

        let outcome = orchestrator.run(Value::Null).await;
        assert_eq!(outcome.execution_status, ExecutionStatus::Failed);
        assert_eq!(outcome.critical_failures.len(), 1);
    }

    #[tokio::test]
    async fn compile_rejects_dangling_orchestrator_agent_reference() {
        let agents = vec![echo_config("a", Queue::Empty)];
        let mut document = doc(agents, None);
        document.orchestrator.agents.push("ghost".to_string());
        let deps = RuntimeDeps::new(InMemoryStore::new());
        assert!(Orchestrator::compile(&document, &deps).await.is_err());
    }

    fn extra_from(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn fork_config(id: &str, branches: &[&str]) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            node_type: "fork".to_string(),
            prompt: None,
            queue: Queue::Empty,
            timeout_secs: 30,
            extra: extra_from(serde_json::json!({
                "targets": branches.iter().map(|b| vec![b.to_string()]).collect::<Vec<_>>(),
                "mode": "parallel",
            })),
        }
    }

    fn join_config(id: &str, fork_group: &str) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            node_type: "join".to_string(),
            prompt: None,
            queue: Queue::Empty,
            timeout_secs: 30,
            extra: extra_from(serde_json::json!({"fork_group": fork_group, "mode": "all"})),
        }
    }

    /// §8: "Join completes iff every expected branch reported", exercised
    /// through a compiled document rather than a hand-built `ForkGroup` —
    /// this is the path that broke when the fork's group id and the
    /// join's static `fork_group` didn't agree.
    #[tokio::test]
    async fn fork_and_join_wire_through_a_compiled_document() {
        let agents = vec![
            fork_config("fork1", &["b1", "b2"]),
            echo_config("b1", Queue::One("join1".to_string())),
            echo_config("b2", Queue::One("join1".to_string())),
            join_config("join1", "fork1"),
        ];
        let document = doc(agents, Some("fork1"));
        let deps = RuntimeDeps::new(InMemoryStore::new());
        let orchestrator = Orchestrator::compile(&document, &deps).await.unwrap();

        let outcome = orchestrator.run(Value::String("payload".to_string())).await;
        assert_eq!(outcome.execution_status, ExecutionStatus::Completed);
        assert!(outcome.critical_failures.is_empty());

        let join_output = outcome.logs.iter().rev().find(|log| log.agent_id == "join1").unwrap();
        assert_eq!(join_output.payload.status, Status::Success);
        assert_eq!(join_output.payload.result["b1"], Value::String("payload".to_string()));
        assert_eq!(join_output.payload.result["b2"], Value::String("payload".to_string()));
    }

    /// Same property, checked directly against the nodes `graph::compile_node`
    /// produces: a join with only one of two expected branches reported
    /// stays partial, and only completes once both have.
    #[tokio::test]
    async fn compiled_join_stays_partial_until_every_branch_reports() {
        let store = InMemoryStore::new();
        let deps = RuntimeDeps::new(store.clone());
        let fork = compile_node(&fork_config("fork1", &["b1", "b2"]), &deps).await.unwrap();
        let join = compile_node(&join_config("join1", "fork1"), &deps).await.unwrap();

        fork.run(RunContext::new(Value::Null)).await;

        let mut ctx = RunContext::new(Value::Null);
        ctx.merge_output("b1", Output::success("b1", ComponentType::Node, Value::from(1)));
        let partial = join.run(ctx.clone()).await;
        assert_eq!(partial.status, Status::Partial);

        ctx.merge_output("b2", Output::success("b2", ComponentType::Node, Value::from(2)));
        let complete = join.run(ctx).await;
        assert_eq!(complete.status, Status::Success);
        assert_eq!(complete.result["b1"], Value::from(1));
        assert_eq!(complete.result["b2"], Value::from(2));
    }
}
