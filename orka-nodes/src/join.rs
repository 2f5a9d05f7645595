//! Join control node (§4.4.3): consults the `ForkGroup` its `fork_group`
//! id names, marks whichever expected branches have already produced an
//! output in `previous_outputs`, and either merges the branch outputs
//! (when ready) or reports back a "not ready yet" partial so the
//! scheduler can cooperatively re-enqueue it — no thread blocks waiting
//! on siblings.

use std::sync::Arc;

use async_trait::async_trait;
use orka_core::config::{JoinConfig, JoinMode as ConfigJoinMode};
use orka_core::{ComponentType, Node, Output, RunContext};
use orka_memory::{ForkGroup, JoinMode, MemoryStore};

pub struct JoinNode {
    id: String,
    config: JoinConfig,
    store: Arc<dyn MemoryStore>,
}

impl JoinNode {
    pub fn new(id: impl Into<String>, config: JoinConfig, store: Arc<dyn MemoryStore>) -> Self {
        Self { id: id.into(), config, store }
    }
}

fn map_mode(mode: ConfigJoinMode) -> JoinMode {
    match mode {
        ConfigJoinMode::All => JoinMode::All,
        ConfigJoinMode::Any => JoinMode::Any,
    }
}

#[async_trait]
impl Node for JoinNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: RunContext) -> Output {
        let Some(group_id) = self.config.fork_group.clone() else {
            return Output::error(&self.id, ComponentType::Node, "join has no fork_group configured");
        };

        let Some(mut group) = self.store.get_fork_group(&group_id).await else {
            return Output::error(&self.id, ComponentType::Node, format!("unknown fork group {group_id}"));
        };

        for branch in group.expected.clone() {
            if ctx.get_output(&branch).is_some() {
                group.mark_completed(branch);
            }
        }

        let mode = map_mode(self.config.mode);
        if !group.is_ready(mode) {
            self.store.put_fork_group(group.clone()).await;
            return Output::partial(
                &self.id,
                ComponentType::Node,
                serde_json::json!({"waiting_on": group.expected.difference(&group.completed).collect::<Vec<_>>()}),
                "fork group not yet ready",
            );
        }

        let mut merged = serde_json::Map::new();
        for branch in &group.expected {
            if let Some(out) = ctx.get_output(branch) {
                merged.insert(branch.clone(), out.result.clone());
            }
        }

        self.store.delete_fork_group(&group_id).await;

        Output::success(&self.id, ComponentType::Node, serde_json::Value::Object(merged))
    }
}
