//! Fork control node (§4.4.3): creates a group id, registers the expected
//! branch set in the memory store under `forkgroup:<group_id>`, and
//! reports the branch start ids for the scheduler to enqueue. Branch
//! concurrency itself is the scheduler's job (§5) — this node only
//! establishes the coordination record Join will consult.
//!
//! The group id is the fork node's own id, not a freshly minted one:
//! `JoinConfig.fork_group` is a static string fixed at compile time
//! (§4.4 `orka_core::config::JoinConfig`), so the group a Join looks up
//! has to be known before the workflow ever runs. A per-run UUID would
//! leave every compiled Join pointing at a group that never exists.

use std::sync::Arc;

use async_trait::async_trait;
use orka_core::config::{ForkConfig, ForkMode};
use orka_core::{ComponentType, Node, Output, RunContext};
use orka_memory::{ForkGroup, MemoryStore};

pub struct ForkNode {
    id: String,
    config: ForkConfig,
    store: Arc<dyn MemoryStore>,
}

impl ForkNode {
    pub fn new(id: impl Into<String>, config: ForkConfig, store: Arc<dyn MemoryStore>) -> Self {
        Self { id: id.into(), config, store }
    }
}

#[async_trait]
impl Node for ForkNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, _ctx: RunContext) -> Output {
        let group_id = self.id.clone();
        let branch_starts: Vec<String> = self.config.targets.iter().filter_map(|t| t.first().cloned()).collect();

        let group = ForkGroup::new(group_id.clone(), branch_starts.clone());
        self.store.put_fork_group(group).await;

        Output::success(
            &self.id,
            ComponentType::Node,
            serde_json::json!({
                "group_id": group_id,
                "branches": self.config.targets,
                "mode": matches!(self.config.mode, ForkMode::Sequential).then_some("sequential").unwrap_or("parallel"),
            }),
        )
        .with_metadata("group_id", serde_json::Value::String(group_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orka_memory::InMemoryStore;
    use serde_json::Value;

    #[tokio::test]
    async fn registers_fork_group_with_expected_branches() {
        let store = InMemoryStore::new();
        let config = ForkConfig {
            targets: vec![vec!["b1".to_string()], vec!["b2".to_string()]],
            mode: ForkMode::Parallel,
        };
        let node = ForkNode::new("f1", config, store.clone());
        let out = node.run(RunContext::new(Value::Null)).await;

        let group_id = out.metadata.get("group_id").unwrap().as_str().unwrap().to_string();
        let group = store.get_fork_group(&group_id).await.unwrap();
        assert_eq!(group.expected.len(), 2);
    }
}
