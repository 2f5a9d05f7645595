//! Router control node (§4.4.5): evaluates `conditions` against
//! `previous_outputs` and reports which successors to enqueue next. The
//! scheduler, not this node, does the enqueueing — `run` reports its
//! decision in `result.next` so the scheduler can read it uniformly with
//! every other node's output.

use async_trait::async_trait;
use orka_core::config::RouterConfig;
use orka_core::{ComponentType, Node, Output, RunContext};
use serde_json::Value;

pub struct RouterNode {
    id: String,
    config: RouterConfig,
}

impl RouterNode {
    pub fn new(id: impl Into<String>, config: RouterConfig) -> Self {
        Self { id: id.into(), config }
    }
}

fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

#[async_trait]
impl Node for RouterNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: RunContext) -> Output {
        let previous = serde_json::to_value(&ctx.previous_outputs).unwrap_or(Value::Null);

        for condition in &self.config.conditions {
            if let Some(value) = resolve_path(&previous, &condition.path) {
                if value == &condition.equals {
                    return Output::success(
                        &self.id,
                        ComponentType::Node,
                        serde_json::json!({"next": condition.then}),
                    );
                }
            }
        }

        Output::success(&self.id, ComponentType::Node, serde_json::json!({"next": self.config.default}))
    }
}
