//! Failover control node (§4.4.6): tries each child in declared order,
//! the first whose output passes [`crate::validity::is_valid_result`]
//! wins.

use async_trait::async_trait;
use orka_core::{ComponentType, Node, Output, RunContext};

use crate::validity::is_valid_result;

pub struct FailoverNode {
    id: String,
    children: Vec<Box<dyn Node>>,
}

impl FailoverNode {
    pub fn new(id: impl Into<String>, children: Vec<Box<dyn Node>>) -> Self {
        Self { id: id.into(), children }
    }
}

#[async_trait]
impl Node for FailoverNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: RunContext) -> Output {
        let mut attempts = Vec::new();

        for child in &self.children {
            let output = child.run(ctx.clone()).await;
            if is_valid_result(&output) {
                let mut out = Output::success(&self.id, ComponentType::Node, output.result.clone());
                out = out.with_metadata("successful_child", serde_json::Value::String(child.id().to_string()));
                return out;
            }
            attempts.push(format!("{}: {}", child.id(), output.error.clone().unwrap_or_else(|| "invalid result".to_string())));
        }

        Output::error(
            &self.id,
            ComponentType::Node,
            format!("all children failed: [{}]", attempts.join("; ")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    struct FailAlways(&'static str);

    #[async_trait]
    impl Node for FailAlways {
        fn id(&self) -> &str {
            self.0
        }
        async fn run(&self, _ctx: RunContext) -> Output {
            Output::error(self.0, ComponentType::Agent, "always fails")
        }
    }

    struct AlwaysOk(&'static str);

    #[async_trait]
    impl Node for AlwaysOk {
        fn id(&self) -> &str {
            self.0
        }
        async fn run(&self, _ctx: RunContext) -> Output {
            Output::success(self.0, ComponentType::Agent, Value::String("fine".to_string()))
        }
    }

    #[tokio::test]
    async fn falls_through_to_first_valid_child() {
        let node = FailoverNode::new(
            "fo",
            vec![Box::new(FailAlways("fail_always")), Box::new(AlwaysOk("always_ok"))],
        );
        let ctx = RunContext::new(Value::Null);
        let out = node.run(ctx).await;
        assert_eq!(out.status, orka_core::Status::Success);
        assert_eq!(out.result, Value::String("fine".to_string()));
        assert_eq!(
            out.metadata.get("successful_child"),
            Some(&Value::String("always_ok".to_string()))
        );
    }

    #[tokio::test]
    async fn all_children_failing_produces_error() {
        let node = FailoverNode::new("fo", vec![Box::new(FailAlways("a")), Box::new(FailAlways("b"))]);
        let ctx = RunContext::new(Value::Null);
        let out = node.run(ctx).await;
        assert_eq!(out.status, orka_core::Status::Error);
    }
}
