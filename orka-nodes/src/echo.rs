//! A trivial agent: returns its rendered prompt (or the raw input if it
//! has none) verbatim. Used in end-to-end scenarios and as the default
//! stand-in where a real agent isn't under test.

use async_trait::async_trait;
use orka_core::{ComponentType, Node, Output, RunContext};

pub struct EchoNode {
    id: String,
    uppercase: bool,
}

impl EchoNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uppercase: false,
        }
    }

    pub fn uppercase(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uppercase: true,
        }
    }
}

#[async_trait]
impl Node for EchoNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: RunContext) -> Output {
        let text = ctx.formatted_prompt.clone().unwrap_or_else(|| ctx.input_as_str());
        let text = if self.uppercase { text.to_uppercase() } else { text };
        Output::success(&self.id, ComponentType::Agent, serde_json::Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn echoes_input_when_no_prompt_rendered() {
        let node = EchoNode::new("a");
        let ctx = RunContext::new(Value::String("hello".into()));
        let out = node.run(ctx).await;
        assert_eq!(out.result, Value::String("hello".to_string()));
    }

    #[tokio::test]
    async fn uppercase_variant_transforms_text() {
        let node = EchoNode::uppercase("b");
        let ctx = RunContext::new(Value::String("hello".into()));
        let out = node.run(ctx).await;
        assert_eq!(out.result, Value::String("HELLO".to_string()));
    }
}
