//! LLM-backed agent node: renders a prompt template against the run
//! context, calls a completion client, and extracts/repairs/validates the
//! structured JSON result (§4.7).

use std::sync::Arc;

use async_trait::async_trait;
use orka_core::json_extract::{self, Schema};
use orka_core::template::render;
use orka_core::{ComponentType, Node, Output, RunContext};
use orka_llm::CompletionClient;

pub struct LlmAgentNode {
    id: String,
    client: Arc<dyn CompletionClient>,
    prompt_template: String,
    schema: Option<Schema>,
}

impl LlmAgentNode {
    pub fn new(id: impl Into<String>, client: Arc<dyn CompletionClient>, prompt_template: impl Into<String>) -> Self {
        Self { id: id.into(), client, prompt_template: prompt_template.into(), schema: None }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[async_trait]
impl Node for LlmAgentNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: RunContext) -> Output {
        let prompt = render(&self.prompt_template, &ctx);

        let raw = match self.client.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => return Output::error(&self.id, ComponentType::Agent, format!("completion failed: {e}")),
        };

        let outcome = match json_extract::parse_llm_json(&raw) {
            Ok(outcome) => outcome,
            Err(e) => {
                return Output::partial(
                    &self.id,
                    ComponentType::Agent,
                    json_extract::error_envelope(&e.to_string()),
                    e.to_string(),
                )
            }
        };

        let value = match &self.schema {
            Some(schema) => match json_extract::validate(outcome.value, schema) {
                Ok(v) => v,
                Err(e) => {
                    return Output::partial(
                        &self.id,
                        ComponentType::Agent,
                        json_extract::error_envelope(&e.to_string()),
                        e.to_string(),
                    )
                }
            },
            None => outcome.value,
        };

        Output::success(&self.id, ComponentType::Agent, value).with_metadata("repaired", serde_json::Value::Bool(outcome.repaired))
    }
}
