//! A node that always errors — used in workflow tests and as a Failover
//! branch that should never be the one selected.

use async_trait::async_trait;
use orka_core::{ComponentType, Node, Output, RunContext};

pub struct FailingNode {
    id: String,
    reason: String,
}

impl FailingNode {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { id: id.into(), reason: reason.into() }
    }
}

#[async_trait]
impl Node for FailingNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, _ctx: RunContext) -> Output {
        Output::error(&self.id, ComponentType::Node, self.reason.clone())
    }
}
