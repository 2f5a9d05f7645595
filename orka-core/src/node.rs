use async_trait::async_trait;

use crate::context::RunContext;
use crate::output::Output;

/// The uniform contract every executable unit in a workflow implements
/// (§4.1): agents, tools, and control nodes alike. `run` never returns
/// `Err` for domain failures — those come back as an error-status
/// [`Output`]; the `Result` here only exists for truly unrecoverable
/// failures (e.g. a panic caught by the caller), and the scheduler still
/// treats even that as a node-level error rather than propagating it.
#[async_trait]
pub trait Node: Send + Sync {
    /// Stable identifier, matching the `id` this node was configured
    /// with. Used as the key in `previous_outputs` and in trace events.
    fn id(&self) -> &str;

    /// Execute once against `ctx`, returning an output envelope.
    async fn run(&self, ctx: RunContext) -> Output;

    /// Idempotent resource acquisition. The scheduler never calls this —
    /// nodes self-initialize on first `run`, typically by checking and
    /// setting an internal `AtomicBool`/`OnceCell`. Provided with a no-op
    /// default for nodes that hold no lazily-acquired state.
    async fn initialize(&self) {}

    /// Release any resources acquired by `initialize`. Not called by the
    /// scheduler during a run; available for callers tearing down a
    /// compiled workflow between runs.
    async fn cleanup(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ComponentType, Output};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Counting {
        id: String,
        initialized: AtomicBool,
    }

    #[async_trait]
    impl Node for Counting {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, _ctx: RunContext) -> Output {
            Output::success(&self.id, ComponentType::Node, serde_json::Value::Null)
        }

        async fn initialize(&self) {
            self.initialized.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn initialize_is_idempotent_to_call_twice() {
        let n = Counting {
            id: "n".into(),
            initialized: AtomicBool::new(false),
        };
        n.initialize().await;
        n.initialize().await;
        assert!(n.initialized.load(Ordering::SeqCst));
    }
}
