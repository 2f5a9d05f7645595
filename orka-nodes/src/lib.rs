//! Concrete node implementations for the OrKa workflow runtime: the
//! control-flow nodes (Router, Failover, Fork, Join, Loop, Failing) and
//! the two store-facing nodes (memory reader/writer), plus the
//! LLM-backed agent node and a trivial Echo node used in tests and
//! examples.

pub mod cognitive;
pub mod echo;
pub mod failing;
pub mod failover;
pub mod fork;
pub mod join;
pub mod llm_agent;
pub mod loop_node;
pub mod memory_node;
pub mod router;
pub mod score_extract;
pub mod validity;

pub use echo::EchoNode;
pub use failing::FailingNode;
pub use failover::FailoverNode;
pub use fork::ForkNode;
pub use join::JoinNode;
pub use llm_agent::LlmAgentNode;
pub use loop_node::LoopNode;
pub use memory_node::{MemoryReaderNode, MemoryWriterNode};
pub use router::RouterNode;
pub use validity::is_valid_result;
