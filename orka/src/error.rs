//! The orchestrator's top-level error type. Node failures never surface
//! here — they stay inside `Output` envelopes (§7 propagation policy).
//! `OrchestratorError` is reserved for compile-time configuration failures
//! and the handful of boundary operations (YAML parsing, file I/O) that
//! have no envelope to report through.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] orka_core::CoreError),

    #[error(transparent)]
    Memory(#[from] orka_memory::MemoryError),

    #[error(transparent)]
    Llm(#[from] orka_llm::LlmError),

    #[error("invalid workflow document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Run(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
