//! Error type for the memory store. Per §7, store write failures are
//! logged and swallowed by callers — they never abort a run — so this
//! type exists mainly for the handful of operations (decay sweep,
//! explicit reads) that do want to distinguish failure modes.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("entry not found: {0}")]
    NotFound(String),
}
