//! Error types shared by every OrKa crate.
//!
//! Node implementations never let these escape to the scheduler — they are
//! caught at the node boundary (see [`crate::node::Node::run`]) and turned
//! into an error-status [`crate::output::Output`] envelope. `CoreError`
//! exists for the handful of places that *do* need to fail loudly: graph
//! compilation, template rendering bugs that should never happen, and the
//! scoring engine's configuration validation.

use thiserror::Error;

/// Convenience alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by orka-core's primitives.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A node configuration referenced an unsupported `type`.
    #[error("unsupported node type: {0}")]
    UnsupportedNodeType(String),

    /// A node id was referenced that does not exist in the compiled graph.
    #[error("unknown node id: {0}")]
    UnknownNode(String),

    /// Workflow configuration failed basic structural validation.
    #[error("invalid workflow configuration: {0}")]
    Configuration(String),

    /// A registry resource was requested that was never registered, or
    /// failed lazy initialization.
    #[error("resource not available: {0}")]
    ResourceUnavailable(String),

    /// JSON extraction/repair could not produce a value and no default
    /// was supplied, while the caller required strict parsing.
    #[error("json_parse_failed: {0}")]
    JsonParseFailed(String),

    /// A scoring preset's weights did not sum to 1.0 (within tolerance)
    /// for some `(context, severity)` pair, or thresholds were inverted.
    #[error("invalid scoring preset {context}/{severity}: {reason}")]
    InvalidPreset {
        context: String,
        severity: String,
        reason: String,
    },

    /// An operation was cancelled because it exceeded its timeout.
    #[error("operation '{operation}' timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
