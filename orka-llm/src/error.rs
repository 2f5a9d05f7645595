//! Error type for LLM completion and embedding clients.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned an error response: {0}")]
    Provider(String),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Mirrors the retry-eligibility taxonomy the orchestrator's Failover
    /// node uses for transient-looking errors: network failures, 5xx
    /// responses, and timeouts are worth retrying; malformed config and
    /// malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Http(_) | LlmError::Timeout(_))
            || matches!(self, LlmError::Provider(msg) if msg.contains("rate limit") || msg.contains("503"))
    }
}
