use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a node's execution, carried on every [`Output`] envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
    Partial,
}

/// What kind of component produced an [`Output`] — used by the trace
/// writer and the TUI (external) to render the right icon/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Agent,
    Node,
    Tool,
}

/// Uniform output shape returned by every executable unit in a workflow.
///
/// `status == Success` implies `error` is `None`; `status == Error` implies
/// `error` is `Some`. Constructors enforce this; there is no public way to
/// build an invariant-violating `Output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub result: Value,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub component_id: String,
    pub component_type: ComponentType,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metrics: serde_json::Map<String, Value>,
}

impl Output {
    pub fn success(
        component_id: impl Into<String>,
        component_type: ComponentType,
        result: Value,
    ) -> Self {
        Self {
            result,
            status: Status::Success,
            error: None,
            component_id: component_id.into(),
            component_type,
            timestamp: Utc::now(),
            execution_time_ms: None,
            metadata: serde_json::Map::new(),
            metrics: serde_json::Map::new(),
        }
    }

    pub fn error(
        component_id: impl Into<String>,
        component_type: ComponentType,
        error: impl Into<String>,
    ) -> Self {
        Self {
            result: Value::Null,
            status: Status::Error,
            error: Some(error.into()),
            component_id: component_id.into(),
            component_type,
            timestamp: Utc::now(),
            execution_time_ms: None,
            metadata: serde_json::Map::new(),
            metrics: serde_json::Map::new(),
        }
    }

    pub fn partial(
        component_id: impl Into<String>,
        component_type: ComponentType,
        result: Value,
        error: impl Into<String>,
    ) -> Self {
        Self {
            result,
            status: Status::Partial,
            error: Some(error.into()),
            component_id: component_id.into(),
            component_type,
            timestamp: Utc::now(),
            execution_time_ms: None,
            metadata: serde_json::Map::new(),
            metrics: serde_json::Map::new(),
        }
    }

    pub fn with_execution_time_ms(mut self, ms: u64) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Structural half of the Failover validity check (§4.4.6): not an
    /// error status, and a non-null result. The string-heuristic half
    /// (empty/"NONE"/error-token matching) lives in `orka-nodes`, which
    /// has the concrete text to inspect.
    pub fn is_structurally_ok(&self) -> bool {
        self.status != Status::Error && !self.result.is_null()
    }
}
