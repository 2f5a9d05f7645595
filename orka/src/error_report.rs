//! Assembles the error report the wrapping layer persists when a run
//! finishes with anything other than a clean `completed` status (§7
//! "the wrapping layer raises to the caller only when it itself cannot
//! persist a report"). The shape matches §6's "Error report" exactly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use orka_memory::search::entry_as_value;
use orka_memory::MemoryStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scheduler::{ExecutionStatus, RunOutcome, StepError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub total_entries: usize,
    pub last_10_entries: Vec<Value>,
    pub backend_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_agents_executed: usize,
    pub total_errors: usize,
    pub total_retries: u32,
    pub execution_status: ExecutionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub run_id: String,
    pub execution_status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub errors: Vec<StepError>,
    pub silent_degradations: Vec<Value>,
    /// The orchestrator itself never retries (§7 "the orchestrator
    /// itself does not retry") — a Failover trying an alternate child is
    /// the only retry-shaped behavior in this runtime, and it isn't
    /// counted here since it never surfaces as a step error. Kept empty
    /// for shape fidelity with callers that expect the key to exist.
    pub retry_counters: HashMap<String, u32>,
    pub critical_failures: Vec<StepError>,
    pub memory_snapshot: MemorySnapshot,
    pub execution_summary: ExecutionSummary,
}

/// A step whose output carries `metadata.repaired == true` is the
/// "silent degradation" case from §7: JSON repaired from malformed text,
/// recorded in telemetry without failing the step.
fn silent_degradations(outcome: &RunOutcome) -> Vec<Value> {
    outcome
        .logs
        .iter()
        .filter(|log| log.payload.metadata.get("repaired") == Some(&Value::Bool(true)))
        .map(|log| {
            serde_json::json!({
                "agent_id": log.agent_id,
                "step": log.step_index,
                "timestamp": log.timestamp,
            })
        })
        .collect()
}

pub async fn build_error_report(outcome: &RunOutcome, store: &dyn MemoryStore, backend_type: impl Into<String>) -> ErrorReport {
    let mut entries = store.all_entries().await;
    entries.sort_by_key(|e| e.timestamp_ms);
    let last_10_entries: Vec<Value> = entries.iter().rev().take(10).map(entry_as_value).collect();

    ErrorReport {
        run_id: outcome.run_id.clone(),
        execution_status: outcome.execution_status,
        started_at: outcome.started_at,
        finished_at: outcome.finished_at,
        errors: outcome.errors.clone(),
        silent_degradations: silent_degradations(outcome),
        retry_counters: HashMap::new(),
        critical_failures: outcome.critical_failures.clone(),
        memory_snapshot: MemorySnapshot { total_entries: entries.len(), last_10_entries, backend_type: backend_type.into() },
        execution_summary: ExecutionSummary {
            total_agents_executed: outcome.logs.len(),
            total_errors: outcome.errors.len(),
            total_retries: 0,
            execution_status: outcome.execution_status,
        },
    }
}
