use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::output::Output;

/// One iteration's summary inside a [`RunContext::past_loops`] list. See
/// §4.4.4 (Loop) and §3's PastLoop entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PastLoop {
    pub loop_number: u32,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub insights: String,
    #[serde(default)]
    pub improvements: String,
    #[serde(default)]
    pub mistakes: String,
    /// Safe-serialized iteration result (blobs already replaced by refs
    /// if over threshold — see `orka::trace::dedupe`).
    pub result: Value,
}

/// Per-execution state threaded through every node invocation.
///
/// Cloned (cheaply — the bulk is behind `Arc`-free `Value`/`String` data
/// that the scheduler owns for the duration of one run) between steps;
/// nodes receive an owned copy via the payload they're invoked with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub input: Value,
    #[serde(default)]
    pub previous_outputs: HashMap<String, Output>,
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub past_loops: Vec<PastLoop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_prompt: Option<String>,
}

impl RunContext {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            previous_outputs: HashMap::new(),
            trace_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            loop_number: None,
            past_loops: Vec::new(),
            formatted_prompt: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Merge a node's output into `previous_outputs`, keyed by node id.
    /// Overwrites any prior entry for that id — invariant I-8.3: after
    /// step N, `previous_outputs[x]` is the most recent execution of `x`
    /// at or before N.
    pub fn merge_output(&mut self, node_id: impl Into<String>, output: Output) {
        self.previous_outputs.insert(node_id.into(), output);
    }

    pub fn get_output(&self, node_id: &str) -> Option<&Output> {
        self.previous_outputs.get(node_id)
    }

    /// Input as a string, for nodes/templates that expect text. Structured
    /// inputs are serialized to compact JSON rather than losing data.
    pub fn input_as_str(&self) -> String {
        match &self.input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Append a completed iteration, trimming to the last 20 entries —
    /// the in-run cap. The on-disk persistence path
    /// (`orka_memory::past_loops`) applies the same cap independently;
    /// see Open Question on `max_loops > 20` in `spec.md` §9.
    pub fn push_past_loop(&mut self, entry: PastLoop) {
        self.past_loops.push(entry);
        if self.past_loops.len() > 20 {
            let excess = self.past_loops.len() - 20;
            self.past_loops.drain(0..excess);
        }
    }
}
