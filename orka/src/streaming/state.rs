//! Streaming session state (§4.5 "StreamingState"): an immutable
//! invariants block plus a mutable part, advanced only through
//! `apply_patch`. Last-write-wins by `timestamp_ms`; ties are broken
//! deterministically by source id then arrival order, per §9's open
//! question ("pick a stable secondary tiebreaker... and document it").

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Fields fixed at session creation; §8 requires these "never change
/// after session creation."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingInvariants {
    pub session_id: String,
    pub created_at_ms: i64,
    pub owner: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamingMutable {
    pub history: Vec<String>,
    pub intent: String,
    pub fields: Map<String, Value>,
    pub satellite_summaries: Map<String, Value>,
}

/// One inbound mutation. `touches_invariants` lets a caller flag a patch
/// that (incorrectly) targets an invariant field without this module
/// needing to know the invariant schema.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub timestamp_ms: i64,
    pub source: String,
    pub set_intent: Option<String>,
    pub append_history: Option<String>,
    pub set_fields: Map<String, Value>,
    pub touches_invariants: bool,
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch targets an invariant field")]
    InvariantViolation,
    #[error("patch superseded by a later write (timestamp_ms={0})")]
    Stale(i64),
}

pub struct StreamingState {
    invariants: StreamingInvariants,
    mutable: StreamingMutable,
    version: u64,
    last_patch_key: (i64, String, u64),
    insertion_seq: u64,
}

impl StreamingState {
    pub fn new(invariants: StreamingInvariants) -> Self {
        Self {
            invariants,
            mutable: StreamingMutable::default(),
            version: 0,
            last_patch_key: (i64::MIN, String::new(), 0),
            insertion_seq: 0,
        }
    }

    pub fn invariants(&self) -> &StreamingInvariants {
        &self.invariants
    }

    pub fn mutable(&self) -> &StreamingMutable {
        &self.mutable
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn apply_patch(&mut self, patch: StatePatch) -> Result<u64, PatchError> {
        if patch.touches_invariants {
            return Err(PatchError::InvariantViolation);
        }

        let seq = self.insertion_seq;
        self.insertion_seq += 1;
        let key = (patch.timestamp_ms, patch.source.clone(), seq);
        if key <= self.last_patch_key {
            return Err(PatchError::Stale(patch.timestamp_ms));
        }
        self.last_patch_key = key;

        if let Some(intent) = patch.set_intent {
            self.mutable.intent = intent;
        }
        if let Some(line) = patch.append_history {
            self.mutable.history.push(line);
        }
        for (key, value) in patch.set_fields {
            self.mutable.fields.insert(key, value);
        }

        self.version += 1;
        Ok(self.version)
    }

    /// Records a satellite's output directly — this is the runtime's own
    /// write after a successful satellite call, not a remote patch, so
    /// it bypasses the last-write-wins race entirely.
    pub fn set_satellite_summary(&mut self, role: &str, summary: Value) {
        self.mutable.satellite_summaries.insert(role.to_string(), summary);
        self.version += 1;
    }

    pub fn has_content(&self) -> bool {
        !self.mutable.intent.is_empty() || !self.mutable.history.is_empty() || !self.mutable.satellite_summaries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invariants() -> StreamingInvariants {
        StreamingInvariants { session_id: "s1".to_string(), created_at_ms: 0, owner: "u1".to_string() }
    }

    #[test]
    fn later_timestamp_wins_over_earlier() {
        let mut state = StreamingState::new(invariants());
        state
            .apply_patch(StatePatch { timestamp_ms: 10, source: "a".to_string(), set_intent: Some("first".to_string()), ..Default::default() })
            .unwrap();
        state
            .apply_patch(StatePatch { timestamp_ms: 20, source: "b".to_string(), set_intent: Some("second".to_string()), ..Default::default() })
            .unwrap();
        assert_eq!(state.mutable().intent, "second");
    }

    #[test]
    fn older_timestamp_is_rejected_as_stale() {
        let mut state = StreamingState::new(invariants());
        state
            .apply_patch(StatePatch { timestamp_ms: 20, source: "a".to_string(), set_intent: Some("kept".to_string()), ..Default::default() })
            .unwrap();
        let result =
            state.apply_patch(StatePatch { timestamp_ms: 10, source: "b".to_string(), set_intent: Some("dropped".to_string()), ..Default::default() });
        assert!(matches!(result, Err(PatchError::Stale(10))));
        assert_eq!(state.mutable().intent, "kept");
    }

    #[test]
    fn equal_timestamps_break_ties_by_source_then_arrival() {
        let mut state = StreamingState::new(invariants());
        state
            .apply_patch(StatePatch { timestamp_ms: 10, source: "b".to_string(), set_intent: Some("from-b".to_string()), ..Default::default() })
            .unwrap();
        // Same timestamp, lexicographically smaller source: loses the tie.
        let result =
            state.apply_patch(StatePatch { timestamp_ms: 10, source: "a".to_string(), set_intent: Some("from-a".to_string()), ..Default::default() });
        assert!(result.is_err());
        assert_eq!(state.mutable().intent, "from-b");
    }

    #[test]
    fn patch_touching_invariants_is_rejected() {
        let mut state = StreamingState::new(invariants());
        let result = state.apply_patch(StatePatch { timestamp_ms: 5, touches_invariants: true, ..Default::default() });
        assert!(matches!(result, Err(PatchError::InvariantViolation)));
    }
}
