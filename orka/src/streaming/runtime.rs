//! The streaming session's main loop and refresh cycle (§4.5 "Main
//! loop", "Refresh"), mirroring the unit-testable-core-plus-driving-loop
//! split `orka_memory::decay::DecaySweeper` uses: `handle_ingress` and
//! `debounce_tick` are plain async methods callable in a test without a
//! real clock, and `run_forever` is the thin `tokio::select!` loop that
//! wires them to the event bus and a debounce timer for production use.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use orka_llm::CompletionClient;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use uuid::Uuid;

use super::event_bus::{Channel, EventBus, MessageKind, WireMessage};
use super::prompt_composer::PromptComposer;
use super::satellite::{run_satellites, SatelliteConfig};
use super::state::{StatePatch, StreamingState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Active,
    Refreshing,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub executor_instance_id: String,
    pub chunks_streamed: usize,
    pub skipped: bool,
}

pub struct SessionRuntime {
    session_id: String,
    bus: Arc<EventBus>,
    state: Mutex<StreamingState>,
    composer: PromptComposer,
    llm: Arc<dyn CompletionClient>,
    satellites: Vec<SatelliteConfig>,
    debounce: Duration,
    delta_threshold: usize,
    pending_delta: Mutex<usize>,
    phase: Mutex<SessionPhase>,
}

impl SessionRuntime {
    pub fn new(
        session_id: impl Into<String>,
        bus: Arc<EventBus>,
        state: StreamingState,
        composer: PromptComposer,
        llm: Arc<dyn CompletionClient>,
        debounce: Duration,
        delta_threshold: usize,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            bus,
            state: Mutex::new(state),
            composer,
            llm,
            satellites: Vec::new(),
            debounce,
            delta_threshold: delta_threshold.max(1),
            pending_delta: Mutex::new(0),
            phase: Mutex::new(SessionPhase::Idle),
        }
    }

    pub fn with_satellites(mut self, satellites: Vec<SatelliteConfig>) -> Self {
        self.satellites = satellites;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap()
    }

    fn publish_alert(&self, reason: impl Into<String>, state_version: u64) {
        self.bus.publish(WireMessage::alert(&self.session_id, "runtime", json!({"reason": reason.into()}), state_version));
    }

    /// Processes one ingress message (§4.5 main loop steps 1-4). Returns
    /// a refresh outcome if the delta threshold fired as a result.
    pub async fn handle_ingress(&self, message: WireMessage) -> Option<RefreshOutcome> {
        if message.channel != Channel::Ingress {
            return None;
        }

        *self.phase.lock().unwrap() = SessionPhase::Active;

        let accepted = if let Some(text) = message.payload.get("text").and_then(Value::as_str) {
            let patch = StatePatch {
                timestamp_ms: message.timestamp_ms,
                source: message.source.clone(),
                append_history: Some(text.to_string()),
                ..Default::default()
            };
            self.state.lock().unwrap().apply_patch(patch).ok();
            true
        } else if let Some(patch_value) = message.payload.get("patch") {
            match self.apply_patch_from_value(patch_value, &message) {
                Ok(_) => true,
                Err(e) => {
                    self.publish_alert(format!("state patch rejected: {e}"), message.state_version);
                    false
                }
            }
        } else {
            false
        };

        if !accepted {
            return None;
        }

        let mut pending = self.pending_delta.lock().unwrap();
        *pending += 1;
        if *pending >= self.delta_threshold {
            *pending = 0;
            drop(pending);
            return Some(self.refresh().await);
        }
        None
    }

    /// Called by the debounce timer; fires a refresh if anything has
    /// accumulated since the last one.
    pub async fn debounce_tick(&self) -> Option<RefreshOutcome> {
        let mut pending = self.pending_delta.lock().unwrap();
        if *pending == 0 {
            return None;
        }
        *pending = 0;
        drop(pending);
        Some(self.refresh().await)
    }

    fn apply_patch_from_value(&self, patch_value: &Value, message: &WireMessage) -> Result<u64, super::state::PatchError> {
        let touches_invariants = patch_value.get("touches_invariants").and_then(Value::as_bool).unwrap_or(false);
        let set_intent = patch_value.get("set_intent").and_then(Value::as_str).map(str::to_string);
        let append_history = patch_value.get("append_history").and_then(Value::as_str).map(str::to_string);
        let set_fields = patch_value.get("set_fields").and_then(Value::as_object).cloned().unwrap_or_default();

        let patch = StatePatch {
            timestamp_ms: message.timestamp_ms,
            source: message.source.clone(),
            set_intent,
            append_history,
            set_fields,
            touches_invariants,
        };
        self.state.lock().unwrap().apply_patch(patch)
    }

    /// Rotates the executor instance id, composes a prompt, and streams
    /// chunks to egress (§4.5 "Refresh"). Skips entirely if the state has
    /// no content to ground a prompt in.
    async fn refresh(&self) -> RefreshOutcome {
        *self.phase.lock().unwrap() = SessionPhase::Refreshing;
        let executor_instance_id = Uuid::new_v4().to_string();

        let (prompt, has_content, state_version) = {
            let state = self.state.lock().unwrap();
            let satellite_summary = state.mutable().satellite_summaries.get("summarizer").and_then(Value::as_str).map(str::to_string);
            let prompt = self.composer.compose(&state, satellite_summary.as_deref());
            (prompt, state.has_content(), state.version())
        };

        if !has_content {
            *self.phase.lock().unwrap() = SessionPhase::Active;
            return RefreshOutcome { executor_instance_id, chunks_streamed: 0, skipped: true };
        }

        let stream = match self.llm.stream_complete(&prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                self.publish_alert(format!("refresh failed: {e}"), state_version);
                *self.phase.lock().unwrap() = SessionPhase::Active;
                return RefreshOutcome { executor_instance_id, chunks_streamed: 0, skipped: true };
            }
        };

        let mut chunks_streamed = 0usize;
        tokio::pin!(stream);
        while let Some(chunk) = stream.next().await {
            self.bus.publish(WireMessage::egress(
                &self.session_id,
                "executor",
                json!({"chunk": chunk, "executor_instance_id": executor_instance_id}),
                state_version,
            ));
            chunks_streamed += 1;
        }
        self.bus.publish(WireMessage::egress(
            &self.session_id,
            "executor",
            json!({"final": true, "executor_instance_id": executor_instance_id}),
            state_version,
        ));

        if !self.satellites.is_empty() {
            run_satellites(&self.satellites, &self.state, &self.bus, &self.session_id, state_version).await;
        }

        *self.phase.lock().unwrap() = SessionPhase::Active;
        RefreshOutcome { executor_instance_id, chunks_streamed, skipped: false }
    }

    /// Persists the session's trace and transitions to `Shutdown` (§4.5
    /// "Shutdown: persist trace to a file; signal workers").
    pub async fn shutdown(&self, trace_path: &std::path::Path) -> std::io::Result<()> {
        *self.phase.lock().unwrap() = SessionPhase::Shutdown;
        let events = self.bus.replay_from(0);
        let trace = crate::trace::build_trace_from_events(&events, orka_memory::blob::DEFAULT_THRESHOLD_BYTES);
        let bytes = serde_json::to_vec_pretty(&trace).unwrap_or_default();
        tokio::fs::write(trace_path, bytes).await
    }

    /// Drives the session from the event bus: dispatches ingress
    /// messages as they arrive and fires a debounce-triggered refresh
    /// when nothing has arrived for `debounce`. Runs until the process
    /// is torn down; call `shutdown` separately to end the session.
    pub async fn run_forever(&self) -> ! {
        let mut rx = self.bus.subscribe();
        loop {
            tokio::select! {
                received = rx.recv() => {
                    if let Ok(message) = received {
                        if message.channel == Channel::Ingress {
                            let _ = self.handle_ingress(message).await;
                        }
                    }
                }
                _ = tokio::time::sleep(self.debounce) => {
                    let _ = self.debounce_tick().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::event_bus::WireMessage;
    use super::super::state::StreamingInvariants;
    use orka_llm::MockCompletionClient;

    fn runtime(delta_threshold: usize) -> SessionRuntime {
        let bus = Arc::new(EventBus::new());
        let state = StreamingState::new(StreamingInvariants { session_id: "s1".to_string(), created_at_ms: 0, owner: "u".to_string() });
        SessionRuntime::new(
            "s1",
            bus,
            state,
            PromptComposer::new(1000),
            Arc::new(MockCompletionClient::fixed("hello there")),
            Duration::from_millis(50),
            delta_threshold,
        )
    }

    #[tokio::test]
    async fn refresh_fires_once_delta_threshold_is_reached() {
        let rt = runtime(3);
        for i in 0..2 {
            let msg = WireMessage::ingress("s1", "user", json!({"text": format!("message {i}")}), 0);
            assert!(rt.handle_ingress(msg).await.is_none());
        }
        let msg = WireMessage::ingress("s1", "user", json!({"text": "message 2"}), 0);
        let outcome = rt.handle_ingress(msg).await;
        assert!(outcome.is_some());
        assert!(!outcome.unwrap().skipped);
    }

    #[tokio::test]
    async fn refresh_skips_when_state_has_no_content() {
        let rt = runtime(1);
        let outcome = rt.debounce_tick().await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn debounce_tick_is_a_no_op_with_nothing_pending() {
        let rt = runtime(5);
        let msg = WireMessage::ingress("s1", "user", json!({"text": "hi"}), 0);
        rt.handle_ingress(msg).await;
        let outcome = rt.debounce_tick().await;
        assert!(outcome.is_some());
        let second = rt.debounce_tick().await;
        assert!(second.is_none());
    }
}
