//! Satellite workers (§4.5 "Satellites"): background roles — a
//! summarizer being the canonical example — that run a role-specific
//! prompt against the session state and, on success, merge their output
//! back in. A failing satellite publishes an alert and the session
//! continues; a satellite never blocks or fails the main refresh loop.

use std::sync::{Arc, Mutex};

use orka_core::template::render;
use orka_core::RunContext;
use orka_llm::CompletionClient;
use serde_json::{json, Value};

use super::event_bus::{EventBus, WireMessage};
use super::state::StreamingState;

#[derive(Clone)]
pub struct SatelliteConfig {
    pub role: String,
    pub llm: Arc<dyn CompletionClient>,
    pub prompt_template: String,
}

fn render_satellite_prompt(template: &str, state: &StreamingState) -> String {
    let mutable = state.mutable();
    let snapshot = json!({
        "intent": mutable.intent,
        "history": mutable.history,
        "fields": Value::Object(mutable.fields.clone()),
    });
    render(template, &RunContext::new(snapshot))
}

/// Runs every configured satellite in declaration order against the
/// current state snapshot, merging successes back in and alerting on
/// failure. Declaration order, not concurrency, matches §4.5's "for each
/// declared satellite role" — nothing in the spec calls for them to race.
pub async fn run_satellites(
    configs: &[SatelliteConfig],
    state: &Mutex<StreamingState>,
    bus: &EventBus,
    session_id: &str,
    state_version: u64,
) {
    for config in configs {
        let prompt = {
            let state = state.lock().unwrap();
            render_satellite_prompt(&config.prompt_template, &state)
        };

        match config.llm.complete(&prompt).await {
            Ok(summary) => {
                let mut state = state.lock().unwrap();
                state.set_satellite_summary(&config.role, Value::String(summary));
            }
            Err(e) => {
                bus.publish(WireMessage::alert(
                    session_id,
                    "satellite",
                    json!({"role": config.role, "error": e.to_string()}),
                    state_version,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::state::{StatePatch, StreamingInvariants};
    use async_trait::async_trait;
    use orka_llm::{LlmError, MockCompletionClient};

    struct AlwaysFails;

    #[async_trait]
    impl CompletionClient for AlwaysFails {
        async fn complete(&self, _prompt: &str) -> orka_llm::Result<String> {
            Err(LlmError::Provider("satellite backend unavailable".to_string()))
        }
    }

    fn fresh_state() -> Mutex<StreamingState> {
        let mut state = StreamingState::new(StreamingInvariants {
            session_id: "s1".to_string(),
            created_at_ms: 0,
            owner: "u".to_string(),
        });
        state
            .apply_patch(StatePatch { timestamp_ms: 1, source: "t".to_string(), set_intent: Some("draft the release notes".to_string()), ..Default::default() })
            .unwrap();
        Mutex::new(state)
    }

    #[tokio::test]
    async fn successful_satellite_merges_summary_into_state() {
        let state = fresh_state();
        let bus = EventBus::new();
        let configs = vec![SatelliteConfig {
            role: "summarizer".to_string(),
            llm: Arc::new(MockCompletionClient::fixed("concise summary")),
            prompt_template: "summarize: {{ input.intent }}".to_string(),
        }];

        run_satellites(&configs, &state, &bus, "s1", 0).await;

        let guard = state.lock().unwrap();
        assert_eq!(guard.mutable().satellite_summaries.get("summarizer"), Some(&Value::String("concise summary".to_string())));
    }

    #[tokio::test]
    async fn failing_satellite_publishes_an_alert_and_continues() {
        let state = fresh_state();
        let bus = EventBus::new();
        let configs = vec![SatelliteConfig {
            role: "summarizer".to_string(),
            llm: Arc::new(AlwaysFails),
            prompt_template: "{{ input.intent }}".to_string(),
        }];

        run_satellites(&configs, &state, &bus, "s1", 0).await;
        assert_eq!(bus.history_len(), 1);
        let guard = state.lock().unwrap();
        assert!(guard.mutable().satellite_summaries.is_empty());
    }
}
