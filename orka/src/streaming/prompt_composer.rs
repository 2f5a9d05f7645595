//! Assembles the executor prompt for a streaming refresh (§4.5
//! "PromptComposer"): each named section gets its own token budget,
//! and the whole thing is additionally capped by a global budget.
//! Token counting is approximate (whitespace-delimited word count) —
//! the same order-of-magnitude heuristic is good enough for a budget
//! that exists to bound an HTTP payload, not to match a specific
//! tokenizer.

use orka_core::template::render;
use orka_core::RunContext;
use serde_json::json;

use super::state::StreamingState;

#[derive(Debug, Clone)]
pub struct SectionBudget {
    pub name: String,
    pub max_tokens: usize,
}

pub struct PromptComposer {
    global_budget_tokens: usize,
    sections: Vec<SectionBudget>,
}

fn truncate_tokens(text: &str, max_tokens: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_tokens {
        return text.to_string();
    }
    let mut truncated = words[..max_tokens].join(" ");
    truncated.push_str(" ...");
    truncated
}

impl PromptComposer {
    pub fn new(global_budget_tokens: usize) -> Self {
        Self {
            global_budget_tokens,
            sections: vec![
                SectionBudget { name: "intent".to_string(), max_tokens: 200 },
                SectionBudget { name: "history".to_string(), max_tokens: 400 },
                SectionBudget { name: "satellite_summary".to_string(), max_tokens: 300 },
                SectionBudget { name: "fields".to_string(), max_tokens: 200 },
            ],
        }
    }

    pub fn with_section(mut self, name: impl Into<String>, max_tokens: usize) -> Self {
        let name = name.into();
        if let Some(existing) = self.sections.iter_mut().find(|s| s.name == name) {
            existing.max_tokens = max_tokens;
        } else {
            self.sections.push(SectionBudget { name, max_tokens });
        }
        self
    }

    fn budget_for(&self, name: &str) -> usize {
        self.sections.iter().find(|s| s.name == name).map(|s| s.max_tokens).unwrap_or(usize::MAX)
    }

    pub fn compose(&self, state: &StreamingState, satellite_summary: Option<&str>) -> String {
        let mutable = state.mutable();
        let mut sections = Vec::new();

        if !mutable.intent.is_empty() {
            sections.push(format!("Intent: {}", truncate_tokens(&mutable.intent, self.budget_for("intent"))));
        }
        if !mutable.history.is_empty() {
            let joined = mutable.history.join("\n");
            sections.push(format!("History:\n{}", truncate_tokens(&joined, self.budget_for("history"))));
        }
        if let Some(summary) = satellite_summary {
            if !summary.is_empty() {
                sections.push(format!("Summary: {}", truncate_tokens(summary, self.budget_for("satellite_summary"))));
            }
        }
        if !mutable.fields.is_empty() {
            let ctx = RunContext::new(json!(mutable.fields));
            let rendered = render("{{ input }}", &ctx);
            sections.push(format!("Fields: {}", truncate_tokens(&rendered, self.budget_for("fields"))));
        }

        truncate_tokens(&sections.join("\n\n"), self.global_budget_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::state::{StatePatch, StreamingInvariants};

    fn state_with_intent(intent: &str) -> StreamingState {
        let mut state = StreamingState::new(StreamingInvariants {
            session_id: "s".to_string(),
            created_at_ms: 0,
            owner: "u".to_string(),
        });
        state
            .apply_patch(StatePatch { timestamp_ms: 1, source: "test".to_string(), set_intent: Some(intent.to_string()), ..Default::default() })
            .unwrap();
        state
    }

    #[test]
    fn composes_intent_section() {
        let state = state_with_intent("ship the release");
        let composer = PromptComposer::new(1000);
        let prompt = composer.compose(&state, None);
        assert!(prompt.contains("ship the release"));
    }

    #[test]
    fn long_intent_is_truncated_to_its_section_budget() {
        let long_intent = "word ".repeat(500);
        let state = state_with_intent(long_intent.trim());
        let composer = PromptComposer::new(10_000).with_section("intent", 5);
        let prompt = composer.compose(&state, None);
        assert!(prompt.contains("..."));
    }
}
