//! `MemoryEntry` and the write-path classification/scoring rules (§4.3.1,
//! §4.3.5).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    ShortTerm,
    LongTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Stored,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub content: String,
    pub node_id: String,
    pub trace_id: String,
    pub timestamp_ms: i64,
    pub importance_score: f64,
    pub memory_type: MemoryType,
    pub category: Category,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at_ms: Option<i64>,
}

/// Configuration knobs that influence classification and expiry. A
/// workflow's `decay` config merges into these defaults per agent.
#[derive(Debug, Clone)]
pub struct DecayConfig {
    pub enabled: bool,
    pub short_term_hours: f64,
    pub long_term_hours: f64,
    /// Event types that always force `long_term` regardless of score.
    pub long_term_events: Vec<String>,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            short_term_hours: 1.0,
            long_term_hours: 24.0 * 7.0,
            long_term_events: vec!["write".to_string(), "decision".to_string()],
        }
    }
}

/// Inputs to [`classify_and_score`] gathered from the write call.
#[derive(Debug, Clone, Default)]
pub struct WriteIntent {
    pub event_type: Option<String>,
    pub agent_name: Option<String>,
    pub log_type: Option<String>,
    pub has_error: bool,
    pub carries_memory_payload: bool,
}

/// Importance score boosts applied on top of the 0.5 base (§4.3.1 step 2,
/// itemized per the supplemented write-path rules).
fn importance_score(intent: &WriteIntent) -> f64 {
    let mut score: f64 = 0.5;

    match intent.event_type.as_deref() {
        Some("write") => score += 0.3,
        Some("result") => score += 0.2,
        _ => {}
    }

    if let Some(name) = &intent.agent_name {
        let lower = name.to_lowercase();
        if lower.contains("memory") {
            score += 0.2;
        }
    }

    if intent.has_error {
        score -= 0.1;
    }

    score.clamp(0.0, 1.0)
}

/// A memory is `stored` iff it carries a persistence marker: an explicit
/// `log_type == "memory"`, an agent name that looks like a memory writer,
/// or a payload shape carrying `content`/`memory_object`/`memories`
/// (§4.3.5). Everything else is a `log` entry.
fn classify_category(intent: &WriteIntent) -> Category {
    if intent.log_type.as_deref() == Some("memory") {
        return Category::Stored;
    }
    if let Some(name) = &intent.agent_name {
        let lower = name.to_lowercase();
        if lower.contains("memory-writer") || lower.contains("memory_writer") {
            return Category::Stored;
        }
    }
    if intent.carries_memory_payload {
        return Category::Stored;
    }
    Category::Log
}

fn classify_memory_type(category: Category, intent: &WriteIntent, score: f64, decay: &DecayConfig) -> MemoryType {
    if category == Category::Log {
        return MemoryType::ShortTerm;
    }
    let is_long_term_event = intent
        .event_type
        .as_deref()
        .map(|t| decay.long_term_events.iter().any(|e| e == t))
        .unwrap_or(false);
    if is_long_term_event || score >= 0.7 {
        MemoryType::LongTerm
    } else {
        MemoryType::ShortTerm
    }
}

fn compute_expiry(memory_type: MemoryType, score: f64, decay: &DecayConfig, now_ms: i64) -> Option<i64> {
    if !decay.enabled {
        return None;
    }
    let base_hours = match memory_type {
        MemoryType::ShortTerm => decay.short_term_hours,
        MemoryType::LongTerm => decay.long_term_hours,
    };
    let scaled_hours = base_hours * (1.0 + score);
    let ms = (scaled_hours * 3_600_000.0) as i64;
    Some(now_ms + ms)
}

/// Build a [`MemoryEntry`] from raw write inputs, applying the full
/// classify/score/expire pipeline. `now_ms` is injected so tests can
/// control expiry math precisely.
pub fn build_entry(
    id: String,
    content: String,
    node_id: String,
    trace_id: String,
    metadata: Map<String, Value>,
    intent: &WriteIntent,
    decay: &DecayConfig,
    now_ms: i64,
) -> MemoryEntry {
    let score = importance_score(intent);
    let category = classify_category(intent);
    let memory_type = classify_memory_type(category, intent, score, decay);
    let expire_at_ms = compute_expiry(memory_type, score, decay, now_ms);

    MemoryEntry {
        id,
        content,
        node_id,
        trace_id,
        timestamp_ms: now_ms,
        importance_score: score,
        memory_type,
        category,
        metadata,
        vector: None,
        expire_at_ms,
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_event_boosts_and_clamps() {
        let intent = WriteIntent {
            event_type: Some("write".to_string()),
            agent_name: Some("memory-writer-1".to_string()),
            ..Default::default()
        };
        assert_eq!(importance_score(&intent), 1.0);
    }

    #[test]
    fn error_penalty_reduces_score() {
        let intent = WriteIntent {
            has_error: true,
            ..Default::default()
        };
        assert!((importance_score(&intent) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn log_entries_are_always_short_term() {
        let intent = WriteIntent {
            event_type: Some("write".to_string()),
            ..Default::default()
        };
        let decay = DecayConfig::default();
        let category = classify_category(&intent);
        assert_eq!(category, Category::Log);
        let memory_type = classify_memory_type(category, &intent, 1.0, &decay);
        assert_eq!(memory_type, MemoryType::ShortTerm);
    }

    #[test]
    fn stored_entry_with_high_score_is_long_term() {
        let intent = WriteIntent {
            log_type: Some("memory".to_string()),
            event_type: Some("result".to_string()),
            ..Default::default()
        };
        let decay = DecayConfig::default();
        let category = classify_category(&intent);
        assert_eq!(category, Category::Stored);
        let score = importance_score(&intent);
        assert!(score >= 0.7);
        assert_eq!(classify_memory_type(category, &intent, score, &decay), MemoryType::LongTerm);
    }

    #[test]
    fn disabled_decay_never_expires() {
        let decay = DecayConfig {
            enabled: false,
            ..Default::default()
        };
        assert_eq!(compute_expiry(MemoryType::ShortTerm, 0.5, &decay, 0), None);
    }

    #[test]
    fn memory_payload_without_explicit_log_type_is_stored() {
        let intent = WriteIntent {
            carries_memory_payload: true,
            ..Default::default()
        };
        assert_eq!(classify_category(&intent), Category::Stored);
    }
}
