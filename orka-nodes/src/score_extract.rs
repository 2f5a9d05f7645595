//! Score extraction strategies for the Loop node (§4.4.4): pull a numeric
//! score out of a nested workflow's agent results so the loop can compare
//! it against `score_threshold`.

use orka_core::config::ScoreStrategy;
use orka_core::scoring::{self, Preset};
use regex::Regex;
use serde_json::Value;

fn as_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn extract_direct_key(result: &Value, key: &str) -> Option<f64> {
    result.as_object()?.get(key).and_then(as_score)
}

/// Walks every agent's result looking for `key`, either directly or under
/// a nested `response`/`result`/`output`/`data` field. `agents` filters
/// which agent ids are considered (empty means "any").
fn extract_agent_key(result: &Value, agents: &[String], key: &str) -> Option<f64> {
    let object = result.as_object()?;
    for (agent_id, agent_result) in object {
        if !agents.is_empty() {
            let lower = agent_id.to_lowercase();
            if !agents.iter().any(|a| lower.contains(&a.to_lowercase())) {
                continue;
            }
        }

        if let Some(v) = agent_result.get(key).and_then(as_score) {
            return Some(v);
        }

        for nested_key in ["response", "result", "output", "data"] {
            let Some(nested) = agent_result.get(nested_key) else { continue };
            match nested {
                Value::Object(_) => {
                    if let Some(v) = nested.get(key).and_then(as_score) {
                        return Some(v);
                    }
                }
                Value::String(s) => {
                    if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                        if let Some(v) = parsed.get(key).and_then(as_score) {
                            return Some(v);
                        }
                    }
                    let pattern = format!(r#"['"]?{}['"]?\s*:\s*([0-9.]+)"#, regex::escape(key));
                    if let Ok(re) = Regex::new(&pattern) {
                        if let Some(caps) = re.captures(s) {
                            if let Some(m) = caps.get(1) {
                                if let Ok(v) = m.as_str().parse::<f64>() {
                                    return Some(v);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    None
}

fn extract_nested_path(result: &Value, path: &[String]) -> Option<f64> {
    if path.is_empty() {
        return None;
    }
    let mut current = result;
    for part in path {
        current = current.get(part)?;
    }
    as_score(current)
}

fn extract_pattern(result: &Value, patterns: &[String]) -> Option<f64> {
    let text = result.to_string();
    for pattern in patterns {
        let Ok(re) = Regex::new(pattern) else { continue };
        if let Some(caps) = re.captures(&text) {
            if let Some(m) = caps.get(1) {
                if let Ok(v) = m.as_str().parse::<f64>() {
                    return Some(v);
                }
            }
        }
    }
    None
}

fn extract_boolean_preset(result: &Value, preset_name: &str, presets: &[Preset]) -> Option<f64> {
    let preset = presets.iter().find(|p| p.name == preset_name)?;
    let criteria = scoring::flatten_criteria(result);
    Some(scoring::score(&criteria, preset).score)
}

/// Try each strategy in order, returning the first successful extraction,
/// or `0.0` when none match — mirroring the loop's "couldn't find a score,
/// keep iterating" fallback.
pub fn extract_score(strategies: &[ScoreStrategy], result: &Value, presets: &[Preset]) -> f64 {
    for strategy in strategies {
        let found = match strategy {
            ScoreStrategy::DirectKey { key } => extract_direct_key(result, key),
            ScoreStrategy::AgentKey { agent, key } => {
                let agents = if agent.is_empty() { vec![] } else { vec![agent.clone()] };
                extract_agent_key(result, &agents, key)
            }
            ScoreStrategy::NestedPath { path } => extract_nested_path(result, path),
            ScoreStrategy::Pattern { patterns } => extract_pattern(result, patterns),
            ScoreStrategy::BooleanPreset { preset } => extract_boolean_preset(result, preset, presets),
        };
        if let Some(score) = found {
            return score;
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_key_extracts_numeric_score() {
        let strategies = vec![ScoreStrategy::DirectKey { key: "score".to_string() }];
        let result = json!({"score": 0.75});
        assert_eq!(extract_score(&strategies, &result, &[]), 0.75);
    }

    #[test]
    fn pattern_extracts_from_stringified_result() {
        let strategies = vec![ScoreStrategy::Pattern {
            patterns: vec![r"score:\s*(\d+\.?\d*)".to_string()],
        }];
        let result = json!({"agent": "final score: 0.9 reached"});
        assert_eq!(extract_score(&strategies, &result, &[]), 0.9);
    }

    #[test]
    fn agent_key_finds_nested_response_field() {
        let strategies = vec![ScoreStrategy::AgentKey {
            agent: "judge".to_string(),
            key: "score".to_string(),
        }];
        let result = json!({"judge_agent": {"response": {"score": 0.6}}});
        assert_eq!(extract_score(&strategies, &result, &[]), 0.6);
    }

    #[test]
    fn agent_key_parses_json_string_response() {
        let strategies = vec![ScoreStrategy::AgentKey {
            agent: String::new(),
            key: "score".to_string(),
        }];
        let result = json!({"judge": {"response": "{\"score\": 0.42}"}});
        assert_eq!(extract_score(&strategies, &result, &[]), 0.42);
    }

    #[test]
    fn nested_path_walks_dotted_segments() {
        let strategies = vec![ScoreStrategy::NestedPath {
            path: vec!["judge".to_string(), "score".to_string()],
        }];
        let result = json!({"judge": {"score": 0.33}});
        assert_eq!(extract_score(&strategies, &result, &[]), 0.33);
    }

    #[test]
    fn no_strategy_matches_defaults_to_zero() {
        let strategies = vec![ScoreStrategy::DirectKey { key: "missing".to_string() }];
        let result = json!({"other": 1});
        assert_eq!(extract_score(&strategies, &result, &[]), 0.0);
    }

    #[test]
    fn boolean_preset_delegates_to_scoring_engine() {
        let presets = vec![Preset {
            name: "p".to_string(),
            weights: std::collections::HashMap::from([("a.one".to_string(), 1.0)]),
            thresholds: orka_core::scoring::Thresholds { approved: 0.5, needs_improvement: 0.1 },
        }];
        let strategies = vec![ScoreStrategy::BooleanPreset { preset: "p".to_string() }];
        let result = json!({"a": {"one": true}});
        assert_eq!(extract_score(&strategies, &result, &presets), 1.0);
    }
}
