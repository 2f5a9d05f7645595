//! Cognitive insight extraction for the Loop node (§4.4.4): pulls
//! `insights`/`improvements`/`mistakes` snippets out of a loop iteration's
//! agent results via configured regex patterns, for carrying forward into
//! the next iteration's `past_loops` context.

use std::collections::HashSet;

use orka_core::config::CognitiveExtractionConfig;
use regex::RegexBuilder;
use serde_json::Value;

const MIN_INSIGHT_LEN: usize = 10;
const CATEGORIES: [&str; 3] = ["insights", "improvements", "mistakes"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CognitiveInsights {
    pub insights: String,
    pub improvements: String,
    pub mistakes: String,
}

fn agent_texts(result: &Value) -> Vec<String> {
    match result.as_object() {
        Some(map) => map
            .values()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        None => Vec::new(),
    }
}

fn collect_matches(texts: &[String], patterns: &[String]) -> Vec<String> {
    let mut found = Vec::new();
    for pattern in patterns {
        let Ok(re) = RegexBuilder::new(pattern).case_insensitive(true).build() else { continue };
        for text in texts {
            for caps in re.captures_iter(text) {
                let Some(m) = caps.get(1) else { continue };
                let insight = m.as_str().trim();
                if insight.len() > MIN_INSIGHT_LEN {
                    found.push(insight.to_string());
                }
            }
        }
    }
    found
}

fn dedup_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item.to_lowercase()) {
            out.push(item);
        }
    }
    out
}

fn truncate(joined: String, max_len: usize) -> String {
    let mut chars = joined.chars();
    let head: String = chars.by_ref().take(max_len).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        joined
    }
}

pub fn extract_cognitive_insights(config: &CognitiveExtractionConfig, result: &Value) -> CognitiveInsights {
    if !config.enabled {
        return CognitiveInsights::default();
    }

    let texts = agent_texts(result);
    let mut by_category = CognitiveInsights::default();

    for category in CATEGORIES {
        let Some(patterns) = config.extract_patterns.get(category) else { continue };
        let matches = dedup_preserve_order(collect_matches(&texts, patterns));
        if matches.is_empty() {
            continue;
        }
        let combined = truncate(matches.join(" | "), config.max_length_per_category);
        match category {
            "insights" => by_category.insights = combined,
            "improvements" => by_category.improvements = combined,
            "mistakes" => by_category.mistakes = combined,
            _ => unreachable!(),
        }
    }

    by_category
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn config(patterns: HashMap<String, Vec<String>>) -> CognitiveExtractionConfig {
        CognitiveExtractionConfig {
            enabled: true,
            extract_patterns: patterns,
            max_length_per_category: 300,
        }
    }

    #[test]
    fn disabled_extraction_returns_empty() {
        let mut config = config(HashMap::new());
        config.enabled = false;
        let out = extract_cognitive_insights(&config, &json!({}));
        assert_eq!(out, CognitiveInsights::default());
    }

    #[test]
    fn extracts_and_dedups_matching_insights() {
        let patterns = HashMap::from([(
            "insights".to_string(),
            vec![r"insight:\s*(.+?)(?:\.|$)".to_string()],
        )]);
        let config = config(patterns);
        let result = json!({
            "a1": "insight: the cache hit rate matters a lot.",
            "a2": "insight: the cache hit rate matters a lot!",
        });
        let out = extract_cognitive_insights(&config, &result);
        assert!(out.insights.contains("cache hit rate"));
        assert_eq!(out.insights.matches("cache hit rate").count(), 1);
    }

    #[test]
    fn short_matches_are_filtered_out() {
        let patterns = HashMap::from([("mistakes".to_string(), vec![r"mistake:\s*(.+)".to_string()])]);
        let config = config(patterns);
        let result = json!({"a1": "mistake: oops"});
        let out = extract_cognitive_insights(&config, &result);
        assert!(out.mistakes.is_empty());
    }

    #[test]
    fn long_combined_text_is_truncated_with_ellipsis() {
        let mut config = config(HashMap::from([(
            "improvements".to_string(),
            vec![r"note:\s*(.+)".to_string()],
        )]));
        config.max_length_per_category = 10;
        let result = json!({"a1": "note: this is a much longer improvement note than the cap"});
        let out = extract_cognitive_insights(&config, &result);
        assert!(out.improvements.ends_with("..."));
        assert_eq!(out.improvements.len(), 13);
    }
}
