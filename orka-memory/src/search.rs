//! Read-path search: keyword, vector, and hybrid re-ranking (§4.3.4).

use std::collections::HashSet;

use serde_json::Value;

use crate::entry::{Category, MemoryEntry};

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub node_id: Option<String>,
    pub category: Option<Category>,
    pub log_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub limit: usize,
    pub similarity_threshold: f64,
    pub enable_context_search: bool,
    pub enable_temporal_ranking: bool,
    pub temporal_weight: f64,
    pub temporal_decay_hours: f64,
    pub context_weight: f64,
}

impl SearchConfig {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            similarity_threshold: 0.0,
            enable_context_search: false,
            enable_temporal_ranking: false,
            temporal_weight: 0.3,
            temporal_decay_hours: 24.0,
            context_weight: 0.2,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: MemoryEntry,
    pub raw_similarity: f64,
    pub composed_similarity: f64,
}

/// Generate query variations to improve recall on short keyword queries:
/// the original, a reversed-bigram swap, an `"about X"` framing, and (for
/// longer queries) a first-and-last-word combination. Queries under two
/// characters produce no variations — too little signal to vary on.
pub fn generate_query_variations(query: &str) -> Vec<String> {
    let trimmed = query.trim();
    if trimmed.chars().count() < 2 {
        return Vec::new();
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    let mut variations = vec![trimmed.to_string()];

    match words.len() {
        0 => return Vec::new(),
        1 => {
            variations.push(format!("about {trimmed}"));
        }
        2 => {
            variations.push(format!("{} {}", words[1], words[0]));
            variations.push(format!("about {trimmed}"));
        }
        _ => {
            variations.push(format!("{} {}", words[0], words[words.len() - 1]));
            variations.push(format!("about {trimmed}"));
        }
    }

    let mut seen = HashSet::new();
    variations.retain(|v| seen.insert(v.clone()));
    variations
}

/// Context-enhanced variations: the base set plus token-overlap framings
/// built from the trailing context items, capped at 8 entries total
/// (§11 supplement — matches the original's enhanced-variation ceiling).
pub fn generate_enhanced_query_variations(query: &str, context: &[String]) -> Vec<String> {
    let mut variations = generate_query_variations(query);
    if variations.is_empty() && !query.trim().is_empty() {
        variations.push(query.trim().to_string());
    }

    for item in context.iter().rev().take(3) {
        let first_word = item.split_whitespace().next();
        if let Some(word) = first_word {
            let combined = format!("{} {}", query.trim(), word);
            if !variations.contains(&combined) {
                variations.push(combined);
            }
        }
        if variations.len() >= 8 {
            break;
        }
    }

    variations.truncate(8);
    variations
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-overlap keyword score in [0,1]: fraction of query tokens found
/// in the content.
pub fn keyword_score(query: &str, content: &str) -> f64 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let content_tokens = tokenize(content);
    let hits = query_tokens.intersection(&content_tokens).count();
    hits as f64 / query_tokens.len() as f64
}

/// Best keyword score across the original query and its variations.
pub fn keyword_score_with_variations(query: &str, content: &str) -> f64 {
    generate_query_variations(query)
        .iter()
        .map(|q| keyword_score(q, content))
        .fold(0.0_f64, f64::max)
}

/// Cosine similarity mapped into a [0,1] "1 - normalized distance" shape
/// matching the vector search contract of §4.3.4 step 1.
pub fn vector_similarity(query: &[f32], candidate: &[f32]) -> f64 {
    if query.len() != candidate.len() || query.is_empty() {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(candidate).map(|(a, b)| a * b).sum();
    let norm_q: f32 = query.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_c: f32 = candidate.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_q == 0.0 || norm_c == 0.0 {
        return 0.0;
    }
    let cosine = (dot / (norm_q * norm_c)) as f64;
    ((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn length_factor(content: &str) -> f64 {
    let words = content.split_whitespace().count() as f64;
    if words < 20.0 {
        0.7 + 0.3 * (words / 20.0)
    } else if words <= 200.0 {
        1.1
    } else {
        (1.1 - (words - 200.0) / 1000.0).max(0.6)
    }
}

fn recency_factor(age_hours: f64, temporal_decay_hours: f64, enabled: bool) -> f64 {
    if !enabled {
        return 1.0;
    }
    (-age_hours / temporal_decay_hours.max(0.001)).exp()
}

fn metadata_factor(entry: &MemoryEntry) -> f64 {
    let present_keys = entry.metadata.len().min(2) as f64 * 0.1;
    let category_bonus = if entry.category == Category::Stored { 0.15 } else { 0.0 };
    present_keys + category_bonus
}

fn context_factor(query: &str, content: &str, context: &[String], weight: f64) -> f64 {
    if context.is_empty() {
        return 0.0;
    }
    let joined = context.iter().rev().take(3).cloned().collect::<Vec<_>>().join(" ");
    let overlap = keyword_score(&format!("{query} {joined}"), content);
    overlap * weight
}

/// Filter candidates by exact `node_id`, category, `log_type`, and
/// expiry, then score by keyword/vector and hybrid-rerank, returning up
/// to `config.limit` results sorted by composed similarity descending.
#[allow(clippy::too_many_arguments)]
pub fn search(
    entries: &[MemoryEntry],
    query: &str,
    query_vector: Option<&[f32]>,
    filters: &SearchFilters,
    config: &SearchConfig,
    context: &[String],
    now_ms: i64,
) -> Vec<ScoredEntry> {
    let mut scored: Vec<ScoredEntry> = entries
        .iter()
        .filter(|e| passes_filters(e, filters, now_ms))
        .map(|e| {
            let raw = match query_vector {
                Some(qv) => e
                    .vector
                    .as_ref()
                    .map(|v| vector_similarity(qv, v))
                    .unwrap_or_else(|| keyword_score_with_variations(query, &e.content)),
                None => keyword_score_with_variations(query, &e.content),
            };

            let age_hours = ((now_ms - e.timestamp_ms).max(0) as f64) / 3_600_000.0;
            let composed = raw
                * length_factor(&e.content)
                * recency_factor(age_hours, config.temporal_decay_hours, config.enable_temporal_ranking)
                * (1.0 + metadata_factor(e))
                * (1.0
                    + if config.enable_context_search {
                        context_factor(query, &e.content, context, config.context_weight)
                    } else {
                        0.0
                    });

            ScoredEntry {
                entry: e.clone(),
                raw_similarity: raw.clamp(0.0, 1.0),
                composed_similarity: composed.clamp(0.0, 1.0),
            }
        })
        .filter(|s| s.composed_similarity >= config.similarity_threshold)
        .collect();

    scored.sort_by(|a, b| b.composed_similarity.partial_cmp(&a.composed_similarity).unwrap());
    if config.limit > 0 {
        scored.truncate(config.limit);
    }
    scored
}

fn passes_filters(entry: &MemoryEntry, filters: &SearchFilters, now_ms: i64) -> bool {
    if let Some(node_id) = &filters.node_id {
        if &entry.node_id != node_id {
            return false;
        }
    }
    if let Some(category) = filters.category {
        if entry.category != category {
            return false;
        }
    }
    if let Some(log_type) = &filters.log_type {
        let matches = match log_type.as_str() {
            "memory" => entry.category == Category::Stored,
            "log" => entry.category == Category::Log,
            _ => true,
        };
        if !matches {
            return false;
        }
    }
    if let Some(expire_at) = entry.expire_at_ms {
        if expire_at < now_ms {
            return false;
        }
    }
    true
}

pub fn entry_as_value(entry: &MemoryEntry) -> Value {
    serde_json::to_value(entry).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MemoryType;
    use serde_json::Map;

    fn entry(id: &str, content: &str, category: Category) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            content: content.to_string(),
            node_id: "n1".to_string(),
            trace_id: "t1".to_string(),
            timestamp_ms: 0,
            importance_score: 0.5,
            memory_type: MemoryType::ShortTerm,
            category,
            metadata: Map::new(),
            vector: None,
            expire_at_ms: None,
        }
    }

    #[test]
    fn single_word_variation_includes_about_framing() {
        let variations = generate_query_variations("python");
        assert!(variations.contains(&"python".to_string()));
        assert!(variations.contains(&"about python".to_string()));
        assert!(variations.len() >= 2);
    }

    #[test]
    fn two_word_variation_includes_reversed_order() {
        let variations = generate_query_variations("machine learning");
        assert!(variations.contains(&"machine learning".to_string()));
        assert!(variations.contains(&"learning machine".to_string()));
    }

    #[test]
    fn multi_word_variation_includes_first_and_last() {
        let variations = generate_query_variations("natural language processing basics");
        assert!(variations
            .iter()
            .any(|v| v.contains("natural") && v.contains("basics")));
    }

    #[test]
    fn empty_and_short_queries_produce_no_variations() {
        assert!(generate_query_variations("").is_empty());
        assert!(generate_query_variations("a").is_empty());
    }

    #[test]
    fn variations_are_unique() {
        let variations = generate_query_variations("hello world");
        let unique: HashSet<_> = variations.iter().collect();
        assert_eq!(unique.len(), variations.len());
    }

    #[test]
    fn enhanced_variations_capped_at_eight() {
        let context = vec![
            "word1 word2 word3".to_string(),
            "word4 word5 word6".to_string(),
            "word7 word8 word9".to_string(),
            "word10 word11".to_string(),
        ];
        let variations = generate_enhanced_query_variations("test query", &context);
        assert!(variations.len() <= 8);
        assert!(variations.contains(&"test query".to_string()));
    }

    #[test]
    fn filters_drop_expired_entries() {
        let mut e = entry("a", "hello", Category::Stored);
        e.expire_at_ms = Some(100);
        let filters = SearchFilters::default();
        assert!(!passes_filters(&e, &filters, 200));
        assert!(passes_filters(&e, &filters, 50));
    }

    #[test]
    fn log_type_filter_restricts_to_stored_or_log() {
        let stored = entry("a", "x", Category::Stored);
        let log = entry("b", "x", Category::Log);
        let filters = SearchFilters {
            log_type: Some("memory".to_string()),
            ..Default::default()
        };
        assert!(passes_filters(&stored, &filters, 0));
        assert!(!passes_filters(&log, &filters, 0));
    }

    #[test]
    fn search_ranks_by_composed_similarity_descending() {
        let entries = vec![
            entry("a", "completely unrelated text about nothing", Category::Stored),
            entry("b", "python programming language tutorial", Category::Stored),
        ];
        let config = SearchConfig::with_limit(10);
        let results = search(&entries, "python", None, &SearchFilters::default(), &config, &[], 0);
        assert_eq!(results[0].entry.id, "b");
    }

    #[test]
    fn vector_similarity_of_identical_vectors_is_near_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((vector_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }
}
