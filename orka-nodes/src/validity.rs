//! The Failover validity predicate (§4.4.6, Design Notes "Structured
//! errors from string matching"). Isolated in one function with full unit
//! coverage, as the design notes ask, because the heuristics themselves
//! are inherently stringly-typed and worth pinning down precisely.

use orka_core::{Output, Status};
use serde_json::Value;

const ERROR_SUBSTRINGS: &[&str] = &[
    "error",
    "failed",
    "rate limit",
    "timeout",
    "internal server error",
    "bad gateway",
    "service unavailable",
];

/// A child's output "succeeds" iff it is non-empty, not a `status:error`
/// envelope, and its text form contains none of the recognized
/// error/failure markers or raw HTML tags.
pub fn is_valid_result(output: &Output) -> bool {
    if !output.is_structurally_ok() {
        return false;
    }
    is_valid_text(&result_text(&output.result))
}

fn result_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The string-heuristic half, usable directly on raw text for callers
/// that haven't wrapped a result in an [`Output`] yet.
pub fn is_valid_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.eq_ignore_ascii_case("none") {
        return false;
    }

    let lower = trimmed.to_lowercase();
    if ERROR_SUBSTRINGS.iter().any(|needle| lower.contains(needle)) {
        return false;
    }

    if contains_html_tag(trimmed) {
        return false;
    }

    true
}

fn contains_html_tag(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if let Some(close) = text[i..].find('>') {
                let inner = &text[i + 1..i + close];
                if !inner.is_empty() && inner.chars().next().map(|c| c.is_alphabetic() || c == '/').unwrap_or(false) {
                    return true;
                }
            }
        }
        i += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use orka_core::ComponentType;

    #[test]
    fn empty_text_is_invalid() {
        assert!(!is_valid_text(""));
        assert!(!is_valid_text("   "));
    }

    #[test]
    fn literal_none_is_invalid() {
        assert!(!is_valid_text("NONE"));
        assert!(!is_valid_text("none"));
    }

    #[test]
    fn error_tokens_are_invalid() {
        assert!(!is_valid_text("Something failed unexpectedly"));
        assert!(!is_valid_text("Rate limit exceeded, try later"));
        assert!(!is_valid_text("Connection timeout after 30s"));
        assert!(!is_valid_text("an error occurred"));
    }

    #[test]
    fn html_tags_are_invalid() {
        assert!(!is_valid_text("<div>broken output</div>"));
        assert!(!is_valid_text("leading text <span>bad</span>"));
    }

    #[test]
    fn plain_good_text_is_valid() {
        assert!(is_valid_text("The answer is 42."));
    }

    #[test]
    fn less_than_comparison_is_not_mistaken_for_html() {
        assert!(is_valid_text("3 < 5 and 5 > 3"));
    }

    #[test]
    fn error_status_output_is_invalid() {
        let out = Output::error("a", ComponentType::Agent, "boom");
        assert!(!is_valid_result(&out));
    }

    #[test]
    fn success_output_with_clean_text_is_valid() {
        let out = Output::success("a", ComponentType::Agent, Value::String("all good".into()));
        assert!(is_valid_result(&out));
    }

    #[test]
    fn success_output_with_error_like_text_is_invalid() {
        let out = Output::success("a", ComponentType::Agent, Value::String("API error: 500".into()));
        assert!(!is_valid_result(&out));
    }
}
