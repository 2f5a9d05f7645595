//! Robust extraction, repair, and schema validation of structured output
//! from free-form LLM text (§4.7).

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::error::{CoreError, Result};

/// A schema describes what a parsed object must contain. Deliberately
/// small — this is not a general JSON Schema implementation, just the
/// required/typed/default machinery §4.7 step 5 calls for.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub required: Vec<String>,
    /// Fields that should be coerced to a particular JSON type if present
    /// as a different (but convertible) type, e.g. `"0.9"` -> `0.9`.
    pub typed: Vec<(String, FieldType)>,
    pub defaults: Vec<(String, Value)>,
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Number,
    Bool,
    String,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn typed(mut self, field: impl Into<String>, ty: FieldType) -> Self {
        self.typed.push((field.into(), ty));
        self
    }

    pub fn default_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.defaults.push((field.into(), value));
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

fn think_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").unwrap())
}

/// Strip `<think>...</think>` reasoning blocks before looking for JSON.
pub fn strip_think_blocks(text: &str) -> String {
    think_block_re().replace_all(text, "").to_string()
}

/// Locate the most likely JSON substring in `text`: a fenced ```json
/// block, any fenced block, or the first balanced `{...}`/`[...]`.
pub fn extract_candidate(text: &str) -> Option<&str> {
    if let Some(inner) = extract_fenced(text, "```json") {
        return Some(inner);
    }
    if let Some(inner) = extract_fenced(text, "```") {
        return Some(inner);
    }
    extract_balanced(text)
}

fn extract_fenced<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    let candidate = rest[..end].trim();
    if candidate.is_empty() {
        None
    } else {
        Some(candidate)
    }
}

fn extract_balanced(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        let (open, close) = match b {
            b'{' => (b'{', b'}'),
            b'[' => (b'[', b']'),
            _ => continue,
        };
        if let Some(end) = find_balanced_end(bytes, i, open, close) {
            return Some(&text[i..=end]);
        }
    }
    None
}

fn find_balanced_end(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for i in start..bytes.len() {
        let b = bytes[i];
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Normalize Python-ish syntax into valid JSON: `True`/`False`/`None`,
/// single-quoted strings, and trailing commas before `}`/`]`.
pub fn normalize_python_syntax(text: &str) -> String {
    let text = normalize_bareword_literals(text);
    let text = normalize_single_quotes(&text);
    strip_trailing_commas(&text)
}

fn normalize_bareword_literals(text: &str) -> String {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    let re = WORD_RE.get_or_init(|| Regex::new(r"\b(True|False|None)\b").unwrap());
    re.replace_all(text, |caps: &regex::Captures| match &caps[1] {
        "True" => "true",
        "False" => "false",
        _ => "null",
    })
    .to_string()
}

/// Replace single-quoted JSON strings with double-quoted ones. This is a
/// best-effort character scan, not a full lexer: it does not attempt to
/// handle single quotes that are genuinely part of the text content.
fn normalize_single_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_double = false;
    while let Some(c) = chars.next() {
        match c {
            '"' if !in_double => {
                in_double = true;
                out.push(c);
            }
            '"' if in_double => {
                in_double = false;
                out.push(c);
            }
            '\'' if !in_double => {
                out.push('"');
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r",(\s*[}\]])").unwrap());
    re.replace_all(text, "$1").to_string()
}

/// Outcome of [`parse_llm_json`] when no strict failure path applies.
#[derive(Debug)]
pub struct ParseOutcome {
    pub value: Value,
    /// True when the repair pass (python-syntax normalization / trailing
    /// comma removal) was needed to get a parseable value — a "silent
    /// degradation" per §7, recorded but not failing the step.
    pub repaired: bool,
}

/// Extract, repair, and parse a JSON value out of free-form LLM text.
/// Never panics; on total failure returns `Err` (caller decides whether
/// that becomes a `json_parse_failed` envelope or a caller-supplied
/// default, or is raised in strict mode per §4.7 step 6).
pub fn parse_llm_json(text: &str) -> Result<ParseOutcome> {
    let stripped = strip_think_blocks(text);
    let candidate = extract_candidate(&stripped)
        .ok_or_else(|| CoreError::JsonParseFailed("no JSON-like content found".to_string()))?;

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Ok(ParseOutcome {
            value,
            repaired: false,
        });
    }

    let repaired = normalize_python_syntax(candidate);
    let value = serde_json::from_str::<Value>(&repaired)
        .map_err(|e| CoreError::JsonParseFailed(e.to_string()))?;
    Ok(ParseOutcome {
        value,
        repaired: true,
    })
}

/// Apply [`Schema`] validation/coercion to a parsed value. Unknown fields
/// are tolerated unless `schema.strict`. Missing required fields error
/// unless a default is registered for them.
pub fn validate(value: Value, schema: &Schema) -> Result<Value> {
    let mut obj = match value {
        Value::Object(o) => o,
        other => {
            return Err(CoreError::JsonParseFailed(format!(
                "expected a JSON object, got {other}"
            )))
        }
    };

    for (field, default) in &schema.defaults {
        obj.entry(field.clone()).or_insert_with(|| default.clone());
    }

    for field in &schema.required {
        if !obj.contains_key(field) {
            return Err(CoreError::JsonParseFailed(format!(
                "missing required field '{field}'"
            )));
        }
    }

    for (field, ty) in &schema.typed {
        if let Some(v) = obj.get(field).cloned() {
            obj.insert(field.clone(), coerce(v, *ty)?);
        }
    }

    if schema.strict {
        let known: std::collections::HashSet<&str> = schema
            .required
            .iter()
            .map(String::as_str)
            .chain(schema.typed.iter().map(|(f, _)| f.as_str()))
            .chain(schema.defaults.iter().map(|(f, _)| f.as_str()))
            .collect();
        let unknown: Vec<String> = obj
            .keys()
            .filter(|k| !known.contains(k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(CoreError::JsonParseFailed(format!(
                "unexpected fields in strict mode: {}",
                unknown.join(", ")
            )));
        }
    }

    Ok(Value::Object(obj))
}

fn coerce(value: Value, ty: FieldType) -> Result<Value> {
    match (ty, &value) {
        (FieldType::Number, Value::String(s)) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| CoreError::JsonParseFailed(format!("cannot coerce '{s}' to number"))),
        (FieldType::Bool, Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(CoreError::JsonParseFailed(format!(
                "cannot coerce '{s}' to bool"
            ))),
        },
        (FieldType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (FieldType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        _ => Ok(value),
    }
}

/// `error_envelope` builds the `{error: "json_parse_failed", ...}` shape
/// called for in §4.7 step 6, for callers in non-strict mode with no
/// default to fall back to.
pub fn error_envelope(reason: &str) -> Value {
    serde_json::json!({"error": "json_parse_failed", "reason": reason})
}

pub fn empty_object() -> Map<String, Value> {
    Map::new()
}
