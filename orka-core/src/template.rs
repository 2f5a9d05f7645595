//! Prompt renderer: a small template-substitution engine over run-state
//! (§4, "Prompt renderer" row; Design Notes' "Templates in prompts").
//!
//! Supports `{{ variable.path }}` lookups, `{{ function("arg") }}` calls,
//! `| filter` pipelines, and `{% if %}` / `{% for %}` blocks. Rendering
//! never fails outright — an undefined variable or malformed expression
//! degrades to an empty substitution (or, for whole malformed tags, the
//! tag's raw text) so a bad prompt template never aborts a run (spec.md
//! §8 boundary: "does not crash the scheduler").

use serde_json::Value;

use crate::context::RunContext;

/// Render `template` against `ctx`. Best-effort: always returns a string,
/// never an error.
pub fn render(template: &str, ctx: &RunContext) -> String {
    let scope = build_scope(ctx);
    render_block(template, &scope)
}

fn build_scope(ctx: &RunContext) -> Value {
    let previous_outputs: serde_json::Map<String, Value> = ctx
        .previous_outputs
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
        .collect();
    serde_json::json!({
        "input": ctx.input,
        "previous_outputs": previous_outputs,
        "loop_number": ctx.loop_number,
        "past_loops": ctx.past_loops.iter().map(|p| serde_json::to_value(p).unwrap_or(Value::Null)).collect::<Vec<_>>(),
        "trace_id": ctx.trace_id,
    })
}

/// Render a template fragment, handling `{% for %}` / `{% if %}` blocks
/// by recursive descent and `{{ }}` expressions inline.
fn render_block(template: &str, scope: &Value) -> String {
    let mut out = String::new();
    let mut rest = template;

    while let Some(start) = find_tag_start(rest) {
        out.push_str(&rest[..start]);
        let (tag_kind, tag_body, after_tag) = match parse_tag(&rest[start..]) {
            Some(t) => t,
            None => {
                // Unterminated tag: emit the rest verbatim rather than
                // looping forever or erroring.
                out.push_str(&rest[start..]);
                return out;
            }
        };

        match tag_kind {
            TagKind::Expr => {
                out.push_str(&eval_expr(tag_body.trim(), scope));
                rest = after_tag;
            }
            TagKind::Stmt => {
                let stmt = tag_body.trim();
                if let Some(cond) = stmt.strip_prefix("if ") {
                    let (then_branch, else_branch, tail) = split_if_block(after_tag);
                    let truthy = eval_condition(cond.trim(), scope);
                    out.push_str(&render_block(
                        if truthy { then_branch } else { else_branch },
                        scope,
                    ));
                    rest = tail;
                } else if let Some(for_spec) = stmt.strip_prefix("for ") {
                    let (body, tail) = split_for_block(after_tag);
                    out.push_str(&render_for(for_spec.trim(), body, scope));
                    rest = tail;
                } else {
                    // Unknown statement tag — best effort: skip it, keep going.
                    rest = after_tag;
                }
            }
        }
    }
    out.push_str(rest);
    out
}

enum TagKind {
    Expr,
    Stmt,
}

fn find_tag_start(s: &str) -> Option<usize> {
    let expr = s.find("{{");
    let stmt = s.find("{%");
    match (expr, stmt) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Parse the tag starting at `s[0..]`, returning (kind, inner body,
/// remainder after the closing delimiter).
fn parse_tag(s: &str) -> Option<(TagKind, &str, &str)> {
    if let Some(body_start) = s.strip_prefix("{{") {
        let end = body_start.find("}}")?;
        Some((TagKind::Expr, &body_start[..end], &body_start[end + 2..]))
    } else if let Some(body_start) = s.strip_prefix("{%") {
        let end = body_start.find("%}")?;
        Some((TagKind::Stmt, &body_start[..end], &body_start[end + 2..]))
    } else {
        None
    }
}

/// Given the text right after an `{% if %}` tag, split into the `then`
/// body, the `else` body (empty if absent), and everything after the
/// matching `{% endif %}`. Malformed/unterminated blocks degrade to
/// treating the rest of the template as the `then` body with no tail.
fn split_if_block(rest: &str) -> (&str, &str, &str) {
    match find_matching_end(rest, "if", "endif") {
        Some((inner, tail)) => match find_top_level_else(inner) {
            Some((then_b, else_b)) => (then_b, else_b, tail),
            None => (inner, "", tail),
        },
        None => (rest, "", ""),
    }
}

fn split_for_block(rest: &str) -> (&str, &str) {
    match find_matching_end(rest, "for", "endfor") {
        Some((inner, tail)) => (inner, tail),
        None => (rest, ""),
    }
}

/// Scan forward from `rest`, tracking nested `{% open %}`/`{% endopen %}`
/// pairs of the same kind, to find the matching end tag. Returns the text
/// between and everything after the matching end tag.
fn find_matching_end<'a>(rest: &'a str, open: &str, close: &str) -> Option<(&'a str, &'a str)> {
    let mut depth = 1usize;
    let mut cursor = 0usize;
    loop {
        let remainder = &rest[cursor..];
        let tag_start = find_tag_start(remainder)?;
        let (kind, body, after) = parse_tag(&remainder[tag_start..])?;
        let body_trim = body.trim();
        let consumed = remainder.len() - after.len();
        if matches!(kind, TagKind::Stmt) {
            if body_trim.starts_with(&format!("{open} ")) || body_trim == open {
                depth += 1;
            } else if body_trim == close {
                depth -= 1;
                if depth == 0 {
                    let inner_end = cursor + tag_start;
                    return Some((&rest[..inner_end], after));
                }
            }
        }
        cursor += consumed;
    }
}

/// Find a top-level `{% else %}` inside `inner` (not nested inside
/// another if/for), splitting into (then, else).
fn find_top_level_else(inner: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut cursor = 0usize;
    loop {
        let remainder = &inner[cursor..];
        let tag_start = find_tag_start(remainder)?;
        let (kind, body, after) = parse_tag(&remainder[tag_start..])?;
        let body_trim = body.trim();
        let consumed = remainder.len() - after.len();
        if matches!(kind, TagKind::Stmt) {
            if body_trim.starts_with("if ") || body_trim.starts_with("for ") {
                depth += 1;
            } else if body_trim == "endif" || body_trim == "endfor" {
                depth -= 1;
            } else if depth == 0 && body_trim == "else" {
                let then_end = cursor + tag_start;
                return Some((&inner[..then_end], after));
            }
        }
        cursor += consumed;
    }
}

fn render_for(spec: &str, body: &str, scope: &Value) -> String {
    // spec is `item in path.to.list`
    let parts: Vec<&str> = spec.splitn(2, " in ").collect();
    if parts.len() != 2 {
        return String::new();
    }
    let var_name = parts[0].trim();
    let list_path = parts[1].trim();
    let list = resolve_path(list_path, scope).unwrap_or(Value::Null);
    let items = match list {
        Value::Array(items) => items,
        _ => return String::new(),
    };

    let mut out = String::new();
    for item in items {
        let mut loop_scope = scope.clone();
        if let Value::Object(map) = &mut loop_scope {
            map.insert(var_name.to_string(), item);
        }
        out.push_str(&render_block(body, &loop_scope));
    }
    out
}

fn eval_condition(expr: &str, scope: &Value) -> bool {
    let value = eval_value(expr, scope);
    is_truthy(&value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn eval_expr(expr: &str, scope: &Value) -> String {
    let value = eval_value(expr, scope);
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Evaluate an expression: a path, a function call, or a `| filter`
/// pipeline over either.
fn eval_value(expr: &str, scope: &Value) -> Value {
    let mut parts = expr.split('|');
    let head = parts.next().unwrap_or("").trim();
    let mut value = eval_primary(head, scope);
    for filter in parts {
        value = apply_filter(filter.trim(), value);
    }
    value
}

fn eval_primary(expr: &str, scope: &Value) -> Value {
    if let Some(call) = parse_call(expr) {
        return eval_call(&call.0, &call.1, scope);
    }
    resolve_path(expr, scope).unwrap_or(Value::Null)
}

/// Parse `name("arg", "arg2")` into (name, args). Only string/bare-word
/// arguments are supported — enough for `get_agent_response("id")`.
fn parse_call(expr: &str) -> Option<(String, Vec<String>)> {
    let open = expr.find('(')?;
    if !expr.ends_with(')') {
        return None;
    }
    let name = expr[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let args_str = &expr[open + 1..expr.len() - 1];
    let args = if args_str.trim().is_empty() {
        Vec::new()
    } else {
        args_str
            .split(',')
            .map(|a| a.trim().trim_matches('"').trim_matches('\'').to_string())
            .collect()
    };
    Some((name.to_string(), args))
}

fn eval_call(name: &str, args: &[String], scope: &Value) -> Value {
    match name {
        "get_input" => scope.get("input").cloned().unwrap_or(Value::Null),
        "get_agent_response" => {
            let id = match args.first() {
                Some(id) => id,
                None => return Value::Null,
            };
            scope
                .get("previous_outputs")
                .and_then(|p| p.get(id))
                .and_then(|o| o.get("result"))
                .cloned()
                .unwrap_or(Value::Null)
        }
        "get_loop_number" => scope.get("loop_number").cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn apply_filter(filter: &str, value: Value) -> Value {
    if let Some(call) = parse_call(filter) {
        if call.0 == "default" {
            if is_truthy(&value) {
                return value;
            }
            return call.1.first().cloned().map(Value::String).unwrap_or(Value::Null);
        }
    }
    match filter {
        "upper" => match value {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        },
        "lower" => match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        },
        "trim" => match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        },
        _ => value,
    }
}

/// Resolve a dotted path (`previous_outputs.classifier.result`) against
/// the scope. Array indices like `past_loops.0.score` are supported.
fn resolve_path(path: &str, scope: &Value) -> Option<Value> {
    let mut current = scope.clone();
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        current = if let Ok(idx) = segment.parse::<usize>() {
            current.get(idx)?.clone()
        } else {
            current.get(segment)?.clone()
        };
    }
    Some(current)
}
