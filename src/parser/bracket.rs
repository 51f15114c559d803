//! Bracket-form action-input parsing: `Action: tool_name[key=value, key2=42]`.
//!
//! Grounded on `proteus/src/agent/utils/llm_response_parser.py`'s bracket
//! regex (`Action:\s*([^[\s]+)\[(.*?)\]`) and its follow-up coercion of each
//! `key=value` pair into bool/int/float/string.

use serde_json::{Map, Value};

/// Splits `key=value, key2=value2` on top-level commas (commas inside a
/// quoted value don't split) and coerces each value to the narrowest JSON
/// type it parses as.
pub fn parse_kv_args(body: &str) -> Value {
    let mut map = Map::new();
    for pair in split_top_level(body) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) => {
                map.insert(key.trim().to_string(), coerce(value.trim()));
            }
            None => {
                // A bare positional token with no `=`: stash it under a
                // synthetic key so no information is silently dropped.
                map.insert("value".to_string(), coerce(pair));
            }
        }
    }
    Value::Object(map)
}

fn split_top_level(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '"';
    for ch in body.chars() {
        match ch {
            '"' | '\'' if !in_quotes => {
                in_quotes = true;
                quote_char = ch;
                current.push(ch);
            }
            c if in_quotes && c == quote_char => {
                in_quotes = false;
                current.push(c);
            }
            ',' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn coerce(raw: &str) -> Value {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    if let Some(s) = unquoted {
        return Value::String(s.to_string());
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" | "None" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}
