//! Response extraction: isolate and strictly parse a JSON payload from
//! raw upstream text, then map it onto a schema's section keys.
//!
//! Repair is limited to two normalisations (code-fence removal and
//! trailing-comma removal) ahead of a strict `serde_json` parse. Anything
//! still invalid after that is a `ParseError`; values are never guessed.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use super::schema::SectionSchema;
use crate::models::SectionedRecord;

/// Top-level keys that may wrap the section object.
const WRAPPER_KEYS: &[&str] = &["sections", "analysis", "result", "interpretation"];

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_\-]*").unwrap());

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("No JSON object found in response")]
    NoJsonSpan,

    #[error("Invalid JSON after repair: {0}")]
    Invalid(String),

    #[error("JSON payload is not an object")]
    NotAnObject,

    #[error("JSON object has no recognised section keys")]
    NoSections,
}

/// Remove every code-fence marker and its language tag.
pub fn strip_fences(text: &str) -> String {
    FENCE.replace_all(text, "").into_owned()
}

/// Slice from the first `{` to the last `}`.
pub fn isolate_object(text: &str) -> Result<&str, ParseError> {
    let start = text.find('{').ok_or(ParseError::NoJsonSpan)?;
    let end = text.rfind('}').ok_or(ParseError::NoJsonSpan)?;
    if end <= start {
        return Err(ParseError::NoJsonSpan);
    }
    Ok(&text[start..=end])
}

/// Drop commas that directly precede `}` or `]`, outside string literals.
pub fn remove_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Full extraction: trim, strip fences, isolate, repair, strict parse.
pub fn extract_json(raw: &str) -> Result<Value, ParseError> {
    let unfenced = strip_fences(raw.trim());
    let span = isolate_object(&unfenced)?;
    let repaired = remove_trailing_commas(span);
    serde_json::from_str(&repaired).map_err(|e| ParseError::Invalid(e.to_string()))
}

/// Extract and map onto the schema in one step.
pub fn extract_sections(raw: &str, schema: &SectionSchema) -> Result<SectionedRecord, ParseError> {
    let value = extract_json(raw)?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;
    let record = record_from_object(object, schema);
    if record.is_empty() {
        return Err(ParseError::NoSections);
    }
    Ok(record)
}

/// Read schema keys and aliases from a parsed object, descending into a
/// wrapper object when the top level carries no section keys.
pub fn record_from_object(object: &Map<String, Value>, schema: &SectionSchema) -> SectionedRecord {
    let record = map_keys(object, schema);
    if !record.is_empty() {
        return record;
    }
    WRAPPER_KEYS
        .iter()
        .filter_map(|w| object.get(*w).and_then(Value::as_object))
        .map(|inner| map_keys(inner, schema))
        .find(|r| !r.is_empty())
        .unwrap_or_default()
}

fn map_keys(object: &Map<String, Value>, schema: &SectionSchema) -> SectionedRecord {
    let mut record = SectionedRecord::new();
    for (name, value) in object {
        let Some(key) = schema.resolve_json_key(name) else {
            continue;
        };
        if let Some(text) = render_value(value) {
            record.append(key, &text);
        }
    }
    record
}

/// Render a JSON value as section text. `None` for null or empty values.
pub fn render_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(render_inline)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| render_inline(v).map(|text| format!("{k}: {text}")))
            .collect::<Vec<_>>()
            .join("\n"),
    };
    (!text.is_empty()).then_some(text)
}

/// Single-line rendering for values nested inside arrays or objects.
fn render_inline(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_inline).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .filter_map(|(k, v)| render_inline(v).map(|text| format!("{k}: {text}")))
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        other => render_value(other),
    }
}
