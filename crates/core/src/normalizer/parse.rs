//! Coercion of loosely typed client values.
//!
//! Form fields arrive as text, JSON clients send real types, and some clients
//! send JSON array text inside a string. Everything here accepts all three.

use serde_json::Value;

/// Decode a list field into trimmed, lower-cased, de-duplicated entries.
///
/// Accepts a JSON array, a string holding JSON array text, a comma separated
/// string, or a single scalar. `null` yields an empty list.
pub fn parse_list(value: &Value) -> Vec<String> {
    let mut items = Vec::new();
    collect_items(value, &mut items);

    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_empty() && !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

fn collect_items(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::Array(entries) => {
            for entry in entries {
                match entry {
                    Value::Array(_) => collect_items(entry, out),
                    other => out.push(clean_item(&scalar_text(other))),
                }
            }
        }
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.starts_with('[') {
                if let Ok(decoded @ Value::Array(_)) = serde_json::from_str::<Value>(trimmed) {
                    collect_items(&decoded, out);
                    return;
                }
            }
            let unbracketed = trimmed.trim_start_matches('[').trim_end_matches(']');
            out.extend(unbracketed.split(',').map(clean_item));
        }
        other => out.push(clean_item(&scalar_text(other))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn clean_item(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_ascii_lowercase()
}

/// Read an integer from a number or numeric text. Fractions are truncated.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Read a finite float from a number or numeric text.
pub fn parse_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Clamp an integer field into `[min, max]`, falling back to `default` when absent or unparseable.
pub fn clamp_int(value: Option<&Value>, min: i64, max: i64, default: i64) -> i64 {
    value
        .and_then(parse_int)
        .map(|v| v.clamp(min, max))
        .unwrap_or(default)
}

/// Clamp a float field into `[min, max]`, falling back to `default` when absent or unparseable.
pub fn clamp_float(value: Option<&Value>, min: f64, max: f64, default: f64) -> f64 {
    value
        .and_then(parse_float)
        .map(|v| v.clamp(min, max))
        .unwrap_or(default)
}

/// Convert a percentage into a multiplicative factor, never below 1 %.
pub fn percent_to_factor(percent: i64) -> f64 {
    (percent as f64 / 100.0).max(0.01)
}
