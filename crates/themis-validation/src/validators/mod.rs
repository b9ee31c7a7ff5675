//! Built-in validators

pub mod custom;
pub mod data_type;
pub mod length;
pub mod numeric;
pub mod pattern;
pub mod required;

use serde_json::Value;

/// Render a value the way messages and pattern checks see it
pub(crate) fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Format a bound without a trailing `.0`
pub(crate) fn format_bound(bound: f64) -> String {
    if bound.fract() == 0.0 && bound.abs() < 1e15 {
        format!("{}", bound as i64)
    } else {
        bound.to_string()
    }
}
