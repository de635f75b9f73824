use crate::{model::attribute::AttributeType, normalize::TypeSafety};
use serde_json::{Number, Value};

/// Check a non-null value against a declared attribute type.
///
/// Relaxed mode accepts loss-free conversions (numeric strings, numbers as
/// strings, boolean literals). Returns a description of the mismatch on
/// failure so callers can wrap it in their own error code.
pub(crate) fn coerce_to_type(
    value: &Value,
    kind: AttributeType,
    safety: TypeSafety,
) -> Result<Value, String> {
    let coerced = match (kind, value) {
        (AttributeType::Json | AttributeType::Ref, _)
        | (AttributeType::String, Value::String(_))
        | (AttributeType::Number, Value::Number(_))
        | (AttributeType::Boolean, Value::Bool(_)) => Some(value.clone()),

        _ if safety.is_strict() => None,

        (AttributeType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (AttributeType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (AttributeType::Number, Value::String(s)) => parse_number(s).map(Value::Number),
        (AttributeType::Boolean, Value::String(s)) => match s.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (AttributeType::Boolean, Value::Number(n)) => match n.as_u64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };

    coerced.ok_or_else(|| format!("expected a {kind}, got {}", describe(value)))
}

/// Parse a trimmed numeric string, preferring an integral representation.
pub(crate) fn parse_number(raw: &str) -> Option<Number> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Number::from(int));
    }
    if let Ok(uint) = raw.parse::<u64>() {
        return Some(Number::from(uint));
    }

    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Read a non-negative integer, accepting integral floats (`3.0`).
pub(crate) fn as_whole_number(value: &Value) -> Option<u64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(uint) = n.as_u64() {
        return Some(uint);
    }

    n.as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
        .map(|f| f as u64)
}

/// Short human-readable description of a value for error messages.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("a boolean ({b})"),
        Value::Number(n) => format!("a number ({n})"),
        Value::String(s) => format!("a string ('{s}')"),
        Value::Array(items) => format!("an array of {} item(s)", items.len()),
        Value::Object(_) => "a dictionary".to_string(),
    }
}
