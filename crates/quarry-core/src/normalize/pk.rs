use crate::{
    model::attribute::AttributeType,
    normalize::{
        MAX_SAFE_INTEGER, NormalizeError,
        coerce::{as_whole_number, describe, parse_number},
    },
};
use serde_json::Value;

/// Normalize one or many primary key values against the declared pk type.
///
/// Always yields an array. Duplicates are dropped, first occurrence wins.
/// String pks need non-empty strings; number pks need non-negative safe
/// integers, and numeric strings are parsed.
pub fn normalize_pk_values(
    value: &Value,
    pk_type: AttributeType,
) -> Result<Vec<Value>, NormalizeError> {
    let candidates = match value {
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };

    let mut normalized: Vec<Value> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let pk = normalize_pk_value(candidate, pk_type)?;
        if !normalized.contains(&pk) {
            normalized.push(pk);
        }
    }

    Ok(normalized)
}

/// Normalize exactly one primary key value.
pub(crate) fn normalize_pk_value(
    value: &Value,
    pk_type: AttributeType,
) -> Result<Value, NormalizeError> {
    match (pk_type, value) {
        (AttributeType::String, Value::String(s)) if !s.is_empty() => Ok(value.clone()),
        (AttributeType::String, Value::String(_)) => Err(NormalizeError::InvalidPkValue(
            "instead of a string (the expected pk type), got an empty string".to_string(),
        )),

        (AttributeType::Number, Value::Number(_)) => safe_natural(value).ok_or_else(|| {
            NormalizeError::InvalidPkValue(format!(
                "instead of a non-negative safe integer (the expected pk type), got {}",
                describe(value)
            ))
        }),
        (AttributeType::Number, Value::String(s)) => parse_number(s)
            .map(Value::Number)
            .as_ref()
            .and_then(safe_natural)
            .ok_or_else(|| {
                NormalizeError::InvalidPkValue(format!(
                    "instead of a number (the expected pk type), got a string that cannot be parsed as one ('{s}')"
                ))
            }),

        (AttributeType::String | AttributeType::Number, other) => {
            Err(NormalizeError::InvalidPkValue(format!(
                "instead of a {pk_type} (the expected pk type), got {}",
                describe(other)
            )))
        }

        (kind, _) => Err(NormalizeError::InvalidPkValue(format!(
            "primary keys cannot be declared as {kind}"
        ))),
    }
}

fn safe_natural(value: &Value) -> Option<Value> {
    as_whole_number(value)
        .filter(|n| *n <= MAX_SAFE_INTEGER)
        .map(Value::from)
}
