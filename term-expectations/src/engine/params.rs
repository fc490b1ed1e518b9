//! Typed lookups into splitter and sampler kwargs.

use crate::error::{Result, TermError};
use serde_json::{Map, Value};

fn missing(key: &str) -> TermError {
    TermError::configuration(format!("missing required parameter '{key}'"))
}

pub(crate) fn str_param<'a>(kwargs: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    opt_str_param(kwargs, key)?.ok_or_else(|| missing(key))
}

pub(crate) fn opt_str_param<'a>(
    kwargs: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(TermError::configuration(format!(
            "parameter '{key}' must be a string, got {other}"
        ))),
    }
}

/// Reads an integer parameter that must be strictly positive.
pub(crate) fn positive_int_param(kwargs: &Map<String, Value>, key: &str) -> Result<i64> {
    let value = kwargs.get(key).ok_or_else(|| missing(key))?;
    let n = int_value(value, key)?;
    if n <= 0 {
        return Err(TermError::configuration(format!(
            "parameter '{key}' must be positive, got {n}"
        )));
    }
    Ok(n)
}

/// Reads a JSON value as an integer; floats with no fractional part are accepted.
pub(crate) fn int_value(value: &Value, key: &str) -> Result<i64> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        _ => Err(TermError::configuration(format!(
            "parameter '{key}' must be an integer, got {value}"
        ))),
    }
}

pub(crate) fn opt_f64_param(kwargs: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            TermError::configuration(format!("parameter '{key}' must be a number, got {value}"))
        }),
    }
}

pub(crate) fn opt_int_param(kwargs: &Map<String, Value>, key: &str) -> Result<Option<i64>> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => int_value(value, key).map(Some),
    }
}

pub(crate) fn object_param<'a>(
    kwargs: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Map<String, Value>> {
    match kwargs.get(key) {
        Some(Value::Object(map)) => Ok(map),
        None | Some(Value::Null) => Err(missing(key)),
        Some(other) => Err(TermError::configuration(format!(
            "parameter '{key}' must be an object, got {other}"
        ))),
    }
}

pub(crate) fn array_param<'a>(kwargs: &'a Map<String, Value>, key: &str) -> Result<&'a [Value]> {
    match kwargs.get(key) {
        Some(Value::Array(items)) => Ok(items),
        None | Some(Value::Null) => Err(missing(key)),
        Some(other) => Err(TermError::configuration(format!(
            "parameter '{key}' must be a list, got {other}"
        ))),
    }
}
