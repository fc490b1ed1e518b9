//! Success rules shared by expectation families.

use crate::core::ExpectationValidationResult;
use crate::error::{Result, TermError};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Whether a map expectation passes.
///
/// Nulls are excluded from both sides of the ratio:
/// `(total - unexpected - null) / (total - null) >= mostly`. The check is
/// vacuously true when the total or null count is unknown, and when no
/// non-null row remains (including an empty domain).
///
/// ```rust
/// use term_expectations::expectations::map_success;
///
/// assert!(!map_success(Some(10), 1, Some(2), 0.9)); // 7 / 8 = 0.875
/// assert!(map_success(Some(10), 1, Some(2), 0.8));
/// assert!(map_success(Some(0), 0, Some(0), 1.0));
/// ```
pub fn map_success(total: Option<u64>, unexpected: u64, null: Option<u64>, mostly: f64) -> bool {
    let (Some(total), Some(null)) = (total, null) else {
        return true;
    };
    let nonnull = i128::from(total) - i128::from(null);
    if nonnull == 0 {
        return true;
    }
    let expected = nonnull - i128::from(unexpected);
    expected as f64 / nonnull as f64 >= mostly
}

/// Reads `mostly`, which must be a number in `[0, 1]`.
pub fn parse_mostly(value: Option<&Value>) -> Result<f64> {
    match value {
        None | Some(Value::Null) => Ok(1.0),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(mostly) if (0.0..=1.0).contains(&mostly) => Ok(mostly),
            _ => Err(TermError::configuration(
                "'mostly' parameter must be between 0 and 1",
            )),
        },
        Some(_) => Err(TermError::configuration(
            "'mostly' parameter must be an integer or float",
        )),
    }
}

/// Checks `min_value`/`max_value` of a between-style configuration.
///
/// Bounds must be numbers or null; when both are given, `min_value <= max_value`.
/// With `require_bound`, at least one bound must be present.
pub fn validate_between_configuration(kwargs: &Map<String, Value>, require_bound: bool) -> Result<()> {
    let bound = |key: &str| -> Result<Option<f64>> {
        match kwargs.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(_) => Err(TermError::configuration(format!(
                "Provided {} threshold must be a number",
                if key == "min_value" { "min" } else { "max" }
            ))),
        }
    };
    let min = bound("min_value")?;
    let max = bound("max_value")?;
    if require_bound && min.is_none() && max.is_none() {
        return Err(TermError::configuration(
            "min_value and max_value cannot both be None",
        ));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(TermError::configuration(
                "Minimum Threshold cannot be larger than Maximum Threshold",
            ));
        }
    }
    Ok(())
}

/// Judges an observed metric value against optional bounds.
///
/// A null observation fails. The result payload is `{"observed_value": ...}`.
pub fn validate_metric_value_between(
    observed: &Value,
    min_value: Option<&Value>,
    max_value: Option<&Value>,
    strict_min: bool,
    strict_max: bool,
) -> Result<ExpectationValidationResult> {
    let payload = Some(Map::from_iter([("observed_value".to_string(), observed.clone())]));
    if observed.is_null() {
        return Ok(ExpectationValidationResult::new(false, payload));
    }

    let above_min = match min_value.filter(|v| !v.is_null()) {
        Some(min) => {
            let ordering = compare_observed(observed, min)?;
            if strict_min {
                ordering == Ordering::Greater
            } else {
                ordering != Ordering::Less
            }
        }
        None => true,
    };
    let below_max = match max_value.filter(|v| !v.is_null()) {
        Some(max) => {
            let ordering = compare_observed(observed, max)?;
            if strict_max {
                ordering == Ordering::Less
            } else {
                ordering != Ordering::Greater
            }
        }
        None => true,
    };
    Ok(ExpectationValidationResult::new(above_min && below_max, payload))
}

fn compare_observed(observed: &Value, bound: &Value) -> Result<Ordering> {
    match (observed, bound) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .ok_or_else(|| TermError::configuration(format!("cannot compare {observed} with {bound}"))),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(TermError::configuration(format!(
            "cannot compare observed value {observed} with bound {bound}"
        ))),
    }
}
