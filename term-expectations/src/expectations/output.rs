//! Tiered result payloads for map expectations.

use super::result_format::{ResultFormat, ResultFormatConfig};
use crate::core::ExpectationValidationResult;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Placeholder used when unexpected values cannot be counted.
pub const UNHASHABLE_COUNTS: &str = "partial_exception_counts requires a hashable type";

/// Raw observations of a map expectation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapObservations<'a> {
    /// Rows in the domain.
    pub element_count: Option<u64>,
    /// Rows not excluded as missing; `None` when missing values are not tracked.
    pub nonnull_count: Option<u64>,
    pub unexpected_count: u64,
    pub unexpected_list: &'a [Value],
    pub unexpected_index_list: Option<&'a [Value]>,
    pub unexpected_rows: Option<&'a [Value]>,
}

/// Builds the result payload of a map expectation at the requested tier.
///
/// Every tier is a superset of the one below it: `BOOLEAN_ONLY` carries no
/// payload, `BASIC` adds counts, percentages and a truncated value list,
/// `SUMMARY` adds value frequencies and truncated indices, `COMPLETE` adds
/// the full lists.
pub fn format_map_output(
    format: &ResultFormatConfig,
    success: bool,
    observed: &MapObservations<'_>,
) -> ExpectationValidationResult {
    if format.result_format == ResultFormat::BooleanOnly {
        return ExpectationValidationResult::new(success, None);
    }

    let limit = format.partial_unexpected_count;
    let element_count = observed.element_count;
    let unexpected = observed.unexpected_count as f64;
    let percent_of = |denominator: u64| -> Value {
        if denominator > 0 {
            json!(unexpected / denominator as f64 * 100.0)
        } else {
            Value::Null
        }
    };

    let mut result = Map::new();
    result.insert("element_count".into(), json!(element_count));
    result.insert("unexpected_count".into(), json!(observed.unexpected_count));
    result.insert(
        "unexpected_percent".into(),
        percent_of(element_count.unwrap_or(0)),
    );
    result.insert(
        "partial_unexpected_list".into(),
        Value::Array(truncated(observed.unexpected_list, limit).to_vec()),
    );

    if let Some(nonnull) = observed.nonnull_count {
        let elements = element_count.unwrap_or(0);
        let missing = elements.saturating_sub(nonnull);
        result.insert("missing_count".into(), json!(missing));
        result.insert(
            "missing_percent".into(),
            if elements > 0 {
                json!(missing as f64 / elements as f64 * 100.0)
            } else {
                Value::Null
            },
        );
        result.insert(
            "unexpected_percent_nonmissing".into(),
            if elements > 0 { percent_of(nonnull) } else { Value::Null },
        );
    }

    if format.result_format == ResultFormat::Basic {
        return ExpectationValidationResult::new(success, Some(result));
    }

    if limit > 0 {
        result.insert(
            "partial_unexpected_counts".into(),
            partial_unexpected_counts(observed.unexpected_list, limit),
        );
        result.insert(
            "partial_unexpected_index_list".into(),
            observed
                .unexpected_index_list
                .map_or(Value::Null, |list| Value::Array(truncated(list, limit).to_vec())),
        );
    }

    if format.result_format == ResultFormat::Summary {
        return ExpectationValidationResult::new(success, Some(result));
    }

    result.insert(
        "unexpected_list".into(),
        Value::Array(observed.unexpected_list.to_vec()),
    );
    result.insert(
        "unexpected_index_list".into(),
        observed
            .unexpected_index_list
            .map_or(Value::Null, |list| Value::Array(list.to_vec())),
    );
    if let Some(rows) = observed.unexpected_rows {
        result.insert("unexpected_rows".into(), Value::Array(rows.to_vec()));
    }
    ExpectationValidationResult::new(success, Some(result))
}

fn truncated(values: &[Value], limit: usize) -> &[Value] {
    &values[..limit.min(values.len())]
}

/// The most frequent values, as `{"value", "count"}` objects sorted by
/// count descending then value ascending, truncated to `limit`.
///
/// Objects cannot be counted; any object in the list yields the
/// [`UNHASHABLE_COUNTS`] placeholder instead.
pub fn partial_unexpected_counts(values: &[Value], limit: usize) -> Value {
    if values.iter().any(|v| !is_hashable(v)) {
        return json!([UNHASHABLE_COUNTS]);
    }

    let mut counts: HashMap<String, (usize, &Value)> = HashMap::new();
    for value in values {
        counts
            .entry(value.to_string())
            .or_insert((0, value))
            .0 += 1;
    }

    let mut ordered: Vec<(usize, &Value)> = counts.into_values().collect();
    ordered.sort_by(|(ca, va), (cb, vb)| cb.cmp(ca).then_with(|| compare_values(va, vb)));
    Value::Array(
        ordered
            .into_iter()
            .take(limit)
            .map(|(count, value)| json!({"value": value, "count": count}))
            .collect(),
    )
}

fn is_hashable(value: &Value) -> bool {
    match value {
        Value::Object(_) => false,
        Value::Array(items) => items.iter().all(is_hashable),
        _ => true,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < booleans < numbers < strings < arrays.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .unwrap_or(f64::NAN)
                    .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(a, b)| compare_values(a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
