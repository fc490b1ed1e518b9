//! Conversions between JSON kwargs, DataFusion literals and Arrow results.
//!
//! Metric values leave the engine as plain JSON; these helpers are the only
//! place Arrow types are turned into `serde_json::Value`.

use crate::error::{Result, TermError};
use arrow::array::{Array, ArrayRef, RecordBatch};
use datafusion::logical_expr::{ident, lit, Expr};
use datafusion::scalar::ScalarValue;
use serde_json::{Map, Number, Value};

/// Converts a JSON scalar into a DataFusion scalar.
pub fn json_to_scalar(value: &Value) -> Result<ScalarValue> {
    match value {
        Value::Null => Ok(ScalarValue::Null),
        Value::Bool(b) => Ok(ScalarValue::Boolean(Some(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ScalarValue::Int64(Some(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(ScalarValue::UInt64(Some(u)))
            } else {
                Ok(ScalarValue::Float64(n.as_f64()))
            }
        }
        Value::String(s) => Ok(ScalarValue::Utf8(Some(s.clone()))),
        other => Err(TermError::configuration(format!(
            "expected a scalar value, got {other}"
        ))),
    }
}

/// Converts a JSON scalar into a literal expression.
pub fn json_literal(value: &Value) -> Result<Expr> {
    json_to_scalar(value).map(lit)
}

/// Builds `column = value`, or `column IS NULL` when the value is null.
pub fn column_equals(column: &str, value: &Value) -> Result<Expr> {
    if value.is_null() {
        Ok(ident(column).is_null())
    } else {
        Ok(ident(column).eq(json_literal(value)?))
    }
}

/// Converts a DataFusion scalar into JSON.
///
/// Non-finite floats become `null`; temporal and other non-JSON types are
/// rendered with their display form.
pub fn scalar_to_json(value: &ScalarValue) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match value {
        ScalarValue::Boolean(Some(b)) => Value::Bool(*b),
        ScalarValue::Int8(Some(v)) => Value::from(*v),
        ScalarValue::Int16(Some(v)) => Value::from(*v),
        ScalarValue::Int32(Some(v)) => Value::from(*v),
        ScalarValue::Int64(Some(v)) => Value::from(*v),
        ScalarValue::UInt8(Some(v)) => Value::from(*v),
        ScalarValue::UInt16(Some(v)) => Value::from(*v),
        ScalarValue::UInt32(Some(v)) => Value::from(*v),
        ScalarValue::UInt64(Some(v)) => Value::from(*v),
        ScalarValue::Float32(Some(v)) => float_to_json(f64::from(*v)),
        ScalarValue::Float64(Some(v)) => float_to_json(*v),
        ScalarValue::Utf8(Some(s))
        | ScalarValue::LargeUtf8(Some(s))
        | ScalarValue::Utf8View(Some(s)) => Value::String(s.clone()),
        ScalarValue::List(list) => array_to_json_list(list.values()),
        ScalarValue::LargeList(list) => array_to_json_list(list.values()),
        other => Value::String(other.to_string()),
    }
}

fn float_to_json(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn array_to_json_list(array: &ArrayRef) -> Value {
    Value::Array(
        (0..array.len())
            .map(|i| {
                ScalarValue::try_from_array(array, i)
                    .map(|s| scalar_to_json(&s))
                    .unwrap_or(Value::Null)
            })
            .collect(),
    )
}

/// Reads one cell as JSON.
pub fn cell_to_json(array: &ArrayRef, row: usize) -> Result<Value> {
    Ok(scalar_to_json(&ScalarValue::try_from_array(array, row)?))
}

/// Flattens the values of one column across batches.
pub fn column_to_json(batches: &[RecordBatch], index: usize) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    for batch in batches {
        let column = batch.column(index);
        for row in 0..batch.num_rows() {
            values.push(cell_to_json(column, row)?);
        }
    }
    Ok(values)
}

/// Converts batches into JSON objects, one per row, skipping `skip` columns.
pub fn rows_to_json(batches: &[RecordBatch], skip: &[&str]) -> Result<Vec<Value>> {
    let mut rows = Vec::new();
    for batch in batches {
        let schema = batch.schema();
        for row in 0..batch.num_rows() {
            let mut object = Map::new();
            for (i, field) in schema.fields().iter().enumerate() {
                if skip.contains(&field.name().as_str()) {
                    continue;
                }
                object.insert(field.name().clone(), cell_to_json(batch.column(i), row)?);
            }
            rows.push(Value::Object(object));
        }
    }
    Ok(rows)
}

/// Reads the single row produced by a bundled aggregate.
///
/// Fails with a graph consistency error unless the batches hold exactly one
/// row with `expected_columns` columns.
pub fn single_row(batches: &[RecordBatch], expected_columns: usize) -> Result<Vec<Value>> {
    let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
    if rows != 1 {
        return Err(TermError::graph_consistency(format!(
            "bundled aggregate returned {rows} rows, expected exactly 1"
        )));
    }
    let batch = batches
        .iter()
        .find(|b| b.num_rows() == 1)
        .ok_or_else(|| TermError::Internal("row vanished from aggregate result".into()))?;
    if batch.num_columns() != expected_columns {
        return Err(TermError::graph_consistency(format!(
            "bundled aggregate returned {} columns for {expected_columns} metrics",
            batch.num_columns()
        )));
    }
    batch
        .columns()
        .iter()
        .map(|column| cell_to_json(column, 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use serde_json::json;
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("a"), None])),
                Arc::new(Float64Array::from(vec![Some(1.5), Some(f64::NAN)])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_json_to_scalar() {
        assert_eq!(json_to_scalar(&json!(3)).unwrap(), ScalarValue::Int64(Some(3)));
        assert_eq!(
            json_to_scalar(&json!(2.5)).unwrap(),
            ScalarValue::Float64(Some(2.5))
        );
        assert_eq!(
            json_to_scalar(&json!("x")).unwrap(),
            ScalarValue::Utf8(Some("x".into()))
        );
        assert!(json_to_scalar(&json!([1])).is_err());
    }

    #[test]
    fn test_rows_to_json_skips_hidden_columns() {
        let rows = rows_to_json(&[batch()], &["id"]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], json!({"name": "a", "score": 1.5}));
        assert_eq!(rows[1], json!({"name": null, "score": null}));
    }

    #[test]
    fn test_column_to_json() {
        let values = column_to_json(&[batch(), batch()], 0).unwrap();
        assert_eq!(values, vec![json!(1), json!(2), json!(1), json!(2)]);
    }

    #[test]
    fn test_single_row_cardinality() {
        let err = single_row(&[batch()], 3).unwrap_err();
        assert!(matches!(err, TermError::GraphConsistency(_)));

        let one = batch().slice(0, 1);
        assert_eq!(
            single_row(&[one.clone()], 3).unwrap(),
            vec![json!(1), json!("a"), json!(1.5)]
        );
        assert!(matches!(
            single_row(&[one], 2),
            Err(TermError::GraphConsistency(_))
        ));
    }
}
