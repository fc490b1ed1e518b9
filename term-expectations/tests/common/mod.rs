//! Shared fixtures for integration tests.

#![allow(dead_code)]

use arrow::array::{Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use serde_json::Value;
use std::sync::Arc;
use term_expectations::core::{BatchSpec, ExpectationConfiguration, InMemoryData};
use term_expectations::engine::{DataFusionExecutionEngine, EngineConfig, ExecutionEngine};

/// Eight orders with a known set of defects:
///
/// - `status`: one `"unknown"` (row 3) and one null (row 5)
/// - `amount`: one null (row 2); the non-null mean is 110 / 7
/// - `ordered > shipped` fails on rows 2 (equal) and 7
pub fn orders() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("status", DataType::Utf8, true),
        Field::new("amount", DataType::Float64, true),
        Field::new("ordered", DataType::Int64, true),
        Field::new("shipped", DataType::Int64, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from((1..=8).collect::<Vec<i64>>())),
            Arc::new(StringArray::from(vec![
                Some("open"),
                Some("closed"),
                Some("open"),
                Some("unknown"),
                Some("closed"),
                None,
                Some("open"),
                Some("closed"),
            ])),
            Arc::new(Float64Array::from(vec![
                Some(10.0),
                Some(20.0),
                None,
                Some(15.0),
                Some(12.5),
                Some(30.0),
                Some(8.0),
                Some(14.5),
            ])),
            Arc::new(Int64Array::from(vec![5, 3, 4, 2, 6, 1, 7, 8])),
            Arc::new(Int64Array::from(vec![1, 2, 4, 1, 2, 0, 3, 9])),
        ],
    )
    .unwrap()
}

pub fn orders_spec() -> BatchSpec {
    BatchSpec::in_memory("orders", InMemoryData::from_batch(orders()))
}

/// An engine with the orders batch loaded and active.
pub async fn orders_engine() -> DataFusionExecutionEngine {
    engine_with(EngineConfig::small()).await
}

pub async fn engine_with(config: EngineConfig) -> DataFusionExecutionEngine {
    let mut engine = DataFusionExecutionEngine::with_config(config).unwrap();
    engine.load_batch(orders_spec()).await.unwrap();
    engine
}

pub fn expectation(expectation_type: &str, kwargs: Value) -> ExpectationConfiguration {
    ExpectationConfiguration::with_kwargs(expectation_type, kwargs).unwrap()
}

/// Writes the orders fixture as CSV rows.
pub fn orders_csv() -> String {
    let mut csv = String::from("id,status,amount,ordered,shipped\n");
    let rows = [
        "1,open,10.0,5,1",
        "2,closed,20.0,3,2",
        "3,open,,4,4",
        "4,unknown,15.0,2,1",
        "5,closed,12.5,6,2",
        "6,,30.0,1,0",
        "7,open,8.0,7,3",
        "8,closed,14.5,8,9",
    ];
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    csv
}
