//! Loading batches from files, splitting, sampling and addressing them by id.

mod common;

use common::{expectation, orders, orders_csv, orders_spec};
use parquet::arrow::ArrowWriter;
use serde_json::{json, Map, Value};
use std::fs::File;
use tempfile::TempDir;
use term_expectations::core::BatchSpec;
use term_expectations::engine::{
    DataFusionExecutionEngine, EngineConfig, ExecutionEngine, LoadFailurePolicy, SamplerDirective,
    SamplingMethod, SplitterDirective, SplitterMethod,
};
use term_expectations::validator::Validator;

fn engine() -> DataFusionExecutionEngine {
    DataFusionExecutionEngine::with_config(EngineConfig::small()).unwrap()
}

fn kwargs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("kwargs must be an object"),
    }
}

async fn row_count(engine: &DataFusionExecutionEngine) -> u64 {
    let results = Validator::new(engine)
        .graph_validate(&[expectation(
            "expect_table_row_count_to_be_between",
            json!({"min_value": 0}),
        )])
        .await
        .unwrap();
    results[0]
        .result_field("observed_value")
        .and_then(Value::as_u64)
        .unwrap()
}

#[tokio::test]
async fn test_load_csv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.csv");
    std::fs::write(&path, orders_csv()).unwrap();

    let mut engine = engine();
    engine
        .load_batch(BatchSpec::from_path(path.to_string_lossy()))
        .await
        .unwrap();
    assert_eq!(row_count(&engine).await, 8);

    let results = Validator::new(&engine)
        .graph_validate(&[expectation(
            "expect_column_values_to_not_be_null",
            json!({"column": "amount"}),
        )])
        .await
        .unwrap();
    assert_eq!(results[0].result_field("unexpected_count"), Some(&json!(1)));
}

#[tokio::test]
async fn test_load_csv_glob() {
    let dir = TempDir::new().unwrap();
    for name in ["a.csv", "b.csv"] {
        std::fs::write(dir.path().join(name), orders_csv()).unwrap();
    }

    let mut engine = engine();
    let pattern = dir.path().join("*.csv");
    engine
        .load_batch(BatchSpec::from_path(pattern.to_string_lossy()))
        .await
        .unwrap();
    assert_eq!(row_count(&engine).await, 16);
}

#[tokio::test]
async fn test_load_parquet() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.parquet");
    let batch = orders();
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let mut engine = engine();
    engine
        .load_batch(BatchSpec::from_path(path.to_string_lossy()))
        .await
        .unwrap();

    let results = Validator::new(&engine)
        .graph_validate(&[
            expectation("expect_table_row_count_to_equal", json!({"value": 8})),
            expectation(
                "expect_column_values_to_be_in_set",
                json!({"column": "status", "value_set": ["open", "closed"], "mostly": 0.8}),
            ),
        ])
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.success));
}

#[tokio::test]
async fn test_load_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.json");
    std::fs::write(
        &path,
        "{\"kind\": \"click\", \"ms\": 12}\n{\"kind\": \"view\", \"ms\": 40}\n{\"kind\": null, \"ms\": 7}\n",
    )
    .unwrap();

    let mut engine = engine();
    engine
        .load_batch(BatchSpec::from_path(path.to_string_lossy()))
        .await
        .unwrap();

    let results = Validator::new(&engine)
        .graph_validate(&[
            expectation("expect_table_row_count_to_equal", json!({"value": 3})),
            expectation(
                "expect_column_values_to_not_be_null",
                json!({"column": "kind", "mostly": 0.6}),
            ),
            expectation(
                "expect_column_max_to_be_between",
                json!({"column": "ms", "min_value": 40, "max_value": 40}),
            ),
        ])
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.success));
}

#[tokio::test]
async fn test_unreadable_path() {
    let mut engine = engine();
    let err = engine
        .load_batch(BatchSpec::from_path("orders.xlsx"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");

    let loaded = engine
        .load_batches(
            vec![BatchSpec::from_path("orders.xlsx"), orders_spec()],
            LoadFailurePolicy::Skip,
        )
        .await
        .unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(engine.loaded_batch_ids(), vec![loaded[0].id().to_string()]);
}

#[tokio::test]
async fn test_splitter_and_sampler() {
    let mut engine = engine();
    let open = orders_spec().with_splitter(
        SplitterDirective::new(
            SplitterMethod::ColumnValue,
            kwargs(json!({"column_name": "status", "partition_definition": {"status": "open"}})),
        )
        .unwrap(),
    );
    engine.load_batch(open).await.unwrap();
    assert_eq!(row_count(&engine).await, 3);

    let listed = orders_spec().with_sampler(
        SamplerDirective::new(
            SamplingMethod::AList,
            kwargs(json!({"column_name": "id", "value_list": [1, 2, 3]})),
        )
        .unwrap(),
    );
    engine.load_batch(listed).await.unwrap();
    assert_eq!(row_count(&engine).await, 3);

    let even = orders_spec().with_sampler(
        SamplerDirective::new(
            SamplingMethod::Mod,
            kwargs(json!({"column_name": "id", "mod": 2, "value": 0})),
        )
        .unwrap(),
    );
    engine.load_batch(even).await.unwrap();
    assert_eq!(row_count(&engine).await, 4);

    engine.load_batch(orders_spec().with_limit(5)).await.unwrap();
    assert_eq!(row_count(&engine).await, 5);
    assert_eq!(engine.loaded_batch_ids().len(), 4);
}

#[tokio::test]
async fn test_batch_ids_are_deterministic() {
    let mut engine = engine();
    let first = engine.load_batch(orders_spec()).await.unwrap();
    let second = engine.load_batch(orders_spec()).await.unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(engine.loaded_batch_ids().len(), 1);
    assert_eq!(first.id(), orders_spec().batch_id());
}

#[tokio::test]
async fn test_expectations_address_batches_by_id() {
    let mut engine = engine();
    let full = engine.load_batch(orders_spec()).await.unwrap();
    let sample = engine
        .load_batch(orders_spec().with_limit(2))
        .await
        .unwrap();
    assert_eq!(engine.active_batch_id().as_deref(), Some(sample.id()));

    let results = Validator::new(&engine)
        .graph_validate(&[
            expectation("expect_table_row_count_to_equal", json!({"value": 2})),
            expectation(
                "expect_table_row_count_to_equal",
                json!({"value": 8, "batch_id": full.id()}),
            ),
        ])
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.success));

    engine.set_active_batch(full.id()).unwrap();
    assert_eq!(row_count(&engine).await, 8);

    assert!(engine.unload_batch(full.id()).is_some());
    assert_eq!(engine.active_batch_id().as_deref(), Some(sample.id()));
    let err = engine.set_active_batch(full.id()).unwrap_err();
    assert_eq!(err.kind(), "DomainResolutionError");
}
