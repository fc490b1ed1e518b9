//! # Term Expectations - Metric-graph data validation for Rust
//!
//! Term Expectations validates data against declared *expectations* (for
//! example "no nulls in `order_id`" or "mean of `amount` between 10 and
//! 20"). Each expectation is resolved into the *metrics* it needs; the
//! metrics of a whole suite are merged into one deduplicated dependency
//! graph and evaluated on DataFusion, where every aggregate over the same
//! data is bundled into a single query.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use term_expectations::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> Result<()> {
//! let mut engine = DataFusionExecutionEngine::new()?;
//! engine.load_batch(BatchSpec::from_path("data/orders.parquet")).await?;
//!
//! let suite = ExpectationSuite::new("orders")
//!     .with_expectation(ExpectationConfiguration::with_kwargs(
//!         "expect_column_values_to_not_be_null",
//!         json!({"column": "order_id"}),
//!     )?)
//!     .with_expectation(ExpectationConfiguration::with_kwargs(
//!         "expect_column_mean_to_be_between",
//!         json!({"column": "amount", "min_value": 10, "max_value": 20}),
//!     )?)
//!     .with_expectation(ExpectationConfiguration::with_kwargs(
//!         "expect_column_values_to_be_in_set",
//!         json!({"column": "status", "value_set": ["open", "closed"], "mostly": 0.95}),
//!     )?);
//!
//! let result = Validator::new(&engine).validate_suite(&suite).await?;
//! println!("{}", HumanFormatter::new().format(&result)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Features
//!
//! ### Shared metric graph
//!
//! Metric requests are identified by a deterministic id over their name,
//! domain and parameters. Two expectations asking for `table.row_count` over
//! the same batch share one node; the graph is resolved frontier by
//! frontier, so dependencies always come first.
//!
//! ### Bundled aggregates
//!
//! Aggregate metrics (counts, min/max, mean, unexpected counts of row-wise
//! conditions) over the same compute domain are evaluated in one DataFusion
//! `aggregate` call. The suite above costs one scan for all of its counts
//! and statistics.
//!
//! ### Tiered results
//!
//! Row-wise expectations report at `BOOLEAN_ONLY`, `BASIC`, `SUMMARY` or
//! `COMPLETE` detail. Only the metrics a tier needs are requested, so
//! `BOOLEAN_ONLY` never lists unexpected rows.
//!
//! ### Batches
//!
//! Batches come from CSV, JSON or Parquet files, SQL queries or in-memory
//! Arrow data, optionally split (by column value, date part, hash, ...) and
//! sampled. Each batch gets a content-derived id and load markers.
//!
//! ### Observability
//!
//! Structured logging with the `tracing` crate; see [`logging`] for the
//! knobs and [`logging::setup`] for a subscriber helper.
//!
//! ## Module Organization
//!
//! - [`core`] - Domain, metric, batch and result types
//! - [`engine`] - The execution engine trait and its DataFusion implementation
//! - [`metrics`] - Metric providers and their registry
//! - [`graph`] - Metric dependency graph and its resolver
//! - [`expectations`] - Expectation traits, catalog and registry
//! - [`validator`] - Runs expectations and suites
//! - [`formatters`] - JSON, human and Markdown rendering of results
//! - [`error`] - Error types
//! - [`logging`] - Logging configuration
//! - [`security`] - Validation of user-supplied expressions and patterns

pub mod core;
pub mod engine;
pub mod error;
pub mod expectations;
pub mod formatters;
pub mod graph;
pub mod logging;
pub mod metrics;
pub mod prelude;
pub mod security;
pub mod validator;

