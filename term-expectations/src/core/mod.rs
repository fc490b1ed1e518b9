//! Core data model of the expectation engine.
//!
//! ## Overview
//!
//! - **[`DomainKwargs`]**: which subset of a batch a metric runs over
//! - **[`MetricConfiguration`]**: "compute metric M over domain D with parameters P",
//!   identified by a deterministic [`MetricId`]
//! - **[`BatchSpec`]** / **[`Batch`]**: how data was produced and the materialized result
//! - **[`ExpectationConfiguration`]** / **[`ExpectationSuite`]**: declared assertions
//! - **[`ExpectationValidationResult`]** / **[`SuiteValidationResult`]**: outcomes
//!
//! ## Identity
//!
//! Every id is the SHA-256 of a canonical, key-sorted JSON rendering, so two
//! requests that differ only in map key order or in explicit `null` kwargs
//! are the same request:
//!
//! ```rust
//! use term_expectations::core::DomainKwargs;
//! use serde_json::json;
//!
//! let a = DomainKwargs::from_value(json!({"column": "x", "row_condition": null})).unwrap();
//! let b = DomainKwargs::from_value(json!({"column": "x"})).unwrap();
//! assert_eq!(a.id(), b.id());
//! ```

pub mod batch;
pub mod domain;
pub mod expectation;
pub mod identity;
pub mod metric;
pub mod result;

pub use batch::{
    Batch, BatchMarkers, BatchSpec, InMemoryData, ReaderMethod, ReaderOptions, LOAD_TIME_FORMAT,
};
pub use domain::{ConditionParser, DomainKwargs, RowCondition};
pub use expectation::{ExpectationConfiguration, ExpectationSuite};
pub use metric::{
    MetricConfiguration, MetricEdge, MetricEdgeKey, MetricId, MetricValue, MetricValues,
};
pub use result::{
    ExceptionInfo, ExpectationValidationResult, SuiteRunMeta, SuiteValidationResult,
    ValidationStatistics,
};
