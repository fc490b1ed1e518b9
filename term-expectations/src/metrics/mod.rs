//! Metric providers: how each named metric is computed.
//!
//! A provider is either an *aggregate*, compiled to one DataFusion aggregate
//! expression so it can share a scan with every other aggregate over the
//! same compute domain, or a *value* metric, computed on its own (row-level
//! listings, schema lookups, arithmetic over other metrics).
//!
//! | family | metrics |
//! |---|---|
//! | table | `table.row_count`, `table.columns`, `table.column_count` |
//! | column | `column.min`, `column.max`, `column.mean`, `column.sum`, `column.median`, `column.standard_deviation`, `column.unique_value_count`, `column.distinct_values`, `column.proportion_of_unique_values` |
//! | column map | `column_values.<condition>.unexpected_{count,values,rows,index_list}` |
//! | column pair | `column_pair_values.<condition>.unexpected_*`, `column_pair_values.missing_count` |

pub mod column;
pub mod map;
pub mod pair;
pub mod registry;
pub mod table;

pub use registry::{core_metric_registry, MetricRegistry};

use crate::core::domain::{BATCH_ID, CONDITION_PARSER, ROW_CONDITION, TABLE};
use crate::core::metric::{MetricConfiguration, MetricValue};
use crate::engine::{AggregateFn, EngineCapabilities, ExecutionEngine};
use crate::error::{Result, TermError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Resolved dependency values, keyed by the dependency name a provider declared.
pub type MetricDependencies = BTreeMap<String, MetricValue>;

/// Domain keys shared by every metric.
pub const TABLE_DOMAIN_KEYS: &[&str] = &[BATCH_ID, TABLE, ROW_CONDITION, CONDITION_PARSER];
/// Domain keys of single-column metrics.
pub const COLUMN_DOMAIN_KEYS: &[&str] = &[BATCH_ID, TABLE, "column", ROW_CONDITION, CONDITION_PARSER];
/// Domain keys of column-pair metrics.
pub const COLUMN_PAIR_DOMAIN_KEYS: &[&str] =
    &[BATCH_ID, TABLE, "column_A", "column_B", ROW_CONDITION, CONDITION_PARSER];

/// How a metric is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricFnType {
    /// One aggregate expression; eligible for bundling.
    Aggregate,
    /// Computed individually.
    Value,
}

/// Computes one named metric.
#[async_trait]
pub trait MetricProvider: fmt::Debug + Send + Sync {
    fn metric_name(&self) -> &str;

    fn fn_type(&self) -> MetricFnType;

    /// Domain keys the metric understands.
    fn domain_keys(&self) -> &[&str] {
        TABLE_DOMAIN_KEYS
    }

    /// Value kwargs the metric understands.
    fn value_keys(&self) -> &[&str] {
        &[]
    }

    /// Metrics that must be resolved before this one, by dependency name.
    fn dependencies(
        &self,
        _metric: &MetricConfiguration,
        _capabilities: EngineCapabilities,
    ) -> Result<BTreeMap<String, MetricConfiguration>> {
        Ok(BTreeMap::new())
    }

    /// Builds the aggregate expression. Only aggregate providers implement this.
    fn aggregate(
        &self,
        _engine: &dyn ExecutionEngine,
        _metric: &MetricConfiguration,
        _dependencies: &MetricDependencies,
    ) -> Result<AggregateFn> {
        Err(TermError::graph_consistency(format!(
            "metric {} is not an aggregate",
            self.metric_name()
        )))
    }

    /// Computes a value metric. Only value providers implement this.
    async fn compute(
        &self,
        _engine: &dyn ExecutionEngine,
        _metric: &MetricConfiguration,
        _dependencies: &MetricDependencies,
    ) -> Result<MetricValue> {
        Err(TermError::graph_consistency(format!(
            "metric {} must be resolved through a bundle",
            self.metric_name()
        )))
    }
}

/// Reads a dependency as an unsigned count; `null` stays `None`.
pub(crate) fn dependency_count(
    dependencies: &MetricDependencies,
    name: &str,
    metric: &str,
) -> Result<Option<u64>> {
    match dependencies.get(name) {
        None => Err(TermError::graph_consistency(format!(
            "metric {metric} is missing dependency {name}"
        ))),
        Some(value) if value.is_null() => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            TermError::metric_resolution(metric, format!("dependency {name} is not a count: {value}"))
        }),
    }
}
