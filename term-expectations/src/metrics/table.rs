//! Table-level metrics.

use super::{MetricDependencies, MetricFnType, MetricProvider};
use crate::core::metric::{MetricConfiguration, MetricValue};
use crate::engine::{AggregateFn, EngineCapabilities, ExecutionEngine, ROW_INDEX_COLUMN};
use crate::error::{Result, TermError};
use async_trait::async_trait;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::logical_expr::lit;
use serde_json::Value;
use std::collections::BTreeMap;

/// `table.row_count`: number of rows in the compute domain.
#[derive(Debug, Default)]
pub struct TableRowCount;

#[async_trait]
impl MetricProvider for TableRowCount {
    fn metric_name(&self) -> &str {
        "table.row_count"
    }

    fn fn_type(&self) -> MetricFnType {
        MetricFnType::Aggregate
    }

    fn aggregate(
        &self,
        engine: &dyn ExecutionEngine,
        metric: &MetricConfiguration,
        _dependencies: &MetricDependencies,
    ) -> Result<AggregateFn> {
        let domain = engine.get_compute_domain(&metric.metric_domain_kwargs)?;
        Ok(AggregateFn {
            expr: count(lit(1)),
            compute_domain_kwargs: domain.compute_kwargs,
        })
    }
}

/// `table.columns`: column names in schema order, hidden columns excluded.
#[derive(Debug, Default)]
pub struct TableColumns;

#[async_trait]
impl MetricProvider for TableColumns {
    fn metric_name(&self) -> &str {
        "table.columns"
    }

    fn fn_type(&self) -> MetricFnType {
        MetricFnType::Value
    }

    async fn compute(
        &self,
        engine: &dyn ExecutionEngine,
        metric: &MetricConfiguration,
        _dependencies: &MetricDependencies,
    ) -> Result<MetricValue> {
        let domain = engine.get_compute_domain(&metric.metric_domain_kwargs)?;
        let columns = domain
            .data
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .filter(|name| *name != ROW_INDEX_COLUMN)
            .map(|name| Value::String(name.to_string()))
            .collect();
        Ok(Value::Array(columns))
    }
}

/// `table.column_count`: length of `table.columns`.
#[derive(Debug, Default)]
pub struct TableColumnCount;

#[async_trait]
impl MetricProvider for TableColumnCount {
    fn metric_name(&self) -> &str {
        "table.column_count"
    }

    fn fn_type(&self) -> MetricFnType {
        MetricFnType::Value
    }

    fn dependencies(
        &self,
        metric: &MetricConfiguration,
        _capabilities: EngineCapabilities,
    ) -> Result<BTreeMap<String, MetricConfiguration>> {
        Ok(BTreeMap::from([(
            "table.columns".to_string(),
            metric.renamed("table.columns"),
        )]))
    }

    async fn compute(
        &self,
        _engine: &dyn ExecutionEngine,
        _metric: &MetricConfiguration,
        dependencies: &MetricDependencies,
    ) -> Result<MetricValue> {
        let columns = dependencies
            .get("table.columns")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TermError::metric_resolution("table.column_count", "table.columns is not a list")
            })?;
        Ok(Value::from(columns.len()))
    }
}
