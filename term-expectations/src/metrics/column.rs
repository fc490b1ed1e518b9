//! Single-column aggregate and summary metrics.

use super::{
    dependency_count, MetricDependencies, MetricFnType, MetricProvider, COLUMN_DOMAIN_KEYS,
};
use crate::core::metric::{MetricConfiguration, MetricValue};
use crate::engine::convert::column_to_json;
use crate::engine::{AggregateFn, EngineCapabilities, ExecutionEngine};
use crate::error::Result;
use async_trait::async_trait;
use datafusion::functions_aggregate::expr_fn::{
    avg, count_distinct, max, median, min, stddev, sum,
};
use arrow::datatypes::DataType;
use datafusion::logical_expr::{cast, ident, Expr, SortExpr};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The statistic computed by a [`ColumnAggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStatistic {
    Min,
    Max,
    Mean,
    Sum,
    Median,
    /// Sample standard deviation.
    StandardDeviation,
    /// Number of distinct non-null values.
    UniqueValueCount,
}

impl ColumnStatistic {
    pub const ALL: &'static [ColumnStatistic] = &[
        Self::Min,
        Self::Max,
        Self::Mean,
        Self::Sum,
        Self::Median,
        Self::StandardDeviation,
        Self::UniqueValueCount,
    ];

    pub fn metric_name(&self) -> &'static str {
        match self {
            Self::Min => "column.min",
            Self::Max => "column.max",
            Self::Mean => "column.mean",
            Self::Sum => "column.sum",
            Self::Median => "column.median",
            Self::StandardDeviation => "column.standard_deviation",
            Self::UniqueValueCount => "column.unique_value_count",
        }
    }

    fn expr(&self, column: Expr) -> Expr {
        match self {
            Self::Min => min(column),
            Self::Max => max(column),
            Self::Mean => avg(column),
            Self::Sum => sum(column),
            // median keeps the input type; an even-sized integer column would truncate
            Self::Median => median(cast(column, DataType::Float64)),
            Self::StandardDeviation => stddev(column),
            Self::UniqueValueCount => count_distinct(column),
        }
    }
}

/// An aggregate over one column (`column.min`, `column.mean`, ...).
#[derive(Debug)]
pub struct ColumnAggregate {
    statistic: ColumnStatistic,
}

impl ColumnAggregate {
    pub fn new(statistic: ColumnStatistic) -> Self {
        Self { statistic }
    }
}

#[async_trait]
impl MetricProvider for ColumnAggregate {
    fn metric_name(&self) -> &str {
        self.statistic.metric_name()
    }

    fn fn_type(&self) -> MetricFnType {
        MetricFnType::Aggregate
    }

    fn domain_keys(&self) -> &[&str] {
        COLUMN_DOMAIN_KEYS
    }

    fn aggregate(
        &self,
        engine: &dyn ExecutionEngine,
        metric: &MetricConfiguration,
        _dependencies: &MetricDependencies,
    ) -> Result<AggregateFn> {
        let domain = engine.get_compute_domain(&metric.metric_domain_kwargs)?;
        let column = domain.accessor_kwargs.require_column()?;
        Ok(AggregateFn {
            expr: self.statistic.expr(ident(column)),
            compute_domain_kwargs: domain.compute_kwargs,
        })
    }
}

/// `column.distinct_values`: sorted distinct non-null values.
#[derive(Debug, Default)]
pub struct ColumnDistinctValues;

#[async_trait]
impl MetricProvider for ColumnDistinctValues {
    fn metric_name(&self) -> &str {
        "column.distinct_values"
    }

    fn fn_type(&self) -> MetricFnType {
        MetricFnType::Value
    }

    fn domain_keys(&self) -> &[&str] {
        COLUMN_DOMAIN_KEYS
    }

    async fn compute(
        &self,
        engine: &dyn ExecutionEngine,
        metric: &MetricConfiguration,
        _dependencies: &MetricDependencies,
    ) -> Result<MetricValue> {
        let domain = engine.get_compute_domain(&metric.metric_domain_kwargs)?;
        let column = domain.accessor_kwargs.require_column()?;
        let batches = domain
            .data
            .filter(ident(column).is_not_null())?
            .select(vec![ident(column)])?
            .distinct()?
            .sort(vec![SortExpr::new(ident(column), true, false)])?
            .collect()
            .await?;
        Ok(Value::Array(column_to_json(&batches, 0)?))
    }
}

/// `column.proportion_of_unique_values`: distinct values over non-null values.
#[derive(Debug, Default)]
pub struct ColumnProportionOfUniqueValues;

impl ColumnProportionOfUniqueValues {
    const UNIQUE: &'static str = "column.unique_value_count";
    const ROWS: &'static str = "table.row_count";
    const NULLS: &'static str = "column_values.nonnull.unexpected_count";
}

#[async_trait]
impl MetricProvider for ColumnProportionOfUniqueValues {
    fn metric_name(&self) -> &str {
        "column.proportion_of_unique_values"
    }

    fn fn_type(&self) -> MetricFnType {
        MetricFnType::Value
    }

    fn domain_keys(&self) -> &[&str] {
        COLUMN_DOMAIN_KEYS
    }

    fn dependencies(
        &self,
        metric: &MetricConfiguration,
        _capabilities: EngineCapabilities,
    ) -> Result<BTreeMap<String, MetricConfiguration>> {
        let domain = metric.metric_domain_kwargs.clone();
        let (table_domain, _) = domain.split_accessor_keys();
        Ok(BTreeMap::from([
            (
                Self::UNIQUE.to_string(),
                MetricConfiguration::new(Self::UNIQUE, domain.clone(), Map::new()),
            ),
            (
                Self::ROWS.to_string(),
                MetricConfiguration::new(Self::ROWS, table_domain, Map::new()),
            ),
            (
                Self::NULLS.to_string(),
                MetricConfiguration::new(Self::NULLS, domain, Map::new()),
            ),
        ]))
    }

    async fn compute(
        &self,
        _engine: &dyn ExecutionEngine,
        _metric: &MetricConfiguration,
        dependencies: &MetricDependencies,
    ) -> Result<MetricValue> {
        let name = self.metric_name();
        let unique = dependency_count(dependencies, Self::UNIQUE, name)?;
        let rows = dependency_count(dependencies, Self::ROWS, name)?;
        let nulls = dependency_count(dependencies, Self::NULLS, name)?;
        match (unique, rows, nulls) {
            (Some(unique), Some(rows), Some(nulls)) if rows > nulls => {
                Ok(Value::from(unique as f64 / (rows - nulls) as f64))
            }
            _ => Ok(Value::Null),
        }
    }
}
