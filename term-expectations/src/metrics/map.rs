//! Row-level ("map") conditions and the metric family each one expands into.
//!
//! A condition says which rows are *expected*. For a condition named
//! `column_values.in_set` five metrics exist:
//!
//! - `column_values.in_set.unexpected_count` (aggregate)
//! - `column_values.in_set.unexpected_values`
//! - `column_values.in_set.unexpected_rows`
//! - `column_values.in_set.unexpected_index_list` (engines with row indices only)
//! - `column_values.in_set.unexpected_listing` (engines with row indices only)
//!
//! The listing metrics depend on the count with `result_format` stripped, so
//! every result tier shares one count node in the graph. On engines with row
//! indices, `unexpected_values` and `unexpected_index_list` are both cut out
//! of `unexpected_listing`, which collects the unexpected rows once.

use super::{
    dependency_count, MetricDependencies, MetricFnType, MetricProvider, COLUMN_DOMAIN_KEYS,
};
use crate::core::domain::DomainKwargs;
use crate::core::metric::{MetricConfiguration, MetricValue};
use crate::engine::convert::{column_to_json, json_literal, rows_to_json};
use crate::engine::{AggregateFn, ComputeDomain, EngineCapabilities, ExecutionEngine, ROW_INDEX_COLUMN};
use crate::error::{Result, TermError};
use crate::expectations::result_format::parse_result_format;
use crate::security::SqlSecurity;
use arrow::datatypes::DataType;
use async_trait::async_trait;
use datafusion::functions::expr_fn::character_length;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::logical_expr::{binary_expr, cast, ident, lit, when, Expr, Operator};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Value kwarg holding the result format of listing metrics.
pub const RESULT_FORMAT_KEY: &str = "result_format";

/// A row-level condition over one or more columns.
pub trait MapCondition: fmt::Debug + Send + Sync {
    /// Metric name prefix, e.g. `column_values.in_set`.
    fn name(&self) -> &str;

    fn domain_keys(&self) -> &[&str];

    fn value_keys(&self) -> &[&str];

    /// Columns reported by `unexpected_values`.
    fn columns(&self, accessor: &DomainKwargs) -> Result<Vec<String>>;

    /// Rows the condition applies to; `None` means every row.
    fn row_filter(&self, accessor: &DomainKwargs, value_kwargs: &Map<String, Value>)
        -> Result<Option<Expr>>;

    /// True for expected rows.
    fn expected(&self, accessor: &DomainKwargs, value_kwargs: &Map<String, Value>) -> Result<Expr>;

    /// Predicate selecting unexpected rows: in scope and not expected.
    fn unexpected(
        &self,
        accessor: &DomainKwargs,
        value_kwargs: &Map<String, Value>,
    ) -> Result<Expr> {
        let violated = self.expected(accessor, value_kwargs)?.is_not_true();
        Ok(match self.row_filter(accessor, value_kwargs)? {
            Some(filter) => filter.and(violated),
            None => violated,
        })
    }
}

/// Which member of a condition's metric family a provider computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMetricPart {
    UnexpectedCount,
    UnexpectedValues,
    UnexpectedRows,
    UnexpectedIndexList,
    /// Values and row indices of the unexpected rows, from one scan.
    UnexpectedListing,
}

impl MapMetricPart {
    pub const ALL: &'static [MapMetricPart] = &[
        Self::UnexpectedCount,
        Self::UnexpectedValues,
        Self::UnexpectedRows,
        Self::UnexpectedIndexList,
        Self::UnexpectedListing,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::UnexpectedCount => "unexpected_count",
            Self::UnexpectedValues => "unexpected_values",
            Self::UnexpectedRows => "unexpected_rows",
            Self::UnexpectedIndexList => "unexpected_index_list",
            Self::UnexpectedListing => "unexpected_listing",
        }
    }
}

/// Name of one member of a condition's metric family.
pub fn family_metric_name(condition: &str, part: MapMetricPart) -> String {
    format!("{condition}.{}", part.suffix())
}

/// One member of a map condition's metric family.
#[derive(Debug)]
pub struct MapMetric {
    name: String,
    condition: Arc<dyn MapCondition>,
    part: MapMetricPart,
    value_keys: Vec<&'static str>,
}

impl MapMetric {
    pub fn new(condition: Arc<dyn MapCondition>, part: MapMetricPart) -> Self {
        let mut value_keys: Vec<&'static str> = Vec::new();
        if part != MapMetricPart::UnexpectedCount {
            value_keys.push(RESULT_FORMAT_KEY);
        }
        Self {
            name: family_metric_name(condition.name(), part),
            condition,
            part,
            value_keys,
        }
    }

    /// All family members of a condition.
    pub fn family(condition: Arc<dyn MapCondition>) -> Vec<MapMetric> {
        MapMetricPart::ALL
            .iter()
            .map(|part| MapMetric::new(condition.clone(), *part))
            .collect()
    }

    fn condition_kwargs(metric: &MetricConfiguration) -> Map<String, Value> {
        let mut kwargs = metric.metric_value_kwargs.clone();
        kwargs.remove(RESULT_FORMAT_KEY);
        kwargs
    }

    /// Resolves the domain and filters it down to unexpected rows.
    fn unexpected_rows_frame(
        &self,
        engine: &dyn ExecutionEngine,
        metric: &MetricConfiguration,
    ) -> Result<(ComputeDomain, datafusion::prelude::DataFrame)> {
        let domain = engine.get_compute_domain(&metric.metric_domain_kwargs)?;
        let predicate = self
            .condition
            .unexpected(&domain.accessor_kwargs, &Self::condition_kwargs(metric))?;
        let mut frame = domain.data.clone().filter(predicate)?;
        let format = parse_result_format(
            metric
                .value_kwarg(RESULT_FORMAT_KEY)
                .unwrap_or(&Value::Null),
        )?;
        if let Some(limit) = format.unexpected_limit() {
            frame = frame.limit(0, Some(limit))?;
        }
        Ok((domain, frame))
    }

    /// Collects `columns` of the unexpected rows as JSON, one entry per row.
    /// A single column yields its values; several yield one array per row.
    async fn unexpected_values(
        &self,
        engine: &dyn ExecutionEngine,
        metric: &MetricConfiguration,
        with_index: bool,
    ) -> Result<(Vec<Value>, Option<Vec<Value>>)> {
        let (domain, frame) = self.unexpected_rows_frame(engine, metric)?;
        let columns = self.condition.columns(&domain.accessor_kwargs)?;
        let mut projection: Vec<Expr> = columns.iter().map(ident).collect();
        if with_index {
            projection.push(ident(ROW_INDEX_COLUMN));
        }
        let batches = frame.select(projection)?.collect().await?;

        let index = if with_index {
            Some(column_to_json(&batches, columns.len())?)
        } else {
            None
        };
        if columns.len() == 1 {
            return Ok((column_to_json(&batches, 0)?, index));
        }
        let per_column = (0..columns.len())
            .map(|i| column_to_json(&batches, i))
            .collect::<Result<Vec<_>>>()?;
        let rows = per_column.first().map_or(0, Vec::len);
        let values = (0..rows)
            .map(|row| Value::Array(per_column.iter().map(|c| c[row].clone()).collect()))
            .collect();
        Ok((values, index))
    }

    /// Reads one list out of the resolved `unexpected_listing`.
    fn from_listing(&self, listing: &Value, key: &str) -> Result<MetricValue> {
        match listing.get(key) {
            Some(list @ Value::Array(_)) => Ok(list.clone()),
            _ => Err(TermError::graph_consistency(format!(
                "metric {} found no {key} in its unexpected listing",
                self.name
            ))),
        }
    }
}

const LISTING: &str = "unexpected_listing";

#[async_trait]
impl MetricProvider for MapMetric {
    fn metric_name(&self) -> &str {
        &self.name
    }

    fn fn_type(&self) -> MetricFnType {
        match self.part {
            MapMetricPart::UnexpectedCount => MetricFnType::Aggregate,
            _ => MetricFnType::Value,
        }
    }

    fn domain_keys(&self) -> &[&str] {
        self.condition.domain_keys()
    }

    fn value_keys(&self) -> &[&str] {
        if self.part == MapMetricPart::UnexpectedCount {
            self.condition.value_keys()
        } else {
            &self.value_keys
        }
    }

    fn dependencies(
        &self,
        metric: &MetricConfiguration,
        capabilities: EngineCapabilities,
    ) -> Result<BTreeMap<String, MetricConfiguration>> {
        match self.part {
            MapMetricPart::UnexpectedCount => Ok(BTreeMap::new()),
            MapMetricPart::UnexpectedIndexList | MapMetricPart::UnexpectedListing
                if !capabilities.row_index =>
            {
                Err(TermError::NotSupported(format!(
                    "{} requires an engine with row indices",
                    self.name
                )))
            }
            MapMetricPart::UnexpectedValues | MapMetricPart::UnexpectedIndexList
                if capabilities.row_index =>
            {
                let listing_name = family_metric_name(self.condition.name(), MapMetricPart::UnexpectedListing);
                Ok(BTreeMap::from([(LISTING.to_string(), metric.renamed(listing_name))]))
            }
            _ => {
                let count_name = family_metric_name(self.condition.name(), MapMetricPart::UnexpectedCount);
                Ok(BTreeMap::from([(
                    "unexpected_count".to_string(),
                    metric
                        .renamed(count_name)
                        .without_value_keys(&[RESULT_FORMAT_KEY]),
                )]))
            }
        }
    }

    fn aggregate(
        &self,
        engine: &dyn ExecutionEngine,
        metric: &MetricConfiguration,
        _dependencies: &MetricDependencies,
    ) -> Result<AggregateFn> {
        if self.part != MapMetricPart::UnexpectedCount {
            return Err(TermError::graph_consistency(format!(
                "metric {} is not an aggregate",
                self.name
            )));
        }
        let domain = engine.get_compute_domain(&metric.metric_domain_kwargs)?;
        let unexpected = self
            .condition
            .unexpected(&domain.accessor_kwargs, &metric.metric_value_kwargs)?;
        Ok(AggregateFn {
            expr: count(when(unexpected, lit(1_i64)).end()?),
            compute_domain_kwargs: domain.compute_kwargs,
        })
    }

    async fn compute(
        &self,
        engine: &dyn ExecutionEngine,
        metric: &MetricConfiguration,
        dependencies: &MetricDependencies,
    ) -> Result<MetricValue> {
        if let Some(listing) = dependencies.get(LISTING) {
            return match self.part {
                MapMetricPart::UnexpectedIndexList => self.from_listing(listing, "unexpected_index_list"),
                _ => self.from_listing(listing, "unexpected_values"),
            };
        }
        if dependency_count(dependencies, "unexpected_count", &self.name)? == Some(0) {
            return Ok(match self.part {
                MapMetricPart::UnexpectedListing => {
                    json!({"unexpected_values": [], "unexpected_index_list": []})
                }
                _ => Value::Array(Vec::new()),
            });
        }

        match self.part {
            MapMetricPart::UnexpectedCount => Err(TermError::graph_consistency(format!(
                "metric {} must be resolved through a bundle",
                self.name
            ))),
            MapMetricPart::UnexpectedValues => {
                let (values, _) = self.unexpected_values(engine, metric, false).await?;
                Ok(Value::Array(values))
            }
            MapMetricPart::UnexpectedListing => {
                if !engine.capabilities().row_index {
                    return Err(TermError::NotSupported(format!(
                        "{} requires an engine with row indices",
                        self.name
                    )));
                }
                let (values, index) = self.unexpected_values(engine, metric, true).await?;
                Ok(json!({
                    "unexpected_values": values,
                    "unexpected_index_list": index.unwrap_or_default(),
                }))
            }
            MapMetricPart::UnexpectedRows => {
                let (_, frame) = self.unexpected_rows_frame(engine, metric)?;
                let batches = frame.collect().await?;
                Ok(Value::Array(rows_to_json(&batches, &[ROW_INDEX_COLUMN])?))
            }
            MapMetricPart::UnexpectedIndexList => {
                let (_, index) = self.unexpected_values(engine, metric, true).await?;
                Ok(Value::Array(index.unwrap_or_default()))
            }
        }
    }
}

/// The single-column conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConditionKind {
    NonNull,
    Null,
    InSet,
    NotInSet,
    Between,
    MatchRegex,
    NotMatchRegex,
    MatchRegexList,
    NotMatchRegexList,
    ValueLengthBetween,
    ValueLengthEquals,
}

impl ColumnConditionKind {
    pub const ALL: &'static [ColumnConditionKind] = &[
        Self::NonNull,
        Self::Null,
        Self::InSet,
        Self::NotInSet,
        Self::Between,
        Self::MatchRegex,
        Self::NotMatchRegex,
        Self::MatchRegexList,
        Self::NotMatchRegexList,
        Self::ValueLengthBetween,
        Self::ValueLengthEquals,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::NonNull => "column_values.nonnull",
            Self::Null => "column_values.null",
            Self::InSet => "column_values.in_set",
            Self::NotInSet => "column_values.not_in_set",
            Self::Between => "column_values.between",
            Self::MatchRegex => "column_values.match_regex",
            Self::NotMatchRegex => "column_values.not_match_regex",
            Self::MatchRegexList => "column_values.match_regex_list",
            Self::NotMatchRegexList => "column_values.not_match_regex_list",
            Self::ValueLengthBetween => "column_values.value_length.between",
            Self::ValueLengthEquals => "column_values.value_length.equals",
        }
    }

    /// Whether null values are excluded before the condition is evaluated.
    ///
    /// False only for the null-testing conditions, so
    /// `column_values.nonnull.unexpected_count` is the null count.
    pub fn filter_nulls(&self) -> bool {
        !matches!(self, Self::NonNull | Self::Null)
    }

    pub fn value_keys(&self) -> &'static [&'static str] {
        match self {
            Self::NonNull | Self::Null => &[],
            Self::InSet | Self::NotInSet => &["value_set"],
            Self::Between => &["min_value", "max_value", "strict_min", "strict_max"],
            Self::MatchRegex | Self::NotMatchRegex => &["regex"],
            Self::MatchRegexList => &["regex_list", "match_on"],
            Self::NotMatchRegexList => &["regex_list"],
            Self::ValueLengthBetween => &["min_value", "max_value"],
            Self::ValueLengthEquals => &["value"],
        }
    }
}

/// A condition over the domain's `column`.
#[derive(Debug, Clone, Copy)]
pub struct ColumnCondition {
    kind: ColumnConditionKind,
}

impl ColumnCondition {
    pub fn new(kind: ColumnConditionKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ColumnConditionKind {
        self.kind
    }
}

fn value_set(kwargs: &Map<String, Value>) -> Result<Vec<Expr>> {
    match kwargs.get("value_set") {
        Some(Value::Array(items)) => items.iter().map(json_literal).collect(),
        _ => Err(TermError::configuration("value_set must be a list")),
    }
}

fn regex_match(column: Expr, pattern: &str, negated: bool) -> Result<Expr> {
    SqlSecurity::validate_regex_pattern(pattern)?;
    let op = if negated {
        Operator::RegexNotMatch
    } else {
        Operator::RegexMatch
    };
    Ok(binary_expr(cast(column, DataType::Utf8), op, lit(pattern.to_string())))
}

fn regex_list(kwargs: &Map<String, Value>) -> Result<Vec<&str>> {
    let list = kwargs
        .get("regex_list")
        .and_then(Value::as_array)
        .ok_or_else(|| TermError::configuration("regex_list must be a list of patterns"))?;
    if list.is_empty() {
        return Err(TermError::configuration("regex_list must not be empty"));
    }
    list.iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| TermError::configuration("regex_list entries must be strings"))
        })
        .collect()
}

pub(crate) fn flag(kwargs: &Map<String, Value>, key: &str) -> Result<bool> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(TermError::configuration(format!(
            "{key} must be a boolean, got {other}"
        ))),
    }
}

/// `min_value <= value <= max_value`, either bound optional, strictness per bound.
pub(crate) fn between(
    value: Expr,
    min_value: Option<&Value>,
    max_value: Option<&Value>,
    strict_min: bool,
    strict_max: bool,
) -> Result<Expr> {
    let min_value = min_value.filter(|v| !v.is_null());
    let max_value = max_value.filter(|v| !v.is_null());
    let lower = min_value
        .map(|v| -> Result<Expr> {
            let bound = json_literal(v)?;
            Ok(if strict_min {
                value.clone().gt(bound)
            } else {
                value.clone().gt_eq(bound)
            })
        })
        .transpose()?;
    let upper = max_value
        .map(|v| -> Result<Expr> {
            let bound = json_literal(v)?;
            Ok(if strict_max {
                value.clone().lt(bound)
            } else {
                value.clone().lt_eq(bound)
            })
        })
        .transpose()?;
    match (lower, upper) {
        (Some(lower), Some(upper)) => Ok(lower.and(upper)),
        (Some(bound), None) | (None, Some(bound)) => Ok(bound),
        (None, None) => Err(TermError::configuration(
            "min_value and max_value cannot both be None",
        )),
    }
}

impl MapCondition for ColumnCondition {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn domain_keys(&self) -> &[&str] {
        COLUMN_DOMAIN_KEYS
    }

    fn value_keys(&self) -> &[&str] {
        self.kind.value_keys()
    }

    fn columns(&self, accessor: &DomainKwargs) -> Result<Vec<String>> {
        Ok(vec![accessor.require_column()?.to_string()])
    }

    fn row_filter(
        &self,
        accessor: &DomainKwargs,
        _value_kwargs: &Map<String, Value>,
    ) -> Result<Option<Expr>> {
        if self.kind.filter_nulls() {
            Ok(Some(ident(accessor.require_column()?).is_not_null()))
        } else {
            Ok(None)
        }
    }

    fn expected(&self, accessor: &DomainKwargs, kwargs: &Map<String, Value>) -> Result<Expr> {
        let column = ident(accessor.require_column()?);
        match self.kind {
            ColumnConditionKind::NonNull => Ok(column.is_not_null()),
            ColumnConditionKind::Null => Ok(column.is_null()),
            ColumnConditionKind::InSet => {
                let set = value_set(kwargs)?;
                Ok(if set.is_empty() {
                    lit(false)
                } else {
                    column.in_list(set, false)
                })
            }
            ColumnConditionKind::NotInSet => {
                let set = value_set(kwargs)?;
                Ok(if set.is_empty() {
                    lit(true)
                } else {
                    column.in_list(set, true)
                })
            }
            ColumnConditionKind::Between => between(
                column,
                kwargs.get("min_value"),
                kwargs.get("max_value"),
                flag(kwargs, "strict_min")?,
                flag(kwargs, "strict_max")?,
            ),
            ColumnConditionKind::MatchRegex | ColumnConditionKind::NotMatchRegex => {
                let pattern = kwargs
                    .get("regex")
                    .and_then(Value::as_str)
                    .ok_or_else(|| TermError::configuration("regex must be a string"))?;
                regex_match(
                    column,
                    pattern,
                    self.kind == ColumnConditionKind::NotMatchRegex,
                )
            }
            ColumnConditionKind::MatchRegexList => {
                let match_all = match kwargs.get("match_on").and_then(Value::as_str) {
                    None | Some("any") => false,
                    Some("all") => true,
                    Some(other) => {
                        return Err(TermError::configuration(format!(
                            "match_on must be 'any' or 'all', got '{other}'"
                        )))
                    }
                };
                let mut combined: Option<Expr> = None;
                for pattern in regex_list(kwargs)? {
                    let matched = regex_match(column.clone(), pattern, false)?;
                    combined = Some(match combined {
                        None => matched,
                        Some(acc) if match_all => acc.and(matched),
                        Some(acc) => acc.or(matched),
                    });
                }
                combined.ok_or_else(|| TermError::Internal("empty regex list".into()))
            }
            ColumnConditionKind::NotMatchRegexList => {
                let mut combined: Option<Expr> = None;
                for pattern in regex_list(kwargs)? {
                    let unmatched = regex_match(column.clone(), pattern, true)?;
                    combined = Some(match combined {
                        None => unmatched,
                        Some(acc) => acc.and(unmatched),
                    });
                }
                combined.ok_or_else(|| TermError::Internal("empty regex list".into()))
            }
            ColumnConditionKind::ValueLengthBetween => between(
                character_length(cast(column, DataType::Utf8)),
                kwargs.get("min_value"),
                kwargs.get("max_value"),
                false,
                false,
            ),
            ColumnConditionKind::ValueLengthEquals => {
                let value = kwargs
                    .get("value")
                    .filter(|v| v.is_u64())
                    .ok_or_else(|| TermError::configuration("value must be a non-negative integer"))?;
                Ok(character_length(cast(column, DataType::Utf8)).eq(json_literal(value)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn accessor() -> DomainKwargs {
        DomainKwargs::new().with("column", "x")
    }

    #[test]
    fn test_family_names_and_types() {
        let condition: Arc<dyn MapCondition> =
            Arc::new(ColumnCondition::new(ColumnConditionKind::InSet));
        let family = MapMetric::family(condition);
        let names: Vec<&str> = family.iter().map(|m| m.metric_name()).collect();
        assert_eq!(
            names,
            vec![
                "column_values.in_set.unexpected_count",
                "column_values.in_set.unexpected_values",
                "column_values.in_set.unexpected_rows",
                "column_values.in_set.unexpected_index_list",
                "column_values.in_set.unexpected_listing",
            ]
        );
        assert_eq!(family[0].fn_type(), MetricFnType::Aggregate);
        assert_eq!(family[1].fn_type(), MetricFnType::Value);
        assert_eq!(family[0].value_keys(), &["value_set"]);
        assert_eq!(family[1].value_keys(), &[RESULT_FORMAT_KEY]);
    }

    #[test]
    fn test_listing_metrics_share_the_count_node() {
        let condition: Arc<dyn MapCondition> =
            Arc::new(ColumnCondition::new(ColumnConditionKind::InSet));
        let values = MapMetric::new(condition, MapMetricPart::UnexpectedValues);
        let capabilities = EngineCapabilities::default();
        let summary = MetricConfiguration::new(
            values.metric_name(),
            accessor(),
            kwargs(json!({"value_set": [1], "result_format": {"result_format": "SUMMARY"}})),
        );
        let complete = MetricConfiguration::new(
            values.metric_name(),
            accessor(),
            kwargs(json!({"value_set": [1], "result_format": {"result_format": "COMPLETE"}})),
        );
        let a = values.dependencies(&summary, capabilities).unwrap();
        let b = values.dependencies(&complete, capabilities).unwrap();
        assert_eq!(a["unexpected_count"].id(), b["unexpected_count"].id());
        assert_eq!(
            a["unexpected_count"].metric_name,
            "column_values.in_set.unexpected_count"
        );
    }

    #[test]
    fn test_values_and_indices_share_one_listing() {
        let condition: Arc<dyn MapCondition> =
            Arc::new(ColumnCondition::new(ColumnConditionKind::InSet));
        let capabilities = EngineCapabilities {
            row_index: true,
            named_tables: false,
        };
        let metric = |part: MapMetricPart| {
            MetricConfiguration::new(
                family_metric_name(condition.name(), part),
                accessor(),
                kwargs(json!({"value_set": [1], "result_format": {"result_format": "SUMMARY"}})),
            )
        };

        let values = MapMetric::new(condition.clone(), MapMetricPart::UnexpectedValues)
            .dependencies(&metric(MapMetricPart::UnexpectedValues), capabilities)
            .unwrap();
        let index = MapMetric::new(condition.clone(), MapMetricPart::UnexpectedIndexList)
            .dependencies(&metric(MapMetricPart::UnexpectedIndexList), capabilities)
            .unwrap();
        assert_eq!(values[LISTING].id(), index[LISTING].id());
        assert_eq!(values[LISTING].id(), metric(MapMetricPart::UnexpectedListing).id());

        let listing = MapMetric::new(condition.clone(), MapMetricPart::UnexpectedListing);
        let dependencies = listing
            .dependencies(&metric(MapMetricPart::UnexpectedListing), capabilities)
            .unwrap();
        assert!(dependencies.contains_key("unexpected_count"));
        assert!(matches!(
            listing.dependencies(
                &metric(MapMetricPart::UnexpectedListing),
                EngineCapabilities::default()
            ),
            Err(TermError::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_lists_are_cut_from_the_listing() {
        let condition: Arc<dyn MapCondition> =
            Arc::new(ColumnCondition::new(ColumnConditionKind::InSet));
        let listing = json!({"unexpected_values": ["x", "y"], "unexpected_index_list": [2, 5]});
        let dependencies = BTreeMap::from([(LISTING.to_string(), listing)]);
        let engine = crate::engine::DataFusionExecutionEngine::new().unwrap();
        let metric = MetricConfiguration::new("unused", accessor(), Map::new());

        let values = MapMetric::new(condition.clone(), MapMetricPart::UnexpectedValues)
            .compute(&engine, &metric, &dependencies)
            .await
            .unwrap();
        let index = MapMetric::new(condition, MapMetricPart::UnexpectedIndexList)
            .compute(&engine, &metric, &dependencies)
            .await
            .unwrap();
        assert_eq!(values, json!(["x", "y"]));
        assert_eq!(index, json!([2, 5]));
    }

    #[test]
    fn test_index_list_requires_row_index() {
        let condition: Arc<dyn MapCondition> =
            Arc::new(ColumnCondition::new(ColumnConditionKind::Null));
        let index = MapMetric::new(condition, MapMetricPart::UnexpectedIndexList);
        let metric = MetricConfiguration::new(index.metric_name(), accessor(), Map::new());
        assert!(matches!(
            index.dependencies(&metric, EngineCapabilities::default()),
            Err(TermError::NotSupported(_))
        ));
    }

    #[test]
    fn test_condition_validation() {
        let between = ColumnCondition::new(ColumnConditionKind::Between);
        assert!(between.expected(&accessor(), &Map::new()).is_err());
        assert!(between
            .expected(&accessor(), &kwargs(json!({"min_value": 1})))
            .is_ok());

        let regex = ColumnCondition::new(ColumnConditionKind::MatchRegex);
        assert!(regex
            .expected(&accessor(), &kwargs(json!({"regex": "(.*)*"})))
            .is_err());

        let list = ColumnCondition::new(ColumnConditionKind::MatchRegexList);
        assert!(list
            .expected(&accessor(), &kwargs(json!({"regex_list": []})))
            .is_err());
        assert!(list
            .expected(&accessor(), &kwargs(json!({"regex_list": ["a"], "match_on": "some"})))
            .is_err());
    }

    #[test]
    fn test_null_conditions_do_not_filter_nulls() {
        assert!(!ColumnConditionKind::NonNull.filter_nulls());
        assert!(!ColumnConditionKind::Null.filter_nulls());
        assert!(ColumnConditionKind::InSet.filter_nulls());
        let nonnull = ColumnCondition::new(ColumnConditionKind::NonNull);
        assert!(nonnull.row_filter(&accessor(), &Map::new()).unwrap().is_none());
    }
}
