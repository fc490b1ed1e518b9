//! Column-pair conditions and the joint-missing metric.

use super::map::MapCondition;
use super::{MetricDependencies, MetricFnType, MetricProvider, COLUMN_PAIR_DOMAIN_KEYS};
use crate::core::domain::DomainKwargs;
use crate::core::metric::MetricConfiguration;
use crate::engine::{AggregateFn, ExecutionEngine};
use crate::error::{Result, TermError};
use async_trait::async_trait;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::logical_expr::{ident, lit, when, Expr};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which rows a pair condition skips because of missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreRowIf {
    #[default]
    BothValuesAreMissing,
    EitherValueIsMissing,
    Neither,
}

impl IgnoreRowIf {
    pub fn from_kwargs(kwargs: &Map<String, Value>) -> Result<Self> {
        match kwargs.get("ignore_row_if") {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(s)) => match s.as_str() {
                "both_values_are_missing" => Ok(Self::BothValuesAreMissing),
                "either_value_is_missing" => Ok(Self::EitherValueIsMissing),
                "neither" => Ok(Self::Neither),
                other => Err(TermError::configuration(format!(
                    "Unknown value of ignore_row_if: {other}"
                ))),
            },
            Some(other) => Err(TermError::configuration(format!(
                "ignore_row_if must be a string, got {other}"
            ))),
        }
    }

    /// Rows skipped under this policy, `None` when nothing is skipped.
    fn ignored(&self, a: Expr, b: Expr) -> Option<Expr> {
        match self {
            Self::BothValuesAreMissing => Some(a.is_null().and(b.is_null())),
            Self::EitherValueIsMissing => Some(a.is_null().or(b.is_null())),
            Self::Neither => None,
        }
    }
}

fn pair_columns(accessor: &DomainKwargs) -> Result<(Expr, Expr)> {
    let (a, b) = accessor.require_column_pair()?;
    Ok((ident(a), ident(b)))
}

/// The column-pair conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairConditionKind {
    Equal,
    AGreaterThanB,
}

impl PairConditionKind {
    pub const ALL: &'static [PairConditionKind] = &[Self::Equal, Self::AGreaterThanB];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Equal => "column_pair_values.equal",
            Self::AGreaterThanB => "column_pair_values.a_greater_than_b",
        }
    }
}

/// A condition over the domain's `column_A` and `column_B`.
#[derive(Debug, Clone, Copy)]
pub struct PairCondition {
    kind: PairConditionKind,
}

impl PairCondition {
    pub fn new(kind: PairConditionKind) -> Self {
        Self { kind }
    }
}

impl MapCondition for PairCondition {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn domain_keys(&self) -> &[&str] {
        COLUMN_PAIR_DOMAIN_KEYS
    }

    fn value_keys(&self) -> &[&str] {
        match self.kind {
            PairConditionKind::Equal => &["ignore_row_if"],
            PairConditionKind::AGreaterThanB => &["ignore_row_if", "or_equal"],
        }
    }

    fn columns(&self, accessor: &DomainKwargs) -> Result<Vec<String>> {
        let (a, b) = accessor.require_column_pair()?;
        Ok(vec![a.to_string(), b.to_string()])
    }

    fn row_filter(
        &self,
        accessor: &DomainKwargs,
        value_kwargs: &Map<String, Value>,
    ) -> Result<Option<Expr>> {
        let (a, b) = pair_columns(accessor)?;
        Ok(IgnoreRowIf::from_kwargs(value_kwargs)?
            .ignored(a, b)
            .map(|ignored| ignored.is_not_true()))
    }

    fn expected(&self, accessor: &DomainKwargs, kwargs: &Map<String, Value>) -> Result<Expr> {
        let (a, b) = pair_columns(accessor)?;
        match self.kind {
            PairConditionKind::Equal => Ok(a.eq(b)),
            PairConditionKind::AGreaterThanB => {
                let or_equal = match kwargs.get("or_equal") {
                    None | Some(Value::Null) => false,
                    Some(Value::Bool(flag)) => *flag,
                    Some(other) => {
                        return Err(TermError::configuration(format!(
                            "or_equal must be a boolean, got {other}"
                        )))
                    }
                };
                Ok(if or_equal { a.gt_eq(b) } else { a.gt(b) })
            }
        }
    }
}

/// `column_pair_values.missing_count`: rows skipped under `ignore_row_if`.
#[derive(Debug, Default)]
pub struct ColumnPairMissingCount;

#[async_trait]
impl MetricProvider for ColumnPairMissingCount {
    fn metric_name(&self) -> &str {
        "column_pair_values.missing_count"
    }

    fn fn_type(&self) -> MetricFnType {
        MetricFnType::Aggregate
    }

    fn domain_keys(&self) -> &[&str] {
        COLUMN_PAIR_DOMAIN_KEYS
    }

    fn value_keys(&self) -> &[&str] {
        &["ignore_row_if"]
    }

    fn aggregate(
        &self,
        engine: &dyn ExecutionEngine,
        metric: &MetricConfiguration,
        _dependencies: &MetricDependencies,
    ) -> Result<AggregateFn> {
        let domain = engine.get_compute_domain(&metric.metric_domain_kwargs)?;
        let (a, b) = pair_columns(&domain.accessor_kwargs)?;
        let expr = match IgnoreRowIf::from_kwargs(&metric.metric_value_kwargs)?.ignored(a, b) {
            Some(ignored) => count(when(ignored, lit(1_i64)).end()?),
            // nothing is skipped; count(NULL) keeps the Int64 result type
            None => count(when(lit(false), lit(1_i64)).end()?),
        };
        Ok(AggregateFn {
            expr,
            compute_domain_kwargs: domain.compute_kwargs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ignore_row_if_parsing() {
        let kwargs = |v: Value| v.as_object().cloned().unwrap();
        assert_eq!(
            IgnoreRowIf::from_kwargs(&Map::new()).unwrap(),
            IgnoreRowIf::BothValuesAreMissing
        );
        assert_eq!(
            IgnoreRowIf::from_kwargs(&kwargs(json!({"ignore_row_if": "neither"}))).unwrap(),
            IgnoreRowIf::Neither
        );
        assert!(IgnoreRowIf::from_kwargs(&kwargs(json!({"ignore_row_if": "never"}))).is_err());
    }

    #[test]
    fn test_pair_condition_requires_both_columns() {
        let condition = PairCondition::new(PairConditionKind::Equal);
        let accessor = DomainKwargs::new().with("column_A", "a");
        assert!(condition.expected(&accessor, &Map::new()).is_err());
        let accessor = accessor.with("column_B", "b");
        assert_eq!(condition.columns(&accessor).unwrap(), vec!["a", "b"]);
        assert!(condition
            .row_filter(&accessor, &Map::new())
            .unwrap()
            .is_some());
    }
}
