//! Expectations on a single aggregate of one column.

use super::keys::ExpectationKeys;
use super::output::compare_values;
use super::{
    check_expectation_type, metric_value, require_kwarg, validate_between_configuration,
    validate_metric_value_between, Expectation, HasDomain, ResultFormatConfig,
    ValidationDependencies,
};
use crate::core::domain::COLUMN;
use crate::core::metric::MetricConfiguration;
use crate::core::{ExpectationConfiguration, ExpectationValidationResult};
use crate::engine::EngineCapabilities;
use crate::error::{Result, TermError};
use crate::metrics::column::ColumnStatistic;
use crate::metrics::map::flag;
use crate::metrics::MetricDependencies;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;

const BETWEEN_KEYS: &[&str] = &["min_value", "strict_min", "max_value", "strict_max"];

const PROPORTION_OF_UNIQUE_VALUES: &str = "column.proportion_of_unique_values";

fn require_column(config: &ExpectationConfiguration) -> Result<()> {
    if require_kwarg(config, COLUMN)?.is_string() {
        Ok(())
    } else {
        Err(TermError::configuration("column must be a string"))
    }
}

/// `expect_column_<metric>_to_be_between`: one column metric within optional bounds.
#[derive(Debug, Clone)]
pub struct ColumnAggregateBetween {
    metric_name: &'static str,
    expectation_type: &'static str,
    keys: ExpectationKeys,
}

impl ColumnAggregateBetween {
    pub fn new(metric_name: &'static str, expectation_type: &'static str) -> Self {
        Self {
            metric_name,
            expectation_type,
            keys: ExpectationKeys::column()
                .with_success_keys(BETWEEN_KEYS)
                .with_defaults(json!({"strict_min": false, "strict_max": false})),
        }
    }

    /// The between expectation over a column statistic.
    pub fn statistic(statistic: ColumnStatistic) -> Self {
        let expectation_type = match statistic {
            ColumnStatistic::Min => "expect_column_min_to_be_between",
            ColumnStatistic::Max => "expect_column_max_to_be_between",
            ColumnStatistic::Mean => "expect_column_mean_to_be_between",
            ColumnStatistic::Sum => "expect_column_sum_to_be_between",
            ColumnStatistic::Median => "expect_column_median_to_be_between",
            ColumnStatistic::StandardDeviation => "expect_column_stdev_to_be_between",
            ColumnStatistic::UniqueValueCount => "expect_column_unique_value_count_to_be_between",
        };
        Self::new(statistic.metric_name(), expectation_type)
    }

    pub fn proportion_of_unique_values() -> Self {
        Self::new(
            PROPORTION_OF_UNIQUE_VALUES,
            "expect_column_proportion_of_unique_values_to_be_between",
        )
    }

    /// Every column aggregate between-expectation.
    pub fn all() -> Vec<Self> {
        ColumnStatistic::ALL
            .iter()
            .copied()
            .map(Self::statistic)
            .chain(std::iter::once(Self::proportion_of_unique_values()))
            .collect()
    }

    pub fn metric_name(&self) -> &str {
        self.metric_name
    }
}

impl HasDomain for ColumnAggregateBetween {
    fn keys(&self) -> &ExpectationKeys {
        &self.keys
    }
}

impl Expectation for ColumnAggregateBetween {
    fn expectation_type(&self) -> String {
        self.expectation_type.to_string()
    }

    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()> {
        check_expectation_type(self, config)?;
        require_column(config)?;
        let success = self.keys.success_kwargs(config);
        validate_between_configuration(&success, true)?;
        flag(&success, "strict_min")?;
        flag(&success, "strict_max")?;
        if self.metric_name == PROPORTION_OF_UNIQUE_VALUES {
            for key in ["min_value", "max_value"] {
                if let Some(bound) = success.get(key).and_then(Value::as_f64) {
                    if !(0.0..=1.0).contains(&bound) {
                        return Err(TermError::configuration(format!(
                            "{key} must be between 0 and 1 for a proportion"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn get_validation_dependencies(
        &self,
        config: &ExpectationConfiguration,
        _result_format: &ResultFormatConfig,
        _capabilities: EngineCapabilities,
    ) -> Result<ValidationDependencies> {
        Ok(ValidationDependencies::from([(
            self.metric_name.to_string(),
            MetricConfiguration::new(self.metric_name, self.domain_kwargs(config), Map::new()),
        )]))
    }

    fn validate(
        &self,
        config: &ExpectationConfiguration,
        metrics: &MetricDependencies,
        _result_format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult> {
        let observed = metric_value(metrics, self.metric_name)?;
        let success = self.keys.success_kwargs(config);
        validate_metric_value_between(
            observed,
            success.get("min_value"),
            success.get("max_value"),
            flag(&success, "strict_min")?,
            flag(&success, "strict_max")?,
        )
    }
}

/// Every distinct non-null value of the column belongs to `value_set`.
///
/// Without a `value_set` the expectation only reports the observed values.
#[derive(Debug, Clone)]
pub struct ExpectColumnDistinctValuesToBeInSet {
    keys: ExpectationKeys,
}

impl Default for ExpectColumnDistinctValuesToBeInSet {
    fn default() -> Self {
        Self {
            keys: ExpectationKeys::column().with_success_keys(&["value_set"]),
        }
    }
}

impl ExpectColumnDistinctValuesToBeInSet {
    const METRIC: &'static str = "column.distinct_values";
}

impl HasDomain for ExpectColumnDistinctValuesToBeInSet {
    fn keys(&self) -> &ExpectationKeys {
        &self.keys
    }
}

impl Expectation for ExpectColumnDistinctValuesToBeInSet {
    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()> {
        check_expectation_type(self, config)?;
        require_column(config)?;
        match config.kwarg("value_set") {
            None | Some(Value::Array(_)) => Ok(()),
            Some(other) => Err(TermError::configuration(format!(
                "value_set must be a list, got {other}"
            ))),
        }
    }

    fn get_validation_dependencies(
        &self,
        config: &ExpectationConfiguration,
        _result_format: &ResultFormatConfig,
        _capabilities: EngineCapabilities,
    ) -> Result<ValidationDependencies> {
        Ok(ValidationDependencies::from([(
            Self::METRIC.to_string(),
            MetricConfiguration::new(Self::METRIC, self.domain_kwargs(config), Map::new()),
        )]))
    }

    fn validate(
        &self,
        config: &ExpectationConfiguration,
        metrics: &MetricDependencies,
        _result_format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult> {
        let mut observed = metric_value(metrics, Self::METRIC)?
            .as_array()
            .cloned()
            .ok_or_else(|| {
                TermError::metric_resolution(Self::METRIC, "distinct values are not a list")
            })?;
        observed.sort_by(compare_values);

        let success = match config.kwarg("value_set").and_then(Value::as_array) {
            Some(value_set) => observed.iter().all(|value| {
                value_set
                    .iter()
                    .any(|allowed| compare_values(value, allowed) == Ordering::Equal)
            }),
            None => true,
        };
        Ok(ExpectationValidationResult::new(
            success,
            Some(Map::from_iter([(
                "observed_value".to_string(),
                Value::Array(observed),
            )])),
        ))
    }
}
