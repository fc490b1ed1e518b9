//! Row-wise expectations over a single column.

use super::keys::{ExpectationKeys, MOSTLY};
use super::{
    check_expectation_type, map_validate, map_validation_dependencies, parse_mostly,
    require_kwarg, validate_between_configuration, Expectation, HasDomain, HasMapMetric,
    HasSuccessRatio, ResultFormatConfig, ValidationDependencies,
};
use crate::core::domain::COLUMN;
use crate::core::metric::MetricConfiguration;
use crate::core::{ExpectationConfiguration, ExpectationValidationResult};
use crate::engine::EngineCapabilities;
use crate::error::{Result, TermError};
use crate::metrics::map::{family_metric_name, ColumnConditionKind, MapMetricPart};
use crate::metrics::MetricDependencies;
use crate::security::SqlSecurity;
use serde_json::{json, Map, Value};

/// An expectation that every (non-null) value of `column` satisfies one
/// [`ColumnConditionKind`], up to the `mostly` ratio.
#[derive(Debug, Clone)]
pub struct ColumnMapExpectation {
    kind: ColumnConditionKind,
    keys: ExpectationKeys,
}

impl ColumnMapExpectation {
    pub fn new(kind: ColumnConditionKind) -> Self {
        let mut success_keys = vec![MOSTLY];
        success_keys.extend_from_slice(kind.value_keys());
        let keys = ExpectationKeys::column_map().with_success_keys(&success_keys);
        let keys = match kind {
            ColumnConditionKind::Between => {
                keys.with_defaults(json!({"strict_min": false, "strict_max": false}))
            }
            ColumnConditionKind::MatchRegexList => keys.with_defaults(json!({"match_on": "any"})),
            _ => keys,
        };
        Self { kind, keys }
    }

    /// One expectation per column condition.
    pub fn all() -> Vec<Self> {
        ColumnConditionKind::ALL.iter().copied().map(Self::new).collect()
    }

    pub fn kind(&self) -> ColumnConditionKind {
        self.kind
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            ColumnConditionKind::NonNull => "expect_column_values_to_not_be_null",
            ColumnConditionKind::Null => "expect_column_values_to_be_null",
            ColumnConditionKind::InSet => "expect_column_values_to_be_in_set",
            ColumnConditionKind::NotInSet => "expect_column_values_to_not_be_in_set",
            ColumnConditionKind::Between => "expect_column_values_to_be_between",
            ColumnConditionKind::MatchRegex => "expect_column_values_to_match_regex",
            ColumnConditionKind::NotMatchRegex => "expect_column_values_to_not_match_regex",
            ColumnConditionKind::MatchRegexList => "expect_column_values_to_match_regex_list",
            ColumnConditionKind::NotMatchRegexList => {
                "expect_column_values_to_not_match_regex_list"
            }
            ColumnConditionKind::ValueLengthBetween => "expect_column_value_lengths_to_be_between",
            ColumnConditionKind::ValueLengthEquals => "expect_column_value_lengths_to_equal",
        }
    }

    fn validate_condition_kwargs(&self, config: &ExpectationConfiguration) -> Result<()> {
        let kwargs = self.condition_kwargs(config);
        match self.kind {
            ColumnConditionKind::NonNull | ColumnConditionKind::Null => Ok(()),
            ColumnConditionKind::InSet | ColumnConditionKind::NotInSet => {
                match require_kwarg(config, "value_set")? {
                    Value::Array(_) => Ok(()),
                    other => Err(TermError::configuration(format!(
                        "value_set must be a list, got {other}"
                    ))),
                }
            }
            ColumnConditionKind::Between => validate_between_configuration(&kwargs, true),
            ColumnConditionKind::MatchRegex | ColumnConditionKind::NotMatchRegex => {
                let regex = require_kwarg(config, "regex")?
                    .as_str()
                    .ok_or_else(|| TermError::configuration("regex must be a string"))?;
                SqlSecurity::validate_regex_pattern(regex)
            }
            ColumnConditionKind::MatchRegexList | ColumnConditionKind::NotMatchRegexList => {
                let list = require_kwarg(config, "regex_list")?
                    .as_array()
                    .filter(|list| !list.is_empty())
                    .ok_or_else(|| {
                        TermError::configuration("regex_list must be a non-empty list of patterns")
                    })?;
                for pattern in list {
                    let pattern = pattern.as_str().ok_or_else(|| {
                        TermError::configuration("regex_list entries must be strings")
                    })?;
                    SqlSecurity::validate_regex_pattern(pattern)?;
                }
                match kwargs.get("match_on").and_then(Value::as_str) {
                    None | Some("any") | Some("all") => Ok(()),
                    Some(other) => Err(TermError::configuration(format!(
                        "match_on must be 'any' or 'all', got {other}"
                    ))),
                }
            }
            ColumnConditionKind::ValueLengthBetween => {
                validate_between_configuration(&kwargs, true)?;
                for key in ["min_value", "max_value"] {
                    if let Some(bound) = kwargs.get(key) {
                        if !(bound.is_u64() || bound.is_i64()) {
                            return Err(TermError::configuration(format!(
                                "{key} must be an integer, got {bound}"
                            )));
                        }
                    }
                }
                Ok(())
            }
            ColumnConditionKind::ValueLengthEquals => {
                let value = require_kwarg(config, "value")?;
                if value.is_u64() {
                    Ok(())
                } else {
                    Err(TermError::configuration(format!(
                        "value must be a non-negative integer, got {value}"
                    )))
                }
            }
        }
    }
}

impl HasDomain for ColumnMapExpectation {
    fn keys(&self) -> &ExpectationKeys {
        &self.keys
    }
}

impl HasSuccessRatio for ColumnMapExpectation {}

impl HasMapMetric for ColumnMapExpectation {
    fn map_metric(&self) -> &str {
        self.kind.name()
    }

    fn condition_kwargs(&self, config: &ExpectationConfiguration) -> Map<String, Value> {
        self.keys.pick(config, self.kind.value_keys())
    }

    fn missing_count_metric(&self, config: &ExpectationConfiguration) -> Option<MetricConfiguration> {
        if !self.kind.filter_nulls() {
            return None;
        }
        Some(MetricConfiguration::new(
            family_metric_name(ColumnConditionKind::NonNull.name(), MapMetricPart::UnexpectedCount),
            self.domain_kwargs(config),
            Map::new(),
        ))
    }
}

impl Expectation for ColumnMapExpectation {
    fn expectation_type(&self) -> String {
        self.type_name().to_string()
    }

    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()> {
        check_expectation_type(self, config)?;
        if !require_kwarg(config, COLUMN)?.is_string() {
            return Err(TermError::configuration("column must be a string"));
        }
        parse_mostly(self.keys.kwarg(config, MOSTLY))?;
        self.validate_condition_kwargs(config)
    }

    fn get_validation_dependencies(
        &self,
        config: &ExpectationConfiguration,
        result_format: &ResultFormatConfig,
        capabilities: EngineCapabilities,
    ) -> Result<ValidationDependencies> {
        map_validation_dependencies(self, config, result_format, capabilities)
    }

    fn validate(
        &self,
        config: &ExpectationConfiguration,
        metrics: &MetricDependencies,
        result_format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult> {
        map_validate(self, config, metrics, result_format)
    }
}
