//! Row-wise expectations over a pair of columns.

use super::keys::{ExpectationKeys, MOSTLY};
use super::{
    check_expectation_type, map_validate, map_validation_dependencies, parse_mostly,
    require_kwarg, Expectation, HasDomain, HasMapMetric, HasSuccessRatio, ResultFormatConfig,
    ValidationDependencies,
};
use crate::core::domain::{COLUMN_A, COLUMN_B};
use crate::core::metric::MetricConfiguration;
use crate::core::{ExpectationConfiguration, ExpectationValidationResult};
use crate::engine::EngineCapabilities;
use crate::error::{Result, TermError};
use crate::metrics::pair::{IgnoreRowIf, PairConditionKind};
use crate::metrics::MetricDependencies;
use serde_json::{json, Map, Value};

const IGNORE_ROW_IF: &str = "ignore_row_if";

/// Counts rows skipped under `ignore_row_if`; the pair analogue of the null count.
pub const PAIR_MISSING_COUNT: &str = "column_pair_values.missing_count";

/// An expectation that `column_A` and `column_B` satisfy one
/// [`PairConditionKind`] row by row.
///
/// Rows skipped under `ignore_row_if` are excluded from the success ratio.
#[derive(Debug, Clone)]
pub struct ColumnPairMapExpectation {
    kind: PairConditionKind,
    keys: ExpectationKeys,
}

impl ColumnPairMapExpectation {
    pub fn new(kind: PairConditionKind) -> Self {
        let keys = match kind {
            PairConditionKind::Equal => ExpectationKeys::column_pair_map(),
            PairConditionKind::AGreaterThanB => ExpectationKeys::column_pair_map()
                .with_success_keys(&[IGNORE_ROW_IF, "or_equal", MOSTLY])
                .with_defaults(json!({"or_equal": false})),
        };
        Self { kind, keys }
    }

    pub fn all() -> Vec<Self> {
        PairConditionKind::ALL.iter().copied().map(Self::new).collect()
    }

    fn condition_keys(&self) -> &'static [&'static str] {
        match self.kind {
            PairConditionKind::Equal => &[IGNORE_ROW_IF],
            PairConditionKind::AGreaterThanB => &[IGNORE_ROW_IF, "or_equal"],
        }
    }
}

impl HasDomain for ColumnPairMapExpectation {
    fn keys(&self) -> &ExpectationKeys {
        &self.keys
    }
}

impl HasSuccessRatio for ColumnPairMapExpectation {}

impl HasMapMetric for ColumnPairMapExpectation {
    fn map_metric(&self) -> &str {
        self.kind.name()
    }

    fn condition_kwargs(&self, config: &ExpectationConfiguration) -> Map<String, Value> {
        self.keys.pick(config, self.condition_keys())
    }

    fn missing_count_metric(&self, config: &ExpectationConfiguration) -> Option<MetricConfiguration> {
        Some(MetricConfiguration::new(
            PAIR_MISSING_COUNT,
            self.domain_kwargs(config),
            self.keys.pick(config, &[IGNORE_ROW_IF]),
        ))
    }
}

impl Expectation for ColumnPairMapExpectation {
    fn expectation_type(&self) -> String {
        match self.kind {
            PairConditionKind::Equal => "expect_column_pair_values_to_be_equal",
            PairConditionKind::AGreaterThanB => "expect_column_pair_values_a_to_be_greater_than_b",
        }
        .to_string()
    }

    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()> {
        check_expectation_type(self, config)?;
        for key in [COLUMN_A, COLUMN_B] {
            if !require_kwarg(config, key)?.is_string() {
                return Err(TermError::configuration(format!("{key} must be a string")));
            }
        }
        parse_mostly(self.keys.kwarg(config, MOSTLY))?;
        IgnoreRowIf::from_kwargs(&self.keys.pick(config, &[IGNORE_ROW_IF]))?;
        match self.keys.kwarg(config, "or_equal") {
            None | Some(Value::Null) | Some(Value::Bool(_)) => Ok(()),
            Some(other) => Err(TermError::configuration(format!(
                "or_equal must be a boolean, got {other}"
            ))),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectations::ResultFormat;

    fn equal_config(kwargs: Value) -> ExpectationConfiguration {
        ExpectationConfiguration::with_kwargs("expect_column_pair_values_to_be_equal", kwargs).unwrap()
    }

    #[test]
    fn test_requires_both_columns() {
        let expectation = ColumnPairMapExpectation::new(PairConditionKind::Equal);
        assert!(expectation
            .validate_configuration(&equal_config(json!({"column_A": "a", "column_B": "b"})))
            .is_ok());
        assert!(expectation
            .validate_configuration(&equal_config(json!({"column_A": "a"})))
            .is_err());
        assert!(expectation
            .validate_configuration(&equal_config(
                json!({"column_A": "a", "column_B": "b", "ignore_row_if": "sometimes"})
            ))
            .is_err());
    }

    #[test]
    fn test_dependencies_always_include_row_count_and_missing_count() {
        let expectation = ColumnPairMapExpectation::new(PairConditionKind::AGreaterThanB);
        let config = ExpectationConfiguration::with_kwargs(
            "expect_column_pair_values_a_to_be_greater_than_b",
            json!({"column_A": "a", "column_B": "b", "or_equal": true}),
        )
        .unwrap();
        let deps = expectation
            .get_validation_dependencies(
                &config,
                &ResultFormatConfig::new(ResultFormat::BooleanOnly),
                EngineCapabilities::default(),
            )
            .unwrap();
        assert_eq!(deps.len(), 3);
        assert!(deps.contains_key("table.row_count"));
        let missing = &deps[PAIR_MISSING_COUNT];
        assert_eq!(
            missing.value_kwarg(IGNORE_ROW_IF),
            Some(&json!("both_values_are_missing"))
        );
        let count = &deps["column_pair_values.a_greater_than_b.unexpected_count"];
        assert_eq!(count.value_kwarg("or_equal"), Some(&json!(true)));
    }

    #[test]
    fn test_skipped_rows_leave_the_ratio() {
        let expectation = ColumnPairMapExpectation::new(PairConditionKind::Equal);
        let config = equal_config(json!({"column_A": "a", "column_B": "b", "mostly": 0.75}));
        let metrics = MetricDependencies::from([
            ("table.row_count".to_string(), json!(6)),
            ("column_pair_values.equal.unexpected_count".to_string(), json!(1)),
            (PAIR_MISSING_COUNT.to_string(), json!(2)),
            ("column_pair_values.equal.unexpected_values".to_string(), json!([[1, 2]])),
        ]);
        let evr = expectation
            .validate(&config, &metrics, &ResultFormatConfig::default())
            .unwrap();
        // 3 of the 4 compared rows match
        assert!(evr.success);
        assert_eq!(evr.result_field("partial_unexpected_list"), Some(&json!([[1, 2]])));
    }
}
