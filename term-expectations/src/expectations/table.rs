//! Expectations on the shape of a batch.

use super::keys::ExpectationKeys;
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
use crate::metrics::MetricDependencies;
use serde_json::{json, Map, Value};

const ROW_COUNT: &str = "table.row_count";
const COLUMNS: &str = "table.columns";
const COLUMN_COUNT: &str = "table.column_count";

fn table_metric<E: HasDomain + ?Sized>(
    expectation: &E,
    config: &ExpectationConfiguration,
    metric_name: &str,
) -> ValidationDependencies {
    ValidationDependencies::from([(
        metric_name.to_string(),
        MetricConfiguration::new(metric_name, expectation.domain_kwargs(config), Map::new()),
    )])
}

fn observed_result(success: bool, observed: &Value) -> ExpectationValidationResult {
    ExpectationValidationResult::new(
        success,
        Some(Map::from_iter([("observed_value".to_string(), observed.clone())])),
    )
}

fn require_count(config: &ExpectationConfiguration, key: &str) -> Result<u64> {
    let value = require_kwarg(config, key)?;
    value.as_u64().ok_or_else(|| {
        TermError::configuration(format!("{key} must be a non-negative integer, got {value}"))
    })
}

/// Row count within `[min_value, max_value]`, either bound optional.
#[derive(Debug, Clone)]
pub struct ExpectTableRowCountToBeBetween {
    keys: ExpectationKeys,
}

impl Default for ExpectTableRowCountToBeBetween {
    fn default() -> Self {
        Self {
            keys: ExpectationKeys::table().with_success_keys(&["min_value", "max_value"]),
        }
    }
}

impl HasDomain for ExpectTableRowCountToBeBetween {
    fn keys(&self) -> &ExpectationKeys {
        &self.keys
    }
}

impl Expectation for ExpectTableRowCountToBeBetween {
    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()> {
        check_expectation_type(self, config)?;
        validate_between_configuration(&self.keys.success_kwargs(config), true)
    }

    fn get_validation_dependencies(
        &self,
        config: &ExpectationConfiguration,
        _result_format: &ResultFormatConfig,
        _capabilities: EngineCapabilities,
    ) -> Result<ValidationDependencies> {
        Ok(table_metric(self, config, ROW_COUNT))
    }

    fn validate(
        &self,
        config: &ExpectationConfiguration,
        metrics: &MetricDependencies,
        _result_format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult> {
        let success = self.keys.success_kwargs(config);
        validate_metric_value_between(
            metric_value(metrics, ROW_COUNT)?,
            success.get("min_value"),
            success.get("max_value"),
            false,
            false,
        )
    }
}

/// Row count equal to `value`.
#[derive(Debug, Clone)]
pub struct ExpectTableRowCountToEqual {
    keys: ExpectationKeys,
}

impl Default for ExpectTableRowCountToEqual {
    fn default() -> Self {
        Self {
            keys: ExpectationKeys::table().with_success_keys(&["value"]),
        }
    }
}

impl HasDomain for ExpectTableRowCountToEqual {
    fn keys(&self) -> &ExpectationKeys {
        &self.keys
    }
}

impl Expectation for ExpectTableRowCountToEqual {
    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()> {
        check_expectation_type(self, config)?;
        require_count(config, "value").map(|_| ())
    }

    fn get_validation_dependencies(
        &self,
        config: &ExpectationConfiguration,
        _result_format: &ResultFormatConfig,
        _capabilities: EngineCapabilities,
    ) -> Result<ValidationDependencies> {
        Ok(table_metric(self, config, ROW_COUNT))
    }

    fn validate(
        &self,
        config: &ExpectationConfiguration,
        metrics: &MetricDependencies,
        _result_format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult> {
        let observed = metric_value(metrics, ROW_COUNT)?;
        let expected = require_count(config, "value")?;
        Ok(observed_result(observed.as_u64() == Some(expected), observed))
    }
}

/// Number of visible columns equal to `value`.
#[derive(Debug, Clone)]
pub struct ExpectTableColumnCountToEqual {
    keys: ExpectationKeys,
}

impl Default for ExpectTableColumnCountToEqual {
    fn default() -> Self {
        Self {
            keys: ExpectationKeys::table().with_success_keys(&["value"]),
        }
    }
}

impl HasDomain for ExpectTableColumnCountToEqual {
    fn keys(&self) -> &ExpectationKeys {
        &self.keys
    }
}

impl Expectation for ExpectTableColumnCountToEqual {
    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()> {
        check_expectation_type(self, config)?;
        require_count(config, "value").map(|_| ())
    }

    fn get_validation_dependencies(
        &self,
        config: &ExpectationConfiguration,
        _result_format: &ResultFormatConfig,
        _capabilities: EngineCapabilities,
    ) -> Result<ValidationDependencies> {
        Ok(table_metric(self, config, COLUMN_COUNT))
    }

    fn validate(
        &self,
        config: &ExpectationConfiguration,
        metrics: &MetricDependencies,
        _result_format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult> {
        let observed = metric_value(metrics, COLUMN_COUNT)?;
        let expected = require_count(config, "value")?;
        Ok(observed_result(observed.as_u64() == Some(expected), observed))
    }
}

/// Visible columns exactly equal to `column_list`, in order.
///
/// A failed result lists each position where the expected and found names differ.
#[derive(Debug, Clone)]
pub struct ExpectTableColumnsToMatchOrderedList {
    keys: ExpectationKeys,
}

impl Default for ExpectTableColumnsToMatchOrderedList {
    fn default() -> Self {
        Self {
            keys: ExpectationKeys::table().with_success_keys(&["column_list"]),
        }
    }
}

impl HasDomain for ExpectTableColumnsToMatchOrderedList {
    fn keys(&self) -> &ExpectationKeys {
        &self.keys
    }
}

impl ExpectTableColumnsToMatchOrderedList {
    fn column_list(config: &ExpectationConfiguration) -> Result<&Vec<Value>> {
        require_kwarg(config, "column_list")?
            .as_array()
            .ok_or_else(|| TermError::configuration("column_list must be a list"))
    }
}

impl Expectation for ExpectTableColumnsToMatchOrderedList {
    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()> {
        check_expectation_type(self, config)?;
        Self::column_list(config).map(|_| ())
    }

    fn get_validation_dependencies(
        &self,
        config: &ExpectationConfiguration,
        _result_format: &ResultFormatConfig,
        _capabilities: EngineCapabilities,
    ) -> Result<ValidationDependencies> {
        Ok(table_metric(self, config, COLUMNS))
    }

    fn validate(
        &self,
        config: &ExpectationConfiguration,
        metrics: &MetricDependencies,
        _result_format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult> {
        let observed_value = metric_value(metrics, COLUMNS)?;
        let observed = observed_value
            .as_array()
            .ok_or_else(|| TermError::metric_resolution(COLUMNS, "columns are not a list"))?;
        let expected = Self::column_list(config)?;
        if observed == expected {
            return Ok(observed_result(true, observed_value));
        }

        let mismatched: Vec<Value> = (0..observed.len().max(expected.len()))
            .filter(|&i| observed.get(i) != expected.get(i))
            .map(|i| {
                json!({
                    "Expected Column Position": i,
                    "Expected": expected.get(i),
                    "Found": observed.get(i),
                })
            })
            .collect();
        let mut evr = observed_result(false, observed_value);
        if let Some(result) = evr.result.as_mut() {
            result.insert("details".to_string(), json!({"mismatched": mismatched}));
        }
        Ok(evr)
    }
}

/// `column` is present, optionally at position `column_index`.
#[derive(Debug, Clone)]
pub struct ExpectColumnToExist {
    keys: ExpectationKeys,
}

impl Default for ExpectColumnToExist {
    fn default() -> Self {
        Self {
            keys: ExpectationKeys::table().with_success_keys(&[COLUMN, "column_index"]),
        }
    }
}

impl HasDomain for ExpectColumnToExist {
    fn keys(&self) -> &ExpectationKeys {
        &self.keys
    }
}

impl Expectation for ExpectColumnToExist {
    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()> {
        check_expectation_type(self, config)?;
        if !require_kwarg(config, COLUMN)?.is_string() {
            return Err(TermError::configuration("column must be a string"));
        }
        match config.kwarg("column_index") {
            None => Ok(()),
            Some(index) if index.is_u64() => Ok(()),
            Some(other) => Err(TermError::configuration(format!(
                "column_index must be a non-negative integer, got {other}"
            ))),
        }
    }

    fn get_validation_dependencies(
        &self,
        config: &ExpectationConfiguration,
        _result_format: &ResultFormatConfig,
        _capabilities: EngineCapabilities,
    ) -> Result<ValidationDependencies> {
        Ok(table_metric(self, config, COLUMNS))
    }

    fn validate(
        &self,
        config: &ExpectationConfiguration,
        metrics: &MetricDependencies,
        _result_format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult> {
        let columns = metric_value(metrics, COLUMNS)?
            .as_array()
            .ok_or_else(|| TermError::metric_resolution(COLUMNS, "columns are not a list"))?;
        let column = require_kwarg(config, COLUMN)?;
        let success = match config.kwarg("column_index").and_then(Value::as_u64) {
            Some(index) => usize::try_from(index)
                .ok()
                .and_then(|i| columns.get(i))
                .is_some_and(|found| found == column),
            None => columns.contains(column),
        };
        Ok(ExpectationValidationResult::new(success, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(expectation_type: &str, kwargs: Value) -> ExpectationConfiguration {
        ExpectationConfiguration::with_kwargs(expectation_type, kwargs).unwrap()
    }

    fn columns(list: Value) -> MetricDependencies {
        MetricDependencies::from([(COLUMNS.to_string(), list)])
    }

    #[test]
    fn test_row_count_dependencies_have_no_column() {
        let deps = ExpectTableRowCountToEqual::default()
            .get_validation_dependencies(
                &config("expect_table_row_count_to_equal", json!({"value": 3, "row_condition": "x > 1"})),
                &ResultFormatConfig::default(),
                EngineCapabilities::default(),
            )
            .unwrap();
        let domain = &deps[ROW_COUNT].metric_domain_kwargs;
        assert_eq!(domain.to_value(), json!({"row_condition": "x > 1"}));
    }

    #[test]
    fn test_row_count_equal() {
        let expectation = ExpectTableRowCountToEqual::default();
        let equal = config("expect_table_row_count_to_equal", json!({"value": 3}));
        let metrics = MetricDependencies::from([(ROW_COUNT.to_string(), json!(3))]);
        let evr = expectation
            .validate(&equal, &metrics, &ResultFormatConfig::default())
            .unwrap();
        assert!(evr.success);
        assert_eq!(evr.result_field("observed_value"), Some(&json!(3)));
        assert!(expectation
            .validate_configuration(&config("expect_table_row_count_to_equal", json!({"value": "3"})))
            .is_err());
    }

    #[test]
    fn test_row_count_between_needs_a_bound() {
        let expectation = ExpectTableRowCountToBeBetween::default();
        assert!(expectation
            .validate_configuration(&config("expect_table_row_count_to_be_between", json!({})))
            .is_err());
        assert!(expectation
            .validate_configuration(&config("expect_table_row_count_to_be_between", json!({"max_value": 10})))
            .is_ok());
    }

    #[test]
    fn test_ordered_list_mismatch_details() {
        let expectation = ExpectTableColumnsToMatchOrderedList::default();
        let config = config(
            "expect_table_columns_to_match_ordered_list",
            json!({"column_list": ["a", "b", "c"]}),
        );
        let evr = expectation
            .validate(&config, &columns(json!(["a", "c"])), &ResultFormatConfig::default())
            .unwrap();
        assert!(!evr.success);
        assert_eq!(
            evr.result_field("details"),
            Some(&json!({"mismatched": [
                {"Expected Column Position": 1, "Expected": "b", "Found": "c"},
                {"Expected Column Position": 2, "Expected": "c", "Found": null},
            ]}))
        );
        assert!(expectation
            .validate(&config, &columns(json!(["a", "b", "c"])), &ResultFormatConfig::default())
            .unwrap()
            .success);
    }

    #[test]
    fn test_column_to_exist() {
        let expectation = ExpectColumnToExist::default();
        assert_eq!(expectation.expectation_type(), "expect_column_to_exist");
        let check = |kwargs: Value| {
            expectation
                .validate(
                    &config("expect_column_to_exist", kwargs),
                    &columns(json!(["id", "name"])),
                    &ResultFormatConfig::default(),
                )
                .unwrap()
                .success
        };
        assert!(check(json!({"column": "name"})));
        assert!(check(json!({"column": "name", "column_index": 1})));
        assert!(!check(json!({"column": "name", "column_index": 0})));
        assert!(!check(json!({"column": "age"})));
    }
}
