//! Expectation configurations and suites.

use crate::core::identity::content_id;
use crate::error::{Result, TermError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One declared expectation: a type name plus its kwargs.
///
/// # Examples
///
/// ```rust
/// use term_expectations::core::ExpectationConfiguration;
/// use serde_json::json;
///
/// let config = ExpectationConfiguration::from_value(json!({
///     "expectation_type": "expect_column_values_to_not_be_null",
///     "kwargs": {"column": "id", "mostly": 0.95}
/// })).unwrap();
/// assert_eq!(config.kwarg("column"), Some(&json!("id")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationConfiguration {
    pub expectation_type: String,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl ExpectationConfiguration {
    pub fn new(expectation_type: impl Into<String>, kwargs: Map<String, Value>) -> Self {
        Self {
            expectation_type: expectation_type.into(),
            kwargs,
            meta: Map::new(),
        }
    }

    /// Builds a configuration from a kwargs JSON object.
    pub fn with_kwargs(expectation_type: impl Into<String>, kwargs: Value) -> Result<Self> {
        match kwargs {
            Value::Object(map) => Ok(Self::new(expectation_type, map)),
            other => Err(TermError::configuration(format!(
                "expectation kwargs must be an object, got {other}"
            ))),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| TermError::configuration(format!("invalid expectation configuration: {e}")))
    }

    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key).filter(|v| !v.is_null())
    }

    /// Content id of the type and kwargs; `meta` is not part of the identity.
    pub fn id(&self) -> String {
        content_id(&serde_json::json!({
            "expectation_type": self.expectation_type,
            "kwargs": self.kwargs,
        }))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A named, ordered list of expectations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectationSuite {
    #[serde(alias = "expectation_suite_name")]
    pub name: String,
    #[serde(default)]
    pub expectations: Vec<ExpectationConfiguration>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl ExpectationSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_expectation(mut self, expectation: ExpectationConfiguration) -> Self {
        self.expectations.push(expectation);
        self
    }

    pub fn add_expectation(&mut self, expectation: ExpectationConfiguration) {
        self.expectations.push(expectation);
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| TermError::configuration(format!("invalid expectation suite: {e}")))
    }

    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_suite_from_json() {
        let suite = ExpectationSuite::from_json_str(
            r#"{
                "expectation_suite_name": "orders",
                "expectations": [
                    {"expectation_type": "expect_table_row_count_to_equal", "kwargs": {"value": 3}},
                    {"expectation_type": "expect_column_to_exist", "kwargs": {"column": "id"}, "meta": {"owner": "ops"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(suite.name, "orders");
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.expectations[1].meta["owner"], json!("ops"));
    }

    #[test]
    fn test_malformed_configuration_is_configuration_error() {
        let err = ExpectationConfiguration::from_value(json!({"kwargs": {}})).unwrap_err();
        assert!(matches!(err, TermError::Configuration(_)));
        let err = ExpectationConfiguration::with_kwargs("expect_column_to_exist", json!([1])).unwrap_err();
        assert!(matches!(err, TermError::Configuration(_)));
    }

    #[test]
    fn test_id_ignores_meta_and_key_order() {
        let a = ExpectationConfiguration::from_value(json!({
            "expectation_type": "expect_column_values_to_be_between",
            "kwargs": {"column": "x", "min_value": 1, "max_value": 2}
        }))
        .unwrap();
        let b = ExpectationConfiguration::from_value(json!({
            "expectation_type": "expect_column_values_to_be_between",
            "kwargs": {"max_value": 2, "min_value": 1, "column": "x"},
            "meta": {"notes": "ranges"}
        }))
        .unwrap();
        assert_eq!(a.id(), b.id());
    }
}
