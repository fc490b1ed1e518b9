//! Validation results.

use crate::core::batch::BatchMarkers;
use crate::core::expectation::ExpectationConfiguration;
use crate::error::TermError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Details of an error captured while validating one expectation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub raised_exception: bool,
    #[serde(default)]
    pub exception_message: Option<String>,
    #[serde(default)]
    pub exception_traceback: Option<String>,
}

impl ExceptionInfo {
    /// Captures an error as `"<kind>: <message>"` plus its source chain.
    pub fn from_error(error: &TermError) -> Self {
        Self {
            raised_exception: true,
            exception_message: Some(format!("{}: {error}", error.kind())),
            exception_traceback: Some(error.source_chain()),
        }
    }
}

/// The outcome of validating one expectation against one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationValidationResult {
    pub success: bool,
    /// Tiered payload; absent at `BOOLEAN_ONLY` and for captured failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation_config: Option<ExpectationConfiguration>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub exception_info: ExceptionInfo,
}

impl ExpectationValidationResult {
    pub fn new(success: bool, result: Option<Map<String, Value>>) -> Self {
        Self {
            success,
            result,
            expectation_config: None,
            meta: Map::new(),
            exception_info: ExceptionInfo::default(),
        }
    }

    /// A failed result carrying the captured error.
    pub fn from_error(error: &TermError) -> Self {
        Self {
            exception_info: ExceptionInfo::from_error(error),
            ..Self::new(false, None)
        }
    }

    pub fn with_config(mut self, config: ExpectationConfiguration) -> Self {
        self.expectation_config = Some(config);
        self
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn raised_exception(&self) -> bool {
        self.exception_info.raised_exception
    }

    /// Reads one field of the result payload.
    pub fn result_field(&self, key: &str) -> Option<&Value> {
        self.result.as_ref().and_then(|r| r.get(key))
    }

    /// Expectation type, when the configuration is attached.
    pub fn expectation_type(&self) -> Option<&str> {
        self.expectation_config
            .as_ref()
            .map(|c| c.expectation_type.as_str())
    }
}

/// Counts over the results of one suite run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    pub evaluated_expectations: usize,
    pub successful_expectations: usize,
    pub unsuccessful_expectations: usize,
    /// `None` when nothing was evaluated.
    pub success_percent: Option<f64>,
}

impl ValidationStatistics {
    pub fn from_results(results: &[ExpectationValidationResult]) -> Self {
        let evaluated = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            evaluated_expectations: evaluated,
            successful_expectations: successful,
            unsuccessful_expectations: evaluated - successful,
            success_percent: (evaluated > 0)
                .then(|| successful as f64 / evaluated as f64 * 100.0),
        }
    }
}

/// Provenance of a suite run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteRunMeta {
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub batch_markers: Option<BatchMarkers>,
    /// Serializable form of the batch spec.
    #[serde(default)]
    pub batch_spec: Option<Value>,
    /// RFC 3339 start time of the run.
    pub run_time: String,
}

/// The outcome of validating a whole suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteValidationResult {
    pub suite_name: String,
    pub success: bool,
    pub results: Vec<ExpectationValidationResult>,
    pub statistics: ValidationStatistics,
    pub meta: SuiteRunMeta,
}

impl SuiteValidationResult {
    pub fn new(
        suite_name: impl Into<String>,
        results: Vec<ExpectationValidationResult>,
        meta: SuiteRunMeta,
    ) -> Self {
        let statistics = ValidationStatistics::from_results(&results);
        Self {
            suite_name: suite_name.into(),
            success: results.iter().all(|r| r.success),
            results,
            statistics,
            meta,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &ExpectationValidationResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        use crate::formatters::{JsonFormatter, ResultFormatter};
        JsonFormatter::new().format(self)
    }
}
