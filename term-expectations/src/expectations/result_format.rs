//! Result-format tiers and their parsing.

use crate::error::{Result, TermError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Default cap on partial unexpected lists.
pub const DEFAULT_PARTIAL_UNEXPECTED_COUNT: usize = 20;

/// Verbosity tier of an expectation result. Each tier is a superset of the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultFormat {
    BooleanOnly,
    Basic,
    Summary,
    Complete,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BooleanOnly => "BOOLEAN_ONLY",
            Self::Basic => "BASIC",
            Self::Summary => "SUMMARY",
            Self::Complete => "COMPLETE",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "BOOLEAN_ONLY" => Ok(Self::BooleanOnly),
            "BASIC" => Ok(Self::Basic),
            "SUMMARY" => Ok(Self::Summary),
            "COMPLETE" => Ok(Self::Complete),
            other => Err(TermError::configuration(format!(
                "Unknown result_format {other}."
            ))),
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized result format: the tier plus the partial list cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultFormatConfig {
    pub result_format: ResultFormat,
    pub partial_unexpected_count: usize,
}

impl Default for ResultFormatConfig {
    fn default() -> Self {
        Self::new(ResultFormat::Basic)
    }
}

impl ResultFormatConfig {
    pub fn new(result_format: ResultFormat) -> Self {
        Self {
            result_format,
            partial_unexpected_count: DEFAULT_PARTIAL_UNEXPECTED_COUNT,
        }
    }

    pub fn with_partial_unexpected_count(mut self, count: usize) -> Self {
        self.partial_unexpected_count = count;
        self
    }

    /// True at COMPLETE, where unexpected lists are not truncated.
    pub fn is_complete(&self) -> bool {
        self.result_format == ResultFormat::Complete
    }

    /// Row limit for unexpected lists, `None` when unlimited.
    pub fn unexpected_limit(&self) -> Option<usize> {
        if self.is_complete() {
            None
        } else {
            Some(self.partial_unexpected_count)
        }
    }

    /// The canonical object form carried in metric value kwargs.
    pub fn to_value(&self) -> Value {
        json!({
            "result_format": self.result_format.as_str(),
            "partial_unexpected_count": self.partial_unexpected_count,
        })
    }
}

/// Normalizes a result format given as a tier name or as an object.
///
/// `null` means the default (`BASIC`). Object form accepts
/// `{"result_format": ..., "partial_unexpected_count": ...}`.
pub fn parse_result_format(value: &Value) -> Result<ResultFormatConfig> {
    match value {
        Value::Null => Ok(ResultFormatConfig::default()),
        Value::String(name) => Ok(ResultFormatConfig::new(ResultFormat::from_name(name)?)),
        Value::Object(map) => {
            let tier = match map.get("result_format") {
                Some(Value::String(name)) => ResultFormat::from_name(name)?,
                _ => {
                    return Err(TermError::configuration(
                        "result_format object requires a 'result_format' string",
                    ))
                }
            };
            let partial = match map.get("partial_unexpected_count") {
                None | Some(Value::Null) => DEFAULT_PARTIAL_UNEXPECTED_COUNT,
                Some(v) => v.as_u64().map(|n| n as usize).ok_or_else(|| {
                    TermError::configuration(format!(
                        "partial_unexpected_count must be a non-negative integer, got {v}"
                    ))
                })?,
            };
            Ok(ResultFormatConfig::new(tier).with_partial_unexpected_count(partial))
        }
        other => Err(TermError::configuration(format!(
            "result_format must be a string or an object, got {other}"
        ))),
    }
}
