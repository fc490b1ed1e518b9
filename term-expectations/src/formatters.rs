//! Rendering of suite validation results.
//!
//! Formatters only read the serializable [`SuiteValidationResult`], so any
//! result (including one loaded back from JSON) can be rendered.
//!
//! # Examples
//!
//! ```rust
//! use term_expectations::core::{ExpectationValidationResult, SuiteRunMeta, SuiteValidationResult};
//! use term_expectations::formatters::{HumanFormatter, ResultFormatter};
//!
//! let result = SuiteValidationResult::new(
//!     "orders",
//!     vec![ExpectationValidationResult::new(true, None)],
//!     SuiteRunMeta::default(),
//! );
//! let output = HumanFormatter::new().format(&result).unwrap();
//! assert!(output.contains("Validation PASSED"));
//! ```

use crate::core::{ExpectationValidationResult, SuiteValidationResult};
use crate::error::{Result, TermError};
use serde_json::Value;

/// Configuration options for formatting validation results.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the run statistics
    pub include_statistics: bool,
    /// Include one entry per failed expectation
    pub include_failures: bool,
    /// Include observed values and unexpected samples of failures
    pub include_result_details: bool,
    /// Maximum number of failures to display, `None` for all
    pub max_failures: Option<usize>,
    /// Whether to use colorized output (human formatter)
    pub use_colors: bool,
    /// Whether to include batch provenance and run time
    pub include_run_meta: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self::detailed()
    }
}

impl FormatterConfig {
    /// Summary only.
    pub fn minimal() -> Self {
        Self {
            include_statistics: true,
            include_failures: false,
            include_result_details: false,
            max_failures: Some(0),
            use_colors: false,
            include_run_meta: false,
        }
    }

    /// Everything.
    pub fn detailed() -> Self {
        Self {
            include_statistics: true,
            include_failures: true,
            include_result_details: true,
            max_failures: None,
            use_colors: true,
            include_run_meta: true,
        }
    }

    /// Bounded, uncolored output for CI logs.
    pub fn ci() -> Self {
        Self {
            include_statistics: true,
            include_failures: true,
            include_result_details: false,
            max_failures: Some(50),
            use_colors: false,
            include_run_meta: true,
        }
    }

    pub fn with_statistics(mut self, include: bool) -> Self {
        self.include_statistics = include;
        self
    }

    pub fn with_failures(mut self, include: bool) -> Self {
        self.include_failures = include;
        self
    }

    pub fn with_max_failures(mut self, max: Option<usize>) -> Self {
        self.max_failures = max;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn shown_failures<'a>(&self, result: &'a SuiteValidationResult) -> Vec<&'a ExpectationValidationResult> {
        if !self.include_failures {
            return Vec::new();
        }
        let failed = result.failed();
        match self.max_failures {
            Some(max) => failed.take(max).collect(),
            None => failed.collect(),
        }
    }
}

/// Renders a suite validation result.
///
/// ```rust
/// use term_expectations::core::SuiteValidationResult;
/// use term_expectations::formatters::ResultFormatter;
///
/// struct OneLine;
///
/// impl ResultFormatter for OneLine {
///     fn format(&self, result: &SuiteValidationResult) -> term_expectations::error::Result<String> {
///         Ok(format!("{}: {}", result.suite_name, result.success))
///     }
/// }
/// ```
pub trait ResultFormatter {
    fn format(&self, result: &SuiteValidationResult) -> Result<String>;

    /// Formats with explicit options; the default ignores them.
    fn format_with_config(
        &self,
        result: &SuiteValidationResult,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(result)
    }
}

/// Structured JSON, for programmatic consumers.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, result: &SuiteValidationResult) -> Result<String> {
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(
        &self,
        result: &SuiteValidationResult,
        config: &FormatterConfig,
    ) -> Result<String> {
        let filtered = filter_result_for_config(result, config)?;
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&filtered)
        } else {
            serde_json::to_string(&filtered)
        };
        rendered.map_err(|e| TermError::Serialization(format!("Failed to serialize result to JSON: {e}")))
    }
}

/// Console output.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn paint(text: &str, color: &str, enabled: bool) -> String {
    if enabled {
        format!("\x1b[{color}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, result: &SuiteValidationResult) -> Result<String> {
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(
        &self,
        result: &SuiteValidationResult,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut lines = vec![String::new()];
        lines.push(if result.success {
            format!("✅ {}", paint("Validation PASSED", "32", config.use_colors))
        } else {
            format!("❌ {}", paint("Validation FAILED", "31", config.use_colors))
        });
        lines.push(String::new());
        lines.push(format!("Suite: {}", result.suite_name));

        if config.include_run_meta {
            if let Some(batch_id) = &result.meta.batch_id {
                lines.push(format!("Batch: {batch_id}"));
            }
            lines.push(format!("Run time: {}", result.meta.run_time));
        }

        if config.include_statistics {
            let stats = &result.statistics;
            lines.push(String::new());
            lines.push("📊 Summary Statistics:".to_string());
            lines.push(format!("   Evaluated: {}", stats.evaluated_expectations));
            lines.push(format!(
                "   ✅ Successful: {}",
                paint(&stats.successful_expectations.to_string(), "32", config.use_colors)
            ));
            lines.push(format!(
                "   ❌ Unsuccessful: {}",
                paint(&stats.unsuccessful_expectations.to_string(), "31", config.use_colors)
            ));
            if let Some(percent) = stats.success_percent {
                lines.push(format!("   Success Rate: {percent:.1}%"));
            }
        }

        let shown = config.shown_failures(result);
        if !shown.is_empty() {
            lines.push(String::new());
            lines.push("🔍 Failed Expectations:".to_string());
            for (i, evr) in shown.iter().enumerate() {
                lines.push(String::new());
                lines.push(format!("   {}. {}", i + 1, describe(evr)));
                if let Some(message) = &evr.exception_info.exception_message {
                    lines.push(format!("      Error: {message}"));
                }
                if config.include_result_details {
                    lines.extend(detail_lines(evr).into_iter().map(|l| format!("      {l}")));
                }
            }
            let total = result.statistics.unsuccessful_expectations;
            if total > shown.len() {
                lines.push(String::new());
                lines.push(format!("   ... and {} more failures", total - shown.len()));
            }
        }

        lines.push(String::new());
        Ok(lines.join("\n"))
    }
}

/// Markdown, for reports and pull request comments.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            heading_level: 2,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the base heading level, clamped to `1..=6`.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 6);
        self
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for MarkdownFormatter {
    fn format(&self, result: &SuiteValidationResult) -> Result<String> {
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(
        &self,
        result: &SuiteValidationResult,
        config: &FormatterConfig,
    ) -> Result<String> {
        let h = "#".repeat(self.heading_level as usize);
        let mut lines = vec![if result.success {
            format!("{h} ✅ Validation Report - PASSED")
        } else {
            format!("{h} ❌ Validation Report - FAILED")
        }];
        lines.push(String::new());
        lines.push(format!("**Suite:** {}", result.suite_name));
        if config.include_run_meta {
            if let Some(batch_id) = &result.meta.batch_id {
                lines.push(format!("**Batch:** `{batch_id}`"));
            }
            lines.push(format!("**Run time:** {}", result.meta.run_time));
        }

        if config.include_statistics {
            let stats = &result.statistics;
            lines.push(String::new());
            lines.push(format!("{h}# Summary"));
            lines.push(String::new());
            lines.push("| Statistic | Value |".to_string());
            lines.push("|-----------|-------|".to_string());
            lines.push(format!("| Evaluated | {} |", stats.evaluated_expectations));
            lines.push(format!("| Successful | {} |", stats.successful_expectations));
            lines.push(format!("| Unsuccessful | {} |", stats.unsuccessful_expectations));
            if let Some(percent) = stats.success_percent {
                lines.push(format!("| Success Rate | {percent:.1}% |"));
            }
        }

        let shown = config.shown_failures(result);
        if !shown.is_empty() {
            lines.push(String::new());
            lines.push(format!("{h}# Failed Expectations"));
            for (i, evr) in shown.iter().enumerate() {
                lines.push(String::new());
                lines.push(format!("{h}## {}. {}", i + 1, describe(evr)));
                lines.push(String::new());
                if let Some(message) = &evr.exception_info.exception_message {
                    lines.push(format!("- **Error:** {message}"));
                }
                if config.include_result_details {
                    lines.extend(detail_lines(evr).into_iter().map(|l| format!("- {l}")));
                }
            }
            let total = result.statistics.unsuccessful_expectations;
            if total > shown.len() {
                lines.push(String::new());
                lines.push(format!(
                    "> **Note:** {} additional failures not shown in this report.",
                    total - shown.len()
                ));
            }
        }

        lines.push(String::new());
        Ok(lines.join("\n"))
    }
}

/// `expect_x (column=a)`, or a placeholder when the config was not attached.
fn describe(evr: &ExpectationValidationResult) -> String {
    let Some(config) = &evr.expectation_config else {
        return "expectation (configuration not included)".to_string();
    };
    let addressing: Vec<String> = ["column", "column_A", "column_B"]
        .iter()
        .filter_map(|key| config.kwarg(key).map(|v| format!("{key}={}", plain(v))))
        .collect();
    if addressing.is_empty() {
        config.expectation_type.clone()
    } else {
        format!("{} ({})", config.expectation_type, addressing.join(", "))
    }
}

fn detail_lines(evr: &ExpectationValidationResult) -> Vec<String> {
    let fields = [
        ("observed_value", "Observed"),
        ("unexpected_count", "Unexpected count"),
        ("unexpected_percent", "Unexpected %"),
        ("partial_unexpected_list", "Sample unexpected values"),
    ];
    fields
        .iter()
        .filter_map(|(key, label)| {
            evr.result_field(key)
                .filter(|v| !v.is_null())
                .map(|v| format!("{label}: {}", plain(v)))
        })
        .collect()
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:.3}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Applies the configuration to the serializable result.
fn filter_result_for_config(
    result: &SuiteValidationResult,
    config: &FormatterConfig,
) -> Result<Value> {
    let mut value = serde_json::to_value(result)?;
    if let Some(map) = value.as_object_mut() {
        if !config.include_statistics {
            map.remove("statistics");
        }
        if !config.include_run_meta {
            map.remove("meta");
        }
        if let Some(Value::Array(results)) = map.get_mut("results") {
            if !config.include_result_details {
                for evr in results.iter_mut() {
                    if let Some(evr) = evr.as_object_mut() {
                        evr.remove("result");
                    }
                }
            }
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExpectationConfiguration, SuiteRunMeta};
    use serde_json::json;

    fn create_test_result() -> SuiteValidationResult {
        let failed = |column: &str, unexpected: u64| {
            ExpectationValidationResult::new(
                false,
                Some(
                    json!({"unexpected_count": unexpected, "partial_unexpected_list": ["x"]})
                        .as_object()
                        .cloned()
                        .unwrap(),
                ),
            )
            .with_config(
                ExpectationConfiguration::with_kwargs(
                    "expect_column_values_to_be_in_set",
                    json!({"column": column, "value_set": ["a"]}),
                )
                .unwrap(),
            )
        };
        SuiteValidationResult::new(
            "test_suite",
            vec![
                ExpectationValidationResult::new(true, None),
                failed("status", 3),
                failed("region", 1),
            ],
            SuiteRunMeta {
                batch_id: Some("abc123".to_string()),
                run_time: "2024-01-01T00:00:00+00:00".to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_formatter_config() {
        let minimal = FormatterConfig::minimal();
        assert!(minimal.include_statistics);
        assert!(!minimal.include_failures);
        assert!(!minimal.use_colors);

        let ci = FormatterConfig::ci();
        assert!(!ci.use_colors);
        assert_eq!(ci.max_failures, Some(50));
    }

    #[test]
    fn test_json_formatter() {
        let result = create_test_result();
        let output = JsonFormatter::new().format(&result).unwrap();
        let parsed: SuiteValidationResult = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.suite_name, "test_suite");
        assert_eq!(parsed.results, result.results);
        assert_eq!(parsed.meta, result.meta);

        let output = JsonFormatter::new()
            .with_pretty(false)
            .format_with_config(&result, &FormatterConfig::minimal())
            .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert!(value.get("meta").is_none());
        assert!(value["results"][1].get("result").is_none());
    }

    #[test]
    fn test_human_formatter() {
        let result = create_test_result();
        let output = HumanFormatter::new().format(&result).unwrap();
        assert!(output.contains("Validation FAILED"));
        assert!(output.contains("Suite: test_suite"));
        assert!(output.contains("Evaluated: 3"));
        assert!(output.contains("expect_column_values_to_be_in_set (column=status)"));
        assert!(output.contains("Unexpected count: 3"));

        let config = FormatterConfig::default().with_colors(false);
        let output = HumanFormatter::new().format_with_config(&result, &config).unwrap();
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_markdown_formatter() {
        let result = create_test_result();
        let output = MarkdownFormatter::new().format(&result).unwrap();
        assert!(output.contains("## ❌ Validation Report - FAILED"));
        assert!(output.contains("**Suite:** test_suite"));
        assert!(output.contains("| Evaluated | 3 |"));
        assert!(output.contains("### 1. expect_column_values_to_be_in_set (column=status)"));

        let output = MarkdownFormatter::new()
            .with_heading_level(1)
            .format(&result)
            .unwrap();
        assert!(output.starts_with("# ❌ Validation Report - FAILED"));
    }

    #[test]
    fn test_config_max_failures() {
        let result = create_test_result();
        let config = FormatterConfig::default().with_max_failures(Some(1));
        let output = HumanFormatter::new().format_with_config(&result, &config).unwrap();
        assert!(output.contains("1. expect_column_values_to_be_in_set"));
        assert!(output.contains("... and 1 more failures"));
    }
}
