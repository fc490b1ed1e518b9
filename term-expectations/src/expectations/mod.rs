//! Expectations: declared assertions and how they map onto metrics.
//!
//! An expectation does two things. Given a configuration it names the
//! metrics it needs ([`Expectation::get_validation_dependencies`]); given
//! the resolved values it decides success and builds the result payload
//! ([`Expectation::validate`]). Everything in between (graph expansion,
//! bundling, execution) belongs to the validator and the engine.
//!
//! Behavior is composed from small capability traits rather than a type
//! hierarchy:
//!
//! - [`HasDomain`]: which kwargs identify the data
//! - [`HasSuccessRatio`]: the `mostly` threshold
//! - [`HasMapMetric`]: a row-wise condition judged with [`map_success`] and
//!   reported with [`format_map_output`]
//!
//! ## Catalog
//!
//! | family | expectations |
//! |---|---|
//! | column map | `expect_column_values_to_not_be_null`, `..._to_be_in_set`, `..._to_be_between`, `..._to_match_regex`, ... |
//! | column pair map | `expect_column_pair_values_to_be_equal`, `expect_column_pair_values_a_to_be_greater_than_b` |
//! | column aggregate | `expect_column_mean_to_be_between`, `expect_column_distinct_values_to_be_in_set`, ... |
//! | table | `expect_table_row_count_to_equal`, `expect_table_columns_to_match_ordered_list`, ... |

pub mod column_aggregate;
pub mod column_map;
pub mod column_pair;
pub mod keys;
pub mod output;
pub mod registry;
pub mod result_format;
pub mod success;
pub mod table;

pub use keys::{merge_defaults, ExpectationKeys};
pub use output::{format_map_output, partial_unexpected_counts, MapObservations};
pub use registry::{camel_to_snake, core_registry, register_core_expectations, ExpectationRegistry};
pub use result_format::{parse_result_format, ResultFormat, ResultFormatConfig};
pub use success::{
    map_success, parse_mostly, validate_between_configuration, validate_metric_value_between,
};

use crate::core::domain::DomainKwargs;
use crate::core::metric::MetricConfiguration;
use crate::core::{ExpectationConfiguration, ExpectationValidationResult};
use crate::engine::EngineCapabilities;
use crate::error::{Result, TermError};
use crate::metrics::map::{family_metric_name, MapMetricPart, RESULT_FORMAT_KEY};
use crate::metrics::{dependency_count, MetricDependencies};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the row count metric every map expectation requests.
pub const TABLE_ROW_COUNT: &str = "table.row_count";

/// Requested metrics by name.
pub type ValidationDependencies = BTreeMap<String, MetricConfiguration>;

/// Kwarg roles and the domain an expectation runs over.
pub trait HasDomain {
    fn keys(&self) -> &ExpectationKeys;

    fn domain_kwargs(&self, config: &ExpectationConfiguration) -> DomainKwargs {
        self.keys().domain_kwargs(config)
    }

    /// The domain with column addressing removed, for table-level metrics.
    fn table_domain_kwargs(&self, config: &ExpectationConfiguration) -> DomainKwargs {
        self.domain_kwargs(config).split_accessor_keys().0
    }
}

/// Expectations judged against a `mostly` threshold.
pub trait HasSuccessRatio: HasDomain {
    fn mostly(&self, config: &ExpectationConfiguration) -> Result<f64> {
        parse_mostly(self.keys().kwarg(config, keys::MOSTLY))
    }
}

/// Expectations backed by one row-wise map condition.
pub trait HasMapMetric: HasSuccessRatio {
    /// The condition's metric family prefix, e.g. `column_values.in_set`.
    fn map_metric(&self) -> &str;

    /// Value kwargs the condition reads.
    fn condition_kwargs(&self, config: &ExpectationConfiguration) -> Map<String, Value>;

    /// The metric counting rows excluded as missing.
    ///
    /// `None` when missing values are themselves what the condition tests.
    fn missing_count_metric(&self, config: &ExpectationConfiguration) -> Option<MetricConfiguration>;
}

/// A registered expectation type.
pub trait Expectation: HasDomain + fmt::Debug + Send + Sync {
    /// Canonical snake-case name; derived from the type name unless overridden.
    fn expectation_type(&self) -> String {
        camel_to_snake(short_type_name(std::any::type_name::<Self>()))
    }

    /// Structural checks on a configuration. Never coerces.
    fn validate_configuration(&self, config: &ExpectationConfiguration) -> Result<()>;

    /// Metrics needed to validate `config` at the given result format.
    fn get_validation_dependencies(
        &self,
        config: &ExpectationConfiguration,
        result_format: &ResultFormatConfig,
        capabilities: EngineCapabilities,
    ) -> Result<ValidationDependencies>;

    /// Turns resolved metrics, keyed as requested, into a result.
    fn validate(
        &self,
        config: &ExpectationConfiguration,
        metrics: &MetricDependencies,
        result_format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult>;
}

fn short_type_name(full: &str) -> &str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics.rsplit("::").next().unwrap_or(without_generics)
}

/// Fails unless `config` names this expectation.
pub fn check_expectation_type<E: Expectation + ?Sized>(
    expectation: &E,
    config: &ExpectationConfiguration,
) -> Result<()> {
    let expected = expectation.expectation_type();
    if config.expectation_type != expected {
        return Err(TermError::configuration(format!(
            "expectation configuration type {} does not match expectation type {expected}",
            config.expectation_type
        )));
    }
    Ok(())
}

/// Requires `key` to be present and non-null.
pub fn require_kwarg<'a>(config: &'a ExpectationConfiguration, key: &str) -> Result<&'a Value> {
    config.kwarg(key).ok_or_else(|| {
        TermError::configuration(format!(
            "'{key}' parameter is required for {}",
            config.expectation_type
        ))
    })
}

/// Effective result format: runtime override, then kwargs, then the default.
pub fn get_result_format<E: HasDomain + ?Sized>(
    expectation: &E,
    config: &ExpectationConfiguration,
    runtime_override: Option<&Value>,
) -> Result<ResultFormatConfig> {
    let value = runtime_override
        .or_else(|| expectation.keys().kwarg(config, keys::RESULT_FORMAT))
        .unwrap_or(&Value::Null);
    parse_result_format(value)
}

/// Reads a resolved metric by request name.
pub fn metric_value<'a>(metrics: &'a MetricDependencies, name: &str) -> Result<&'a Value> {
    metrics.get(name).ok_or_else(|| {
        TermError::graph_consistency(format!("metric {name} was requested but not resolved"))
    })
}

/// Metric requests of a map expectation.
///
/// Always the unexpected count, the row count and (when tracked) the missing
/// count. Above `BOOLEAN_ONLY` the unexpected values; at `SUMMARY` and above
/// the unexpected indices when the engine has them; at `COMPLETE` the
/// unexpected rows.
pub fn map_validation_dependencies<E: HasMapMetric + ?Sized>(
    expectation: &E,
    config: &ExpectationConfiguration,
    result_format: &ResultFormatConfig,
    capabilities: EngineCapabilities,
) -> Result<ValidationDependencies> {
    let domain = expectation.domain_kwargs(config);
    let condition = expectation.map_metric();
    let condition_kwargs = expectation.condition_kwargs(config);
    let mut metrics = ValidationDependencies::new();

    let count_name = family_metric_name(condition, MapMetricPart::UnexpectedCount);
    metrics.insert(
        count_name.clone(),
        MetricConfiguration::new(count_name, domain.clone(), condition_kwargs.clone()),
    );
    metrics.insert(
        TABLE_ROW_COUNT.to_string(),
        MetricConfiguration::new(
            TABLE_ROW_COUNT,
            expectation.table_domain_kwargs(config),
            Map::new(),
        ),
    );
    if let Some(missing) = expectation.missing_count_metric(config) {
        metrics.insert(missing.metric_name.clone(), missing);
    }
    if result_format.result_format == ResultFormat::BooleanOnly {
        return Ok(metrics);
    }

    let mut listing_kwargs = condition_kwargs;
    listing_kwargs.insert(RESULT_FORMAT_KEY.to_string(), result_format.to_value());
    let mut request = |part: MapMetricPart| {
        let name = family_metric_name(condition, part);
        metrics.insert(
            name.clone(),
            MetricConfiguration::new(name, domain.clone(), listing_kwargs.clone()),
        );
    };

    request(MapMetricPart::UnexpectedValues);
    if result_format.result_format >= ResultFormat::Summary && capabilities.row_index {
        request(MapMetricPart::UnexpectedIndexList);
    }
    if result_format.result_format == ResultFormat::Complete {
        request(MapMetricPart::UnexpectedRows);
    }
    Ok(metrics)
}

/// Judges a map expectation from its resolved metrics.
pub fn map_validate<E: HasMapMetric + ?Sized>(
    expectation: &E,
    config: &ExpectationConfiguration,
    metrics: &MetricDependencies,
    result_format: &ResultFormatConfig,
) -> Result<ExpectationValidationResult> {
    let condition = expectation.map_metric();
    let count_name = family_metric_name(condition, MapMetricPart::UnexpectedCount);

    let total = dependency_count(metrics, TABLE_ROW_COUNT, condition)?;
    let unexpected = dependency_count(metrics, &count_name, condition)?.unwrap_or(0);
    let missing = match expectation.missing_count_metric(config) {
        Some(metric) => Some(dependency_count(metrics, &metric.metric_name, condition)?.unwrap_or(0)),
        None => None,
    };

    let success = map_success(
        total,
        unexpected,
        Some(missing.unwrap_or(0)),
        expectation.mostly(config)?,
    );

    let list = |part: MapMetricPart| -> Option<&[Value]> {
        metrics
            .get(&family_metric_name(condition, part))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    };
    let observed = MapObservations {
        element_count: total,
        nonnull_count: match (total, missing) {
            (Some(total), Some(missing)) => Some(total.saturating_sub(missing)),
            _ => None,
        },
        unexpected_count: unexpected,
        unexpected_list: list(MapMetricPart::UnexpectedValues).unwrap_or(&[]),
        unexpected_index_list: list(MapMetricPart::UnexpectedIndexList),
        unexpected_rows: list(MapMetricPart::UnexpectedRows),
    };
    Ok(format_map_output(result_format, success, &observed))
}
