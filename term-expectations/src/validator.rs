//! Runs expectations against the active batch of an engine.
//!
//! The validator collects the metric requests of every expectation, merges
//! them into one [`ValidationGraph`] so shared metrics are computed once and
//! aggregates over the same domain share a scan, resolves it, and hands each
//! expectation its values.
//!
//! ```rust,no_run
//! use term_expectations::core::{BatchSpec, ExpectationConfiguration, ExpectationSuite};
//! use term_expectations::engine::{DataFusionExecutionEngine, ExecutionEngine};
//! use term_expectations::validator::Validator;
//! use serde_json::json;
//!
//! # async fn example() -> term_expectations::error::Result<()> {
//! let mut engine = DataFusionExecutionEngine::new()?;
//! engine.load_batch(BatchSpec::from_path("data/orders.csv")).await?;
//!
//! let suite = ExpectationSuite::new("orders").with_expectation(
//!     ExpectationConfiguration::with_kwargs(
//!         "expect_column_values_to_not_be_null",
//!         json!({"column": "order_id"}),
//!     )?,
//! );
//! let result = Validator::new(&engine).validate_suite(&suite).await?;
//! println!("{}", result.to_json()?);
//! # Ok(())
//! # }
//! ```

use crate::core::metric::MetricValues;
use crate::core::{
    ExpectationConfiguration, ExpectationSuite, ExpectationValidationResult, SuiteRunMeta,
    SuiteValidationResult,
};
use crate::engine::ExecutionEngine;
use crate::error::{ErrorContext, Result, TermError};
use crate::expectations::keys::{CATCH_EXCEPTIONS, INCLUDE_CONFIG};
use crate::expectations::{
    core_registry, get_result_format, Expectation, ExpectationRegistry, ResultFormatConfig,
    ValidationDependencies,
};
use crate::graph::{resolve_validation_graph, ValidationGraph};
use crate::logging::{truncate_field, LogConfig};
use crate::metrics::{core_metric_registry, MetricDependencies, MetricRegistry};
use crate::perf_debug;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Run-level overrides; each wins over the matching expectation kwarg.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfiguration {
    pub result_format: Option<Value>,
    pub catch_exceptions: Option<bool>,
    pub include_config: Option<bool>,
}

impl RuntimeConfiguration {
    pub fn with_result_format(mut self, result_format: impl Into<Value>) -> Self {
        self.result_format = Some(result_format.into());
        self
    }

    pub fn with_catch_exceptions(mut self, catch_exceptions: bool) -> Self {
        self.catch_exceptions = Some(catch_exceptions);
        self
    }

    pub fn with_include_config(mut self, include_config: bool) -> Self {
        self.include_config = Some(include_config);
        self
    }
}

/// One configuration, bound to its expectation and effective runtime settings.
struct Planned<'c> {
    config: &'c ExpectationConfiguration,
    expectation: Arc<dyn Expectation>,
    result_format: ResultFormatConfig,
    catch_exceptions: bool,
    include_config: bool,
}

/// Metric requests of a planned expectation, or the error that stopped it.
type Outcome = Result<ValidationDependencies>;

/// Validates expectation configurations through one execution engine.
pub struct Validator<'e> {
    engine: &'e dyn ExecutionEngine,
    runtime: RuntimeConfiguration,
    expectations: Arc<ExpectationRegistry>,
    metrics: Arc<MetricRegistry>,
    log_config: LogConfig,
}

impl<'e> Validator<'e> {
    /// A validator using the built-in expectation and metric registries.
    pub fn new(engine: &'e dyn ExecutionEngine) -> Self {
        Self {
            engine,
            runtime: RuntimeConfiguration::default(),
            expectations: core_registry(),
            metrics: core_metric_registry(),
            log_config: LogConfig::default(),
        }
    }

    pub fn with_runtime_configuration(mut self, runtime: RuntimeConfiguration) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_expectation_registry(mut self, registry: Arc<ExpectationRegistry>) -> Self {
        self.expectations = registry;
        self
    }

    pub fn with_metric_registry(mut self, registry: Arc<MetricRegistry>) -> Self {
        self.metrics = registry;
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Validates every configuration against the engine's active batch.
    ///
    /// All metric requests go into one shared graph. When resolving it fails
    /// with a non-fatal error, each expectation's metrics are resolved on
    /// their own (keeping everything already computed), so the error is
    /// reported only by the expectations that need the failing metric.
    ///
    /// With `catch_exceptions` a non-fatal error becomes a failed result
    /// carrying `exception_info`; otherwise it is returned. Configuration and
    /// graph consistency errors are always returned.
    #[instrument(skip_all, fields(expectations = configs.len(), engine = self.engine.name()))]
    pub async fn graph_validate(
        &self,
        configs: &[ExpectationConfiguration],
    ) -> Result<Vec<ExpectationValidationResult>> {
        let mut plans = configs
            .iter()
            .map(|config| self.plan(config))
            .collect::<Result<Vec<_>>>()?;

        let capabilities = self.engine.capabilities();
        let mut graph = ValidationGraph::new();
        for (_, outcome) in &mut plans {
            let Ok(dependencies) = &*outcome else {
                continue;
            };
            let added = dependencies
                .values()
                .try_for_each(|metric| {
                    graph
                        .add_metric(metric.clone(), &self.metrics, capabilities)
                        .map(|_| ())
                });
            if let Err(error) = added {
                if error.is_fatal() {
                    return Err(error);
                }
                *outcome = Err(error);
            }
        }
        perf_debug!(
            self.log_config,
            graph.nodes = graph.len(),
            graph.edges = graph.edges().len(),
            "Built validation graph"
        );

        let mut resolved = MetricValues::new();
        if let Err(error) = resolve_validation_graph(&graph, self.engine, &mut resolved).await {
            if error.is_fatal() {
                return Err(error);
            }
            warn!(
                error = %error,
                "Shared metric resolution failed; resolving expectations separately"
            );
            for (_, outcome) in &mut plans {
                let Ok(dependencies) = &*outcome else {
                    continue;
                };
                if let Err(error) = self.resolve_separately(dependencies, &mut resolved).await {
                    if error.is_fatal() {
                        return Err(error);
                    }
                    *outcome = Err(error);
                }
            }
        }

        let mut results = Vec::with_capacity(plans.len());
        for (plan, outcome) in plans {
            let evr = outcome.and_then(|dependencies| {
                let metrics = collect_metrics(&dependencies, &resolved)?;
                plan.expectation
                    .validate(plan.config, &metrics, &plan.result_format)
            });
            let evr = match evr {
                Ok(evr) => evr,
                Err(error) => capture(&plan, error)?,
            };
            results.push(finish(&plan, evr));
        }

        if self.log_config.log_expectation_results {
            for (config, evr) in configs.iter().zip(&results) {
                let payload = serde_json::to_string(&evr.result).unwrap_or_default();
                debug!(
                    expectation.name = %config.expectation_type,
                    expectation.success = evr.success,
                    expectation.raised = evr.raised_exception(),
                    expectation.result = %truncate_field(&payload, self.log_config.max_field_length),
                    "Validated expectation"
                );
            }
        }
        Ok(results)
    }

    /// Validates a suite against the active batch and records its provenance.
    pub async fn validate_suite(&self, suite: &ExpectationSuite) -> Result<SuiteValidationResult> {
        let run_time = Utc::now().to_rfc3339();
        let results = self.graph_validate(&suite.expectations).await?;

        let batch_id = self.engine.active_batch_id();
        let batch = batch_id.as_deref().and_then(|id| self.engine.get_batch(id));
        let meta = SuiteRunMeta {
            batch_markers: batch.map(|b| b.markers().clone()),
            batch_spec: batch.map(|b| b.spec().identity_value()),
            batch_id,
            run_time,
        };
        let result = SuiteValidationResult::new(suite.name.clone(), results, meta);
        info!(
            suite.name = %result.suite_name,
            suite.success = result.success,
            suite.evaluated = result.statistics.evaluated_expectations,
            suite.successful = result.statistics.successful_expectations,
            "Validated expectation suite"
        );
        Ok(result)
    }

    fn plan<'c>(&self, config: &'c ExpectationConfiguration) -> Result<(Planned<'c>, Outcome)> {
        let expectation = self.expectations.get(&config.expectation_type)?;
        expectation
            .validate_configuration(config)
            .with_context(|| format!("invalid {}", config.expectation_type))?;

        let flag = |runtime: Option<bool>, key: &str| -> Result<bool> {
            if let Some(value) = runtime {
                return Ok(value);
            }
            match expectation.keys().kwarg(config, key) {
                None | Some(Value::Null) => Ok(false),
                Some(Value::Bool(value)) => Ok(*value),
                Some(other) => Err(TermError::configuration(format!(
                    "{key} must be a boolean, got {other}"
                ))),
            }
        };
        let catch_exceptions = flag(self.runtime.catch_exceptions, CATCH_EXCEPTIONS)?;
        let include_config = flag(self.runtime.include_config, INCLUDE_CONFIG)?;
        let result_format =
            get_result_format(expectation.as_ref(), config, self.runtime.result_format.as_ref())?;

        let outcome = match expectation.get_validation_dependencies(
            config,
            &result_format,
            self.engine.capabilities(),
        ) {
            Err(error) if error.is_fatal() || !catch_exceptions => return Err(error),
            outcome => outcome,
        };
        let plan = Planned {
            config,
            expectation,
            result_format,
            catch_exceptions,
            include_config,
        };
        Ok((plan, outcome))
    }

    async fn resolve_separately(
        &self,
        dependencies: &ValidationDependencies,
        resolved: &mut MetricValues,
    ) -> Result<()> {
        let mut graph = ValidationGraph::new();
        for metric in dependencies.values() {
            graph.add_metric(metric.clone(), &self.metrics, self.engine.capabilities())?;
        }
        resolve_validation_graph(&graph, self.engine, resolved).await
    }
}

/// Reads an expectation's metrics out of the run's resolved values.
fn collect_metrics(
    dependencies: &ValidationDependencies,
    resolved: &MetricValues,
) -> Result<MetricDependencies> {
    dependencies
        .iter()
        .map(|(name, metric)| {
            let id = metric.id();
            resolved
                .get(&id)
                .cloned()
                .map(|value| (name.clone(), value))
                .ok_or_else(|| {
                    TermError::graph_consistency(format!("metric {id} was never resolved"))
                })
        })
        .collect()
}

fn capture(plan: &Planned<'_>, error: TermError) -> Result<ExpectationValidationResult> {
    if error.is_fatal() || !plan.catch_exceptions {
        return Err(error);
    }
    warn!(
        expectation.name = %plan.config.expectation_type,
        error.kind = error.kind(),
        error = %error,
        "Captured expectation error"
    );
    Ok(ExpectationValidationResult::from_error(&error))
}

fn finish(plan: &Planned<'_>, evr: ExpectationValidationResult) -> ExpectationValidationResult {
    let evr = evr.with_meta(plan.config.meta.clone());
    if plan.include_config {
        evr.with_config(plan.config.clone())
    } else {
        evr
    }
}
