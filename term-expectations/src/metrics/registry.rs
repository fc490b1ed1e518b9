//! Lookup of metric providers by name.

use super::column::{
    ColumnAggregate, ColumnDistinctValues, ColumnProportionOfUniqueValues, ColumnStatistic,
};
use super::map::{ColumnCondition, ColumnConditionKind, MapCondition, MapMetric};
use super::pair::{ColumnPairMissingCount, PairCondition, PairConditionKind};
use super::table::{TableColumnCount, TableColumns, TableRowCount};
use super::MetricProvider;
use crate::error::{Result, TermError};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Metric providers keyed by metric name.
#[derive(Debug, Default, Clone)]
pub struct MetricRegistry {
    providers: HashMap<String, Arc<dyn MetricProvider>>,
}

impl MetricRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in metric.
    pub fn with_core_metrics() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TableRowCount));
        registry.register(Arc::new(TableColumns));
        registry.register(Arc::new(TableColumnCount));
        for statistic in ColumnStatistic::ALL {
            registry.register(Arc::new(ColumnAggregate::new(*statistic)));
        }
        registry.register(Arc::new(ColumnDistinctValues));
        registry.register(Arc::new(ColumnProportionOfUniqueValues));
        for kind in ColumnConditionKind::ALL {
            registry.register_map_condition(Arc::new(ColumnCondition::new(*kind)));
        }
        for kind in PairConditionKind::ALL {
            registry.register_map_condition(Arc::new(PairCondition::new(*kind)));
        }
        registry.register(Arc::new(ColumnPairMissingCount));
        registry
    }

    /// Registers a provider, replacing any provider with the same name.
    pub fn register(&mut self, provider: Arc<dyn MetricProvider>) {
        let name = provider.metric_name().to_string();
        if self.providers.insert(name.clone(), provider).is_some() {
            debug!(metric.name = %name, "Replaced metric provider");
        }
    }

    /// Registers the whole metric family of a map condition.
    pub fn register_map_condition(&mut self, condition: Arc<dyn MapCondition>) {
        for metric in MapMetric::family(condition) {
            self.register(Arc::new(metric));
        }
    }

    /// Looks up a provider.
    pub fn get(&self, metric_name: &str) -> Result<Arc<dyn MetricProvider>> {
        self.providers.get(metric_name).cloned().ok_or_else(|| {
            TermError::metric_resolution(metric_name, "no provider is registered for this metric")
        })
    }

    pub fn contains(&self, metric_name: &str) -> bool {
        self.providers.contains_key(metric_name)
    }

    /// Registered metric names, sorted.
    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

static CORE_METRICS: Lazy<Arc<MetricRegistry>> =
    Lazy::new(|| Arc::new(MetricRegistry::with_core_metrics()));

/// The process-wide registry of built-in metrics.
pub fn core_metric_registry() -> Arc<MetricRegistry> {
    CORE_METRICS.clone()
}
