//! The validation graph: every metric a run needs, deduplicated by id.
//!
//! Expectations request metrics; [`ValidationGraph::add_metric`] expands each
//! request into its dependencies recursively. Two requests with the same
//! [`MetricId`] are one node, so a metric shared by ten expectations is
//! computed once.

mod resolver;

pub use resolver::resolve_validation_graph;

use crate::core::metric::{MetricConfiguration, MetricEdge, MetricId};
use crate::engine::EngineCapabilities;
use crate::error::{Result, TermError};
use crate::metrics::{MetricProvider, MetricRegistry};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::trace;

/// A metric node together with its provider and dependency ids.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub metric: MetricConfiguration,
    pub provider: Arc<dyn MetricProvider>,
    /// Dependency name → dependency id.
    pub dependencies: BTreeMap<String, MetricId>,
}

/// Dependency graph of metric requests.
#[derive(Debug, Clone, Default)]
pub struct ValidationGraph {
    nodes: HashMap<MetricId, GraphNode>,
    order: Vec<MetricId>,
    edges: Vec<MetricEdge>,
}

impl ValidationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a metric and, recursively, everything it depends on.
    ///
    /// Adding a metric whose id is already present is a no-op. A dependency
    /// chain that leads back to itself is a graph consistency error.
    pub fn add_metric(
        &mut self,
        metric: MetricConfiguration,
        registry: &MetricRegistry,
        capabilities: EngineCapabilities,
    ) -> Result<MetricId> {
        let mut path = Vec::new();
        self.add_inner(metric, registry, capabilities, &mut path)
    }

    fn add_inner(
        &mut self,
        metric: MetricConfiguration,
        registry: &MetricRegistry,
        capabilities: EngineCapabilities,
        path: &mut Vec<MetricId>,
    ) -> Result<MetricId> {
        let id = metric.id();
        if path.contains(&id) {
            let chain: Vec<&str> = path.iter().map(|m| m.metric_name.as_str()).collect();
            return Err(TermError::graph_consistency(format!(
                "dependency cycle: {} -> {}",
                chain.join(" -> "),
                id.metric_name
            )));
        }
        if self.nodes.contains_key(&id) {
            return Ok(id);
        }

        let provider = registry.get(&metric.metric_name)?;
        let requested = provider.dependencies(&metric, capabilities)?;

        path.push(id.clone());
        let mut dependencies = BTreeMap::new();
        for (name, dependency) in requested {
            let dependency_id = self.add_inner(dependency.clone(), registry, capabilities, path)?;
            self.edges.push(MetricEdge {
                left: metric.clone(),
                right: Some(dependency),
            });
            dependencies.insert(name, dependency_id);
        }
        path.pop();

        if dependencies.is_empty() {
            self.edges.push(MetricEdge {
                left: metric.clone(),
                right: None,
            });
        }

        trace!(metric.id = %id, metric.dependencies = dependencies.len(), "Added graph node");
        self.order.push(id.clone());
        self.nodes.insert(
            id.clone(),
            GraphNode {
                metric,
                provider,
                dependencies,
            },
        );
        Ok(id)
    }

    pub fn contains(&self, id: &MetricId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &MetricId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Nodes in insertion order; dependencies always precede their dependents.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn edges(&self) -> &[MetricEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::DomainKwargs;
    use crate::core::metric::MetricValue;
    use crate::metrics::{MetricDependencies, MetricFnType};
    use async_trait::async_trait;
    use serde_json::{json, Map};

    fn caps() -> EngineCapabilities {
        EngineCapabilities {
            row_index: true,
            named_tables: false,
        }
    }

    fn column_metric(name: &str, column: &str, value_kwargs: serde_json::Value) -> MetricConfiguration {
        MetricConfiguration::new(
            name,
            DomainKwargs::new().with("column", column),
            value_kwargs.as_object().cloned().unwrap_or_default(),
        )
    }

    #[test]
    fn test_identical_requests_collapse() {
        let registry = MetricRegistry::with_core_metrics();
        let mut graph = ValidationGraph::new();
        let a = graph
            .add_metric(
                column_metric("column.proportion_of_unique_values", "x", json!({})),
                &registry,
                caps(),
            )
            .unwrap();
        let size = graph.len();
        let b = graph
            .add_metric(
                column_metric("column.proportion_of_unique_values", "x", json!({})),
                &registry,
                caps(),
            )
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(graph.len(), size);
        // proportion + unique count + row count + null count
        assert_eq!(size, 4);
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let registry = MetricRegistry::with_core_metrics();
        let mut graph = ValidationGraph::new();
        graph
            .add_metric(
                column_metric(
                    "column_values.in_set.unexpected_values",
                    "x",
                    json!({"value_set": [1], "result_format": {"result_format": "SUMMARY"}}),
                ),
                &registry,
                caps(),
            )
            .unwrap();
        let names: Vec<&str> = graph.nodes().map(|n| n.metric.metric_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "column_values.in_set.unexpected_count",
                "column_values.in_set.unexpected_listing",
                "column_values.in_set.unexpected_values"
            ]
        );
        assert_eq!(graph.edges().len(), 3);
        assert!(graph.edges().iter().any(|e| e.right.is_none()));
    }

    #[test]
    fn test_unknown_metric_is_resolution_error() {
        let registry = MetricRegistry::with_core_metrics();
        let mut graph = ValidationGraph::new();
        let err = graph
            .add_metric(column_metric("column.mode", "x", json!({})), &registry, caps())
            .unwrap_err();
        assert!(matches!(err, TermError::MetricResolution { .. }));
    }

    #[derive(Debug)]
    struct Loop(&'static str, &'static str);

    #[async_trait]
    impl MetricProvider for Loop {
        fn metric_name(&self) -> &str {
            self.0
        }

        fn fn_type(&self) -> MetricFnType {
            MetricFnType::Value
        }

        fn dependencies(
            &self,
            metric: &MetricConfiguration,
            _capabilities: EngineCapabilities,
        ) -> Result<BTreeMap<String, MetricConfiguration>> {
            Ok(BTreeMap::from([(self.1.to_string(), metric.renamed(self.1))]))
        }

        async fn compute(
            &self,
            _engine: &dyn crate::engine::ExecutionEngine,
            _metric: &MetricConfiguration,
            _dependencies: &MetricDependencies,
        ) -> Result<MetricValue> {
            Ok(json!(null))
        }
    }

    #[test]
    fn test_cycles_are_detected() {
        let mut registry = MetricRegistry::new();
        registry.register(Arc::new(Loop("a", "b")));
        registry.register(Arc::new(Loop("b", "a")));
        let mut graph = ValidationGraph::new();
        let err = graph
            .add_metric(
                MetricConfiguration::new("a", DomainKwargs::new(), Map::new()),
                &registry,
                caps(),
            )
            .unwrap_err();
        assert!(matches!(err, TermError::GraphConsistency(_)));
        assert!(err.to_string().contains("cycle"));
    }
}
