use super::{GraphNode, ValidationGraph};
use crate::core::metric::{MetricId, MetricValues};
use crate::engine::{BundledMetric, ExecutionEngine};
use crate::error::{Result, TermError};
use crate::metrics::{MetricDependencies, MetricFnType};
use tracing::{debug, instrument};

/// Resolves every node of `graph` that is not already in `resolved`.
///
/// Each round takes the frontier of nodes whose dependencies are all
/// resolved, submits its aggregates to the engine as one bundle and then
/// computes its value metrics one at a time. Ids already present in
/// `resolved` are never resubmitted, so the same map can be threaded through
/// several graphs of one run.
#[instrument(skip_all, fields(graph.nodes = graph.len(), engine = engine.name()))]
pub async fn resolve_validation_graph(
    graph: &ValidationGraph,
    engine: &dyn ExecutionEngine,
    resolved: &mut MetricValues,
) -> Result<()> {
    let mut round = 0_usize;
    loop {
        let pending: Vec<(&MetricId, &GraphNode)> = graph
            .order
            .iter()
            .filter(|id| !resolved.contains_key(*id))
            .filter_map(|id| graph.nodes.get(id).map(|node| (id, node)))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let ready: Vec<(&MetricId, &GraphNode)> = pending
            .iter()
            .filter(|(_, node)| node.dependencies.values().all(|dep| resolved.contains_key(dep)))
            .copied()
            .collect();
        if ready.is_empty() {
            let names: Vec<&str> = pending
                .iter()
                .map(|(id, _)| id.metric_name.as_str())
                .collect();
            return Err(TermError::graph_consistency(format!(
                "no resolvable metrics remain; unresolved: {}",
                names.join(", ")
            )));
        }

        round += 1;
        let (aggregates, values): (Vec<_>, Vec<_>) = ready
            .into_iter()
            .partition(|(_, node)| node.provider.fn_type() == MetricFnType::Aggregate);
        debug!(
            graph.round = round,
            graph.aggregates = aggregates.len(),
            graph.values = values.len(),
            "Resolving metric frontier"
        );

        if !aggregates.is_empty() {
            let bundle = aggregates
                .iter()
                .map(|(_, node)| {
                    Ok(BundledMetric {
                        metric: node.metric.clone(),
                        provider: node.provider.clone(),
                        dependencies: dependency_values(node, resolved)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let mut computed = engine.resolve_metric_bundle(&bundle).await?;
            for (id, _) in &aggregates {
                let value = computed.remove(*id).ok_or_else(|| {
                    TermError::graph_consistency(format!(
                        "bundle returned no value for metric {id}"
                    ))
                })?;
                resolved.insert((*id).clone(), value);
            }
        }

        for (id, node) in values {
            let dependencies = dependency_values(node, resolved)?;
            let value = node
                .provider
                .compute(engine, &node.metric, &dependencies)
                .await?;
            resolved.insert(id.clone(), value);
        }
    }
}

fn dependency_values(node: &GraphNode, resolved: &MetricValues) -> Result<MetricDependencies> {
    node.dependencies
        .iter()
        .map(|(name, id)| {
            resolved
                .get(id)
                .cloned()
                .map(|value| (name.clone(), value))
                .ok_or_else(|| {
                    TermError::graph_consistency(format!(
                        "metric {} is missing dependency {name}",
                        node.metric.metric_name
                    ))
                })
        })
        .collect()
}
