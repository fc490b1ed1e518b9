//! Metric identity: "compute metric M over domain D with parameters P".

use crate::core::domain::DomainKwargs;
use crate::core::identity::{content_id, without_nulls};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// A resolved metric value. Always plain JSON so nothing backend-specific leaks out.
pub type MetricValue = Value;

/// Resolved metrics keyed by id.
pub type MetricValues = HashMap<MetricId, MetricValue>;

/// Deterministic identity of a [`MetricConfiguration`].
///
/// Built from the metric name and the ids of its domain and value kwargs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricId {
    pub metric_name: String,
    pub domain_id: String,
    pub value_id: String,
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.metric_name,
            &self.domain_id[..12.min(self.domain_id.len())],
            &self.value_id[..12.min(self.value_id.len())]
        )
    }
}

/// A request to compute one metric over one domain with one set of parameters.
///
/// # Examples
///
/// ```rust
/// use term_expectations::core::{DomainKwargs, MetricConfiguration};
/// use serde_json::json;
///
/// let domain = DomainKwargs::new().with("column", "price");
/// let a = MetricConfiguration::new("column.mean", domain.clone(), Default::default());
/// let b = MetricConfiguration::new("column.mean", domain, Default::default());
/// assert_eq!(a.id(), b.id());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfiguration {
    pub metric_name: String,
    pub metric_domain_kwargs: DomainKwargs,
    pub metric_value_kwargs: Map<String, Value>,
}

impl MetricConfiguration {
    /// Creates a metric configuration. Null value kwargs are dropped.
    pub fn new(
        metric_name: impl Into<String>,
        metric_domain_kwargs: DomainKwargs,
        metric_value_kwargs: Map<String, Value>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_domain_kwargs,
            metric_value_kwargs: without_nulls(&metric_value_kwargs),
        }
    }

    /// Returns the deterministic identity of this configuration.
    pub fn id(&self) -> MetricId {
        MetricId {
            metric_name: self.metric_name.clone(),
            domain_id: self.metric_domain_kwargs.id(),
            value_id: content_id(&Value::Object(self.metric_value_kwargs.clone())),
        }
    }

    /// Returns a copy with a different metric name and the same kwargs.
    pub fn renamed(&self, metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_domain_kwargs: self.metric_domain_kwargs.clone(),
            metric_value_kwargs: self.metric_value_kwargs.clone(),
        }
    }

    /// Returns a copy with the given value kwargs removed.
    pub fn without_value_keys(&self, keys: &[&str]) -> Self {
        let mut value_kwargs = self.metric_value_kwargs.clone();
        for key in keys {
            value_kwargs.remove(*key);
        }
        Self {
            metric_name: self.metric_name.clone(),
            metric_domain_kwargs: self.metric_domain_kwargs.clone(),
            metric_value_kwargs: value_kwargs,
        }
    }

    /// Returns a value kwarg.
    pub fn value_kwarg(&self, key: &str) -> Option<&Value> {
        self.metric_value_kwargs.get(key)
    }
}

/// Key of an edge in the validation graph: `left` depends on `right`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricEdgeKey {
    pub left: MetricId,
    pub right: Option<MetricId>,
}

/// An edge in the validation graph.
///
/// `right` is `None` for a metric without dependencies; such an edge keeps
/// the node present in the graph.
#[derive(Debug, Clone)]
pub struct MetricEdge {
    pub left: MetricConfiguration,
    pub right: Option<MetricConfiguration>,
}

impl MetricEdge {
    /// Returns the id pair identifying this edge.
    pub fn key(&self) -> MetricEdgeKey {
        MetricEdgeKey {
            left: self.left.id(),
            right: self.right.as_ref().map(MetricConfiguration::id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_identical_requests_share_id() {
        let domain = DomainKwargs::from_value(json!({"column": "x", "batch_id": "b"})).unwrap();
        let a = MetricConfiguration::new(
            "column_values.in_set.unexpected_count",
            domain.clone(),
            kwargs(json!({"value_set": [1, 2, 3]})),
        );
        let b = MetricConfiguration::new(
            "column_values.in_set.unexpected_count",
            domain,
            kwargs(json!({"value_set": [1, 2, 3], "parse_strings_as_datetimes": null})),
        );
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_value_kwargs_change_id() {
        let domain = DomainKwargs::new().with("column", "x");
        let a = MetricConfiguration::new("m", domain.clone(), kwargs(json!({"regex": "a"})));
        let b = MetricConfiguration::new("m", domain, kwargs(json!({"regex": "b"})));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().domain_id, b.id().domain_id);
    }

    #[test]
    fn test_without_value_keys() {
        let metric = MetricConfiguration::new(
            "column_values.null.unexpected_values",
            DomainKwargs::new().with("column", "x"),
            kwargs(json!({"result_format": {"result_format": "BASIC"}})),
        );
        let stripped = metric.without_value_keys(&["result_format"]);
        assert!(stripped.metric_value_kwargs.is_empty());
        assert_eq!(
            stripped.renamed("m").id().domain_id,
            metric.id().domain_id
        );
    }

    #[test]
    fn test_edge_key() {
        let left = MetricConfiguration::new("a", DomainKwargs::new(), Map::new());
        let right = MetricConfiguration::new("b", DomainKwargs::new(), Map::new());
        let edge = MetricEdge {
            left: left.clone(),
            right: Some(right.clone()),
        };
        assert_eq!(edge.key().left, left.id());
        assert_eq!(edge.key().right, Some(right.id()));
    }
}
