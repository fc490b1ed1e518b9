//! Execution engines: load batches, resolve compute domains and run bundled aggregates.
//!
//! Expectation and graph code only ever sees the [`ExecutionEngine`] trait.
//! [`DataFusionExecutionEngine`] is the in-process implementation.
//!
//! ## Bundling
//!
//! Every aggregate-type metric compiles to a single DataFusion aggregate
//! expression over its compute domain. [`ExecutionEngine::resolve_metric_bundle`]
//! groups those expressions by compute domain and evaluates each group with
//! one `aggregate` + `collect`, so ten statistics over the same filtered frame
//! cost one scan.
//!
//! ```rust,ignore
//! let values = engine.resolve_metric_bundle(&bundle).await?;
//! assert_eq!(engine.round_trips(), 1);
//! ```

pub mod condition;
pub mod config;
pub mod convert;
mod datafusion_engine;
pub(crate) mod params;
pub mod sampler;
pub mod splitter;

pub use self::config::EngineConfig;
pub use self::datafusion_engine::DataFusionExecutionEngine;
pub use self::sampler::{SamplerDirective, SamplingMethod};
pub use self::splitter::{SplitterDirective, SplitterMethod};

use crate::core::batch::{Batch, BatchMarkers, BatchSpec};
use crate::core::domain::DomainKwargs;
use crate::core::metric::{MetricConfiguration, MetricId, MetricValue};
use crate::error::Result;
use crate::metrics::MetricProvider;
use datafusion::logical_expr::Expr;
use datafusion::prelude::DataFrame;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Name of the hidden column holding each row's position in its batch.
pub const ROW_INDEX_COLUMN: &str = "__row_index";

/// Optional features an engine may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineCapabilities {
    /// Rows can be reported by their position in the batch.
    pub row_index: bool,
    /// Domains may address named tables.
    pub named_tables: bool,
}

/// What to do when one of several batches fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadFailurePolicy {
    /// Log the failure and keep loading the rest.
    Skip,
    /// Stop at the first failure and return it.
    #[default]
    Abort,
}

/// A resolved compute domain.
#[derive(Clone)]
pub struct ComputeDomain {
    /// The batch data with the row condition applied.
    pub data: DataFrame,
    /// The kwargs that determined `data`; metrics sharing them share a scan.
    pub compute_kwargs: DomainKwargs,
    /// Column addressing within `data`.
    pub accessor_kwargs: DomainKwargs,
}

impl fmt::Debug for ComputeDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeDomain")
            .field("compute_kwargs", &self.compute_kwargs)
            .field("accessor_kwargs", &self.accessor_kwargs)
            .finish()
    }
}

/// A single aggregate expression plus the compute domain it was built against.
#[derive(Debug, Clone)]
pub struct AggregateFn {
    pub expr: Expr,
    pub compute_domain_kwargs: DomainKwargs,
}

/// One entry of a metric bundle.
#[derive(Debug, Clone)]
pub struct BundledMetric {
    pub metric: MetricConfiguration,
    pub provider: Arc<dyn MetricProvider>,
    /// Resolved values of the metric's dependencies, by dependency name.
    pub dependencies: BTreeMap<String, MetricValue>,
}

/// A backend able to load batches and compute metrics over them.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Engine name, used in logs.
    fn name(&self) -> &str;

    fn capabilities(&self) -> EngineCapabilities;

    fn supported_splitters(&self) -> &[SplitterMethod];

    fn supported_samplers(&self) -> &[SamplingMethod];

    /// Loads a batch and makes it the active one.
    async fn load_batch(&mut self, spec: BatchSpec) -> Result<Batch>;

    /// Loads several batches in order.
    async fn load_batches(
        &mut self,
        specs: Vec<BatchSpec>,
        policy: LoadFailurePolicy,
    ) -> Result<Vec<Batch>>;

    /// Materializes the data described by `spec` without registering a batch.
    async fn get_batch_data_and_markers(&self, spec: &BatchSpec)
        -> Result<(DataFrame, BatchMarkers)>;

    /// Ids of the loaded batches, in load order.
    fn loaded_batch_ids(&self) -> Vec<String>;

    /// The batch used when a domain names none.
    fn active_batch_id(&self) -> Option<String>;

    fn set_active_batch(&mut self, batch_id: &str) -> Result<()>;

    fn get_batch(&self, batch_id: &str) -> Option<&Batch>;

    /// Evicts a batch, returning it if it was loaded.
    fn unload_batch(&mut self, batch_id: &str) -> Option<Batch>;

    /// Resolves domain kwargs into data plus split compute/accessor kwargs.
    fn get_compute_domain(&self, domain_kwargs: &DomainKwargs) -> Result<ComputeDomain>;

    /// Evaluates aggregate metrics, one round trip per distinct compute domain.
    async fn resolve_metric_bundle(
        &self,
        bundle: &[BundledMetric],
    ) -> Result<HashMap<MetricId, MetricValue>>;

    /// Number of bundled aggregate queries executed so far.
    fn round_trips(&self) -> usize;
}
