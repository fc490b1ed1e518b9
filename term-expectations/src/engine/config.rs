//! Session configuration for the DataFusion execution engine.

use crate::error::Result;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use std::sync::Arc;
use tracing::instrument;

/// Configuration for creating a [`DataFusionExecutionEngine`](super::DataFusionExecutionEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Maximum memory for query execution (in bytes)
    pub max_memory: usize,
    /// Memory fraction to use before spilling (0.0 to 1.0)
    pub memory_fraction: f64,
    /// Attach a hidden row-index column to every loaded batch
    pub track_row_index: bool,
    /// Largest loaded batch (in bytes) that still gets a content fingerprint
    pub fingerprint_max_bytes: usize,
    /// Keep rows in load order (no round-robin repartitioning)
    pub preserve_row_order: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: num_cpus::get(),
            max_memory: 2 * 1024 * 1024 * 1024, // 2GB
            memory_fraction: 0.9,
            track_row_index: true,
            fingerprint_max_bytes: 64 * 1024 * 1024,
            preserve_row_order: true,
        }
    }
}

impl EngineConfig {
    /// A small configuration for tests and tiny datasets.
    pub fn small() -> Self {
        Self {
            batch_size: 1024,
            target_partitions: 2,
            max_memory: 256 * 1024 * 1024,
            ..Default::default()
        }
    }

    pub fn with_track_row_index(mut self, enabled: bool) -> Self {
        self.track_row_index = enabled;
        self
    }

    pub fn with_fingerprint_max_bytes(mut self, bytes: usize) -> Self {
        self.fingerprint_max_bytes = bytes;
        self
    }

    /// Builds the DataFusion session for this configuration.
    #[instrument(skip(self), fields(
        engine.batch_size = self.batch_size,
        engine.target_partitions = self.target_partitions,
        engine.max_memory = self.max_memory
    ))]
    pub fn build_session(&self) -> Result<SessionContext> {
        let mut session_config = SessionConfig::new()
            .with_batch_size(self.batch_size)
            .with_target_partitions(self.target_partitions.max(1))
            .with_information_schema(true);
        if self.preserve_row_order {
            session_config = session_config
                .with_round_robin_repartition(false)
                .with_repartition_file_scans(false);
        }

        let pool_size = (self.max_memory as f64 * self.memory_fraction.clamp(0.0, 1.0)) as usize;
        let memory_pool = Arc::new(FairSpillPool::new(pool_size)) as Arc<dyn MemoryPool>;

        let runtime_env = RuntimeEnvBuilder::new()
            .with_memory_pool(memory_pool)
            .with_temp_file_path(std::env::temp_dir())
            .build()
            .map(Arc::new)?;

        Ok(SessionContext::new_with_config_rt(session_config, runtime_env))
    }
}
