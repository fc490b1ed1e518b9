//! In-process execution engine backed by DataFusion.

use super::condition::parse_row_condition;
use super::config::EngineConfig;
use super::convert::single_row;
use super::{
    BundledMetric, ComputeDomain, EngineCapabilities, ExecutionEngine, LoadFailurePolicy,
    SamplingMethod, SplitterMethod, ROW_INDEX_COLUMN,
};
use crate::core::batch::{Batch, BatchMarkers, BatchSpec, ReaderMethod};
use crate::core::domain::DomainKwargs;
use crate::core::identity::hash_bytes;
use crate::core::metric::{MetricId, MetricValue};
use crate::error::{Result, TermError};
use crate::logging::{truncate_field, LogConfig};
use crate::metrics::MetricFnType;
use crate::{log_data_op, log_metric, perf_debug};
use arrow::array::{RecordBatch, UInt64Array};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use arrow::ipc::writer::StreamWriter;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::execution::context::SQLOptions;
use datafusion::logical_expr::Expr;
use datafusion::prelude::{
    CsvReadOptions, DataFrame, NdJsonReadOptions, ParquetReadOptions, SessionContext,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Executes metrics in-process with DataFusion.
///
/// Batches are materialized into memory when loaded, so every later metric
/// reads a stable snapshot regardless of what happens to the source files.
///
/// # Examples
///
/// ```rust
/// use term_expectations::core::{BatchSpec, InMemoryData};
/// use term_expectations::engine::{DataFusionExecutionEngine, ExecutionEngine};
/// use arrow::array::{Int64Array, RecordBatch};
/// use arrow::datatypes::{DataType, Field, Schema};
/// use std::sync::Arc;
///
/// # async fn example() -> term_expectations::error::Result<()> {
/// let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)]));
/// let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])?;
///
/// let mut engine = DataFusionExecutionEngine::new()?;
/// let loaded = engine
///     .load_batch(BatchSpec::in_memory("numbers", InMemoryData::from_batch(batch)))
///     .await?;
/// assert_eq!(engine.active_batch_id().as_deref(), Some(loaded.id()));
/// # Ok(())
/// # }
/// ```
pub struct DataFusionExecutionEngine {
    ctx: SessionContext,
    config: EngineConfig,
    log_config: LogConfig,
    batches: HashMap<String, Batch>,
    load_order: Vec<String>,
    active_batch_id: Option<String>,
    round_trips: AtomicUsize,
}

impl DataFusionExecutionEngine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with a custom configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let ctx = config.build_session()?;
        Ok(Self {
            ctx,
            config,
            log_config: LogConfig::default(),
            batches: HashMap::new(),
            load_order: Vec::new(),
            active_batch_id: None,
            round_trips: AtomicUsize::new(0),
        })
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// The underlying DataFusion session.
    ///
    /// Tables registered here are visible to query-based batch specs.
    pub fn session(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn read_source(&self, spec: &BatchSpec) -> Result<DataFrame> {
        if let Some(data) = &spec.in_memory {
            let table = Arc::new(MemTable::try_new(data.schema(), vec![data.batches().to_vec()])?);
            if let Some(name) = &spec.data_asset_name {
                // Make the frame addressable from later query specs.
                self.ctx.deregister_table(name.as_str())?;
                self.ctx.register_table(name.as_str(), table.clone())?;
            }
            return Ok(self.ctx.read_table(table)?);
        }

        if let Some(query) = &spec.query {
            let options = SQLOptions::new()
                .with_allow_ddl(false)
                .with_allow_dml(false)
                .with_allow_statements(false);
            return Ok(self.ctx.sql_with_options(query, options).await?);
        }

        let Some(path) = &spec.path else {
            return Err(TermError::configuration(
                "batch spec needs one of path, query or in-memory data",
            ));
        };
        let method = spec
            .resolved_reader_method()?
            .ok_or_else(|| TermError::Internal("path without reader method".into()))?;
        let paths = expand_paths(path)?;
        let extension = Path::new(&paths[0])
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        debug!(
            batch.path = %path,
            batch.files = paths.len(),
            batch.reader = ?method,
            "Reading batch source"
        );

        let frame = match method {
            ReaderMethod::Csv => {
                let default_delimiter = if extension.eq_ignore_ascii_case(".tsv") {
                    b'\t'
                } else {
                    b','
                };
                let options = CsvReadOptions::new()
                    .has_header(spec.reader_options.has_header.unwrap_or(true))
                    .delimiter(
                        spec.reader_options
                            .delimiter_byte()?
                            .unwrap_or(default_delimiter),
                    )
                    .file_extension(&extension);
                self.ctx.read_csv(paths, options).await?
            }
            ReaderMethod::Parquet => {
                let options = ParquetReadOptions {
                    file_extension: &extension,
                    ..Default::default()
                };
                self.ctx.read_parquet(paths, options).await?
            }
            ReaderMethod::Json => {
                let options = NdJsonReadOptions::default().file_extension(&extension);
                self.ctx.read_json(paths, options).await?
            }
        };
        Ok(frame)
    }

    fn check_supported(&self, spec: &BatchSpec) -> Result<()> {
        if let Some(splitter) = &spec.splitter {
            if !self.supported_splitters().contains(&splitter.method) {
                return Err(TermError::configuration(format!(
                    "engine {} does not support splitter {}",
                    self.name(),
                    splitter.method.name()
                )));
            }
        }
        if let Some(sampler) = &spec.sampler {
            if !self.supported_samplers().contains(&sampler.method) {
                return Err(TermError::configuration(format!(
                    "engine {} does not support sampler {}",
                    self.name(),
                    sampler.method.name()
                )));
            }
        }
        Ok(())
    }

    fn resolve_batch(&self, domain: &DomainKwargs) -> Result<&Batch> {
        let batch_id = match domain.batch_id()? {
            Some(id) => id.to_string(),
            None => self.active_batch_id().ok_or_else(|| {
                TermError::domain_resolution(
                    "No batch is specified, but could not identify a loaded batch",
                )
            })?,
        };
        self.batches.get(&batch_id).ok_or_else(|| {
            TermError::domain_resolution(format!("Unable to find batch with batch_id {batch_id}"))
        })
    }
}

/// Expands glob metacharacters; plain paths pass through untouched.
fn expand_paths(path: &str) -> Result<Vec<String>> {
    if !path.contains(['*', '?', '[']) {
        return Ok(vec![path.to_string()]);
    }
    let entries = glob::glob(path)
        .map_err(|e| TermError::configuration(format!("invalid path pattern '{path}': {e}")))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TermError::Io(e.into_error()))?;
        paths.push(entry.to_string_lossy().into_owned());
    }
    if paths.is_empty() {
        return Err(TermError::configuration(format!(
            "path pattern '{path}' matched no files"
        )));
    }
    paths.sort();
    Ok(paths)
}

fn attach_row_index(schema: &SchemaRef, batches: Vec<RecordBatch>) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    if schema.field_with_name(ROW_INDEX_COLUMN).is_ok() {
        return Err(TermError::configuration(format!(
            "source data already has a column named {ROW_INDEX_COLUMN}"
        )));
    }
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new(ROW_INDEX_COLUMN, DataType::UInt64, false)));
    let indexed = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));

    let mut offset = 0u64;
    let mut out = Vec::with_capacity(batches.len());
    for batch in batches {
        let rows = batch.num_rows() as u64;
        let mut columns = batch.columns().to_vec();
        columns.push(Arc::new(UInt64Array::from_iter_values(offset..offset + rows)));
        out.push(RecordBatch::try_new(indexed.clone(), columns)?);
        offset += rows;
    }
    Ok((indexed, out))
}

fn fingerprint(schema: &SchemaRef, batches: &[RecordBatch], max_bytes: usize) -> Result<Option<String>> {
    let size: usize = batches.iter().map(RecordBatch::get_array_memory_size).sum();
    if size > max_bytes {
        return Ok(None);
    }
    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, schema)?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.finish()?;
    }
    Ok(Some(hash_bytes(&buffer)))
}

#[async_trait]
impl ExecutionEngine for DataFusionExecutionEngine {
    fn name(&self) -> &str {
        "datafusion"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            row_index: self.config.track_row_index,
            named_tables: false,
        }
    }

    fn supported_splitters(&self) -> &[SplitterMethod] {
        SplitterMethod::ALL
    }

    fn supported_samplers(&self) -> &[SamplingMethod] {
        SamplingMethod::ALL
    }

    #[instrument(skip(self, spec), fields(batch.id = %spec.batch_id()))]
    async fn load_batch(&mut self, spec: BatchSpec) -> Result<Batch> {
        let (data, markers) = self.get_batch_data_and_markers(&spec).await?;
        let batch = Batch::new(data, spec, markers);
        let id = batch.id().to_string();

        log_data_op!(
            self.log_config,
            batch.id = %id,
            batch.load_time = %batch.markers().load_time,
            batch.fingerprint = ?batch.markers().fingerprint,
            "Loaded batch"
        );

        if self.batches.insert(id.clone(), batch.clone()).is_none() {
            self.load_order.push(id.clone());
        }
        self.active_batch_id = Some(id);
        Ok(batch)
    }

    async fn load_batches(
        &mut self,
        specs: Vec<BatchSpec>,
        policy: LoadFailurePolicy,
    ) -> Result<Vec<Batch>> {
        let mut loaded = Vec::with_capacity(specs.len());
        for spec in specs {
            match self.load_batch(spec).await {
                Ok(batch) => loaded.push(batch),
                Err(e) if policy == LoadFailurePolicy::Skip => {
                    warn!(error = %e, "Skipping batch that failed to load");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(loaded)
    }

    #[instrument(skip(self, spec))]
    async fn get_batch_data_and_markers(
        &self,
        spec: &BatchSpec,
    ) -> Result<(DataFrame, BatchMarkers)> {
        self.check_supported(spec)?;

        let mut frame = self.read_source(spec).await?;
        if let Some(splitter) = &spec.splitter {
            frame = splitter.apply(frame)?;
        }
        if let Some(sampler) = &spec.sampler {
            frame = sampler.apply(&self.ctx, frame).await?;
        }
        if let Some(limit) = spec.limit {
            frame = frame.limit(0, Some(limit))?;
        }

        let logical_schema = frame.schema().inner().clone();
        let mut batches = frame.collect().await?;
        batches.retain(|b| b.num_rows() > 0);
        let mut schema = batches
            .first()
            .map(RecordBatch::schema)
            .unwrap_or(logical_schema);

        if self.config.track_row_index {
            let (indexed, with_index) = attach_row_index(&schema, batches)?;
            schema = indexed;
            batches = with_index;
        }

        let markers = BatchMarkers::now().with_fingerprint(fingerprint(
            &schema,
            &batches,
            self.config.fingerprint_max_bytes,
        )?);

        let table = MemTable::try_new(schema, vec![batches])?;
        Ok((self.ctx.read_table(Arc::new(table))?, markers))
    }

    fn loaded_batch_ids(&self) -> Vec<String> {
        self.load_order.clone()
    }

    fn active_batch_id(&self) -> Option<String> {
        match &self.active_batch_id {
            Some(id) => Some(id.clone()),
            None if self.load_order.len() == 1 => self.load_order.first().cloned(),
            None => None,
        }
    }

    fn set_active_batch(&mut self, batch_id: &str) -> Result<()> {
        if !self.batches.contains_key(batch_id) {
            return Err(TermError::domain_resolution(format!(
                "Unable to find batch with batch_id {batch_id}"
            )));
        }
        self.active_batch_id = Some(batch_id.to_string());
        Ok(())
    }

    fn get_batch(&self, batch_id: &str) -> Option<&Batch> {
        self.batches.get(batch_id)
    }

    fn unload_batch(&mut self, batch_id: &str) -> Option<Batch> {
        let removed = self.batches.remove(batch_id)?;
        self.load_order.retain(|id| id != batch_id);
        if self.active_batch_id.as_deref() == Some(batch_id) {
            self.active_batch_id = None;
        }
        debug!(batch.id = %batch_id, "Unloaded batch");
        Some(removed)
    }

    fn get_compute_domain(&self, domain_kwargs: &DomainKwargs) -> Result<ComputeDomain> {
        let (compute_kwargs, accessor_kwargs) = domain_kwargs.split_accessor_keys();

        if let Some(table) = compute_kwargs.table()? {
            return Err(TermError::domain_resolution(format!(
                "engine {} addresses data by batch, not by table (got table '{table}')",
                self.name()
            )));
        }

        let batch = self.resolve_batch(&compute_kwargs)?;
        let mut data = batch.data().clone();
        if let Some(condition) = compute_kwargs.row_condition()? {
            let filter: Expr = parse_row_condition(&data, &condition)?;
            data = data.filter(filter)?;
        }

        for column in accessor_kwargs.accessor_columns()? {
            let exists = data.schema().fields().iter().any(|f| f.name() == &column);
            if !exists || column == ROW_INDEX_COLUMN {
                return Err(TermError::ColumnNotFound { column });
            }
        }

        Ok(ComputeDomain {
            data,
            compute_kwargs,
            accessor_kwargs,
        })
    }

    #[instrument(skip(self, bundle), fields(bundle.size = bundle.len()))]
    async fn resolve_metric_bundle(
        &self,
        bundle: &[BundledMetric],
    ) -> Result<HashMap<MetricId, MetricValue>> {
        // Groups keep the order in which their first metric was declared.
        let mut groups: Vec<(ComputeDomain, Vec<(MetricId, Expr)>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();
        let mut seen = HashSet::new();

        for entry in bundle {
            let id = entry.metric.id();
            if !seen.insert(id.clone()) {
                continue;
            }
            if entry.provider.fn_type() != MetricFnType::Aggregate {
                return Err(TermError::graph_consistency(format!(
                    "metric {} is not an aggregate and cannot be bundled",
                    entry.metric.metric_name
                )));
            }
            let aggregate = entry
                .provider
                .aggregate(self, &entry.metric, &entry.dependencies)?;
            let declared = self.get_compute_domain(&entry.metric.metric_domain_kwargs)?;
            let domain_id = declared.compute_kwargs.id();
            if aggregate.compute_domain_kwargs.id() != domain_id {
                return Err(TermError::graph_consistency(format!(
                    "Invalid compute domain returned from bundled metric {}",
                    entry.metric.metric_name
                )));
            }
            let index = match group_index.get(&domain_id) {
                Some(index) => *index,
                None => {
                    groups.push((declared, Vec::new()));
                    group_index.insert(domain_id, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[index].1.push((id, aggregate.expr));
        }

        let mut results = HashMap::with_capacity(seen.len());
        for (domain, metrics) in groups {
            let exprs: Vec<Expr> = metrics
                .iter()
                .enumerate()
                .map(|(i, (_, expr))| expr.clone().alias(format!("__metric_{i}")))
                .collect();
            perf_debug!(
                self.log_config,
                domain.id = %domain.compute_kwargs.id(),
                bundle.metrics = exprs.len(),
                "Executing bundled aggregate"
            );
            let batches = domain.data.aggregate(vec![], exprs)?.collect().await?;
            self.round_trips.fetch_add(1, Ordering::Relaxed);

            let row = single_row(&batches, metrics.len())?;
            for ((id, _), value) in metrics.into_iter().zip(row) {
                log_metric!(
                    self.log_config,
                    metric.id = %id,
                    metric.value = %truncate_field(&value.to_string(), self.log_config.max_field_length),
                    "Resolved bundled metric"
                );
                results.insert(id, value);
            }
        }

        info!(
            bundle.metrics = results.len(),
            engine.round_trips = self.round_trips(),
            "Resolved metric bundle"
        );
        Ok(results)
    }

    fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::batch::InMemoryData;
    use arrow::array::{Int64Array, StringArray};
    use serde_json::json;

    fn orders() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("region", DataType::Utf8, true),
            Field::new("amount", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6])),
                Arc::new(StringArray::from(vec![
                    Some("EU"),
                    Some("US"),
                    None,
                    Some("EU"),
                    Some("US"),
                    Some("EU"),
                ])),
                Arc::new(Int64Array::from(vec![
                    Some(10),
                    Some(20),
                    Some(30),
                    None,
                    Some(50),
                    Some(60),
                ])),
            ],
        )
        .unwrap()
    }

    async fn engine_with_orders() -> (DataFusionExecutionEngine, String) {
        let mut engine = DataFusionExecutionEngine::with_config(EngineConfig::small()).unwrap();
        let batch = engine
            .load_batch(BatchSpec::in_memory("orders", InMemoryData::from_batch(orders())))
            .await
            .unwrap();
        (engine, batch.id().to_string())
    }

    fn domain(value: serde_json::Value) -> DomainKwargs {
        DomainKwargs::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_load_batch_sets_active_and_markers() {
        let (engine, id) = engine_with_orders().await;
        assert_eq!(engine.active_batch_id(), Some(id.clone()));
        assert_eq!(engine.loaded_batch_ids(), vec![id.clone()]);
        let batch = engine.get_batch(&id).unwrap();
        assert_eq!(batch.markers().load_time.len(), "20240101T000000.000000Z".len());
        assert!(batch.markers().fingerprint.is_some());
    }

    #[tokio::test]
    async fn test_fingerprint_is_content_based() {
        let (a, id_a) = engine_with_orders().await;
        let (b, id_b) = engine_with_orders().await;
        assert_eq!(id_a, id_b);
        assert_eq!(
            a.get_batch(&id_a).unwrap().markers().fingerprint,
            b.get_batch(&id_b).unwrap().markers().fingerprint
        );

        let mut tiny = DataFusionExecutionEngine::with_config(
            EngineConfig::small().with_fingerprint_max_bytes(0),
        )
        .unwrap();
        let batch = tiny
            .load_batch(BatchSpec::in_memory("orders", InMemoryData::from_batch(orders())))
            .await
            .unwrap();
        assert!(batch.markers().fingerprint.is_none());
    }

    #[tokio::test]
    async fn test_compute_domain_splits_accessor_keys() {
        let (engine, id) = engine_with_orders().await;
        let resolved = engine
            .get_compute_domain(&domain(json!({
                "batch_id": id,
                "column": "amount",
                "row_condition": "region = 'EU'",
                "condition_parser": "sql"
            })))
            .unwrap();
        assert!(!resolved.compute_kwargs.contains_key("column"));
        assert_eq!(resolved.accessor_kwargs.column().unwrap(), Some("amount"));
        assert_eq!(resolved.data.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_compute_domain_errors() {
        let (engine, _) = engine_with_orders().await;

        let err = engine
            .get_compute_domain(&domain(json!({"batch_id": "missing"})))
            .unwrap_err();
        assert!(err.to_string().contains("Unable to find batch with batch_id"));

        let err = engine
            .get_compute_domain(&domain(json!({"table": "orders"})))
            .unwrap_err();
        assert!(matches!(err, TermError::DomainResolution(_)));

        let err = engine
            .get_compute_domain(&domain(json!({"column": "nope"})))
            .unwrap_err();
        assert!(matches!(err, TermError::ColumnNotFound { .. }));

        let err = engine
            .get_compute_domain(&domain(json!({"row_condition": "x", "condition_parser": "pandas"})))
            .unwrap_err();
        assert!(matches!(err, TermError::DomainResolution(_)));

        let empty = DataFusionExecutionEngine::with_config(EngineConfig::small()).unwrap();
        let err = empty.get_compute_domain(&DomainKwargs::new()).unwrap_err();
        assert!(err
            .to_string()
            .contains("No batch is specified, but could not identify a loaded batch"));
    }

    #[tokio::test]
    async fn test_active_batch_rules() {
        let mut engine = DataFusionExecutionEngine::with_config(EngineConfig::small()).unwrap();
        let first = engine
            .load_batch(BatchSpec::in_memory("a", InMemoryData::from_batch(orders())))
            .await
            .unwrap();
        let second = engine
            .load_batch(BatchSpec::in_memory("b", InMemoryData::from_batch(orders())))
            .await
            .unwrap();
        assert_eq!(engine.active_batch_id().as_deref(), Some(second.id()));

        engine.set_active_batch(first.id()).unwrap();
        assert_eq!(engine.active_batch_id().as_deref(), Some(first.id()));
        assert!(engine.set_active_batch("nope").is_err());

        engine.unload_batch(first.id());
        // the single remaining batch becomes the default again
        assert_eq!(engine.active_batch_id().as_deref(), Some(second.id()));
    }

    #[tokio::test]
    async fn test_load_pipeline_applies_directives_in_order() {
        let mut engine = DataFusionExecutionEngine::with_config(EngineConfig::small()).unwrap();
        let spec = BatchSpec::from_value(json!({
            "splitter_method": "_split_on_column_value",
            "splitter_kwargs": {"column_name": "region", "partition_definition": {"region": "EU"}},
            "sampling_method": "_sample_using_a_list",
            "sampling_kwargs": {"column_name": "id", "value_list": [1, 4, 5]},
            "limit": 1
        }))
        .unwrap();
        let spec = BatchSpec {
            in_memory: Some(InMemoryData::from_batch(orders())),
            data_asset_name: Some("orders".into()),
            ..spec
        };
        let batch = engine.load_batch(spec).await.unwrap();
        let rows = batch.data().clone().collect().await.unwrap();
        let total: usize = rows.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(total, 1);
        assert!(rows[0].schema().field_with_name(ROW_INDEX_COLUMN).is_ok());
    }

    #[tokio::test]
    async fn test_query_specs_are_read_only() {
        let (mut engine, _) = engine_with_orders().await;
        let batch = engine
            .load_batch(BatchSpec::from_query("SELECT * FROM orders WHERE amount > 15"))
            .await
            .unwrap();
        assert_eq!(batch.data().clone().count().await.unwrap(), 4);

        let err = engine
            .load_batch(BatchSpec::from_query("DROP TABLE orders"))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_load_batches_skip_policy() {
        let mut engine = DataFusionExecutionEngine::with_config(EngineConfig::small()).unwrap();
        let specs = vec![
            BatchSpec::from_path("/definitely/not/here/*.csv"),
            BatchSpec::in_memory("orders", InMemoryData::from_batch(orders())),
        ];
        let loaded = engine
            .load_batches(specs.clone(), LoadFailurePolicy::Skip)
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(engine
            .load_batches(specs, LoadFailurePolicy::Abort)
            .await
            .is_err());
    }
}
