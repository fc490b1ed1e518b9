//! Batches: materialized units of tabular data and the specs that produce them.

use crate::core::identity::content_id;
use crate::engine::sampler::{SamplerDirective, SamplingMethod};
use crate::engine::splitter::{SplitterDirective, SplitterMethod};
use crate::error::{Result, TermError};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use datafusion::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Format of the load timestamp recorded in [`BatchMarkers`].
pub const LOAD_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// File readers the engine knows how to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderMethod {
    Csv,
    Parquet,
    /// Newline-delimited JSON.
    Json,
}

impl ReaderMethod {
    /// Guesses the reader from a path's extension.
    pub fn guess_from_path(path: &str) -> Result<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") | Some("tsv") => Ok(Self::Csv),
            Some("parquet") => Ok(Self::Parquet),
            Some("json") | Some("jsonl") | Some("ndjson") => Ok(Self::Json),
            _ => Err(TermError::configuration(format!(
                "Unable to determine reader method from path: {path}"
            ))),
        }
    }
}

/// Options passed through to the file reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

impl ReaderOptions {
    /// Returns true when no option is set.
    pub fn is_empty(&self) -> bool {
        self.has_header.is_none() && self.delimiter.is_none()
    }

    /// Returns the delimiter as a single byte.
    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        match self.delimiter.as_deref() {
            None => Ok(None),
            Some(d) if d.len() == 1 => Ok(Some(d.as_bytes()[0])),
            Some("\\t") => Ok(Some(b'\t')),
            Some(other) => Err(TermError::configuration(format!(
                "delimiter must be a single character, got '{other}'"
            ))),
        }
    }
}

/// Arrow data handed to the engine directly.
///
/// Never serialized; a spec carrying it is flagged instead.
#[derive(Clone)]
pub struct InMemoryData {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl InMemoryData {
    /// Wraps record batches that share `schema`.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        if let Some(batch) = batches.iter().find(|b| b.schema() != schema) {
            return Err(TermError::configuration(format!(
                "in-memory batch schema {:?} does not match {:?}",
                batch.schema(),
                schema
            )));
        }
        Ok(Self { schema, batches })
    }

    /// Wraps a single record batch.
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows.
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

impl fmt::Debug for InMemoryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryData")
            .field("columns", &self.schema.fields().len())
            .field("rows", &self.num_rows())
            .finish()
    }
}

/// How a batch is produced: the source plus splitter, sampler and limit directives.
///
/// Deserializing validates splitter and sampler names and their parameters,
/// so an unknown name fails before any data is touched.
///
/// # Examples
///
/// ```rust
/// use term_expectations::core::BatchSpec;
///
/// let spec = BatchSpec::from_json_str(r#"{
///     "path": "data/orders.csv",
///     "splitter_method": "_split_on_column_value",
///     "splitter_kwargs": {"column_name": "region", "partition_definition": {"region": "EU"}},
///     "limit": 1000
/// }"#).unwrap();
/// assert!(spec.splitter.is_some());
///
/// let err = BatchSpec::from_json_str(r#"{"path": "a.csv", "splitter_method": "_split_on_magic"}"#);
/// assert!(err.is_err());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "BatchSpecRecord", into = "BatchSpecRecord")]
pub struct BatchSpec {
    pub path: Option<String>,
    pub reader_method: Option<ReaderMethod>,
    pub reader_options: ReaderOptions,
    pub query: Option<String>,
    pub data_asset_name: Option<String>,
    pub in_memory: Option<InMemoryData>,
    pub splitter: Option<SplitterDirective>,
    pub sampler: Option<SamplerDirective>,
    pub limit: Option<usize>,
}

impl BatchSpec {
    /// A spec reading a file (or glob of files).
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// A spec running a read-only SQL query against the engine's session.
    pub fn from_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    /// A spec wrapping data that is already in memory.
    pub fn in_memory(data_asset_name: impl Into<String>, data: InMemoryData) -> Self {
        Self {
            data_asset_name: Some(data_asset_name.into()),
            in_memory: Some(data),
            ..Default::default()
        }
    }

    /// Parses a spec from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TermError::configuration(e.to_string()))
    }

    /// Parses a spec from a JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| TermError::configuration(e.to_string()))
    }

    pub fn with_reader_method(mut self, method: ReaderMethod) -> Self {
        self.reader_method = Some(method);
        self
    }

    pub fn with_reader_options(mut self, options: ReaderOptions) -> Self {
        self.reader_options = options;
        self
    }

    pub fn with_splitter(mut self, splitter: SplitterDirective) -> Self {
        self.splitter = Some(splitter);
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerDirective) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the serializable identity view of the spec.
    ///
    /// In-memory data is left out and replaced with an `in_memory_data` flag.
    pub fn identity_value(&self) -> Value {
        let mut value = match serde_json::to_value(BatchSpecRecord::from(self.clone())) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if self.in_memory.is_some() {
            value.insert("in_memory_data".to_string(), Value::Bool(true));
        }
        Value::Object(value)
    }

    /// Returns the deterministic batch id.
    pub fn batch_id(&self) -> String {
        content_id(&self.identity_value())
    }

    /// Returns the reader method, guessing it from the path when unset.
    pub fn resolved_reader_method(&self) -> Result<Option<ReaderMethod>> {
        match (&self.reader_method, &self.path) {
            (Some(method), _) => Ok(Some(*method)),
            (None, Some(path)) => ReaderMethod::guess_from_path(path).map(Some),
            (None, None) => Ok(None),
        }
    }
}

/// The wire form of a [`BatchSpec`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchSpecRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reader_method: Option<ReaderMethod>,
    #[serde(default, skip_serializing_if = "ReaderOptions::is_empty")]
    reader_options: ReaderOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_asset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    splitter_method: Option<SplitterMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    splitter_kwargs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sampling_method: Option<SamplingMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sampling_kwargs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    // Accepted on input so a serialized identity view round-trips; the
    // payload itself can never come back from JSON.
    #[serde(default, skip_serializing)]
    in_memory_data: Option<bool>,
}

impl TryFrom<BatchSpecRecord> for BatchSpec {
    type Error = TermError;

    fn try_from(record: BatchSpecRecord) -> Result<Self> {
        let splitter = match (record.splitter_method, record.splitter_kwargs) {
            (Some(method), kwargs) => {
                Some(SplitterDirective::new(method, kwargs.unwrap_or_default())?)
            }
            (None, Some(_)) => {
                return Err(TermError::configuration(
                    "splitter_kwargs given without splitter_method",
                ))
            }
            (None, None) => None,
        };
        let sampler = match (record.sampling_method, record.sampling_kwargs) {
            (Some(method), kwargs) => {
                Some(SamplerDirective::new(method, kwargs.unwrap_or_default())?)
            }
            (None, Some(_)) => {
                return Err(TermError::configuration(
                    "sampling_kwargs given without sampling_method",
                ))
            }
            (None, None) => None,
        };
        Ok(Self {
            path: record.path,
            reader_method: record.reader_method,
            reader_options: record.reader_options,
            query: record.query,
            data_asset_name: record.data_asset_name,
            in_memory: None,
            splitter,
            sampler,
            limit: record.limit,
        })
    }
}

impl From<BatchSpec> for BatchSpecRecord {
    fn from(spec: BatchSpec) -> Self {
        let (splitter_method, splitter_kwargs) = match spec.splitter {
            Some(directive) => (Some(directive.method), Some(directive.kwargs)),
            None => (None, None),
        };
        let (sampling_method, sampling_kwargs) = match spec.sampler {
            Some(directive) => (Some(directive.method), Some(directive.kwargs)),
            None => (None, None),
        };
        Self {
            path: spec.path,
            reader_method: spec.reader_method,
            reader_options: spec.reader_options,
            query: spec.query,
            data_asset_name: spec.data_asset_name,
            splitter_method,
            splitter_kwargs,
            sampling_method,
            sampling_kwargs,
            limit: spec.limit,
            in_memory_data: None,
        }
    }
}

/// Provenance recorded when a batch is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMarkers {
    /// UTC load time formatted as `YYYYMMDDTHHMMSS.ffffffZ`.
    pub load_time: String,
    /// SHA-256 of the loaded data, when it was small enough to hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl BatchMarkers {
    /// Markers stamped with the given load time.
    pub fn at(load_time: DateTime<Utc>) -> Self {
        Self {
            load_time: load_time.format(LOAD_TIME_FORMAT).to_string(),
            fingerprint: None,
        }
    }

    /// Markers stamped with the current time.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.fingerprint = fingerprint;
        self
    }
}

/// One materialized, immutable unit of tabular data.
#[derive(Clone)]
pub struct Batch {
    id: String,
    data: DataFrame,
    spec: BatchSpec,
    markers: BatchMarkers,
}

impl Batch {
    pub(crate) fn new(data: DataFrame, spec: BatchSpec, markers: BatchMarkers) -> Self {
        Self {
            id: spec.batch_id(),
            data,
            spec,
            markers,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The loaded data.
    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn spec(&self) -> &BatchSpec {
        &self.spec
    }

    pub fn markers(&self) -> &BatchMarkers {
        &self.markers
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("id", &self.id)
            .field("spec", &self.spec)
            .field("markers", &self.markers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Arc;

    fn small_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap()
    }

    #[test]
    fn test_reader_method_guess() {
        assert_eq!(ReaderMethod::guess_from_path("a/b.csv").unwrap(), ReaderMethod::Csv);
        assert_eq!(ReaderMethod::guess_from_path("a/b.TSV").unwrap(), ReaderMethod::Csv);
        assert_eq!(
            ReaderMethod::guess_from_path("a/b.parquet").unwrap(),
            ReaderMethod::Parquet
        );
        assert_eq!(ReaderMethod::guess_from_path("b.jsonl").unwrap(), ReaderMethod::Json);
        assert!(matches!(
            ReaderMethod::guess_from_path("b.xlsx"),
            Err(TermError::Configuration(_))
        ));
    }

    #[test]
    fn test_batch_id_is_stable_and_excludes_payload() {
        let a = BatchSpec::in_memory("orders", InMemoryData::from_batch(small_batch()));
        let b = BatchSpec::in_memory("orders", InMemoryData::from_batch(small_batch()));
        assert_eq!(a.batch_id(), b.batch_id());

        let identity = a.identity_value();
        assert_eq!(identity["in_memory_data"], json!(true));
        assert_eq!(identity["data_asset_name"], json!("orders"));

        let c = BatchSpec::in_memory("customers", InMemoryData::from_batch(small_batch()));
        assert_ne!(a.batch_id(), c.batch_id());
    }

    #[test]
    fn test_spec_json_round_trip_keeps_id() {
        let spec = BatchSpec::from_json_str(
            r#"{"path": "data/x.csv", "sampling_method": "_sample_using_random",
                "sampling_kwargs": {"p": 0.5}, "limit": 10}"#,
        )
        .unwrap();
        let reparsed = BatchSpec::from_value(serde_json::to_value(&spec).unwrap()).unwrap();
        assert_eq!(spec.batch_id(), reparsed.batch_id());
        assert_eq!(reparsed.limit, Some(10));
    }

    #[test]
    fn test_unknown_directive_names_fail_at_load() {
        let err = BatchSpec::from_json_str(r#"{"path": "x.csv", "sampling_method": "_sample_all"}"#)
            .unwrap_err();
        assert!(matches!(err, TermError::Configuration(_)));

        let err = BatchSpec::from_json_str(
            r#"{"path": "x.csv", "splitter_method": "_split_on_mod_integer",
                "splitter_kwargs": {"column_name": "x"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mod"));
    }

    #[test]
    fn test_markers_format() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let markers = BatchMarkers::at(t);
        assert_eq!(markers.load_time, "20240305T070809.000000Z");
    }

    #[test]
    fn test_delimiter_byte() {
        let options = ReaderOptions {
            has_header: Some(true),
            delimiter: Some("|".into()),
        };
        assert_eq!(options.delimiter_byte().unwrap(), Some(b'|'));
        let options = ReaderOptions {
            has_header: None,
            delimiter: Some("||".into()),
        };
        assert!(options.delimiter_byte().is_err());
    }
}
