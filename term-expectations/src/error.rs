//! Error types for the expectation engine.
//!
//! All failures surface as a [`TermError`]. The variants follow the engine's
//! error taxonomy: configuration problems, domain resolution problems, graph
//! consistency violations and per-metric resolution failures, plus wrappers for
//! the DataFusion, Arrow and I/O errors that bubble up from the backend.

use thiserror::Error;

/// The main error type for the expectation engine.
#[derive(Error, Debug)]
pub enum TermError {
    /// A malformed expectation configuration, batch spec, splitter or sampler
    /// directive, or result format.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The engine could not work out which data a metric should run against.
    ///
    /// Raised for missing or ambiguous batches, unknown batch ids, unrecognized
    /// row-condition parsers and unsupported named-table addressing.
    #[error("Domain resolution error: {0}")]
    DomainResolution(String),

    /// An engine or metric provider broke the bundling contract.
    ///
    /// This always indicates a bug and is never captured into a validation result.
    #[error("Graph consistency error: {0}")]
    GraphConsistency(String),

    /// A metric could not be resolved.
    #[error("Metric resolution failed for '{metric}': {message}")]
    MetricResolution {
        /// Name of the metric that failed
        metric: String,
        /// Detailed error message
        message: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error when a required column is not found in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Error when an operation is not supported.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a new domain resolution error.
    pub fn domain_resolution(message: impl Into<String>) -> Self {
        Self::DomainResolution(message.into())
    }

    /// Creates a new graph consistency error.
    pub fn graph_consistency(message: impl Into<String>) -> Self {
        Self::GraphConsistency(message.into())
    }

    /// Creates a new metric resolution error.
    pub fn metric_resolution(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetricResolution {
            metric: metric.into(),
            message: message.into(),
        }
    }

    /// Returns a stable short name for the error kind.
    ///
    /// Used as the prefix of `exception_message` in captured validation results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::DomainResolution(_) => "DomainResolutionError",
            Self::GraphConsistency(_) => "GraphConsistencyError",
            Self::MetricResolution { .. } => "MetricResolutionError",
            Self::DataFusion(_) => "DataFusionError",
            Self::Arrow(_) => "ArrowError",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
            Self::ColumnNotFound { .. } => "ColumnNotFoundError",
            Self::NotSupported(_) => "NotSupportedError",
            Self::Internal(_) => "InternalError",
            Self::SecurityError(_) => "SecurityError",
        }
    }

    /// Returns true for errors that must abort a run even when
    /// `catch_exceptions` is enabled.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::GraphConsistency(_))
    }

    /// Renders the error and its chain of sources, outermost first.
    pub fn source_chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            rendered.push_str("\n  caused by: ");
            rendered.push_str(&err.to_string());
            source = err.source();
        }
        rendered
    }
}

impl From<serde_json::Error> for TermError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| prefix_error(e.into(), msg))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| prefix_error(e.into(), &f()))
    }
}

// Keeps the taxonomy intact: a configuration error stays a configuration error.
fn prefix_error(err: TermError, msg: &str) -> TermError {
    match err {
        TermError::Configuration(inner) => TermError::Configuration(format!("{msg}: {inner}")),
        TermError::DomainResolution(inner) => {
            TermError::DomainResolution(format!("{msg}: {inner}"))
        }
        TermError::GraphConsistency(inner) => {
            TermError::GraphConsistency(format!("{msg}: {inner}"))
        }
        TermError::MetricResolution { metric, message } => TermError::MetricResolution {
            metric,
            message: format!("{msg}: {message}"),
        },
        TermError::SecurityError(inner) => TermError::SecurityError(format!("{msg}: {inner}")),
        TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
        other => TermError::Internal(format!("{msg}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = TermError::configuration("'column' parameter is required");
        assert_eq!(
            err.to_string(),
            "Configuration error: 'column' parameter is required"
        );
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_metric_resolution_error() {
        let err = TermError::metric_resolution("column.mean", "no provider registered");
        assert_eq!(
            err.to_string(),
            "Metric resolution failed for 'column.mean': no provider registered"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_graph_consistency_is_fatal() {
        let err = TermError::graph_consistency("Invalid compute domain returned");
        assert!(err.is_fatal());
        assert_eq!(err.kind(), "GraphConsistencyError");
    }

    #[test]
    fn test_domain_resolution_not_fatal() {
        let err = TermError::domain_resolution("Unable to find batch with batch_id abc");
        assert!(!err.is_fatal());
        assert_eq!(err.kind(), "DomainResolutionError");
    }

    #[test]
    fn test_column_not_found() {
        let err = TermError::ColumnNotFound {
            column: "user_id".to_string(),
        };
        assert_eq!(err.to_string(), "Column 'user_id' not found in dataset");
    }

    #[test]
    fn test_source_chain_includes_io_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err = TermError::from(io);
        assert!(err.source_chain().starts_with("IO error: File not found"));
    }

    #[test]
    fn test_error_context_preserves_kind() {
        fn failing_operation() -> Result<()> {
            Err(TermError::configuration("bad splitter"))
        }

        let err = failing_operation().context("While loading batch").unwrap_err();
        assert!(matches!(err, TermError::Configuration(_)));
        assert!(err.to_string().contains("While loading batch: bad splitter"));

        let err = Err::<(), _>(TermError::SecurityError("nested quantifier".into()))
            .with_context(|| "expect_column_values_to_match_regex".to_string())
            .unwrap_err();
        assert_eq!(err.kind(), "SecurityError");

        let err = Err::<(), _>(TermError::NotSupported("x".into()))
            .context("During resolution")
            .unwrap_err();
        assert!(matches!(err, TermError::Internal(_)));
    }
}
