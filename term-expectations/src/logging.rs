//! Logging configuration.
//!
//! The engine logs through `tracing` with dotted structured field names
//! (`metric.name`, `batch.id`, `domain.id`, `expectation.name`). [`LogConfig`]
//! gates the high-volume events; [`setup`] installs a subscriber for
//! binaries and tests.

use tracing::Level;

/// Which engine events are emitted.
///
/// Per-metric and per-expectation events are the expensive ones on large
/// suites; they are checked before any field is formatted.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Threshold for [`perf_debug!`](crate::perf_debug) events
    pub base_level: Level,
    /// Log every bundled metric value as it is resolved
    pub log_metric_details: bool,
    /// Log batch loads
    pub log_data_operations: bool,
    /// Log the outcome of every expectation
    pub log_expectation_results: bool,
    /// Longest rendered value kept in a log field
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_metric_details: false,
            log_data_operations: true,
            log_expectation_results: false,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Everything on, with long fields.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_metric_details: true,
            log_data_operations: true,
            log_expectation_results: true,
            max_field_length: 1024,
        }
    }

    /// Only warnings and suite summaries.
    pub fn quiet() -> Self {
        Self {
            base_level: Level::WARN,
            log_metric_details: false,
            log_data_operations: false,
            log_expectation_results: false,
            max_field_length: 128,
        }
    }
}

/// Debug event emitted only when `base_level` admits debug output.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Debug event for a resolved metric, gated by `log_metric_details`.
#[macro_export]
macro_rules! log_metric {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_metric_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Info event for a batch operation, gated by `log_data_operations`.
#[macro_export]
macro_rules! log_data_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_data_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Cuts `value` to at most `max_length` bytes on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber installation.
pub mod setup {
    use tracing::Level;

    /// Filter and output format of the installed subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Level for every other target
        pub level: Level,
        /// Level for the `term_expectations` target
        pub crate_level: Level,
        pub json_format: bool,
        /// Replaces the filter built from the two levels
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                crate_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON lines, warnings from dependencies, info from the engine.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_crate_level(mut self, level: Level) -> Self {
            self.crate_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// The `EnvFilter` directive string.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},term_expectations={}",
                    self.level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs the global subscriber; `RUST_LOG` wins over the configured filter.
    ///
    /// ```rust,no_run
    /// use term_expectations::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::production()).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));
        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_presets() {
        let default = LogConfig::default();
        assert_eq!(default.base_level, Level::INFO);
        assert!(default.log_data_operations);
        assert!(!default.log_expectation_results);

        let quiet = LogConfig::quiet();
        assert!(!quiet.log_metric_details && !quiet.log_data_operations);
        assert!(LogConfig::verbose().base_level >= Level::DEBUG);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("[1,2,3,4,5,6,7,8,9]", 6),
            "[1,2,3...(truncated)"
        );
        assert_eq!(truncate_field("ééé", 3), "é...(truncated)");
    }

    #[test]
    fn test_env_filter() {
        assert_eq!(LoggingConfig::default().env_filter(), "info,term_expectations=debug");
        assert_eq!(
            LoggingConfig::production().env_filter(),
            "warn,term_expectations=info"
        );
        assert_eq!(LoggingConfig::default().with_env_filter("off").env_filter(), "off");
    }
}
