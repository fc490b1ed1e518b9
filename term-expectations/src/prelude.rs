//! Prelude for commonly used types and traits in term-expectations.

pub use crate::core::{
    BatchSpec, DomainKwargs, ExpectationConfiguration, ExpectationSuite,
    ExpectationValidationResult, MetricConfiguration, SuiteValidationResult,
};
pub use crate::engine::{DataFusionExecutionEngine, EngineConfig, ExecutionEngine};
pub use crate::error::{ErrorContext, Result, TermError};
pub use crate::expectations::{Expectation, ExpectationRegistry, ResultFormat};
pub use crate::formatters::{
    FormatterConfig, HumanFormatter, JsonFormatter, MarkdownFormatter, ResultFormatter,
};
pub use crate::logging::LogConfig;
pub use crate::validator::{RuntimeConfiguration, Validator};
