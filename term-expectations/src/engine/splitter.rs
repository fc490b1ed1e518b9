//! Splitters: keep only the rows belonging to one partition of a batch.
//!
//! Every splitter is a pure filter `(DataFrame, kwargs) -> DataFrame`. The
//! external names (`_split_on_*`) map onto [`SplitterMethod`] variants, and
//! each variant maps onto exactly one function, so an unknown name can only
//! fail while the batch spec is being parsed.

use crate::engine::convert::{column_equals, json_literal};
use crate::engine::params;
use crate::error::{Result, TermError};
use arrow::datatypes::{DataType, TimeUnit};
use datafusion::functions::expr_fn::{encode, floor, right, sha256, to_char};
use datafusion::logical_expr::{cast, ident, lit, Expr};
use datafusion::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default `date_format_string` for `_split_on_converted_datetime`.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Signature shared by all splitter functions.
pub type SplitterFn = fn(DataFrame, &Map<String, Value>) -> Result<DataFrame>;

/// The splitters an engine can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitterMethod {
    #[serde(rename = "_split_on_whole_table")]
    WholeTable,
    #[serde(rename = "_split_on_column_value")]
    ColumnValue,
    #[serde(rename = "_split_on_converted_datetime")]
    ConvertedDatetime,
    #[serde(rename = "_split_on_divided_integer")]
    DividedInteger,
    #[serde(rename = "_split_on_mod_integer")]
    ModInteger,
    #[serde(rename = "_split_on_multi_column_values")]
    MultiColumnValues,
    #[serde(rename = "_split_on_hashed_column")]
    HashedColumn,
}

impl SplitterMethod {
    /// Every splitter, in declaration order.
    pub const ALL: &'static [SplitterMethod] = &[
        Self::WholeTable,
        Self::ColumnValue,
        Self::ConvertedDatetime,
        Self::DividedInteger,
        Self::ModInteger,
        Self::MultiColumnValues,
        Self::HashedColumn,
    ];

    /// The external name of the splitter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WholeTable => "_split_on_whole_table",
            Self::ColumnValue => "_split_on_column_value",
            Self::ConvertedDatetime => "_split_on_converted_datetime",
            Self::DividedInteger => "_split_on_divided_integer",
            Self::ModInteger => "_split_on_mod_integer",
            Self::MultiColumnValues => "_split_on_multi_column_values",
            Self::HashedColumn => "_split_on_hashed_column",
        }
    }

    /// Resolves an external name.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == name)
            .ok_or_else(|| TermError::configuration(format!("unknown splitter method '{name}'")))
    }

    /// Parameters that must be present in the kwargs.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::WholeTable => &[],
            Self::ColumnValue | Self::ConvertedDatetime => &["column_name", "partition_definition"],
            Self::DividedInteger => &["column_name", "divisor", "partition_definition"],
            Self::ModInteger => &["column_name", "mod", "partition_definition"],
            Self::MultiColumnValues => &["partition_definition"],
            Self::HashedColumn => &["column_name", "hash_digits", "partition_definition"],
        }
    }

    /// The function implementing this splitter.
    pub fn function(&self) -> SplitterFn {
        match self {
            Self::WholeTable => split_on_whole_table,
            Self::ColumnValue => split_on_column_value,
            Self::ConvertedDatetime => split_on_converted_datetime,
            Self::DividedInteger => split_on_divided_integer,
            Self::ModInteger => split_on_mod_integer,
            Self::MultiColumnValues => split_on_multi_column_values,
            Self::HashedColumn => split_on_hashed_column,
        }
    }
}

/// A splitter plus its parameters, validated on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitterDirective {
    pub method: SplitterMethod,
    pub kwargs: Map<String, Value>,
}

impl SplitterDirective {
    /// Builds a directive, checking that the parameters fit the method.
    pub fn new(method: SplitterMethod, kwargs: Map<String, Value>) -> Result<Self> {
        for param in method.required_params() {
            if kwargs.get(*param).map_or(true, Value::is_null) {
                return Err(TermError::configuration(format!(
                    "{} requires parameter '{param}'",
                    method.name()
                )));
            }
        }
        // Building the predicate exercises every typed parameter lookup.
        predicate(method, &kwargs)?;
        Ok(Self { method, kwargs })
    }

    /// Applies the splitter.
    pub fn apply(&self, data: DataFrame) -> Result<DataFrame> {
        (self.method.function())(data, &self.kwargs)
    }
}

fn predicate(method: SplitterMethod, kwargs: &Map<String, Value>) -> Result<Option<Expr>> {
    let expr = match method {
        SplitterMethod::WholeTable => return Ok(None),
        SplitterMethod::ColumnValue => {
            let column = params::str_param(kwargs, "column_name")?;
            column_equals(column, partition_value(kwargs, column)?)?
        }
        SplitterMethod::ConvertedDatetime => {
            let column = params::str_param(kwargs, "column_name")?;
            let format = params::opt_str_param(kwargs, "date_format_string")?
                .unwrap_or(DEFAULT_DATE_FORMAT);
            let expected = partition_value(kwargs, column)?;
            to_char(
                cast(ident(column), DataType::Timestamp(TimeUnit::Nanosecond, None)),
                lit(format),
            )
            .eq(json_literal(expected)?)
        }
        SplitterMethod::DividedInteger => {
            let column = params::str_param(kwargs, "column_name")?;
            let divisor = params::positive_int_param(kwargs, "divisor")?;
            let expected = params::int_value(partition_value(kwargs, column)?, column)?;
            floor(cast(ident(column), DataType::Float64) / lit(divisor as f64))
                .eq(lit(expected as f64))
        }
        SplitterMethod::ModInteger => {
            let column = params::str_param(kwargs, "column_name")?;
            let modulus = params::positive_int_param(kwargs, "mod")?;
            let expected = params::int_value(partition_value(kwargs, column)?, column)?;
            (cast(ident(column), DataType::Int64) % lit(modulus)).eq(lit(expected))
        }
        SplitterMethod::MultiColumnValues => {
            let definition = params::object_param(kwargs, "partition_definition")?;
            if definition.is_empty() {
                return Err(TermError::configuration(
                    "_split_on_multi_column_values requires a non-empty partition_definition",
                ));
            }
            let mut conjunction: Option<Expr> = None;
            for (column, value) in definition {
                let eq = column_equals(column, value)?;
                conjunction = Some(match conjunction {
                    Some(acc) => acc.and(eq),
                    None => eq,
                });
            }
            conjunction.ok_or_else(|| TermError::Internal("empty conjunction".into()))?
        }
        SplitterMethod::HashedColumn => {
            let column = params::str_param(kwargs, "column_name")?;
            let digits = params::positive_int_param(kwargs, "hash_digits")?;
            let hash_value = partition_value(kwargs, "hash_value")?
                .as_str()
                .ok_or_else(|| TermError::configuration("hash_value must be a string"))?;
            right(
                encode(sha256(cast(ident(column), DataType::Utf8)), lit("hex")),
                lit(digits),
            )
            .eq(lit(hash_value.to_ascii_lowercase()))
        }
    };
    Ok(Some(expr))
}

fn partition_value<'a>(kwargs: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    params::object_param(kwargs, "partition_definition")?
        .get(key)
        .ok_or_else(|| {
            TermError::configuration(format!("partition_definition is missing key '{key}'"))
        })
}

fn filter(data: DataFrame, method: SplitterMethod, kwargs: &Map<String, Value>) -> Result<DataFrame> {
    match predicate(method, kwargs)? {
        Some(expr) => Ok(data.filter(expr)?),
        None => Ok(data),
    }
}

/// `_split_on_whole_table`: returns the data unchanged.
pub fn split_on_whole_table(data: DataFrame, _kwargs: &Map<String, Value>) -> Result<DataFrame> {
    Ok(data)
}

/// `_split_on_column_value`: rows where `column_name` equals its partition value.
pub fn split_on_column_value(data: DataFrame, kwargs: &Map<String, Value>) -> Result<DataFrame> {
    filter(data, SplitterMethod::ColumnValue, kwargs)
}

/// `_split_on_converted_datetime`: rows whose formatted datetime equals the partition value.
pub fn split_on_converted_datetime(
    data: DataFrame,
    kwargs: &Map<String, Value>,
) -> Result<DataFrame> {
    filter(data, SplitterMethod::ConvertedDatetime, kwargs)
}

/// `_split_on_divided_integer`: rows where `floor(x / divisor)` equals the partition value.
pub fn split_on_divided_integer(data: DataFrame, kwargs: &Map<String, Value>) -> Result<DataFrame> {
    filter(data, SplitterMethod::DividedInteger, kwargs)
}

/// `_split_on_mod_integer`: rows where `x % mod` equals the partition value.
pub fn split_on_mod_integer(data: DataFrame, kwargs: &Map<String, Value>) -> Result<DataFrame> {
    filter(data, SplitterMethod::ModInteger, kwargs)
}

/// `_split_on_multi_column_values`: rows matching every key of the partition definition.
pub fn split_on_multi_column_values(
    data: DataFrame,
    kwargs: &Map<String, Value>,
) -> Result<DataFrame> {
    filter(data, SplitterMethod::MultiColumnValues, kwargs)
}

/// `_split_on_hashed_column`: rows whose SHA-256 hex digest ends with `hash_value`.
pub fn split_on_hashed_column(data: DataFrame, kwargs: &Map<String, Value>) -> Result<DataFrame> {
    filter(data, SplitterMethod::HashedColumn, kwargs)
}
