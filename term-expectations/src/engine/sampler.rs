//! Samplers: subset a batch's rows independently of any partitioning.

use crate::engine::convert::json_literal;
use crate::engine::params;
use crate::error::{Result, TermError};
use arrow::array::BooleanArray;
use arrow::compute::filter_record_batch;
use arrow::datatypes::DataType;
use datafusion::datasource::MemTable;
use datafusion::functions::expr_fn::{md5, right};
use datafusion::logical_expr::{cast, ident, lit, Expr};
use datafusion::prelude::{DataFrame, SessionContext};
use futures::TryStreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Default keep probability of `_sample_using_random`.
pub const DEFAULT_P: f64 = 0.1;
/// Default seed of `_sample_using_random`.
pub const DEFAULT_SEED: u64 = 1;
/// Default `hash_digits` of `_sample_using_md5`.
pub const DEFAULT_HASH_DIGITS: i64 = 1;
/// Default `hash_value` of `_sample_using_md5`.
pub const DEFAULT_HASH_VALUE: &str = "f";

/// The samplers an engine can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingMethod {
    #[serde(rename = "_sample_using_random")]
    Random,
    #[serde(rename = "_sample_using_mod")]
    Mod,
    #[serde(rename = "_sample_using_a_list")]
    AList,
    #[serde(rename = "_sample_using_md5")]
    Md5,
}

impl SamplingMethod {
    pub const ALL: &'static [SamplingMethod] = &[Self::Random, Self::Mod, Self::AList, Self::Md5];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Random => "_sample_using_random",
            Self::Mod => "_sample_using_mod",
            Self::AList => "_sample_using_a_list",
            Self::Md5 => "_sample_using_md5",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == name)
            .ok_or_else(|| TermError::configuration(format!("unknown sampling method '{name}'")))
    }

    /// Parameters that must be present in the kwargs.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::Random => &[],
            Self::Mod => &["column_name", "mod", "value"],
            Self::AList => &["column_name", "value_list"],
            Self::Md5 => &["column_name"],
        }
    }
}

/// A sampler plus its parameters, validated on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDirective {
    pub method: SamplingMethod,
    pub kwargs: Map<String, Value>,
}

impl SamplerDirective {
    pub fn new(method: SamplingMethod, kwargs: Map<String, Value>) -> Result<Self> {
        for param in method.required_params() {
            if kwargs.get(*param).map_or(true, Value::is_null) {
                return Err(TermError::configuration(format!(
                    "{} requires parameter '{param}'",
                    method.name()
                )));
            }
        }
        let directive = Self { method, kwargs };
        match method {
            SamplingMethod::Random => {
                directive.random_params()?;
            }
            _ => {
                directive.predicate()?;
            }
        }
        Ok(directive)
    }

    /// Applies the sampler.
    ///
    /// The random sampler materializes the frame to draw one number per row in
    /// load order; the others are plain filters.
    pub async fn apply(&self, ctx: &SessionContext, data: DataFrame) -> Result<DataFrame> {
        match self.method {
            SamplingMethod::Random => {
                let (p, seed) = self.random_params()?;
                sample_using_random(ctx, data, p, seed).await
            }
            SamplingMethod::Mod | SamplingMethod::AList | SamplingMethod::Md5 => {
                Ok(data.filter(self.predicate()?)?)
            }
        }
    }

    fn random_params(&self) -> Result<(f64, u64)> {
        let p = params::opt_f64_param(&self.kwargs, "p")?.unwrap_or(DEFAULT_P);
        if !(0.0..=1.0).contains(&p) {
            return Err(TermError::configuration(format!(
                "_sample_using_random requires 0 <= p <= 1, got {p}"
            )));
        }
        let seed = match params::opt_int_param(&self.kwargs, "seed")? {
            Some(seed) if seed < 0 => {
                return Err(TermError::configuration("seed must be non-negative"))
            }
            Some(seed) => seed as u64,
            None => DEFAULT_SEED,
        };
        Ok((p, seed))
    }

    fn predicate(&self) -> Result<Expr> {
        let kwargs = &self.kwargs;
        match self.method {
            SamplingMethod::Random => Err(TermError::Internal(
                "random sampling has no row predicate".into(),
            )),
            SamplingMethod::Mod => {
                let column = params::str_param(kwargs, "column_name")?;
                let modulus = params::positive_int_param(kwargs, "mod")?;
                let value = params::int_value(
                    kwargs.get("value").unwrap_or(&Value::Null),
                    "value",
                )?;
                Ok((cast(ident(column), DataType::Int64) % lit(modulus)).eq(lit(value)))
            }
            SamplingMethod::AList => {
                let column = params::str_param(kwargs, "column_name")?;
                let list = params::array_param(kwargs, "value_list")?
                    .iter()
                    .map(json_literal)
                    .collect::<Result<Vec<_>>>()?;
                Ok(ident(column).in_list(list, false))
            }
            SamplingMethod::Md5 => {
                let column = params::str_param(kwargs, "column_name")?;
                let digits =
                    params::opt_int_param(kwargs, "hash_digits")?.unwrap_or(DEFAULT_HASH_DIGITS);
                if digits <= 0 {
                    return Err(TermError::configuration("hash_digits must be positive"));
                }
                let value = params::opt_str_param(kwargs, "hash_value")?
                    .unwrap_or(DEFAULT_HASH_VALUE)
                    .to_ascii_lowercase();
                Ok(right(md5(cast(ident(column), DataType::Utf8)), lit(digits)).eq(lit(value)))
            }
        }
    }
}

async fn sample_using_random(
    ctx: &SessionContext,
    data: DataFrame,
    p: f64,
    seed: u64,
) -> Result<DataFrame> {
    let schema = data.schema().inner().clone();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stream = data.execute_stream().await?;
    let mut kept = Vec::new();
    let (mut seen, mut taken) = (0usize, 0usize);
    while let Some(batch) = stream.try_next().await? {
        let mask: BooleanArray = (0..batch.num_rows())
            .map(|_| Some(rng.random::<f64>() < p))
            .collect();
        let filtered = filter_record_batch(&batch, &mask)?;
        seen += batch.num_rows();
        taken += filtered.num_rows();
        kept.push(filtered);
    }
    debug!(
        sample.p = p,
        sample.seed = seed,
        sample.rows_in = seen,
        sample.rows_out = taken,
        "Applied random sampler"
    );
    let table = MemTable::try_new(schema, vec![kept])?;
    Ok(ctx.read_table(Arc::new(table))?)
}
