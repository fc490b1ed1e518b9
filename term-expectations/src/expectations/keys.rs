//! Declared kwargs of an expectation family and their defaults.

use crate::core::domain::{BATCH_ID, COLUMN, COLUMN_A, COLUMN_B, CONDITION_PARSER, ROW_CONDITION, TABLE};
use crate::core::{DomainKwargs, ExpectationConfiguration};
use serde_json::{json, Map, Value};

pub const RESULT_FORMAT: &str = "result_format";
pub const INCLUDE_CONFIG: &str = "include_config";
pub const CATCH_EXCEPTIONS: &str = "catch_exceptions";
pub const MOSTLY: &str = "mostly";

/// Which kwargs identify the data, which decide success, and which only
/// affect reporting, plus the default value of each.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationKeys {
    pub domain_keys: Vec<&'static str>,
    pub success_keys: Vec<&'static str>,
    pub runtime_keys: Vec<&'static str>,
    pub default_kwarg_values: Map<String, Value>,
}

impl ExpectationKeys {
    /// Keys every expectation has.
    pub fn base() -> Self {
        Self {
            domain_keys: Vec::new(),
            success_keys: Vec::new(),
            runtime_keys: vec![INCLUDE_CONFIG, CATCH_EXCEPTIONS, RESULT_FORMAT],
            default_kwarg_values: object(json!({
                INCLUDE_CONFIG: true,
                CATCH_EXCEPTIONS: false,
                RESULT_FORMAT: "BASIC",
            })),
        }
    }

    /// Expectations over a whole (optionally row-filtered) batch.
    pub fn table() -> Self {
        Self::base()
            .with_domain_keys(&[BATCH_ID, TABLE, ROW_CONDITION, CONDITION_PARSER])
            .with_defaults(json!({ROW_CONDITION: null, CONDITION_PARSER: null}))
    }

    /// Expectations over one column.
    pub fn column() -> Self {
        Self::table().with_domain_keys(&[BATCH_ID, TABLE, COLUMN, ROW_CONDITION, CONDITION_PARSER])
    }

    /// Row-wise expectations over one column, judged with `mostly`.
    pub fn column_map() -> Self {
        Self::column()
            .with_success_keys(&[MOSTLY])
            .with_defaults(json!({MOSTLY: 1, CATCH_EXCEPTIONS: true}))
    }

    /// Row-wise expectations over a pair of columns.
    pub fn column_pair_map() -> Self {
        Self::table()
            .with_domain_keys(&[
                BATCH_ID,
                TABLE,
                COLUMN_A,
                COLUMN_B,
                ROW_CONDITION,
                CONDITION_PARSER,
            ])
            .with_success_keys(&["ignore_row_if", MOSTLY])
            .with_defaults(json!({
                MOSTLY: 1,
                "ignore_row_if": "both_values_are_missing",
                CATCH_EXCEPTIONS: true,
            }))
    }

    /// Replaces the domain keys.
    pub fn with_domain_keys(mut self, keys: &[&'static str]) -> Self {
        self.domain_keys = keys.to_vec();
        self
    }

    /// Replaces the success keys.
    pub fn with_success_keys(mut self, keys: &[&'static str]) -> Self {
        self.success_keys = keys.to_vec();
        self
    }

    /// Merges more defaults over the current ones; see [`merge_defaults`].
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.default_kwarg_values = merge_defaults(&self.default_kwarg_values, &object(defaults));
        self
    }

    /// Every kwarg this expectation understands.
    pub fn allowed_keys(&self) -> impl Iterator<Item = &str> {
        self.domain_keys
            .iter()
            .chain(&self.success_keys)
            .chain(&self.runtime_keys)
            .copied()
    }

    /// The configured value of `key`, falling back to its default.
    ///
    /// An explicit `null` in the configuration wins over the default.
    pub fn kwarg<'a>(&'a self, config: &'a ExpectationConfiguration, key: &str) -> Option<&'a Value> {
        config
            .kwargs
            .get(key)
            .or_else(|| self.default_kwarg_values.get(key))
    }

    /// The domain part of a configuration.
    pub fn domain_kwargs(&self, config: &ExpectationConfiguration) -> DomainKwargs {
        self.pick(config, &self.domain_keys)
            .into_iter()
            .fold(DomainKwargs::new(), |domain, (k, v)| domain.with(k, v))
    }

    /// Success kwargs (without the domain).
    pub fn success_kwargs(&self, config: &ExpectationConfiguration) -> Map<String, Value> {
        self.pick(config, &self.success_keys)
    }

    /// Picks `keys` from the configuration, with defaults, dropping nulls.
    pub fn pick(&self, config: &ExpectationConfiguration, keys: &[&str]) -> Map<String, Value> {
        keys.iter()
            .filter_map(|key| {
                self.kwarg(config, key)
                    .filter(|v| !v.is_null())
                    .map(|v| (key.to_string(), v.clone()))
            })
            .collect()
    }
}

/// Merges `overrides` over `base`.
///
/// Object-valued entries present on both sides merge key by key; any other
/// value in `overrides` replaces the one in `base`.
///
/// ```rust
/// use term_expectations::expectations::keys::merge_defaults;
/// use serde_json::json;
///
/// let base = json!({"result_format": {"result_format": "BASIC", "partial_unexpected_count": 20}, "mostly": 1});
/// let child = json!({"result_format": {"result_format": "SUMMARY"}});
/// let merged = merge_defaults(base.as_object().unwrap(), child.as_object().unwrap());
/// assert_eq!(merged["result_format"]["partial_unexpected_count"], json!(20));
/// assert_eq!(merged["result_format"]["result_format"], json!("SUMMARY"));
/// assert_eq!(merged["mostly"], json!(1));
/// ```
pub fn merge_defaults(base: &Map<String, Value>, overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in overrides {
        let combined = match (merged.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(child)) => {
                Value::Object(merge_defaults(existing, child))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
