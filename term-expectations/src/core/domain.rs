//! Domain kwargs: which subset of a batch a metric computes over.
//!
//! A domain is a small JSON mapping (batch id, optional table, column(s) and
//! row condition). Before a backend resolves it, the *accessor* keys (the
//! columns read out of the frame) are split off so that metrics differing only
//! in the column they read share one compute domain.

use crate::core::identity::{content_id, without_nulls};
use crate::error::{Result, TermError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Keys that address data inside an already-filtered frame.
pub const ACCESSOR_KEYS: &[&str] = &["column", "column_A", "column_B", "column_list"];

/// Key holding the batch identifier.
pub const BATCH_ID: &str = "batch_id";
/// Key holding a named table.
pub const TABLE: &str = "table";
/// Key holding the single column of a column domain.
pub const COLUMN: &str = "column";
/// Key holding the first column of a column-pair domain.
pub const COLUMN_A: &str = "column_A";
/// Key holding the second column of a column-pair domain.
pub const COLUMN_B: &str = "column_B";
/// Key holding the row condition text.
pub const ROW_CONDITION: &str = "row_condition";
/// Key holding the row condition parser tag.
pub const CONDITION_PARSER: &str = "condition_parser";

/// A canonical mapping describing a metric's domain.
///
/// Null-valued entries are dropped on construction; a key set to `null` is
/// indistinguishable from an absent key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainKwargs(Map<String, Value>);

impl DomainKwargs {
    /// Creates an empty domain (the whole active batch).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a domain from a JSON map, dropping null entries.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(without_nulls(&map))
    }

    /// Creates a domain from a JSON value that must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            Value::Null => Ok(Self::new()),
            other => Err(TermError::configuration(format!(
                "domain kwargs must be an object, got {other}"
            ))),
        }
    }

    /// Sets a key, removing it when the value is null.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets a key in place, removing it when the value is null.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if value.is_null() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, value);
        }
    }

    /// Removes a key, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns true if no keys are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns the domain as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Returns the deterministic id of this domain.
    pub fn id(&self) -> String {
        content_id(&Value::Object(self.0.clone()))
    }

    /// Returns a string-valued key, failing if it holds a non-string.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(TermError::configuration(format!(
                "domain key '{key}' must be a string, got {other}"
            ))),
        }
    }

    /// Returns the batch id, if addressed explicitly.
    pub fn batch_id(&self) -> Result<Option<&str>> {
        self.get_str(BATCH_ID)
    }

    /// Returns the named table, if any.
    pub fn table(&self) -> Result<Option<&str>> {
        self.get_str(TABLE)
    }

    /// Returns the column of a column domain.
    pub fn column(&self) -> Result<Option<&str>> {
        self.get_str(COLUMN)
    }

    /// Returns the first column of a column-pair domain, if any.
    pub fn column_a(&self) -> Result<Option<&str>> {
        self.get_str(COLUMN_A)
    }

    pub fn column_b(&self) -> Result<Option<&str>> {
        self.get_str(COLUMN_B)
    }

    /// Returns the column, failing if absent.
    pub fn require_column(&self) -> Result<&str> {
        self.column()?
            .ok_or_else(|| TermError::configuration("domain requires a 'column' key"))
    }

    /// Returns the two columns of a column-pair domain, failing if either is absent.
    pub fn require_column_pair(&self) -> Result<(&str, &str)> {
        let a = self
            .get_str(COLUMN_A)?
            .ok_or_else(|| TermError::configuration("domain requires a 'column_A' key"))?;
        let b = self
            .get_str(COLUMN_B)?
            .ok_or_else(|| TermError::configuration("domain requires a 'column_B' key"))?;
        Ok((a, b))
    }

    /// Returns the row condition, if any.
    ///
    /// A condition without a parser tag is a configuration error: the dialect
    /// must always be explicit.
    pub fn row_condition(&self) -> Result<Option<RowCondition>> {
        let Some(condition) = self.get_str(ROW_CONDITION)? else {
            return Ok(None);
        };
        let parser = self.get_str(CONDITION_PARSER)?.ok_or_else(|| {
            TermError::domain_resolution(
                "row_condition requires an explicit condition_parser",
            )
        })?;
        Ok(Some(RowCondition {
            condition: condition.to_string(),
            parser: ConditionParser::from_tag(parser)?,
        }))
    }

    /// Splits the domain into `(compute, accessor)` kwargs.
    pub fn split_accessor_keys(&self) -> (DomainKwargs, DomainKwargs) {
        let mut compute = self.clone();
        let mut accessor = DomainKwargs::new();
        for key in ACCESSOR_KEYS {
            if let Some(value) = compute.remove(key) {
                accessor.insert(*key, value);
            }
        }
        (compute, accessor)
    }

    /// Returns all accessor columns named by this domain.
    pub fn accessor_columns(&self) -> Result<Vec<String>> {
        let mut columns = Vec::new();
        for key in [COLUMN, COLUMN_A, COLUMN_B] {
            if let Some(column) = self.get_str(key)? {
                columns.push(column.to_string());
            }
        }
        if let Some(value) = self.get("column_list") {
            let list = value.as_array().ok_or_else(|| {
                TermError::configuration("domain key 'column_list' must be a list")
            })?;
            for item in list {
                let column = item.as_str().ok_or_else(|| {
                    TermError::configuration("'column_list' entries must be strings")
                })?;
                columns.push(column.to_string());
            }
        }
        Ok(columns)
    }
}

impl fmt::Display for DomainKwargs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for DomainKwargs {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

/// The dialect a row condition is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionParser {
    /// The backend's native SQL expression syntax.
    Sql,
    /// The portable simplified boolean syntax, e.g. `col("x") > 5 & col("y").notnull()`.
    Portable,
}

impl ConditionParser {
    /// Resolves a parser tag, failing for unrecognized dialects.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "sql" => Ok(Self::Sql),
            "portable" => Ok(Self::Portable),
            other => Err(TermError::domain_resolution(format!(
                "unrecognized condition_parser '{other}'; expected 'sql' or 'portable'"
            ))),
        }
    }

    /// Returns the canonical tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Portable => "portable",
        }
    }
}

/// A row filter together with the dialect it is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCondition {
    pub condition: String,
    pub parser: ConditionParser,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn domain(value: Value) -> DomainKwargs {
        DomainKwargs::from_value(value).unwrap()
    }

    #[test]
    fn test_nulls_are_dropped() {
        let with_null = domain(json!({"column": "x", "row_condition": null}));
        let without = domain(json!({"column": "x"}));
        assert_eq!(with_null, without);
        assert_eq!(with_null.id(), without.id());
    }

    #[test]
    fn test_split_accessor_keys() {
        let kwargs = domain(json!({
            "batch_id": "b1",
            "column": "price",
            "row_condition": "price > 0",
            "condition_parser": "sql"
        }));
        let (compute, accessor) = kwargs.split_accessor_keys();
        assert!(!compute.contains_key("column"));
        assert_eq!(compute.batch_id().unwrap(), Some("b1"));
        assert_eq!(accessor.column().unwrap(), Some("price"));
    }

    #[test]
    fn test_different_columns_share_compute_domain() {
        let a = domain(json!({"batch_id": "b1", "column": "a"}));
        let b = domain(json!({"batch_id": "b1", "column": "b"}));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.split_accessor_keys().0.id(), b.split_accessor_keys().0.id());
    }

    #[test]
    fn test_row_condition_requires_known_parser() {
        let kwargs = domain(json!({"row_condition": "x > 1", "condition_parser": "pandas"}));
        assert!(matches!(
            kwargs.row_condition(),
            Err(TermError::DomainResolution(_))
        ));

        let kwargs = domain(json!({"row_condition": "x > 1"}));
        assert!(matches!(
            kwargs.row_condition(),
            Err(TermError::DomainResolution(_))
        ));

        let kwargs = domain(json!({"row_condition": "x > 1", "condition_parser": "sql"}));
        let condition = kwargs.row_condition().unwrap().unwrap();
        assert_eq!(condition.parser, ConditionParser::Sql);
    }

    #[test]
    fn test_accessor_columns() {
        let kwargs = domain(json!({"column_A": "a", "column_B": "b"}));
        assert_eq!(kwargs.accessor_columns().unwrap(), vec!["a", "b"]);
        assert_eq!(kwargs.require_column_pair().unwrap(), ("a", "b"));
        assert!(kwargs.require_column().is_err());
    }
}
