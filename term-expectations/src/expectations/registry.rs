//! Lookup of expectations by canonical name.

use super::column_aggregate::{ColumnAggregateBetween, ExpectColumnDistinctValuesToBeInSet};
use super::column_map::ColumnMapExpectation;
use super::column_pair::ColumnPairMapExpectation;
use super::table::{
    ExpectColumnToExist, ExpectTableColumnCountToEqual, ExpectTableColumnsToMatchOrderedList,
    ExpectTableRowCountToBeBetween, ExpectTableRowCountToEqual,
};
use super::Expectation;
use crate::error::{Result, TermError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

static WORD_START: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new("(.)([A-Z][a-z]+)").expect("Hard-coded regex pattern should be valid")
});
static CASE_CHANGE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new("([a-z0-9])([A-Z])").expect("Hard-coded regex pattern should be valid")
});

/// Converts a CamelCase type name to snake_case.
///
/// ```rust
/// use term_expectations::expectations::camel_to_snake;
///
/// assert_eq!(camel_to_snake("ExpectTableRowCountToEqual"), "expect_table_row_count_to_equal");
/// assert_eq!(
///     camel_to_snake("ExpectColumnPairValuesAToBeGreaterThanB"),
///     "expect_column_pair_values_a_to_be_greater_than_b"
/// );
/// ```
pub fn camel_to_snake(name: &str) -> String {
    let split = WORD_START.replace_all(name, "${1}_${2}");
    CASE_CHANGE.replace_all(&split, "${1}_${2}").to_lowercase()
}

/// Expectations keyed by canonical snake-case name.
#[derive(Debug, Default, Clone)]
pub struct ExpectationRegistry {
    expectations: HashMap<String, Arc<dyn Expectation>>,
}

impl ExpectationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in catalog.
    pub fn with_core_expectations() -> Self {
        let mut registry = Self::new();
        register_core_expectations(&mut registry);
        registry
    }

    /// Registers under the expectation's own type name and returns that name.
    pub fn register(&mut self, expectation: Arc<dyn Expectation>) -> String {
        let name = expectation.expectation_type();
        self.register_as(name.clone(), expectation);
        name
    }

    /// Registers under an explicit name.
    ///
    /// Registering an identical implementation again is a no-op; a
    /// different implementation replaces the existing one.
    pub fn register_as(&mut self, name: impl Into<String>, expectation: Arc<dyn Expectation>) {
        let name = name.into();
        if let Some(existing) = self.expectations.get(&name) {
            if format!("{existing:?}") == format!("{expectation:?}") {
                info!(expectation.name = %name, "Expectation already registered");
                return;
            }
            warn!(
                expectation.name = %name,
                "Overwriting registered expectation with a different implementation"
            );
        }
        self.expectations.insert(name, expectation);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Expectation>> {
        self.expectations.get(name).cloned().ok_or_else(|| {
            TermError::configuration(format!("expectation {name} is not registered"))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.expectations.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn expectation_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.expectations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }
}

/// Registers the built-in catalog.
pub fn register_core_expectations(registry: &mut ExpectationRegistry) {
    for expectation in ColumnMapExpectation::all() {
        registry.register(Arc::new(expectation));
    }
    for expectation in ColumnPairMapExpectation::all() {
        registry.register(Arc::new(expectation));
    }
    for expectation in ColumnAggregateBetween::all() {
        registry.register(Arc::new(expectation));
    }
    registry.register(Arc::new(ExpectColumnDistinctValuesToBeInSet::default()));
    registry.register(Arc::new(ExpectTableRowCountToBeBetween::default()));
    registry.register(Arc::new(ExpectTableRowCountToEqual::default()));
    registry.register(Arc::new(ExpectTableColumnCountToEqual::default()));
    registry.register(Arc::new(ExpectTableColumnsToMatchOrderedList::default()));
    registry.register(Arc::new(ExpectColumnToExist::default()));
}

static CORE_EXPECTATIONS: Lazy<Arc<ExpectationRegistry>> =
    Lazy::new(|| Arc::new(ExpectationRegistry::with_core_expectations()));

/// The process-wide registry of built-in expectations.
pub fn core_registry() -> Arc<ExpectationRegistry> {
    CORE_EXPECTATIONS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::map::ColumnConditionKind;

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("ExpectColumnToExist"), "expect_column_to_exist");
        assert_eq!(
            camel_to_snake("ExpectColumnDistinctValuesToBeInSet"),
            "expect_column_distinct_values_to_be_in_set"
        );
        assert_eq!(camel_to_snake("HTTPResponse"), "http_response");
    }

    #[test]
    fn test_core_catalog() {
        let registry = core_registry();
        assert_eq!(registry.len(), 27);
        for name in [
            "expect_column_values_to_not_be_null",
            "expect_column_value_lengths_to_equal",
            "expect_column_pair_values_a_to_be_greater_than_b",
            "expect_column_proportion_of_unique_values_to_be_between",
            "expect_table_columns_to_match_ordered_list",
        ] {
            assert!(registry.contains(name), "{name} missing");
        }
        let err = registry.get("expect_the_unexpected").unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_reregistration() {
        let mut registry = ExpectationRegistry::new();
        let name = registry.register(Arc::new(ColumnMapExpectation::new(ColumnConditionKind::InSet)));
        registry.register(Arc::new(ColumnMapExpectation::new(ColumnConditionKind::InSet)));
        assert_eq!(registry.len(), 1);

        registry.register_as(
            name.clone(),
            Arc::new(ColumnMapExpectation::new(ColumnConditionKind::NotInSet)),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(&name).unwrap().expectation_type(),
            "expect_column_values_to_not_be_in_set"
        );
    }
}
