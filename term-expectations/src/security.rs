//! Screening of user-supplied expressions and patterns.
//!
//! Row conditions in the `sql` dialect and regex patterns come straight from
//! expectation configurations, so they are screened before they reach
//! DataFusion. Column names never go through here: they are passed to the
//! backend as identifiers, not spliced into SQL text.

use crate::error::{Result, TermError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Maximum length accepted for a row condition.
pub const MAX_EXPRESSION_LENGTH: usize = 5000;

/// Maximum length accepted for a regex pattern.
pub const MAX_PATTERN_LENGTH: usize = 1000;

/// Screening for SQL expressions and regex patterns.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates a regex pattern for safety.
    ///
    /// Rejects overlong patterns, null bytes, patterns that do not compile and
    /// the textbook catastrophic-backtracking shapes.
    pub fn validate_regex_pattern(pattern: &str) -> Result<()> {
        if pattern.len() > MAX_PATTERN_LENGTH {
            return Err(TermError::SecurityError(format!(
                "Regex pattern too long (max {MAX_PATTERN_LENGTH} characters)"
            )));
        }

        if pattern.contains('\0') {
            return Err(TermError::SecurityError(
                "Regex pattern cannot contain null bytes".to_string(),
            ));
        }

        if let Err(e) = Regex::new(pattern) {
            return Err(TermError::SecurityError(format!(
                "Invalid regex pattern: {e}"
            )));
        }

        Self::check_redos_patterns(pattern)
    }

    /// Validates a SQL row-condition expression for safety.
    ///
    /// Conditions are filters, so anything that looks like a statement,
    /// a subquery or a comment is refused.
    pub fn validate_sql_expression(expression: &str) -> Result<()> {
        if expression.len() > MAX_EXPRESSION_LENGTH {
            return Err(TermError::SecurityError(format!(
                "SQL expression too long (max {MAX_EXPRESSION_LENGTH} characters)"
            )));
        }

        if expression.contains('\0') {
            return Err(TermError::SecurityError(
                "SQL expression cannot contain null bytes".to_string(),
            ));
        }

        Self::check_dangerous_sql_patterns(expression)
    }

    fn check_redos_patterns(pattern: &str) -> Result<()> {
        // Only the obvious nested-quantifier shapes; anything subtler would
        // reject legitimate patterns such as email validators.
        let dangerous_patterns = &["(.*)*", "(.*)+", "(a+)+", "(a*)*"];

        for dangerous in dangerous_patterns {
            if pattern.contains(dangerous) {
                return Err(TermError::SecurityError(
                    "Regex pattern might cause ReDoS attack".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn check_dangerous_sql_patterns(expression: &str) -> Result<()> {
        static DANGEROUS_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
            [
                "drop", "create", "alter", "truncate", "insert", "update", "delete", "exec",
                "execute", "declare", "cursor", "fetch", "begin", "commit", "rollback",
                "transaction", "information_schema", "copy",
            ]
            .into_iter()
            .collect()
        });

        // Word-boundary matching so that columns like `created_at` stay usable.
        static WORD: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"[a-z_][a-z0-9_]*").expect("Hard-coded regex pattern should be valid")
        });

        let expression_lower = expression.to_lowercase();

        for word in WORD.find_iter(&expression_lower) {
            if DANGEROUS_KEYWORDS.contains(word.as_str()) {
                return Err(TermError::SecurityError(format!(
                    "SQL expression contains dangerous keyword: '{}'",
                    word.as_str()
                )));
            }
        }

        for marker in ["--", "/*", "*/"] {
            if expression_lower.contains(marker) {
                return Err(TermError::SecurityError(format!(
                    "SQL expression contains dangerous keyword: '{marker}'"
                )));
            }
        }

        static SUSPICIOUS: Lazy<Vec<Regex>> = Lazy::new(|| {
            [
                r";",
                r"union\s+select",
                r"'\s*or\s+'",
                r"'\s*and\s+'",
                r"\(\s*select\s",
            ]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
        });

        for pattern in SUSPICIOUS.iter() {
            if pattern.is_match(&expression_lower) {
                return Err(TermError::SecurityError(format!(
                    "SQL expression contains suspicious pattern matching: {}",
                    pattern.as_str()
                )));
            }
        }

        Ok(())
    }
}
