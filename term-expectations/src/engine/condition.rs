//! Row-condition parsing into DataFusion filter expressions.
//!
//! Two dialects are understood:
//!
//! - `sql`: a DataFusion SQL expression such as `price > 0 AND region = 'EU'`,
//!   screened by [`SqlSecurity`] and parsed against the frame's schema.
//! - `portable`: a small boolean syntax that does not depend on any backend:
//!
//! ```text
//! col("price") > 0 & ~col("region").isin(["US", "CA"]) | col("note").isnull()
//! ```
//!
//! Comparisons bind tighter than `~`, which binds tighter than `&`, which
//! binds tighter than `|`. Parentheses group as usual.

use crate::core::domain::{ConditionParser, RowCondition};
use crate::error::{Result, TermError};
use crate::security::SqlSecurity;
use datafusion::logical_expr::{binary_expr, ident, lit, not, Expr, Operator};
use datafusion::prelude::DataFrame;

/// Parses a row condition into a filter expression over `data`.
pub fn parse_row_condition(data: &DataFrame, condition: &RowCondition) -> Result<Expr> {
    match condition.parser {
        ConditionParser::Sql => {
            SqlSecurity::validate_sql_expression(&condition.condition)?;
            data.parse_sql_expr(&condition.condition).map_err(|e| {
                TermError::domain_resolution(format!(
                    "unable to parse sql row_condition '{}': {e}",
                    condition.condition
                ))
            })
        }
        ConditionParser::Portable => parse_portable(&condition.condition),
    }
}

/// Parses a condition in the portable dialect.
pub fn parse_portable(text: &str) -> Result<Expr> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        text,
    };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    And,
    Or,
    Not,
    Cmp(Operator),
    Str(String),
    Int(i64),
    Float(f64),
    Ident(String),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let fail = |msg: String| {
        TermError::domain_resolution(format!("unable to parse row_condition '{text}': {msg}"))
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Or);
                i += 1;
            }
            '~' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (Operator::Eq, 2),
                    ('!', Some('=')) => (Operator::NotEq, 2),
                    ('<', Some('=')) => (Operator::LtEq, 2),
                    ('>', Some('=')) => (Operator::GtEq, 2),
                    ('<', _) => (Operator::Lt, 1),
                    ('>', _) => (Operator::Gt, 1),
                    _ => return Err(fail(format!("unexpected '{c}' at position {i}"))),
                };
                tokens.push(Token::Cmp(op));
                i += width;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(fail("unterminated string literal".into())),
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                value.push(*escaped);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            '.' if !chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E'))
                {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                if let Ok(n) = literal.parse::<i64>() {
                    tokens.push(Token::Int(n));
                } else if let Ok(f) = literal.parse::<f64>() {
                    tokens.push(Token::Float(f));
                } else {
                    return Err(fail(format!("invalid number '{literal}'")));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(fail(format!("unexpected '{other}' at position {i}"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    text: &'a str,
}

impl Parser<'_> {
    fn error(&self, msg: &str) -> TermError {
        TermError::domain_resolution(format!(
            "unable to parse row_condition '{}': {msg} (token {})",
            self.text, self.pos
        ))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            _ => Err(self.error(&format!("expected {expected:?}"))),
        }
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            left = left.or(self.and_expr()?);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            left = left.and(self.unary()?);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(not(self.unary()?));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.primary()?;
        if let Some(Token::Cmp(op)) = self.peek().cloned() {
            self.pos += 1;
            let right = self.primary()?;
            return Ok(binary_expr(left, op, right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                self.methods(inner)
            }
            Some(Token::Ident(name)) if name == "col" => {
                self.expect(Token::LParen)?;
                let column = match self.next() {
                    Some(Token::Str(column)) => column,
                    _ => return Err(self.error("col() takes a quoted column name")),
                };
                self.expect(Token::RParen)?;
                self.methods(ident(column))
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "True" | "true" => Ok(lit(true)),
                "False" | "false" => Ok(lit(false)),
                "None" | "null" => Ok(lit(datafusion::scalar::ScalarValue::Null)),
                _ => Err(self.error(&format!("unknown name '{name}'"))),
            },
            Some(token) => self.literal(token),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn literal(&self, token: Token) -> Result<Expr> {
        match token {
            Token::Str(s) => Ok(lit(s)),
            Token::Int(n) => Ok(lit(n)),
            Token::Float(f) => Ok(lit(f)),
            other => Err(self.error(&format!("unexpected {other:?}"))),
        }
    }

    fn methods(&mut self, mut expr: Expr) -> Result<Expr> {
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                _ => return Err(self.error("expected a method name after '.'")),
            };
            self.expect(Token::LParen)?;
            expr = match name.as_str() {
                "isnull" | "isna" => {
                    self.expect(Token::RParen)?;
                    expr.is_null()
                }
                "notnull" | "notna" => {
                    self.expect(Token::RParen)?;
                    expr.is_not_null()
                }
                "isin" => {
                    self.expect(Token::LBracket)?;
                    let mut items = Vec::new();
                    while self.peek() != Some(&Token::RBracket) {
                        let token = self
                            .next()
                            .ok_or_else(|| self.error("unterminated list"))?;
                        items.push(match token {
                            Token::Ident(ref b) if b == "True" || b == "true" => lit(true),
                            Token::Ident(ref b) if b == "False" || b == "false" => lit(false),
                            other => self.literal(other)?,
                        });
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                        }
                    }
                    self.expect(Token::RBracket)?;
                    self.expect(Token::RParen)?;
                    expr.in_list(items, false)
                }
                other => return Err(self.error(&format!("unknown method '{other}'"))),
            };
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, RecordBatch, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use datafusion::prelude::SessionContext;
    use std::sync::Arc;

    fn frame() -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Int64, true),
            Field::new("region", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(1), Some(5), Some(10), None])),
                Arc::new(StringArray::from(vec![Some("EU"), Some("US"), None, Some("EU")])),
            ],
        )
        .unwrap();
        SessionContext::new().read_batch(batch).unwrap()
    }

    async fn count(condition: &str, parser: ConditionParser) -> usize {
        let df = frame();
        let expr = parse_row_condition(
            &df,
            &RowCondition {
                condition: condition.to_string(),
                parser,
            },
        )
        .unwrap();
        df.filter(expr).unwrap().count().await.unwrap()
    }

    #[tokio::test]
    async fn test_portable_conditions() {
        assert_eq!(count(r#"col("x") > 2"#, ConditionParser::Portable).await, 2);
        assert_eq!(
            count(r#"col("x") >= 5 & col("region").notnull()"#, ConditionParser::Portable).await,
            1
        );
        assert_eq!(
            count(r#"col("region") == 'EU' | col("x").isnull()"#, ConditionParser::Portable).await,
            2
        );
        assert_eq!(
            count(r#"~(col("region").isin(["EU", "US"]))"#, ConditionParser::Portable).await,
            0
        );
        assert_eq!(count(r#"col("x").isin([1, 10])"#, ConditionParser::Portable).await, 2);
        assert_eq!(count(r#"col("x") != -1"#, ConditionParser::Portable).await, 3);
    }

    #[tokio::test]
    async fn test_sql_conditions() {
        assert_eq!(count("x > 2", ConditionParser::Sql).await, 2);
        assert_eq!(count("region = 'EU' AND x IS NOT NULL", ConditionParser::Sql).await, 1);
    }

    #[test]
    fn test_malformed_conditions_fail() {
        for bad in [
            r#"col("x") >"#,
            r#"col(x) > 1"#,
            r#"col("x") = 1"#,
            r#"col("x").explode()"#,
            r#"col("x") > 1)"#,
            r#"col("x") == "unterminated"#,
        ] {
            assert!(
                matches!(parse_portable(bad), Err(TermError::DomainResolution(_))),
                "{bad} should fail"
            );
        }
    }

    #[test]
    fn test_sql_screening() {
        let df = frame();
        let condition = RowCondition {
            condition: "x > 1; DROP TABLE t".into(),
            parser: ConditionParser::Sql,
        };
        assert!(matches!(
            parse_row_condition(&df, &condition),
            Err(TermError::SecurityError(_))
        ));
    }
}
