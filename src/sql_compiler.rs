//! SQL compiler that turns a filter expression into a `SELECT` over a JSON
//! metadata column using sea-query.
//!
//! Keys become `"<metadata_column>" ->> '<key>'`; the extracted text is cast
//! to `numeric` or `boolean` when compared with a number or a boolean.

use crate::ast::{format_timestamp, Expression, ExpressionType, Key, Operand, Value};
use crate::converter::{comparison_operands, logical_operands, negated_operand, null_check_key, ConvertError};
use sea_query::{Alias, Asterisk, Expr, PostgresQueryBuilder, SelectStatement, SimpleExpr};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlCompilerConfig {
    /// Table holding the documents
    pub table: String,
    /// JSON(B) column holding the metadata
    pub metadata_column: String,
    /// Minimum number of same-key equalities in an OR chain before it becomes an IN clause
    pub max_or_conditions_for_in: usize,
}

impl Default for SqlCompilerConfig {
    fn default() -> Self {
        Self {
            table: "documents".to_string(),
            metadata_column: "metadata".to_string(),
            max_or_conditions_for_in: 5,
        }
    }
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Optimization {
    OrToIn { key: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

#[derive(Debug, Clone, Default)]
pub struct SqlFilterCompiler {
    config: SqlCompilerConfig,
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// How the extracted text is cast before comparing.
fn cast_for(value: &Value) -> Option<&'static str> {
    match value {
        Value::Int(_) | Value::Float(_) => Some("numeric"),
        Value::Bool(_) => Some("boolean"),
        _ => None,
    }
}

fn sql_value(kind: ExpressionType, value: &Value) -> Result<sea_query::Value, ConvertError> {
    Ok(match value {
        Value::Null => sea_query::Value::String(None),
        Value::Bool(b) => (*b).into(),
        Value::Int(n) => (*n).into(),
        Value::Float(x) => (*x).into(),
        Value::String(s) => s.clone().into(),
        Value::Date(date) => format_timestamp(date).into(),
        Value::List(_) => return Err(ConvertError::malformed(kind, "nested lists are not supported")),
    })
}

impl SqlFilterCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SqlCompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SqlCompilerConfig {
        &self.config
    }

    /// Compile a filter into `SELECT * FROM <table> WHERE ...`
    pub fn compile(&self, expression: &Expression) -> Result<CompileResult, ConvertError> {
        let mut optimizations = Vec::new();
        let condition = self.compile_expression(expression, &mut optimizations)?;

        let mut select = SelectStatement::new();
        select
            .from(Alias::new(&self.config.table))
            .column(Asterisk)
            .and_where(condition);
        let sql = select.to_string(PostgresQueryBuilder);

        debug!(filter = %expression, sql = %sql, optimizations = optimizations.len(), "compiled filter");
        Ok(CompileResult { sql, optimizations })
    }

    fn compile_expression(
        &self,
        expression: &Expression,
        optimizations: &mut Vec<Optimization>,
    ) -> Result<SimpleExpr, ConvertError> {
        let kind = expression.kind;
        match kind {
            ExpressionType::And => {
                let (left, right) = logical_operands(expression)?;
                let left = self.compile_operand(kind, left, optimizations)?;
                let right = self.compile_operand(kind, right, optimizations)?;
                Ok(left.and(right))
            }
            ExpressionType::Or => {
                if let Some((in_expr, optimization)) = self.try_optimize_or_to_in(expression)? {
                    optimizations.push(optimization);
                    return Ok(in_expr);
                }
                let (left, right) = logical_operands(expression)?;
                let left = self.compile_operand(kind, left, optimizations)?;
                let right = self.compile_operand(kind, right, optimizations)?;
                Ok(left.or(right))
            }
            ExpressionType::Not => {
                let operand = negated_operand(expression)?;
                Ok(self.compile_operand(kind, operand, optimizations)?.not())
            }
            ExpressionType::Eq
            | ExpressionType::Ne
            | ExpressionType::Gt
            | ExpressionType::Gte
            | ExpressionType::Lt
            | ExpressionType::Lte => {
                let (key, value) = comparison_operands(expression)?;
                self.compile_comparison(kind, key, value)
            }
            ExpressionType::In | ExpressionType::Nin => {
                let (key, value) = comparison_operands(expression)?;
                let items = match value {
                    Value::List(items) => items.as_slice(),
                    scalar => std::slice::from_ref(scalar),
                };
                let column = Expr::expr(self.key_expr(key, items.first().and_then(cast_for)));
                let values = items
                    .iter()
                    .map(|item| sql_value(kind, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if kind == ExpressionType::In {
                    column.is_in(values)
                } else {
                    column.is_not_in(values)
                })
            }
            ExpressionType::IsNull => {
                let key = null_check_key(expression)?;
                Ok(Expr::expr(self.key_expr(key, None)).is_null())
            }
            ExpressionType::IsNotNull => {
                let key = null_check_key(expression)?;
                Ok(Expr::expr(self.key_expr(key, None)).is_not_null())
            }
        }
    }

    /// Groups compile to their content; sea-query parenthesizes by precedence.
    fn compile_operand(
        &self,
        parent: ExpressionType,
        operand: &Operand,
        optimizations: &mut Vec<Optimization>,
    ) -> Result<SimpleExpr, ConvertError> {
        match operand {
            Operand::Expression(expression) => self.compile_expression(expression, optimizations),
            Operand::Group(group) => self.compile_expression(&group.content, optimizations),
            Operand::Key(_) | Operand::Value(_) => Err(ConvertError::malformed(
                parent,
                "operands must be expressions or groups",
            )),
        }
    }

    fn compile_comparison(&self, kind: ExpressionType, key: &Key, value: &Value) -> Result<SimpleExpr, ConvertError> {
        if matches!(value, Value::Null) {
            let column = Expr::expr(self.key_expr(key, None));
            return match kind {
                ExpressionType::Eq => Ok(column.is_null()),
                ExpressionType::Ne => Ok(column.is_not_null()),
                _ => Err(ConvertError::malformed(kind, "null can only be compared with EQ or NE")),
            };
        }

        let column = Expr::expr(self.key_expr(key, cast_for(value)));
        let value = sql_value(kind, value)?;
        match kind {
            ExpressionType::Eq => Ok(column.eq(value)),
            ExpressionType::Ne => Ok(column.ne(value)),
            ExpressionType::Gt => Ok(column.gt(value)),
            ExpressionType::Gte => Ok(column.gte(value)),
            ExpressionType::Lt => Ok(column.lt(value)),
            ExpressionType::Lte => Ok(column.lte(value)),
            _ => Err(ConvertError::malformed(kind, "not a comparison")),
        }
    }

    /// `"<metadata_column>" ->> '<key>'`, optionally wrapped in a cast
    fn key_expr(&self, key: &Key, cast: Option<&str>) -> SimpleExpr {
        let path = Expr::cust(format!(
            "{} ->> {}",
            quote_identifier(&self.config.metadata_column),
            quote_literal(key.unquoted())
        ));
        match cast {
            Some(type_name) => Expr::expr(path).cast_as(Alias::new(type_name)),
            None => path,
        }
    }

    /// Try to fold an OR chain of equalities on one key into an IN clause
    fn try_optimize_or_to_in(&self, expression: &Expression) -> Result<Option<(SimpleExpr, Optimization)>, ConvertError> {
        let mut terms = Vec::new();
        if !collect_equality_terms(expression, &mut terms) {
            return Ok(None);
        }
        let threshold = self.config.max_or_conditions_for_in.max(2);
        let Some(&(key, first)) = terms.first() else {
            return Ok(None);
        };
        if terms.len() < threshold {
            return Ok(None);
        }
        let same_key = terms.iter().all(|(k, _)| k.unquoted() == key.unquoted());
        let same_cast = terms.iter().all(|(_, v)| cast_for(v) == cast_for(first));
        if !same_key || !same_cast {
            return Ok(None);
        }

        let values = terms
            .iter()
            .map(|(_, value)| sql_value(ExpressionType::Or, value))
            .collect::<Result<Vec<_>, _>>()?;
        let in_expr = Expr::expr(self.key_expr(key, cast_for(first))).is_in(values);
        let optimization = Optimization::OrToIn {
            key: key.unquoted().to_string(),
            value_count: terms.len(),
        };
        trace!(key = key.unquoted(), value_count = terms.len(), "folded OR chain into IN");

        Ok(Some((in_expr, optimization)))
    }
}

/// Recursively collect `key == value` leaves under OR nodes and groups.
/// Returns `false` as soon as anything else breaks the pattern.
fn collect_equality_terms<'a>(expression: &'a Expression, terms: &mut Vec<(&'a Key, &'a Value)>) -> bool {
    match expression.kind {
        ExpressionType::Or => {
            let Ok((left, right)) = logical_operands(expression) else {
                return false;
            };
            collect_operand_terms(left, terms) && collect_operand_terms(right, terms)
        }
        ExpressionType::Eq => match comparison_operands(expression) {
            Ok((_, Value::Null)) | Err(_) => false,
            Ok((key, value)) => {
                terms.push((key, value));
                true
            }
        },
        _ => false,
    }
}

fn collect_operand_terms<'a>(operand: &'a Operand, terms: &mut Vec<(&'a Key, &'a Value)>) -> bool {
    match operand {
        Operand::Expression(expression) => collect_equality_terms(expression, terms),
        Operand::Group(group) => collect_equality_terms(&group.content, terms),
        Operand::Key(_) | Operand::Value(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Group;

    fn compile(expression: &Expression) -> CompileResult {
        SqlFilterCompiler::new().compile(expression).unwrap()
    }

    #[test]
    fn test_simple_filter_compilation() {
        let result = compile(&Expression::eq("country", "BG"));
        assert_eq!(
            result.sql,
            r#"SELECT * FROM "documents" WHERE ("metadata" ->> 'country') = 'BG'"#
        );
        assert!(result.optimizations.is_empty());
    }

    #[test]
    fn test_numeric_and_boolean_casts() {
        let result = compile(&Expression::gte("year", 2020));
        assert_eq!(
            result.sql,
            r#"SELECT * FROM "documents" WHERE CAST(("metadata" ->> 'year') AS numeric) >= 2020"#
        );

        let result = compile(&Expression::eq("isOpen", true));
        assert!(result.sql.contains(r#"CAST(("metadata" ->> 'isOpen') AS boolean)"#));
    }

    #[test]
    fn test_key_literal_is_quoted() {
        let result = compile(&Expression::eq("owner's name", "x"));
        assert_eq!(
            result.sql,
            r#"SELECT * FROM "documents" WHERE ("metadata" ->> 'owner''s name') = 'x'"#
        );
    }

    #[test]
    fn test_connectives_and_groups() {
        let expression = Expression::and(
            Group::new(Expression::or(Expression::gte("year", 2020), Expression::eq("country", "BG"))),
            Expression::not(Expression::in_list("city", vec!["Sofia", "Plovdiv"])),
        );
        let result = compile(&expression);
        assert!(result.sql.contains(r#"CAST(("metadata" ->> 'year') AS numeric) >= 2020 OR ("metadata" ->> 'country') = 'BG'"#));
        assert!(result.sql.contains(" AND "));
        assert!(result.sql.contains("NOT"));
        assert!(result.sql.contains(r#"("metadata" ->> 'city') IN ('Sofia', 'Plovdiv')"#));
    }

    #[test]
    fn test_not_over_group() {
        let expression = Expression::not(Group::new(Expression::or(
            Expression::eq("a", "x"),
            Expression::eq("b", "y"),
        )));
        assert_eq!(
            compile(&expression).sql,
            r#"SELECT * FROM "documents" WHERE NOT (("metadata" ->> 'a') = 'x' OR ("metadata" ->> 'b') = 'y')"#
        );
    }

    #[test]
    fn test_membership() {
        assert_eq!(
            compile(&Expression::in_list("status", vec!["A", "B"])).sql,
            r#"SELECT * FROM "documents" WHERE ("metadata" ->> 'status') IN ('A', 'B')"#
        );
        assert_eq!(
            compile(&Expression::nin("status", vec!["A", "B"])).sql,
            r#"SELECT * FROM "documents" WHERE ("metadata" ->> 'status') NOT IN ('A', 'B')"#
        );
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(
            compile(&Expression::is_null("owner")).sql,
            r#"SELECT * FROM "documents" WHERE ("metadata" ->> 'owner') IS NULL"#
        );
        assert_eq!(
            compile(&Expression::is_not_null("owner")).sql,
            r#"SELECT * FROM "documents" WHERE ("metadata" ->> 'owner') IS NOT NULL"#
        );

        let eq_null = Expression::binary(ExpressionType::Eq, Key::new("owner"), Value::Null);
        assert!(compile(&eq_null).sql.contains("IS NULL"));
        let ne_null = Expression::binary(ExpressionType::Ne, Key::new("owner"), Value::Null);
        assert!(compile(&ne_null).sql.contains("IS NOT NULL"));
    }

    #[test]
    fn test_string_values_are_escaped() {
        let result = compile(&Expression::eq("name", "O'Brien"));
        assert!(result.sql.contains("'O''Brien'") || result.sql.contains("E'O\\'Brien'"));
    }

    #[test]
    fn test_or_to_in_optimization() {
        let config = SqlCompilerConfig {
            max_or_conditions_for_in: 3,
            ..SqlCompilerConfig::default()
        };
        let compiler = SqlFilterCompiler::with_config(config);

        let expression = Expression::or(
            Expression::or(Expression::eq("status", "Open"), Expression::eq("status", "Pending")),
            Group::new(Expression::eq("status", "Review")),
        );
        let result = compiler.compile(&expression).unwrap();

        assert_eq!(
            result.optimizations,
            vec![Optimization::OrToIn {
                key: "status".to_string(),
                value_count: 3
            }]
        );
        assert_eq!(
            result.sql,
            r#"SELECT * FROM "documents" WHERE ("metadata" ->> 'status') IN ('Open', 'Pending', 'Review')"#
        );
    }

    #[test]
    fn test_or_chain_below_threshold_is_kept() {
        let expression = Expression::or(Expression::eq("status", "Open"), Expression::eq("status", "Pending"));
        let result = compile(&expression);
        assert!(result.optimizations.is_empty());
        assert!(result.sql.contains(" OR "));
    }

    #[test]
    fn test_mixed_keys_are_not_folded() {
        let compiler = SqlFilterCompiler::with_config(SqlCompilerConfig {
            max_or_conditions_for_in: 2,
            ..SqlCompilerConfig::default()
        });
        let expression = Expression::or(Expression::eq("status", "Open"), Expression::eq("priority", "High"));
        let result = compiler.compile(&expression).unwrap();
        assert!(result.optimizations.is_empty());
    }

    #[test]
    fn test_custom_table_and_column() {
        let compiler = SqlFilterCompiler::with_config(SqlCompilerConfig {
            table: "chunks".to_string(),
            metadata_column: "meta".to_string(),
            ..SqlCompilerConfig::default()
        });
        let result = compiler.compile(&Expression::eq("\"country 1 2 3\"", "BG")).unwrap();
        assert_eq!(
            result.sql,
            r#"SELECT * FROM "chunks" WHERE ("meta" ->> 'country 1 2 3') = 'BG'"#
        );
    }

    #[test]
    fn test_malformed_expression_is_rejected() {
        let err = SqlFilterCompiler::new()
            .compile(&Expression::in_list("x", "scalar"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::MalformedOperand { kind: ExpressionType::In, .. }));

        let err = SqlFilterCompiler::new()
            .compile(&Expression::gt("x", f64::INFINITY))
            .unwrap_err();
        assert!(matches!(err, ConvertError::MalformedOperand { kind: ExpressionType::Gt, .. }));
    }
}
