//! The dialect-independent tree walker.
//!
//! [`FilterConverter`] fixes the traversal order and leaves every syntax
//! decision to the implementing dialect:
//!
//! ```text
//! convert(expression)
//!   └─ do_expression()                 (dialect: one arm per ExpressionType)
//!        ├─ AND / OR  → do_logical()   left, symbol, right
//!        ├─ NOT       → do_negation()  symbol, operand
//!        └─ leaf      → do_comparison() do_key(), symbol, do_value()
//!                                         ├─ list   → do_start_value_range()
//!                                         │           do_single_value() (do_add_value_range_splitter())*
//!                                         │           do_end_value_range()
//!                                         └─ scalar → do_single_value()
//! convert_group(group)
//!   └─ do_group()  do_start_group(), do_expression(), do_end_group()
//! ```
//!
//! Operands are validated before they are rendered; a tree that breaks the
//! per-operator shape rules fails with [`ConvertError::MalformedOperand`]
//! instead of producing partial output.

use crate::ast::{Expression, ExpressionType, Group, Key, Operand, Value};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

pub use crate::ast::{format_float, format_timestamp as format_date, parse_timestamp as parse_date};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("unsupported expression type {kind} for the {dialect} dialect")]
    UnsupportedExpression {
        kind: ExpressionType,
        dialect: &'static str,
    },

    #[error("malformed {kind} expression: {reason}")]
    MalformedOperand { kind: ExpressionType, reason: String },
}

impl ConvertError {
    pub fn unsupported(kind: ExpressionType, dialect: &'static str) -> Self {
        ConvertError::UnsupportedExpression { kind, dialect }
    }

    pub fn malformed(kind: ExpressionType, reason: impl Into<String>) -> Self {
        ConvertError::MalformedOperand {
            kind,
            reason: reason.into(),
        }
    }
}

/// Renders an [`Expression`] tree into one native query syntax.
///
/// Implementors provide [`do_expression`](FilterConverter::do_expression) and
/// [`do_key`](FilterConverter::do_key); every other hook has a default that a
/// dialect overrides only where its grammar differs. Implementations hold
/// immutable configuration only, and each call writes into its own buffer.
pub trait FilterConverter: Send + Sync {
    /// Name used in error messages and logs.
    fn dialect(&self) -> &'static str;

    fn convert(&self, expression: &Expression) -> Result<String, ConvertError> {
        let mut out = String::new();
        self.do_expression(expression, &mut out)?;
        debug!(dialect = self.dialect(), filter = %expression, output = %out, "converted filter");
        Ok(out)
    }

    fn convert_group(&self, group: &Group) -> Result<String, ConvertError> {
        let mut out = String::new();
        self.do_group(group, &mut out)?;
        debug!(dialect = self.dialect(), filter = %group, output = %out, "converted group");
        Ok(out)
    }

    fn convert_operand(&self, operand: &Operand, out: &mut String) -> Result<(), ConvertError> {
        match operand {
            Operand::Expression(expression) => self.do_expression(expression, out),
            Operand::Group(group) => self.do_group(group, out),
            Operand::Key(key) => self.do_key(key, out),
            Operand::Value(value) => self.do_value(value, out),
        }
    }

    fn do_expression(&self, expression: &Expression, out: &mut String) -> Result<(), ConvertError>;

    fn do_key(&self, key: &Key, out: &mut String) -> Result<(), ConvertError>;

    fn do_group(&self, group: &Group, out: &mut String) -> Result<(), ConvertError> {
        self.do_start_group(group, out);
        self.do_expression(&group.content, out)?;
        self.do_end_group(group, out);
        Ok(())
    }

    fn do_start_group(&self, _group: &Group, out: &mut String) {
        out.push('(');
    }

    fn do_end_group(&self, _group: &Group, out: &mut String) {
        out.push(')');
    }

    fn do_value(&self, value: &Value, out: &mut String) -> Result<(), ConvertError> {
        match value {
            Value::List(items) => {
                self.do_start_value_range(out);
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.do_add_value_range_splitter(out);
                    }
                    self.do_single_value(item, out)?;
                }
                self.do_end_value_range(out);
                Ok(())
            }
            scalar => self.do_single_value(scalar, out),
        }
    }

    fn do_single_value(&self, value: &Value, out: &mut String) -> Result<(), ConvertError> {
        match value {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Float(x) => out.push_str(&format_float(*x)),
            Value::String(s) => match parse_date(s) {
                Some(date) => self.do_date(&date, out),
                None => self.do_string(s, out),
            },
            Value::Date(date) => self.do_date(date, out),
            Value::List(_) => return self.do_value(value, out),
        }
        Ok(())
    }

    /// Double-quoted, with `\` and `"` backslash-escaped.
    fn do_string(&self, text: &str, out: &mut String) {
        out.push('"');
        for c in text.chars() {
            if c == '\\' || c == '"' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    }

    fn do_date(&self, date: &DateTime<Utc>, out: &mut String) {
        self.do_string(&format_date(date), out);
    }

    fn do_start_value_range(&self, out: &mut String) {
        out.push('[');
    }

    fn do_add_value_range_splitter(&self, out: &mut String) {
        out.push(',');
    }

    fn do_end_value_range(&self, out: &mut String) {
        out.push(']');
    }

    /// `key symbol value` for leaf tests.
    fn do_comparison(&self, expression: &Expression, symbol: &str, out: &mut String) -> Result<(), ConvertError> {
        let (key, value) = comparison_operands(expression)?;
        self.do_key(key, out)?;
        out.push_str(symbol);
        self.do_value(value, out)
    }

    /// `left symbol right` for `AND` / `OR`.
    fn do_logical(&self, expression: &Expression, symbol: &str, out: &mut String) -> Result<(), ConvertError> {
        let (left, right) = logical_operands(expression)?;
        self.convert_operand(left, out)?;
        out.push_str(symbol);
        self.convert_operand(right, out)
    }

    /// `symbol operand` for `NOT`.
    fn do_negation(&self, expression: &Expression, symbol: &str, out: &mut String) -> Result<(), ConvertError> {
        let operand = negated_operand(expression)?;
        out.push_str(symbol);
        self.convert_operand(operand, out)
    }

    /// Like [`do_logical`](FilterConverter::do_logical), for syntaxes where AND
    /// does not bind tighter than OR: a bare child connective of the other kind
    /// is parenthesized.
    fn do_flat_logical(&self, expression: &Expression, symbol: &str, out: &mut String) -> Result<(), ConvertError> {
        let (left, right) = logical_operands(expression)?;
        self.convert_bracketed_operand(expression.kind, left, out)?;
        out.push_str(symbol);
        self.convert_bracketed_operand(expression.kind, right, out)
    }

    /// Like [`do_negation`](FilterConverter::do_negation); a bare connective operand is parenthesized.
    fn do_flat_negation(&self, expression: &Expression, symbol: &str, out: &mut String) -> Result<(), ConvertError> {
        let operand = negated_operand(expression)?;
        out.push_str(symbol);
        self.convert_bracketed_operand(expression.kind, operand, out)
    }

    fn convert_bracketed_operand(
        &self,
        parent: ExpressionType,
        operand: &Operand,
        out: &mut String,
    ) -> Result<(), ConvertError> {
        match operand {
            Operand::Expression(child) if is_connective(child.kind) && child.kind != parent => {
                out.push('(');
                self.do_expression(child, out)?;
                out.push(')');
                Ok(())
            }
            other => self.convert_operand(other, out),
        }
    }
}

fn is_connective(kind: ExpressionType) -> bool {
    matches!(kind, ExpressionType::And | ExpressionType::Or)
}

fn describe(operand: &Operand) -> &'static str {
    match operand {
        Operand::Key(_) => "a key",
        Operand::Value(_) => "a value",
        Operand::Expression(_) => "an expression",
        Operand::Group(_) => "a group",
    }
}

fn is_boolean(operand: &Operand) -> bool {
    matches!(operand, Operand::Expression(_) | Operand::Group(_))
}

fn checked_key(kind: ExpressionType, operand: &Operand) -> Result<&Key, ConvertError> {
    match operand {
        Operand::Key(key) if key.unquoted().is_empty() => {
            Err(ConvertError::malformed(kind, "key must not be empty"))
        }
        Operand::Key(key) => Ok(key),
        other => Err(ConvertError::malformed(
            kind,
            format!("left operand must be a key, found {}", describe(other)),
        )),
    }
}

/// Validates a comparison or membership test and returns its key and value.
pub fn comparison_operands(expression: &Expression) -> Result<(&Key, &Value), ConvertError> {
    let kind = expression.kind;
    if !kind.is_comparison() && !kind.is_membership() {
        return Err(ConvertError::malformed(kind, "not a comparison"));
    }

    let key = checked_key(kind, &expression.left)?;
    let value = match &expression.right {
        Some(Operand::Value(value)) => value,
        Some(other) => {
            return Err(ConvertError::malformed(
                kind,
                format!("right operand must be a value, found {}", describe(other)),
            ))
        }
        None => return Err(ConvertError::malformed(kind, "missing right operand")),
    };

    match value {
        Value::List(items) if kind.is_membership() => {
            if items.iter().any(Value::is_list) {
                return Err(ConvertError::malformed(kind, "nested lists are not supported"));
            }
        }
        _ if kind.is_membership() => {
            return Err(ConvertError::malformed(kind, "right operand must be a list"));
        }
        Value::List(_) => {
            return Err(ConvertError::malformed(kind, "right operand must be a scalar, found a list"));
        }
        Value::Null if !matches!(kind, ExpressionType::Eq | ExpressionType::Ne) => {
            return Err(ConvertError::malformed(kind, "null can only be compared with EQ or NE"));
        }
        _ => {}
    }

    let non_finite = |value: &Value| matches!(value, Value::Float(number) if !number.is_finite());
    if non_finite(value) || matches!(value, Value::List(items) if items.iter().any(non_finite)) {
        return Err(ConvertError::malformed(kind, "numbers must be finite"));
    }

    Ok((key, value))
}

/// Validates an `AND` / `OR` node and returns both sides.
pub fn logical_operands(expression: &Expression) -> Result<(&Operand, &Operand), ConvertError> {
    let kind = expression.kind;
    let right = expression
        .right
        .as_ref()
        .ok_or_else(|| ConvertError::malformed(kind, "missing right operand"))?;
    for operand in [&expression.left, right] {
        if !is_boolean(operand) {
            return Err(ConvertError::malformed(
                kind,
                format!("operands must be expressions or groups, found {}", describe(operand)),
            ));
        }
    }
    Ok((&expression.left, right))
}

/// Validates a `NOT` node and returns its operand.
pub fn negated_operand(expression: &Expression) -> Result<&Operand, ConvertError> {
    let kind = expression.kind;
    if expression.right.is_some() {
        return Err(ConvertError::malformed(kind, "takes a single operand"));
    }
    if !is_boolean(&expression.left) {
        return Err(ConvertError::malformed(
            kind,
            format!("operand must be an expression or a group, found {}", describe(&expression.left)),
        ));
    }
    Ok(&expression.left)
}

/// Validates an `ISNULL` / `ISNOTNULL` node and returns its key.
pub fn null_check_key(expression: &Expression) -> Result<&Key, ConvertError> {
    if expression.right.is_some() {
        return Err(ConvertError::malformed(expression.kind, "takes a single operand"));
    }
    checked_key(expression.kind, &expression.left)
}
