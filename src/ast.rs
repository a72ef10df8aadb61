//! Backend-independent filter expression tree.
//!
//! A filter is an [`Expression`] whose operands are [`Key`]s, [`Value`]s,
//! nested expressions or [`Group`]s. The tree is immutable once built and is
//! shared by every dialect converter.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fmt;

/// Canonical timestamp layout. String values matching it are treated as dates.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Metadata field name, kept exactly as written (including any quotes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    pub fn new(raw: impl Into<String>) -> Self {
        Key(raw.into())
    }

    /// The key text as written, including surrounding quotes if any.
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// `true` when the key is wrapped in a matching pair of `"` or `'`.
    pub fn is_quoted(&self) -> bool {
        let bytes = self.0.as_bytes();
        bytes.len() >= 2
            && (bytes[0] == b'"' || bytes[0] == b'\'')
            && bytes[bytes.len() - 1] == bytes[0]
    }

    /// The key with one layer of outer quotes removed.
    pub fn unquoted(&self) -> &str {
        if self.is_quoted() {
            &self.0[1..self.0.len() - 1]
        } else {
            &self.0
        }
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Key::new(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Key(raw)
    }
}

/// Typed literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    /// Only valid as the right operand of `IN` / `NIN`.
    List(Vec<Value>),
}

impl Value {
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

/// Operator tag of an [`Expression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    And,
    Or,
    Not,
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    IsNull,
    IsNotNull,
}

impl ExpressionType {
    pub fn name(&self) -> &'static str {
        match self {
            ExpressionType::And => "AND",
            ExpressionType::Or => "OR",
            ExpressionType::Not => "NOT",
            ExpressionType::Eq => "EQ",
            ExpressionType::Ne => "NE",
            ExpressionType::Gt => "GT",
            ExpressionType::Gte => "GTE",
            ExpressionType::Lt => "LT",
            ExpressionType::Lte => "LTE",
            ExpressionType::In => "IN",
            ExpressionType::Nin => "NIN",
            ExpressionType::IsNull => "ISNULL",
            ExpressionType::IsNotNull => "ISNOTNULL",
        }
    }

    /// `EQ`, `NE`, `GT`, `GTE`, `LT`, `LTE`.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            ExpressionType::Eq
                | ExpressionType::Ne
                | ExpressionType::Gt
                | ExpressionType::Gte
                | ExpressionType::Lt
                | ExpressionType::Lte
        )
    }

    /// `IN`, `NIN`.
    pub fn is_membership(&self) -> bool {
        matches!(self, ExpressionType::In | ExpressionType::Nin)
    }

    /// The operator producing the logical complement of a leaf test.
    fn complement(&self) -> Option<ExpressionType> {
        match self {
            ExpressionType::Eq => Some(ExpressionType::Ne),
            ExpressionType::Ne => Some(ExpressionType::Eq),
            ExpressionType::Gt => Some(ExpressionType::Lte),
            ExpressionType::Gte => Some(ExpressionType::Lt),
            ExpressionType::Lt => Some(ExpressionType::Gte),
            ExpressionType::Lte => Some(ExpressionType::Gt),
            ExpressionType::In => Some(ExpressionType::Nin),
            ExpressionType::Nin => Some(ExpressionType::In),
            ExpressionType::IsNull => Some(ExpressionType::IsNotNull),
            ExpressionType::IsNotNull => Some(ExpressionType::IsNull),
            ExpressionType::And | ExpressionType::Or | ExpressionType::Not => None,
        }
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that can stand on either side of an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Key(Key),
    Value(Value),
    Expression(Box<Expression>),
    Group(Box<Group>),
}

impl Operand {
    /// Logical complement of a boolean operand; keys and values are returned unchanged.
    pub fn negate(&self) -> Operand {
        match self {
            Operand::Expression(expression) => Operand::from(expression.negate()),
            Operand::Group(group) => Operand::from(Group::new(group.content.negate())),
            other => other.clone(),
        }
    }
}

impl From<Key> for Operand {
    fn from(key: Key) -> Self {
        Operand::Key(key)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<Expression> for Operand {
    fn from(expression: Expression) -> Self {
        Operand::Expression(Box::new(expression))
    }
}

impl From<Group> for Operand {
    fn from(group: Group) -> Self {
        Operand::Group(Box::new(group))
    }
}

/// An operator applied to one or two operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionType,
    pub left: Operand,
    pub right: Option<Operand>,
}

impl Expression {
    pub fn new(kind: ExpressionType, left: impl Into<Operand>, right: Option<Operand>) -> Self {
        Expression {
            kind,
            left: left.into(),
            right,
        }
    }

    pub fn binary(kind: ExpressionType, left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Expression::new(kind, left, Some(right.into()))
    }

    pub fn unary(kind: ExpressionType, operand: impl Into<Operand>) -> Self {
        Expression::new(kind, operand, None)
    }

    fn test(kind: ExpressionType, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Expression::binary(kind, key.into(), value.into())
    }

    pub fn eq(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Expression::test(ExpressionType::Eq, key, value)
    }

    pub fn ne(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Expression::test(ExpressionType::Ne, key, value)
    }

    pub fn gt(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Expression::test(ExpressionType::Gt, key, value)
    }

    pub fn gte(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Expression::test(ExpressionType::Gte, key, value)
    }

    pub fn lt(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Expression::test(ExpressionType::Lt, key, value)
    }

    pub fn lte(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Expression::test(ExpressionType::Lte, key, value)
    }

    pub fn in_list(key: impl Into<Key>, values: impl Into<Value>) -> Self {
        Expression::test(ExpressionType::In, key, values)
    }

    pub fn nin(key: impl Into<Key>, values: impl Into<Value>) -> Self {
        Expression::test(ExpressionType::Nin, key, values)
    }

    pub fn is_null(key: impl Into<Key>) -> Self {
        Expression::unary(ExpressionType::IsNull, key.into())
    }

    pub fn is_not_null(key: impl Into<Key>) -> Self {
        Expression::unary(ExpressionType::IsNotNull, key.into())
    }

    pub fn and(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Expression::binary(ExpressionType::And, left, right)
    }

    pub fn or(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Expression::binary(ExpressionType::Or, left, right)
    }

    pub fn not(operand: impl Into<Operand>) -> Self {
        Expression::unary(ExpressionType::Not, operand)
    }

    /// Logical complement without a `NOT` node at the root.
    ///
    /// Leaf tests flip to their complementary operator, `AND`/`OR` follow
    /// De Morgan and `NOT x` collapses to `x`. A `NOT` whose operand is not
    /// boolean is returned unchanged so that converters can reject it.
    pub fn negate(&self) -> Expression {
        match self.kind {
            ExpressionType::And | ExpressionType::Or => {
                let kind = if self.kind == ExpressionType::And {
                    ExpressionType::Or
                } else {
                    ExpressionType::And
                };
                Expression {
                    kind,
                    left: self.left.negate(),
                    right: self.right.as_ref().map(Operand::negate),
                }
            }
            ExpressionType::Not => match &self.left {
                Operand::Expression(inner) => inner.as_ref().clone(),
                Operand::Group(group) => group.content.clone(),
                _ => self.clone(),
            },
            kind => Expression {
                kind: kind.complement().unwrap_or(kind),
                left: self.left.clone(),
                right: self.right.clone(),
            },
        }
    }
}

/// Explicit parentheses around an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub content: Expression,
}

impl Group {
    pub fn new(content: Expression) -> Self {
        Group { content }
    }
}

/// Parses a string in [`TIMESTAMP_FORMAT`], e.g. `2024-03-01T10:15:00Z`.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if text.len() != 20 {
        return None;
    }
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn format_timestamp(date: &DateTime<Utc>) -> String {
    date.format(TIMESTAMP_FORMAT).to_string()
}

/// Renders a float so that it always reads back as a float (`-100.0`, not `-100`).
pub fn format_float(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains(|c: char| c == '.' || c == 'e' || c == 'E') {
        format!("{text}.0")
    } else {
        text
    }
}

// Canonical filter-language printer. The output reparses to the same tree.

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in text.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::String(s) => write_quoted(f, s),
            Value::Date(d) => write_quoted(f, &format_timestamp(d)),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Binding strength used by the printer: OR < AND < everything else.
fn precedence(operand: &Operand) -> u8 {
    match operand {
        Operand::Expression(e) if e.kind == ExpressionType::Or => 1,
        Operand::Expression(e) if e.kind == ExpressionType::And => 2,
        _ => 3,
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Operand, parenthesize: bool) -> fmt::Result {
    if parenthesize {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Key(key) => write!(f, "{key}"),
            Operand::Value(value) => write!(f, "{value}"),
            Operand::Expression(expression) => write!(f, "{expression}"),
            Operand::Group(group) => write!(f, "{group}"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self.kind {
            ExpressionType::And => " && ",
            ExpressionType::Or => " || ",
            ExpressionType::Eq => " == ",
            ExpressionType::Ne => " != ",
            ExpressionType::Gt => " > ",
            ExpressionType::Gte => " >= ",
            ExpressionType::Lt => " < ",
            ExpressionType::Lte => " <= ",
            ExpressionType::In => " in ",
            ExpressionType::Nin => " not in ",
            ExpressionType::Not => {
                f.write_str("NOT ")?;
                return write_operand(f, &self.left, precedence(&self.left) < 3);
            }
            ExpressionType::IsNull => return write!(f, "{} is null", self.left),
            ExpressionType::IsNotNull => return write!(f, "{} is not null", self.left),
        };

        // Connectives are left-associative: a right child of equal strength needs parentheses.
        let own = match self.kind {
            ExpressionType::Or => 1,
            ExpressionType::And => 2,
            _ => 3,
        };
        write_operand(f, &self.left, precedence(&self.left) < own)?;
        f.write_str(symbol)?;
        match &self.right {
            Some(right) => write_operand(f, right, own < 3 && precedence(right) <= own),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.content)
    }
}
