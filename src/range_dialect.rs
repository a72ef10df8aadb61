//! Bracket-range queries for the geo/vector search engine: `year:[2020 TO *]`.
//!
//! Values are bare tokens; reserved characters and whitespace are escaped.
//! There is no existence query, so null checks and comparisons with null
//! are unsupported.

use crate::ast::{Expression, ExpressionType, Key, Value};
use crate::converter::{comparison_operands, ConvertError, FilterConverter};
use crate::lucene_dialect::escape_query_term;

#[derive(Debug, Clone, Copy, Default)]
pub struct RangeFilterConverter;

impl RangeFilterConverter {
    pub fn new() -> Self {
        RangeFilterConverter
    }

    /// `key:<open><lower> TO <upper><close>`; the unbounded side is `*`.
    fn do_range(&self, expression: &Expression, open: &str, lower: bool, close: &str, out: &mut String) -> Result<(), ConvertError> {
        let (key, value) = comparison_operands(expression)?;
        self.do_key(key, out)?;
        out.push_str(open);
        if lower {
            self.do_single_value(value, out)?;
            out.push_str(" TO *");
        } else {
            out.push_str("* TO ");
            self.do_single_value(value, out)?;
        }
        out.push_str(close);
        Ok(())
    }

    /// `key:value` or `key:(a OR b)`, optionally prefixed with `NOT `.
    fn do_match(&self, expression: &Expression, negated: bool, out: &mut String) -> Result<(), ConvertError> {
        let (_, value) = comparison_operands(expression)?;
        if matches!(value, Value::Null) {
            return Err(ConvertError::unsupported(expression.kind, self.dialect()));
        }
        if negated {
            out.push_str("NOT ");
        }
        self.do_comparison(expression, "", out)
    }
}

impl FilterConverter for RangeFilterConverter {
    fn dialect(&self) -> &'static str {
        "range"
    }

    fn do_expression(&self, expression: &Expression, out: &mut String) -> Result<(), ConvertError> {
        match expression.kind {
            ExpressionType::And => self.do_flat_logical(expression, " AND ", out),
            ExpressionType::Or => self.do_flat_logical(expression, " OR ", out),
            ExpressionType::Not => self.do_flat_negation(expression, "NOT ", out),
            ExpressionType::Eq | ExpressionType::In => self.do_match(expression, false, out),
            ExpressionType::Ne | ExpressionType::Nin => self.do_match(expression, true, out),
            ExpressionType::Gt => self.do_range(expression, "{", true, "}", out),
            ExpressionType::Gte => self.do_range(expression, "[", true, "]", out),
            ExpressionType::Lt => self.do_range(expression, "{", false, "}", out),
            ExpressionType::Lte => self.do_range(expression, "[", false, "]", out),
            ExpressionType::IsNull | ExpressionType::IsNotNull => {
                Err(ConvertError::unsupported(expression.kind, self.dialect()))
            }
        }
    }

    fn do_key(&self, key: &Key, out: &mut String) -> Result<(), ConvertError> {
        out.push_str(&escape_query_term(key.unquoted()));
        out.push(':');
        Ok(())
    }

    fn do_string(&self, text: &str, out: &mut String) {
        if text.is_empty() {
            out.push_str("\"\"");
        } else {
            out.push_str(&escape_query_term(text));
        }
    }

    fn do_start_value_range(&self, out: &mut String) {
        out.push('(');
    }

    fn do_add_value_range_splitter(&self, out: &mut String) {
        out.push_str(" OR ");
    }

    fn do_end_value_range(&self, out: &mut String) {
        out.push(')');
    }
}
