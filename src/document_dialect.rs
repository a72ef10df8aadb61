//! Document-store JSON filters: `{"country": {"$eq": "BG"}}`.
//!
//! Connectives nest as `{"$and": [left,right]}`. JSON carries its own
//! structure, so groups render without boundaries, and `NOT` is pushed into
//! the subtree with [`Expression::negate`](crate::ast::Expression::negate).

use crate::ast::{Expression, ExpressionType, Group, Key};
use crate::converter::{comparison_operands, logical_operands, negated_operand, null_check_key, ConvertError, FilterConverter};

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFilterConverter;

impl DocumentFilterConverter {
    pub fn new() -> Self {
        DocumentFilterConverter
    }

    /// `{"key": {"$op": value}}`
    fn do_field_test(&self, expression: &Expression, operator: &str, out: &mut String) -> Result<(), ConvertError> {
        let (key, value) = comparison_operands(expression)?;
        out.push('{');
        self.do_key(key, out)?;
        out.push_str(": {\"");
        out.push_str(operator);
        out.push_str("\": ");
        self.do_value(value, out)?;
        out.push_str("}}");
        Ok(())
    }

    /// `{"$op": [left,right]}`
    fn do_connective(&self, expression: &Expression, operator: &str, out: &mut String) -> Result<(), ConvertError> {
        let (left, right) = logical_operands(expression)?;
        out.push_str("{\"");
        out.push_str(operator);
        out.push_str("\": [");
        self.convert_operand(left, out)?;
        out.push(',');
        self.convert_operand(right, out)?;
        out.push_str("]}");
        Ok(())
    }

    fn do_exists(&self, expression: &Expression, exists: bool, out: &mut String) -> Result<(), ConvertError> {
        let key = null_check_key(expression)?;
        out.push('{');
        self.do_key(key, out)?;
        out.push_str(if exists {
            ": {\"$exists\": true}}"
        } else {
            ": {\"$exists\": false}}"
        });
        Ok(())
    }
}

impl FilterConverter for DocumentFilterConverter {
    fn dialect(&self) -> &'static str {
        "document"
    }

    fn do_expression(&self, expression: &Expression, out: &mut String) -> Result<(), ConvertError> {
        match expression.kind {
            ExpressionType::And => self.do_connective(expression, "$and", out),
            ExpressionType::Or => self.do_connective(expression, "$or", out),
            ExpressionType::Not => {
                let operand = negated_operand(expression)?;
                self.convert_operand(&operand.negate(), out)
            }
            ExpressionType::Eq => self.do_field_test(expression, "$eq", out),
            ExpressionType::Ne => self.do_field_test(expression, "$ne", out),
            ExpressionType::Gt => self.do_field_test(expression, "$gt", out),
            ExpressionType::Gte => self.do_field_test(expression, "$gte", out),
            ExpressionType::Lt => self.do_field_test(expression, "$lt", out),
            ExpressionType::Lte => self.do_field_test(expression, "$lte", out),
            ExpressionType::In => self.do_field_test(expression, "$in", out),
            ExpressionType::Nin => self.do_field_test(expression, "$nin", out),
            ExpressionType::IsNull => self.do_exists(expression, false, out),
            ExpressionType::IsNotNull => self.do_exists(expression, true, out),
        }
    }

    fn do_key(&self, key: &Key, out: &mut String) -> Result<(), ConvertError> {
        self.do_string(key.unquoted(), out);
        Ok(())
    }

    fn do_string(&self, text: &str, out: &mut String) {
        out.push_str(&serde_json::Value::String(text.to_owned()).to_string());
    }

    fn do_start_group(&self, _group: &Group, _out: &mut String) {}

    fn do_end_group(&self, _group: &Group, _out: &mut String) {}
}
