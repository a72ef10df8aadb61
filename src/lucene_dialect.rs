//! Lucene query strings: `country:"BG" AND year:[2020 TO *]`.
//!
//! The query parser has no comparison operators, so ordering tests become
//! open-ended ranges and membership becomes a disjunction of term queries.

use crate::ast::{Expression, ExpressionType, Key, Value};
use crate::converter::{comparison_operands, null_check_key, ConvertError, FilterConverter};
use serde::{Deserialize, Serialize};

/// Characters with a meaning in the query syntax.
const RESERVED: &[char] = &[
    '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

/// Backslash-escapes reserved characters and whitespace so `text` reads as one term.
pub fn escape_query_term(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) || c.is_whitespace() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuceneFilterConverter {
    /// Prepended to every field name, e.g. `metadata.`.
    pub key_prefix: String,
}

impl LuceneFilterConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// `key:value`
    fn do_term(&self, key: &Key, value: &Value, out: &mut String) -> Result<(), ConvertError> {
        self.do_key(key, out)?;
        out.push(':');
        self.do_single_value(value, out)
    }

    fn do_exists(&self, key: &Key, exists: bool, out: &mut String) -> Result<(), ConvertError> {
        if !exists {
            out.push_str("NOT ");
        }
        out.push_str("_exists_:");
        self.do_key(key, out)
    }

    fn do_match(&self, expression: &Expression, negated: bool, out: &mut String) -> Result<(), ConvertError> {
        let (key, value) = comparison_operands(expression)?;
        if matches!(value, Value::Null) {
            return self.do_exists(key, negated, out);
        }
        if negated {
            out.push_str("NOT ");
        }
        self.do_term(key, value, out)
    }

    /// `key:{value TO *]` and friends; `open`/`close` pick inclusive or exclusive bounds.
    fn do_range(
        &self,
        expression: &Expression,
        open: char,
        close: char,
        lower_bound: bool,
        out: &mut String,
    ) -> Result<(), ConvertError> {
        let (key, value) = comparison_operands(expression)?;
        self.do_key(key, out)?;
        out.push(':');
        out.push(open);
        if lower_bound {
            self.do_single_value(value, out)?;
            out.push_str(" TO *");
        } else {
            out.push_str("* TO ");
            self.do_single_value(value, out)?;
        }
        out.push(close);
        Ok(())
    }

    /// `(key:a OR key:b)`
    fn do_any_of(&self, expression: &Expression, negated: bool, out: &mut String) -> Result<(), ConvertError> {
        let (key, value) = comparison_operands(expression)?;
        let items = match value {
            Value::List(items) => items.as_slice(),
            scalar => std::slice::from_ref(scalar),
        };
        if negated {
            out.push_str("NOT ");
        }
        out.push('(');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(" OR ");
            }
            self.do_term(key, item, out)?;
        }
        out.push(')');
        Ok(())
    }
}

impl FilterConverter for LuceneFilterConverter {
    fn dialect(&self) -> &'static str {
        "lucene"
    }

    fn do_expression(&self, expression: &Expression, out: &mut String) -> Result<(), ConvertError> {
        match expression.kind {
            ExpressionType::And => self.do_flat_logical(expression, " AND ", out),
            ExpressionType::Or => self.do_flat_logical(expression, " OR ", out),
            ExpressionType::Not => self.do_flat_negation(expression, "NOT ", out),
            ExpressionType::Eq => self.do_match(expression, false, out),
            ExpressionType::Ne => self.do_match(expression, true, out),
            ExpressionType::Gt => self.do_range(expression, '{', ']', true, out),
            ExpressionType::Gte => self.do_range(expression, '[', ']', true, out),
            ExpressionType::Lt => self.do_range(expression, '[', '}', false, out),
            ExpressionType::Lte => self.do_range(expression, '[', ']', false, out),
            ExpressionType::In => self.do_any_of(expression, false, out),
            ExpressionType::Nin => self.do_any_of(expression, true, out),
            ExpressionType::IsNull => self.do_exists(null_check_key(expression)?, false, out),
            ExpressionType::IsNotNull => self.do_exists(null_check_key(expression)?, true, out),
        }
    }

    fn do_key(&self, key: &Key, out: &mut String) -> Result<(), ConvertError> {
        out.push_str(&self.key_prefix);
        out.push_str(&escape_query_term(key.unquoted()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Group;
    use crate::parser::parse_filter;

    fn convert(expression: &Expression) -> String {
        LuceneFilterConverter::new().convert(expression).unwrap()
    }

    #[test]
    fn test_escape_query_term() {
        assert_eq!(escape_query_term("plain"), "plain");
        assert_eq!(escape_query_term("a b"), r"a\ b");
        assert_eq!(escape_query_term("a:b(c)"), r"a\:b\(c\)");
        assert_eq!(escape_query_term(r"x\y/z"), r"x\\y\/z");
        assert_eq!(escape_query_term("2024-03-01"), r"2024\-03\-01");
    }

    #[test]
    fn test_equality() {
        assert_eq!(convert(&Expression::eq("country", "BG")), "country:\"BG\"");
        assert_eq!(convert(&Expression::ne("country", "BG")), "NOT country:\"BG\"");
        assert_eq!(convert(&Expression::eq("year", 2020)), "year:2020");
        assert_eq!(convert(&Expression::eq("isOpen", true)), "isOpen:true");
    }

    #[test]
    fn test_equality_with_null() {
        let eq_null = Expression::binary(ExpressionType::Eq, Key::new("owner"), Value::Null);
        let ne_null = Expression::binary(ExpressionType::Ne, Key::new("owner"), Value::Null);
        assert_eq!(convert(&eq_null), "NOT _exists_:owner");
        assert_eq!(convert(&ne_null), "_exists_:owner");
    }

    #[test]
    fn test_ranges() {
        assert_eq!(convert(&Expression::gt("year", 2020)), "year:{2020 TO *]");
        assert_eq!(convert(&Expression::gte("year", 2020)), "year:[2020 TO *]");
        assert_eq!(convert(&Expression::lt("year", 2020)), "year:[* TO 2020}");
        assert_eq!(convert(&Expression::lte("year", 2020)), "year:[* TO 2020]");
        assert_eq!(
            convert(&Expression::and(
                Expression::gte("temperature", -15.6),
                Expression::lte("temperature", 20.13)
            )),
            "temperature:[-15.6 TO *] AND temperature:[* TO 20.13]"
        );
    }

    #[test]
    fn test_membership() {
        assert_eq!(
            convert(&Expression::in_list("genre", vec!["comedy", "drama"])),
            "(genre:\"comedy\" OR genre:\"drama\")"
        );
        assert_eq!(
            convert(&Expression::nin("status", vec!["A", "B", "C"])),
            "NOT (status:\"A\" OR status:\"B\" OR status:\"C\")"
        );
        assert_eq!(convert(&Expression::in_list("tags", Vec::<i64>::new())), "()");
    }

    #[test]
    fn test_boolean_structure() {
        let expression = Expression::and(
            Group::new(Expression::or(Expression::gte("year", 2020), Expression::eq("country", "BG"))),
            Expression::not(Expression::in_list("city", vec!["Sofia", "Plovdiv"])),
        );
        assert_eq!(
            convert(&expression),
            "(year:[2020 TO *] OR country:\"BG\") AND NOT (city:\"Sofia\" OR city:\"Plovdiv\")"
        );
    }

    #[test]
    fn test_mixed_connectives_are_parenthesized() {
        let expression = parse_filter("a == 1 || b == 2 && c == 3").unwrap();
        assert_eq!(convert(&expression), "a:1 OR (b:2 AND c:3)");
        let expression = parse_filter("a == 1 && b == 2 || c == 3").unwrap();
        assert_eq!(convert(&expression), "(a:1 AND b:2) OR c:3");
        let negated = Expression::not(Expression::or(Expression::eq("a", 1), Expression::eq("b", 2)));
        assert_eq!(convert(&negated), "NOT (a:1 OR b:2)");
    }

    #[test]
    fn test_null_checks() {
        assert_eq!(convert(&Expression::is_null("owner")), "NOT _exists_:owner");
        assert_eq!(convert(&Expression::is_not_null("owner")), "_exists_:owner");
    }

    #[test]
    fn test_key_prefix_and_escaping() {
        let converter = LuceneFilterConverter::new().with_key_prefix("metadata.");
        assert_eq!(
            converter.convert(&Expression::eq("\"country 1 2 3\"", "BG")).unwrap(),
            "metadata.country\\ 1\\ 2\\ 3:\"BG\""
        );
        assert_eq!(
            convert(&Expression::eq("title", "say \"hi\" \\o/")),
            r#"title:"say \"hi\" \\o/""#
        );
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            convert(&Expression::gte("created", "2024-03-01T10:15:00Z")),
            "created:[\"2024-03-01T10:15:00Z\" TO *]"
        );
    }
}
