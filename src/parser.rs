//! Recursive-descent parser for filter expressions.
//!
//! ## Parse flow
//!
//! ```text
//! parse()
//!   ├─ optional WHERE
//!   ├─ parse_or_expression()
//!   │    └─ parse_and_expression()          (OR: left-associative)
//!   │         └─ parse_not_expression()     (AND: left-associative)
//!   │              ├─ NOT / ! → parse_not_expression()
//!   │              └─ parse_primary_expression()
//!   │                   ├─ "(" → Group(parse_or_expression()) ")"
//!   │                   └─ identifier → parse_predicate()
//!   │                        ├─ == != > >= < <=   → parse_constant()
//!   │                        ├─ IN / NIN / NOT IN → parse_list()
//!   │                        └─ IS [NOT] NULL
//!   └─ expect <EOF>
//! ```
//!
//! ## Precedence (high to low)
//!
//! 1. **Parentheses** `(expression)`
//! 2. **Predicates** `a == 1`, `a in [1, 2]`, `a is null`
//! 3. **NOT** `NOT expression`, `!expression`
//! 4. **AND** `a && b`, `a AND b`
//! 5. **OR** `a || b`, `a OR b`
//!
//! Errors use recognizer-style messages and carry the 1-based line and column
//! of the offending token, e.g. `line 1:12 no viable alternative at input 'NL'`.

use crate::ast::{Expression, ExpressionType, Group, Key, Operand, Value};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use thiserror::Error;
use tracing::{debug, trace};

/// Returned by `peek` once the token slice is exhausted.
static END: Token<'static> = Token {
    kind: TokenKind::Eof,
    text: "<EOF>",
    span: Span { start: 0, end: 0 },
    line: 1,
    column: 1,
};

/// Nested groups plus `NOT` prefixes allowed before the parser gives up.
pub const MAX_NESTING_DEPTH: usize = 128;

const PREDICATE_OPERATORS: &str = "{'==', '!=', '>', '>=', '<', '<=', 'IN', 'NIN', 'NOT', 'IS'}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}:{column} {message}")]
pub struct ParseError {
    pub message: String,
    /// 1-based line of the offending token.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    /// The offending source text.
    pub token: String,
    pub span: Span,
}

impl ParseError {
    fn at(token: &Token<'_>, message: String) -> Self {
        ParseError {
            message,
            line: token.line,
            column: token.column,
            token: token.text.to_string(),
            span: token.span,
        }
    }

    /// Renders the error with the offending source line and a caret marker.
    pub fn format_with_source(&self, source: &str) -> String {
        let line_text = source.lines().nth(self.line.saturating_sub(1)).unwrap_or("");
        let width = if self.span.start == self.span.end {
            1
        } else {
            self.token.chars().count().max(1)
        };
        format!(
            "{}\n{}\n{}{}",
            self,
            line_text,
            " ".repeat(self.column.saturating_sub(1)),
            "^".repeat(width)
        )
    }
}

/// A parsed boolean subtree, remembering whether it was parenthesized.
enum Node {
    Plain(Expression),
    Grouped(Group),
}

impl Node {
    fn into_expression(self) -> Expression {
        match self {
            Node::Plain(expression) => expression,
            Node::Grouped(group) => group.content,
        }
    }
}

impl From<Node> for Operand {
    fn from(node: Node) -> Self {
        match node {
            Node::Plain(expression) => Operand::from(expression),
            Node::Grouped(group) => Operand::from(group),
        }
    }
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// Returns the current token without advancing
    fn peek(&self) -> &'a Token<'a> {
        self.tokens.get(self.position).unwrap_or(&END)
    }

    /// Returns the current token and advances
    fn advance(&mut self) -> &'a Token<'a> {
        let token = self.peek();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn match_token(&self, kind: &TokenKind<'_>) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    /// Consumes a token of the given kind or fails with `mismatched input`.
    fn expect(&mut self, kind: &TokenKind<'_>, expecting: &str) -> Result<&'a Token<'a>, ParseError> {
        if self.match_token(kind) {
            Ok(self.advance())
        } else {
            Err(mismatched(self.peek(), expecting))
        }
    }

    fn enter_nested(&mut self, token: &Token<'_>) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::at(token, "maximum nesting depth exceeded".to_string()));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn parse(&mut self) -> Result<Expression, ParseError> {
        if self.match_token(&TokenKind::Where) {
            self.advance();
        }
        let root = self.parse_or_expression()?;

        let token = self.peek();
        match token.kind {
            TokenKind::Eof => Ok(root.into_expression()),
            TokenKind::Illegal => Err(recognition_error(token)),
            _ => Err(ParseError::at(
                token,
                format!("extraneous input '{}' expecting <EOF>", token.text),
            )),
        }
    }

    /// `and_expr (OR and_expr)*`
    fn parse_or_expression(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.match_token(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Node::Plain(Expression::or(left, right));
        }

        Ok(left)
    }

    /// `not_expr (AND not_expr)*`
    fn parse_and_expression(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_not_expression()?;

        while self.match_token(&TokenKind::And) {
            self.advance();
            let right = self.parse_not_expression()?;
            left = Node::Plain(Expression::and(left, right));
        }

        Ok(left)
    }

    /// `NOT* primary`
    fn parse_not_expression(&mut self) -> Result<Node, ParseError> {
        if self.match_token(&TokenKind::Not) {
            let token = self.advance();
            self.enter_nested(token)?;
            let operand = self.parse_not_expression()?;
            self.depth -= 1;
            Ok(Node::Plain(Expression::not(operand)))
        } else {
            self.parse_primary_expression()
        }
    }

    fn parse_primary_expression(&mut self) -> Result<Node, ParseError> {
        let token = self.peek();
        trace!(line = token.line, column = token.column, token = token.text, "primary expression");

        match token.kind {
            TokenKind::LParen => {
                self.advance();
                self.enter_nested(token)?;
                let inner = self.parse_or_expression()?;
                self.expect(&TokenKind::RParen, "{')', '&&', '||'}")?;
                self.depth -= 1;
                Ok(Node::Grouped(Group::new(inner.into_expression())))
            }
            TokenKind::Identifier(_) | TokenKind::String(_) => {
                let key = self.parse_identifier()?;
                self.parse_predicate(key)
            }
            _ => Err(no_viable_alternative(token)),
        }
    }

    /// A dotted bare name (`entity.profile.name`) or a quoted string kept verbatim.
    fn parse_identifier(&mut self) -> Result<Key, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::String(raw) => Ok(Key::new(raw)),
            TokenKind::Identifier(name) => {
                let mut path = name.to_string();
                while self.match_token(&TokenKind::Dot) {
                    self.advance();
                    let part = self.expect(&TokenKind::Identifier(""), "IDENTIFIER")?;
                    path.push('.');
                    path.push_str(part.text);
                }
                Ok(Key::new(path))
            }
            _ => Err(no_viable_alternative(token)),
        }
    }

    fn parse_predicate(&mut self, key: Key) -> Result<Node, ParseError> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Eq => ExpressionType::Eq,
            TokenKind::NotEq => ExpressionType::Ne,
            TokenKind::Gt => ExpressionType::Gt,
            TokenKind::Gte => ExpressionType::Gte,
            TokenKind::Lt => ExpressionType::Lt,
            TokenKind::Lte => ExpressionType::Lte,
            TokenKind::In => return self.parse_membership(ExpressionType::In, key),
            TokenKind::Nin => return self.parse_membership(ExpressionType::Nin, key),
            TokenKind::Not => {
                self.expect(&TokenKind::In, "'IN'")?;
                return self.parse_membership(ExpressionType::Nin, key);
            }
            TokenKind::Is => {
                let negated = self.match_token(&TokenKind::Not);
                if negated {
                    self.advance();
                }
                self.expect(&TokenKind::Null, "'NULL'")?;
                let expression = if negated {
                    Expression::is_not_null(key)
                } else {
                    Expression::is_null(key)
                };
                return Ok(Node::Plain(expression));
            }
            _ => return Err(mismatched(token, PREDICATE_OPERATORS)),
        };

        let value = self.parse_constant()?;
        Ok(Node::Plain(Expression::binary(kind, key, value)))
    }

    fn parse_membership(&mut self, kind: ExpressionType, key: Key) -> Result<Node, ParseError> {
        let values = self.parse_list()?;
        Ok(Node::Plain(Expression::binary(kind, key, values)))
    }

    /// `[ (constant (, constant)*)? ]`
    fn parse_list(&mut self) -> Result<Value, ParseError> {
        self.expect(&TokenKind::LBracket, "'['")?;

        let mut values = Vec::new();
        if !self.match_token(&TokenKind::RBracket) {
            loop {
                values.push(self.parse_constant()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        self.expect(&TokenKind::RBracket, "{',', ']'}")?;
        Ok(Value::List(values))
    }

    fn parse_constant(&mut self) -> Result<Value, ParseError> {
        let token = self.peek();
        let value = match token.kind {
            TokenKind::Integer(text) => parse_integer(text)
                .map(Value::Int)
                .ok_or_else(|| ParseError::at(token, format!("integer out of range: '{text}'")))?,
            TokenKind::Decimal(text) => match text.parse::<f64>() {
                Ok(number) if number.is_finite() => Value::Float(number),
                _ => return Err(ParseError::at(token, format!("malformed number: '{text}'"))),
            },
            TokenKind::String(raw) => Value::String(unescape(raw)),
            TokenKind::Boolean(value) => Value::Bool(value),
            TokenKind::Null => Value::Null,
            _ => return Err(no_viable_alternative(token)),
        };
        self.advance();
        Ok(value)
    }
}

fn recognition_error(token: &Token<'_>) -> ParseError {
    ParseError::at(token, format!("token recognition error at: '{}'", token.text))
}

fn no_viable_alternative(token: &Token<'_>) -> ParseError {
    match token.kind {
        TokenKind::Illegal => recognition_error(token),
        _ => ParseError::at(token, format!("no viable alternative at input '{}'", token.text)),
    }
}

fn mismatched(token: &Token<'_>, expecting: &str) -> ParseError {
    match token.kind {
        TokenKind::Illegal => recognition_error(token),
        _ => ParseError::at(
            token,
            format!("mismatched input '{}' expecting {}", token.text, expecting),
        ),
    }
}

/// `42`, `-7`, `+3`, `9000000000L`
fn parse_integer(text: &str) -> Option<i64> {
    let digits = text.strip_suffix(['l', 'L']).unwrap_or(text);
    let digits = digits.strip_prefix('+').unwrap_or(digits);
    digits.parse().ok()
}

/// Strips the delimiters and resolves `\<quote>` and `\\`. Any other backslash is kept.
fn unescape(raw: &str) -> String {
    let mut chars = raw.chars();
    let quote = chars.next();
    let inner = chars.as_str();
    let inner = inner.strip_suffix(|c: char| Some(c) == quote).unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '\\' || Some(next) == quote {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Tokenizes and parses a filter string.
pub fn parse_filter(input: &str) -> Result<Expression, ParseError> {
    let tokens: Vec<Token<'_>> = Lexer::new(input).collect();
    let result = Parser::new(&tokens).parse();
    match &result {
        Ok(expression) => debug!(input, parsed = %expression, "parsed filter"),
        Err(err) => debug!(input, error = %err, "rejected filter"),
    }
    result
}
