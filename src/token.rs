//! The token definition for the filter language.

use std::fmt;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    /// The source text of the token (`<EOF>` for the end marker).
    pub text: &'a str,
    pub span: Span,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column (in characters) of the first character.
    pub column: usize,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    Where, // "WHERE"
    And,   // "AND", "&&"
    Or,    // "OR", "||"
    Not,   // "NOT", "!"
    In,    // "IN"
    Nin,   // "NIN"
    Is,    // "IS"
    Null,  // "NULL"

    // Literals
    Identifier(&'a str),
    String(&'a str), // The raw string, including quotes
    Integer(&'a str), // Optional sign and `L` suffix included
    Decimal(&'a str),
    Boolean(bool),

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Dot,      // .

    // Operators
    Eq,    // ==
    NotEq, // !=
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=

    // Special
    Illegal, // An illegal/unknown character or an unterminated string
    Eof,     // End of file
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Where => write!(f, "'WHERE'"),
            TokenKind::And => write!(f, "'AND'"),
            TokenKind::Or => write!(f, "'OR'"),
            TokenKind::Not => write!(f, "'NOT'"),
            TokenKind::In => write!(f, "'IN'"),
            TokenKind::Nin => write!(f, "'NIN'"),
            TokenKind::Is => write!(f, "'IS'"),
            TokenKind::Null => write!(f, "'NULL'"),
            TokenKind::Identifier(_) => write!(f, "IDENTIFIER"),
            TokenKind::String(_) => write!(f, "QUOTED_STRING"),
            TokenKind::Integer(_) => write!(f, "INTEGER_VALUE"),
            TokenKind::Decimal(_) => write!(f, "DECIMAL_VALUE"),
            TokenKind::Boolean(_) => write!(f, "BOOLEAN_VALUE"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Eq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Gte => write!(f, "'>='"),
            TokenKind::Lte => write!(f, "'<='"),
            TokenKind::Illegal => write!(f, "<illegal>"),
            TokenKind::Eof => write!(f, "<EOF>"),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
