//! Lexer for the filter language.

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// Current byte offset into the input
    position: usize,
    /// 1-based line of `position`
    line: usize,
    /// 1-based column (in characters) of `position`
    column: usize,
    /// Set once the `Eof` token has been produced
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    /// Returns the character at the current position without advancing
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// Returns the character after the current one without advancing
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// Advances one character and returns it
    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if predicate(c) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        self.bump_while(char::is_whitespace);
    }

    fn token(&self, kind: TokenKind<'a>, start: usize, line: usize, column: usize) -> Token<'a> {
        Token {
            kind,
            text: &self.input[start..self.position],
            span: Span::new(start, self.position),
            line,
            column,
        }
    }

    /// Reads a numeric literal. A leading sign has already been consumed.
    ///
    /// `12`, `-7`, `12L` are integers; `1.5`, `.5`, `3.`, `1e10` are decimals.
    fn read_number(&mut self) -> TokenKind<'a> {
        let start = self.position;
        let mut decimal = false;

        self.bump_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            decimal = true;
            self.bump();
            self.bump_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_follows = match self.peek_next() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => self.input[self.position..]
                    .chars()
                    .nth(2)
                    .is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if exponent_follows {
                decimal = true;
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.bump_while(|c| c.is_ascii_digit());
            }
        }
        if !decimal && self.position > start && matches!(self.peek(), Some('l' | 'L')) {
            self.bump();
        }

        if decimal {
            TokenKind::Decimal("")
        } else {
            TokenKind::Integer("")
        }
    }

    /// Reads a quoted string. The opening quote has already been consumed.
    ///
    /// A backslash escapes the next character; strings may not span lines.
    fn read_string(&mut self, quote: char) -> bool {
        while let Some(c) = self.peek() {
            match c {
                '\n' | '\r' => return false,
                '\\' => {
                    self.bump();
                    if matches!(self.peek(), Some('\n' | '\r') | None) {
                        return false;
                    }
                    self.bump();
                }
                c if c == quote => {
                    self.bump();
                    return true;
                }
                _ => {
                    self.bump();
                }
            }
        }
        false
    }

    /// Reads an identifier or a keyword
    fn read_identifier(&mut self, start: usize) -> TokenKind<'a> {
        self.bump_while(|c| c.is_alphanumeric() || c == '_');
        match_keyword(&self.input[start..self.position])
    }
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    match s.to_ascii_lowercase().as_str() {
        "where" => TokenKind::Where,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "nin" => TokenKind::Nin,
        "is" => TokenKind::Is,
        "null" => TokenKind::Null,
        "true" => TokenKind::Boolean(true),
        "false" => TokenKind::Boolean(false),
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.skip_whitespace();
        let start = self.position;
        let (line, column) = (self.line, self.column);

        let Some(c) = self.bump() else {
            self.finished = true;
            return Some(Token {
                kind: TokenKind::Eof,
                text: "<EOF>",
                span: Span::new(start, start),
                line,
                column,
            });
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '=' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::Eq
            }
            '!' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::NotEq
            }
            '!' => TokenKind::Not,
            '<' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::Lte
            }
            '<' => TokenKind::Lt,
            '>' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::Gte
            }
            '>' => TokenKind::Gt,
            '&' if self.peek() == Some('&') => {
                self.bump();
                TokenKind::And
            }
            '|' if self.peek() == Some('|') => {
                self.bump();
                TokenKind::Or
            }
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.bump_while(|c| c.is_ascii_digit());
                TokenKind::Decimal("")
            }
            '.' => TokenKind::Dot,
            '-' | '+'
                if self
                    .peek()
                    .is_some_and(|c| c.is_ascii_digit() || c == '.') =>
            {
                self.read_number()
            }
            '"' | '\'' => {
                if self.read_string(c) {
                    TokenKind::String("")
                } else {
                    TokenKind::Illegal
                }
            }
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
            _ => TokenKind::Illegal,
        };

        // Attach the source slice to the literal kinds.
        let text = &self.input[start..self.position];
        let kind = match kind {
            TokenKind::String(_) => TokenKind::String(text),
            TokenKind::Integer(_) => TokenKind::Integer(text),
            TokenKind::Decimal(_) => TokenKind::Decimal(text),
            kind => kind,
        };
        Some(self.token(kind, start, line, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_filter() {
        let input = "country == 'BG'";
        let mut lexer = Lexer::new(input);

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Identifier("country"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eq);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::String("'BG'"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eof);
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        let input = "!= == > < >= <= ( ) [ ] , . && || !";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::NotEq, TokenKind::Eq, TokenKind::Gt, TokenKind::Lt,
                TokenKind::Gte, TokenKind::Lte, TokenKind::LParen, TokenKind::RParen,
                TokenKind::LBracket, TokenKind::RBracket, TokenKind::Comma,
                TokenKind::Dot, TokenKind::And, TokenKind::Or, TokenKind::Not,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let input = "WHERE AND or nOt IN nin is NULL true FALSE my_field";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Where, TokenKind::And, TokenKind::Or, TokenKind::Not,
                TokenKind::In, TokenKind::Nin, TokenKind::Is, TokenKind::Null,
                TokenKind::Boolean(true), TokenKind::Boolean(false),
                TokenKind::Identifier("my_field"), TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let input = "12345 -15.6 +20.13 .5 1e3 2.5E-2 42L -7";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Integer("12345"),
                TokenKind::Decimal("-15.6"),
                TokenKind::Decimal("+20.13"),
                TokenKind::Decimal(".5"),
                TokenKind::Decimal("1e3"),
                TokenKind::Decimal("2.5E-2"),
                TokenKind::Integer("42L"),
                TokenKind::Integer("-7"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_keep_quotes_and_escapes() {
        let input = r#""hello world" 'it\'s' "say \"hi\"""#;
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::String(r#""hello world""#),
                TokenKind::String(r"'it\'s'"),
                TokenKind::String(r#""say \"hi\"""#),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_illegal() {
        let tokens: Vec<_> = Lexer::new("a == 'open").collect();
        assert_eq!(tokens[2].kind, TokenKind::Illegal);
        assert_eq!(tokens[2].text, "'open");
    }

    #[test]
    fn test_illegal_characters() {
        let tokens: Vec<_> = Lexer::new("a = 1 @").collect();
        assert_eq!(tokens[1].kind, TokenKind::Illegal);
        assert_eq!(tokens[1].text, "=");
        assert_eq!(tokens[3].kind, TokenKind::Illegal);
        assert_eq!(tokens[3].text, "@");
    }

    #[test]
    fn test_line_and_column_tracking() {
        let input = "country == 'BG'\n  && year >= 2020";
        let tokens: Vec<_> = Lexer::new(input).collect();

        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[2].line, tokens[2].column), (1, 12));
        assert_eq!(tokens[3].kind, TokenKind::And);
        assert_eq!((tokens[3].line, tokens[3].column), (2, 3));
        assert_eq!(tokens[4].text, "year");
        assert_eq!((tokens[4].line, tokens[4].column), (2, 6));
        let eof = tokens.last().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!((eof.line, eof.column), (2, 18));
    }

    #[test]
    fn test_complex_query() {
        let input = "(year >= 2020 || country == \"BG\") && city NOT IN ['Sofia', 'Plovdiv']";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::LParen,
                TokenKind::Identifier("year"),
                TokenKind::Gte,
                TokenKind::Integer("2020"),
                TokenKind::Or,
                TokenKind::Identifier("country"),
                TokenKind::Eq,
                TokenKind::String("\"BG\""),
                TokenKind::RParen,
                TokenKind::And,
                TokenKind::Identifier("city"),
                TokenKind::Not,
                TokenKind::In,
                TokenKind::LBracket,
                TokenKind::String("'Sofia'"),
                TokenKind::Comma,
                TokenKind::String("'Plovdiv'"),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_dotted_identifier() {
        assert_eq!(
            kinds("entity.profile.name"),
            vec![
                TokenKind::Identifier("entity"),
                TokenKind::Dot,
                TokenKind::Identifier("profile"),
                TokenKind::Dot,
                TokenKind::Identifier("name"),
                TokenKind::Eof,
            ]
        );
    }
}
