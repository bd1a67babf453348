//! Lexer for chainline source.
//!
//! Converts source text into a stream of [`Token`]s.

use crate::error::{DslError, Result};

use super::token::{Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            self.skip_comment();
            self.skip_whitespace();

            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line: self.line,
                    col: self.col,
                });
                break;
            }

            let ch = self.peek();

            if ch == '\n' {
                tokens.push(Token {
                    kind: TokenKind::Newline,
                    line: self.line,
                    col: self.col,
                });
                self.advance();
                self.line += 1;
                self.col = 1;
                continue;
            }

            let token = match ch {
                ';' => self.single_char(TokenKind::Newline),
                '(' => self.single_char(TokenKind::LParen),
                ')' => self.single_char(TokenKind::RParen),
                '[' => self.single_char(TokenKind::LBracket),
                ']' => self.single_char(TokenKind::RBracket),
                '{' => self.single_char(TokenKind::LBrace),
                '}' => self.single_char(TokenKind::RBrace),
                ',' => self.single_char(TokenKind::Comma),
                ':' => self.single_char(TokenKind::Colon),
                '@' => self.single_char(TokenKind::At),
                '+' => self.single_char(TokenKind::Plus),
                '-' => self.single_char(TokenKind::Minus),
                '*' => self.single_char(TokenKind::Star),
                '/' => self.single_char(TokenKind::Slash),
                '=' => self.one_or_two('=', TokenKind::Assign, TokenKind::EqEq),
                '<' => self.one_or_two('=', TokenKind::Lt, TokenKind::LtEq),
                '>' => self.one_or_two('=', TokenKind::Gt, TokenKind::GtEq),
                '!' if self.peek_next() == Some('=') => {
                    self.one_or_two('=', TokenKind::NotEq, TokenKind::NotEq)
                }
                '"' | '\'' => self.lex_string(ch)?,
                '.' if self.peek_next().is_some_and(|c| c.is_ascii_digit())
                    && !self.follows_value(&tokens) =>
                {
                    self.lex_number(true)?
                }
                '.' => self.single_char(TokenKind::Dot),
                '0'..='9' => {
                    let after_dot = matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Dot));
                    self.lex_number(!after_dot)?
                }
                c if c.is_alphabetic() || c == '_' => self.lex_ident_or_keyword(),
                _ => {
                    return Err(DslError::syntax(
                        format!("unexpected character: '{ch}'"),
                        self.line,
                        self.col,
                    ));
                }
            };

            tokens.push(token);
        }

        Ok(tokens)
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        if ch != '\n' {
            self.col += 1;
        }
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// `items.0` is a path segment, not the float `.0`.
    fn follows_value(&self, tokens: &[Token]) -> bool {
        matches!(
            tokens.last().map(|t| &t.kind),
            Some(
                TokenKind::Ident(_)
                    | TokenKind::Integer(_)
                    | TokenKind::RParen
                    | TokenKind::RBracket
            )
        )
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() {
            let ch = self.peek();
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        let line_comment = !self.is_at_end()
            && ((self.peek() == '/' && self.peek_next() == Some('/')) || self.peek() == '#');
        if line_comment {
            while !self.is_at_end() && self.peek() != '\n' {
                self.advance();
            }
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> Token {
        let line = self.line;
        let col = self.col;
        self.advance();
        Token { kind, line, col }
    }

    fn one_or_two(&mut self, second: char, one: TokenKind, two: TokenKind) -> Token {
        let line = self.line;
        let col = self.col;
        self.advance();
        if !self.is_at_end() && self.peek() == second {
            self.advance();
            Token {
                kind: two,
                line,
                col,
            }
        } else {
            Token {
                kind: one,
                line,
                col,
            }
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<Token> {
        let line = self.line;
        let col = self.col;
        self.advance(); // opening quote
        let mut s = String::new();
        while !self.is_at_end() && self.peek() != quote {
            let ch = self.advance();
            if ch == '\n' {
                return Err(DslError::syntax("unclosed string literal", line, col));
            }
            if ch == '\\' {
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                s.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            } else {
                s.push(ch);
            }
        }
        if self.is_at_end() {
            return Err(DslError::syntax("unclosed string literal", line, col));
        }
        self.advance(); // closing quote
        Ok(Token {
            kind: TokenKind::Str(s),
            line,
            col,
        })
    }

    /// Path segments like `items.0.1` lex as integers, never as `0.1`.
    fn lex_number(&mut self, allow_fraction: bool) -> Result<Token> {
        let line = self.line;
        let col = self.col;
        let mut s = String::new();

        while !self.is_at_end() && self.peek().is_ascii_digit() {
            s.push(self.advance());
        }

        let is_float = allow_fraction
            && !self.is_at_end()
            && self.peek() == '.'
            && self.peek_next().is_some_and(|c| c.is_ascii_digit());
        if is_float {
            s.push(self.advance()); // '.'
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                s.push(self.advance());
            }
        }

        let kind = if is_float || s.starts_with('.') {
            let val: f64 = s
                .parse()
                .map_err(|_| DslError::syntax(format!("invalid number: {s}"), line, col))?;
            TokenKind::Number(val)
        } else {
            let val: i64 = s
                .parse()
                .map_err(|_| DslError::syntax(format!("invalid integer: {s}"), line, col))?;
            TokenKind::Integer(val)
        };

        Ok(Token { kind, line, col })
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let line = self.line;
        let col = self.col;
        let mut s = String::new();

        while !self.is_at_end() && (self.peek().is_alphanumeric() || self.peek() == '_') {
            s.push(self.advance());
        }

        let kind = match s.as_str() {
            "true" | "True" => TokenKind::True,
            "false" | "False" => TokenKind::False,
            "null" | "None" => TokenKind::Null,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => TokenKind::Ident(s),
        };

        Token { kind, line, col }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lex_call_with_keyword_argument() {
        assert_eq!(
            kinds(r#"track(instrument="Serum")"#),
            vec![
                TokenKind::Ident("track".to_string()),
                TokenKind::LParen,
                TokenKind::Ident("instrument".to_string()),
                TokenKind::Assign,
                TokenKind::Str("Serum".to_string()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_numbers() {
        assert_eq!(
            kinds("3 2.5 .5"),
            vec![
                TokenKind::Integer(3),
                TokenKind::Number(2.5),
                TokenKind::Number(0.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_index_segment_after_identifier() {
        assert_eq!(
            kinds("items.0"),
            vec![
                TokenKind::Ident("items".to_string()),
                TokenKind::Dot,
                TokenKind::Integer(0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_nested_index_segments() {
        assert_eq!(
            kinds("items.0.1"),
            vec![
                TokenKind::Ident("items".to_string()),
                TokenKind::Dot,
                TokenKind::Integer(0),
                TokenKind::Dot,
                TokenKind::Integer(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_comparison_operators() {
        assert_eq!(
            kinds("== != <= >= < > ="),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Assign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_keywords() {
        assert_eq!(
            kinds("true false null and or not"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::Null,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_string_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\"\n""#),
            vec![TokenKind::Str("say \"hi\"\n".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn lex_comments_and_separators() {
        let tokens = kinds("a() // trailing\n# full line\nb();c()");
        let newlines = tokens
            .iter()
            .filter(|k| **k == TokenKind::Newline)
            .count();
        assert_eq!(newlines, 3);
    }

    #[test]
    fn lex_tracks_line_numbers() {
        let tokens = Lexer::new("a()\n  b()").tokenize().unwrap();
        let b = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Ident("b".to_string()))
            .unwrap();
        assert_eq!((b.line, b.col), (2, 3));
    }

    #[test]
    fn lex_error_unclosed_string() {
        assert!(Lexer::new(r#"track(name="oops)"#).tokenize().is_err());
    }

    #[test]
    fn lex_error_unexpected_character() {
        let err = Lexer::new("track($)").tokenize().unwrap_err();
        assert!(matches!(err, DslError::Syntax { line: 1, col: 7, .. }));
    }
}
