//! Token types for the chainline lexer.

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    True,
    False,
    Null,
    And,
    Or,
    Not,

    // Literals
    Ident(String),
    Str(String),
    Integer(i64),
    Number(f64),

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    At,
    Assign, // =

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Special
    Newline, // also `;`
    Eof,
}
