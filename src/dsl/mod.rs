//! DSL front end: source text → tokens → method-chain AST.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::*;

use crate::error::Result;

use lexer::Lexer;
use parser::Parser;

/// The chainline front end.
pub struct Dsl;

impl Dsl {
    /// Parse DSL source into a Program AST.
    pub fn parse(source: &str) -> Result<Program> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        let mut parser = Parser::new(tokens);
        parser.parse()
    }

    /// Parse DSL source straight into its flattened call sequence.
    pub fn calls(source: &str) -> Result<Vec<Call>> {
        Ok(Self::parse(source)?.calls())
    }
}
