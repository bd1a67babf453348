//! Parser for chainline source.
//!
//! Recursive descent over the token stream. Statements are method chains;
//! argument expressions use the usual precedence ladder
//! `or < and < comparison < additive < multiplicative < unary < postfix`.

use crate::error::{DslError, Result};
use crate::value::Value;

use super::ast::*;
use super::token::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Program> {
        let mut statements = Vec::new();

        self.skip_newlines();

        while !self.is_at_end() {
            statements.push(self.parse_statement()?);

            if !self.is_at_end() && !self.check(TokenKind::Newline) {
                let t = self.peek();
                return Err(DslError::syntax(
                    format!("expected end of statement, got {:?}", t.kind),
                    t.line,
                    t.col,
                ));
            }
            self.skip_newlines();
        }

        Ok(Program { statements })
    }

    /// `call ('.' call)*`; a chain may continue on the next line.
    fn parse_statement(&mut self) -> Result<Statement> {
        let mut chain = vec![self.parse_call()?];

        while self.check(TokenKind::Dot) || self.check_skip_newlines(TokenKind::Dot) {
            self.advance(); // consume '.'
            chain.push(self.parse_call()?);
        }

        Ok(Statement { chain })
    }

    fn parse_call(&mut self) -> Result<Call> {
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let args = self.parse_args()?;
        Ok(Call { name, args })
    }

    /// Arguments up to and including the closing `)`.
    fn parse_args(&mut self) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        self.skip_newlines();
        if self.check(TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }

        loop {
            self.skip_newlines();
            args.push(self.parse_arg()?);
            self.skip_newlines();
            if self.check(TokenKind::Comma) {
                self.advance();
                self.skip_newlines();
                // trailing comma
                if self.check(TokenKind::RParen) {
                    self.advance();
                    break;
                }
            } else {
                self.expect(TokenKind::RParen)?;
                break;
            }
        }

        Ok(args)
    }

    fn parse_arg(&mut self) -> Result<Arg> {
        let is_keyword = matches!(self.peek().kind, TokenKind::Ident(_))
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Assign);
        if is_keyword {
            let name = self.expect_ident()?;
            self.advance(); // consume '='
            let value = self.parse_expr()?;
            return Ok(Arg {
                name: Some(name),
                value,
            });
        }
        Ok(Arg {
            name: None,
            value: self.parse_expr()?,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.check(TokenKind::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;
        let op = match self.peek().kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::GtEq => BinaryOp::GtEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(Expr::binary(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek().kind {
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Minus => {
                self.advance();
                // fold negative literals so `-3` stays a plain int
                match self.parse_unary()? {
                    Expr::Literal(Value::Int(n)) => Ok(Expr::Literal(Value::Int(-n))),
                    Expr::Literal(Value::Float(x)) => Ok(Expr::Literal(Value::Float(-x))),
                    operand => Ok(Expr::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    }),
                }
            }
            _ => self.parse_postfix(),
        }
    }

    /// Property segments and method calls after a primary expression.
    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;

        while self.check(TokenKind::Dot) {
            self.advance();
            let t = self.peek().clone();
            let segment = match &t.kind {
                TokenKind::Ident(s) => s.clone(),
                TokenKind::Integer(n) if *n >= 0 => n.to_string(),
                _ => {
                    return Err(DslError::syntax(
                        format!("expected property name, got {:?}", t.kind),
                        t.line,
                        t.col,
                    ));
                }
            };
            self.advance();

            if self.check(TokenKind::LParen) {
                self.advance();
                let args = self
                    .parse_args()?
                    .into_iter()
                    .map(|a| a.value)
                    .collect();
                expr = Expr::MethodCall {
                    target: Box::new(expr),
                    method: segment,
                    args,
                };
                continue;
            }

            expr = match expr {
                Expr::Property { root, mut path } => {
                    path.push(segment);
                    Expr::Property { root, path }
                }
                other => {
                    return Err(DslError::syntax(
                        format!("cannot access '{segment}' on {other}"),
                        t.line,
                        t.col,
                    ));
                }
            };
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(n)))
            }
            TokenKind::Number(x) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(x)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::Str(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => self.parse_map(),
            TokenKind::At => {
                self.advance();
                let name = self.expect_ident()?;
                let args = if self.check(TokenKind::LParen) {
                    self.advance();
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                Ok(Expr::FuncRef { name, args })
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    return Ok(Expr::Call(Call { name, args }));
                }
                Ok(Expr::ident(name))
            }
            other => Err(DslError::syntax(
                format!("expected expression, got {other:?}"),
                t.line,
                t.col,
            )),
        }
    }

    fn parse_list(&mut self) -> Result<Expr> {
        self.expect(TokenKind::LBracket)?;
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::RBracket) {
                self.advance();
                break;
            }
            items.push(self.parse_expr()?);
            self.skip_newlines();
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                self.expect(TokenKind::RBracket)?;
                break;
            }
        }
        Ok(Expr::List(items))
    }

    /// `{key: value, key=value, "quoted key": value}`
    fn parse_map(&mut self) -> Result<Expr> {
        self.expect(TokenKind::LBrace)?;
        let mut entries = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) {
                self.advance();
                break;
            }
            let t = self.peek().clone();
            let key = match t.kind {
                TokenKind::Ident(s) | TokenKind::Str(s) => s,
                other => {
                    return Err(DslError::syntax(
                        format!("expected map key, got {other:?}"),
                        t.line,
                        t.col,
                    ));
                }
            };
            self.advance();
            if self.check(TokenKind::Colon) || self.check(TokenKind::Assign) {
                self.advance();
            } else {
                let t = self.peek();
                return Err(DslError::syntax(
                    format!("expected ':' after map key, got {:?}", t.kind),
                    t.line,
                    t.col,
                ));
            }
            entries.push((key, self.parse_expr()?));
            self.skip_newlines();
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                self.expect(TokenKind::RBrace)?;
                break;
            }
        }
        Ok(Expr::Map(entries))
    }

    // --- Utility methods ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> &Token {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len() || self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end()
            && std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(&kind)
    }

    fn check_skip_newlines(&mut self, kind: TokenKind) -> bool {
        let saved = self.pos;
        self.skip_newlines();
        if self.check(kind) {
            true
        } else {
            self.pos = saved;
            false
        }
    }

    fn skip_newlines(&mut self) {
        while !self.is_at_end() && self.peek().kind == TokenKind::Newline {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token> {
        self.skip_newlines();
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(&kind) {
            Ok(self.advance())
        } else {
            let t = self.peek();
            Err(DslError::syntax(
                format!("expected {kind:?}, got {:?}", t.kind),
                t.line,
                t.col,
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        self.skip_newlines();
        let t = self.peek();
        match &t.kind {
            TokenKind::Ident(s) => {
                let val = s.clone();
                self.advance();
                Ok(val)
            }
            _ => Err(DslError::syntax(
                format!("expected identifier, got {:?}", t.kind),
                t.line,
                t.col,
            )),
        }
    }
}
