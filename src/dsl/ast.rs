//! Abstract syntax tree for chainline programs.
//!
//! A program is a list of method chains; each chain is a list of calls. The
//! interpreter consumes the flattened call sequence, so callers that build
//! calls by hand never need the parser.

use std::fmt;

use crate::error::{DslError, Result};
use crate::value::Value;

/// A complete DSL program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    /// Every call in source order, chains flattened left to right.
    pub fn calls(&self) -> Vec<Call> {
        self.statements
            .iter()
            .flat_map(|s| s.chain.iter().cloned())
            .collect()
    }
}

/// One method chain, e.g. `track(...).new_clip(...).add_midi(...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub chain: Vec<Call>,
}

/// A method invocation with positional and keyword arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Arg>,
}

impl Call {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append a keyword argument.
    pub fn kw(mut self, name: impl Into<String>, value: Expr) -> Self {
        self.args.push(Arg {
            name: Some(name.into()),
            value,
        });
        self
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: Expr) -> Self {
        self.args.push(Arg { name: None, value });
        self
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, render_args(&self.args))
    }
}

/// Render arguments the way they were written, for error context.
pub fn render_args(args: &[Arg]) -> String {
    args.iter()
        .map(|a| match &a.name {
            Some(name) => format!("{name}={}", a.value),
            None => a.value.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A call argument; keyword when `name` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    /// `root.seg.seg`; a bare identifier has an empty path.
    Property {
        root: String,
        path: Vec<String>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `target.method(args)`, e.g. `fx.name.contains("EQ")`.
    MethodCall {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// A nested DSL call such as `filter(...)` used as a value.
    Call(Call),
    /// `@name` or `@name(kw=...)`.
    FuncRef {
        name: String,
        args: Vec<Arg>,
    },
}

impl Expr {
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Property {
            root: name.into(),
            path: Vec::new(),
        }
    }

    /// Parse a dotted path such as `track.fx.0.name`.
    pub fn path(dotted: &str) -> Self {
        let mut parts = dotted.split('.').map(str::to_string);
        let root = parts.next().unwrap_or_default();
        Expr::Property {
            root,
            path: parts.collect(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn func(name: impl Into<String>) -> Self {
        Expr::FuncRef {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// The identifier name, if this is a bare identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Property { root, path } if path.is_empty() => Some(root),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Expr::Map(entries) => {
                let parts: Vec<String> = entries.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Expr::Property { root, path } => {
                write!(f, "{root}")?;
                for seg in path {
                    write!(f, ".{seg}")?;
                }
                Ok(())
            }
            Expr::Binary { op, left, right } => write!(f, "{left} {op} {right}"),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "not {operand}"),
                UnaryOp::Neg => write!(f, "-{operand}"),
            },
            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{target}.{method}({})", parts.join(", "))
            }
            Expr::Call(call) => write!(f, "{call}"),
            Expr::FuncRef { name, args } if args.is_empty() => write!(f, "@{name}"),
            Expr::FuncRef { name, args } => write!(f, "@{name}({})", render_args(args)),
        }
    }
}

/// Binary operators, already structured by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    /// Map operator text to an operator.
    pub fn from_symbol(symbol: &str) -> Result<Self> {
        Ok(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::NotEq,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::LtEq,
            ">=" => BinaryOp::GtEq,
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            other => return Err(DslError::evaluation(format!("unknown operator: {other}"))),
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}
