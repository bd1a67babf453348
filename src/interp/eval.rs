//! Expression evaluation: operators, method calls, and the interpreter's
//! `evaluate` entry point.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::dsl::{BinaryOp, Expr, UnaryOp};
use crate::error::{DslError, Result};
use crate::value::Value;

use super::context::IterationBinding;
use super::resolve::resolve;
use super::Execution;

impl Execution<'_> {
    /// Evaluate an expression with the active iteration binding, if any.
    pub(crate) fn evaluate(
        &mut self,
        expr: &Expr,
        binding: Option<&IterationBinding>,
    ) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List(items) => items
                .iter()
                .map(|item| self.evaluate(item, binding))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.evaluate(value, binding)?);
                }
                Ok(Value::Map(map))
            }
            Expr::Property { root, path } => {
                resolve(root, path, binding, self.ctx.symbols(), self.snapshot)
            }
            Expr::Binary { op, left, right } => {
                let left = self.evaluate(left, binding)?;
                let right = self.evaluate(right, binding)?;
                apply_binary(*op, &left, &right)
            }
            Expr::Unary { op, operand } => {
                let operand = self.evaluate(operand, binding)?;
                apply_unary(*op, &operand)
            }
            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                let target = self.evaluate(target, binding)?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg, binding))
                    .collect::<Result<Vec<_>>>()?;
                call_method(&target, method, &args)
            }
            Expr::Call(call) => self.call(call, binding),
            Expr::FuncRef { name, .. } => Err(DslError::evaluation(format!(
                "function reference @{name} is not a value"
            ))),
        }
    }
}

/// Apply a binary operator to two evaluated operands.
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul => arithmetic(op, left, right),
        BinaryOp::Div => divide(left, right),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            let ordering = compare(op, left, right)?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Gt => ordering == Ordering::Greater,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

pub fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| DslError::evaluation("integer overflow in '-'")),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, v) => Err(DslError::evaluation(format!(
            "unsupported operand kind for '-': {}",
            v.kind()
        ))),
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> DslError {
    DslError::evaluation(format!(
        "unsupported operand kinds for '{op}': {} and {}",
        left.kind(),
        right.kind()
    ))
}

fn overflow(op: BinaryOp) -> DslError {
    DslError::evaluation(format!("integer overflow in '{op}'"))
}

fn numbers(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.as_f64()?, right.as_f64()?))
}

fn add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or_else(|| overflow(BinaryOp::Add)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => numbers(left, right)
            .map(|(a, b)| Value::Float(a + b))
            .ok_or_else(|| mismatch(BinaryOp::Add, left, right)),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let result = match op {
            BinaryOp::Sub => a.checked_sub(*b),
            _ => a.checked_mul(*b),
        };
        return result.map(Value::Int).ok_or_else(|| overflow(op));
    }
    let (a, b) = numbers(left, right).ok_or_else(|| mismatch(op, left, right))?;
    Ok(Value::Float(match op {
        BinaryOp::Sub => a - b,
        _ => a * b,
    }))
}

fn divide(left: &Value, right: &Value) -> Result<Value> {
    let (a, b) = numbers(left, right).ok_or_else(|| mismatch(BinaryOp::Div, left, right))?;
    if b == 0.0 {
        return Err(DslError::evaluation(format!(
            "division by zero: {} / {}",
            left.kind(),
            right.kind()
        )));
    }
    Ok(Value::Float(a / b))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => numbers(left, right)
            .and_then(|(a, b)| a.partial_cmp(&b))
            .ok_or_else(|| mismatch(op, left, right)),
    }
}

/// Call a built-in method on a value, e.g. `fx.name.contains("EQ")`.
pub fn call_method(target: &Value, method: &str, args: &[Value]) -> Result<Value> {
    match method {
        "contains" => {
            let [needle] = expect_args::<1>(method, args)?;
            match (target, needle) {
                (Value::Str(s), Value::Str(n)) => Ok(Value::Bool(s.contains(n.as_str()))),
                (Value::List(items), n) => Ok(Value::Bool(items.contains(n))),
                (Value::Map(map), Value::Str(key)) => Ok(Value::Bool(map.contains_key(key))),
                _ => Err(receiver(method, target, Some(needle))),
            }
        }
        "starts_with" | "ends_with" => {
            let [affix] = expect_args::<1>(method, args)?;
            match (target, affix) {
                (Value::Str(s), Value::Str(a)) if method == "starts_with" => {
                    Ok(Value::Bool(s.starts_with(a.as_str())))
                }
                (Value::Str(s), Value::Str(a)) => Ok(Value::Bool(s.ends_with(a.as_str()))),
                _ => Err(receiver(method, target, Some(affix))),
            }
        }
        "lower" | "upper" => {
            expect_args::<0>(method, args)?;
            match target {
                Value::Str(s) if method == "lower" => Ok(Value::Str(s.to_lowercase())),
                Value::Str(s) => Ok(Value::Str(s.to_uppercase())),
                _ => Err(receiver(method, target, None)),
            }
        }
        "len" => {
            expect_args::<0>(method, args)?;
            let len = match target {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(map) => map.len(),
                _ => return Err(receiver(method, target, None)),
            };
            Ok(Value::Int(len as i64))
        }
        other => Err(DslError::UnknownMethod(other.to_string())),
    }
}

fn expect_args<'a, const N: usize>(method: &str, args: &'a [Value]) -> Result<&'a [Value; N]> {
    args.try_into().map_err(|_| {
        DslError::evaluation(format!(
            "{method} expects {N} argument(s), got {}",
            args.len()
        ))
    })
}

fn receiver(method: &str, target: &Value, arg: Option<&Value>) -> DslError {
    match arg {
        Some(arg) => DslError::evaluation(format!(
            "{method} is not supported on {} with {}",
            target.kind(),
            arg.kind()
        )),
        None => DslError::evaluation(format!("{method} is not supported on {}", target.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn int_arithmetic_stays_int() {
        assert_eq!(
            apply_binary(BinaryOp::Add, &Value::Int(2), &Value::Int(3)).unwrap(),
            Value::Int(5)
        );
        assert!(matches!(
            apply_binary(BinaryOp::Mul, &Value::Int(4), &Value::Int(3)).unwrap(),
            Value::Int(12)
        ));
        assert!(matches!(
            apply_binary(BinaryOp::Sub, &Value::Int(1), &Value::Int(3)).unwrap(),
            Value::Int(-2)
        ));
    }

    #[test]
    fn mixed_arithmetic_is_float() {
        let v = apply_binary(BinaryOp::Add, &Value::Int(1), &Value::Float(0.5)).unwrap();
        assert!(matches!(v, Value::Float(f) if (f - 1.5).abs() < 1e-12));
    }

    #[test]
    fn division_always_float() {
        let v = apply_binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap();
        assert!(matches!(v, Value::Float(f) if (f - 3.5).abs() < 1e-12));
    }

    #[test]
    fn division_by_zero_fails() {
        let err = apply_binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert!(matches!(err, DslError::Evaluation { .. }));
    }

    #[test]
    fn overflow_fails() {
        assert!(apply_binary(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1)).is_err());
        assert!(apply_unary(UnaryOp::Neg, &Value::Int(i64::MIN)).is_err());
    }

    #[test]
    fn string_and_list_concat() {
        assert_eq!(apply_binary(BinaryOp::Add, &s("Re"), &s("aEQ")).unwrap(), s("ReaEQ"));
        let joined = apply_binary(
            BinaryOp::Add,
            &Value::List(vec![Value::Int(1)]),
            &Value::List(vec![Value::Int(2)]),
        )
        .unwrap();
        assert_eq!(joined, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn mismatch_names_operator_and_kinds() {
        let err = apply_binary(BinaryOp::Sub, &s("a"), &Value::Int(1)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains('-'));
        assert!(msg.contains("string"));
        assert!(msg.contains("int"));
    }

    #[test]
    fn equality_never_errors() {
        assert_eq!(
            apply_binary(BinaryOp::Eq, &Value::Int(1), &Value::Float(1.0)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            apply_binary(BinaryOp::Eq, &s("1"), &Value::Int(1)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            apply_binary(BinaryOp::NotEq, &Value::Null, &Value::Bool(false)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn comparison_rules() {
        assert_eq!(
            apply_binary(BinaryOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(apply_binary(BinaryOp::GtEq, &s("b"), &s("a")).unwrap(), Value::Bool(true));
        assert_eq!(
            apply_binary(BinaryOp::LtEq, &Value::Int(2), &Value::Int(2)).unwrap(),
            Value::Bool(true)
        );
        assert!(apply_binary(BinaryOp::Gt, &s("b"), &Value::Int(1)).is_err());
    }

    #[test]
    fn logical_ops_return_bools() {
        assert_eq!(
            apply_binary(BinaryOp::And, &Value::Int(1), &s("x")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            apply_binary(BinaryOp::Or, &Value::Null, &Value::List(vec![])).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(apply_unary(UnaryOp::Not, &Value::Null).unwrap(), Value::Bool(true));
    }

    #[test]
    fn methods_on_strings() {
        assert_eq!(call_method(&s("ReaEQ"), "contains", &[s("EQ")]).unwrap(), Value::Bool(true));
        assert_eq!(
            call_method(&s("ReaEQ"), "starts_with", &[s("Rea")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(call_method(&s("ReaEQ"), "ends_with", &[s("Rea")]).unwrap(), Value::Bool(false));
        assert_eq!(call_method(&s("ReaEQ"), "lower", &[]).unwrap(), s("reaeq"));
        assert_eq!(call_method(&s("ReaEQ"), "len", &[]).unwrap(), Value::Int(5));
    }

    #[test]
    fn contains_on_lists_and_maps() {
        let list = Value::List(vec![Value::Int(1), s("a")]);
        assert_eq!(
            call_method(&list, "contains", &[Value::Float(1.0)]).unwrap(),
            Value::Bool(true)
        );
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), s("x"));
        assert_eq!(
            call_method(&Value::Map(map), "contains", &[s("name")]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn method_errors() {
        assert_eq!(
            call_method(&s("x"), "explode", &[]).unwrap_err(),
            DslError::UnknownMethod("explode".to_string())
        );
        assert!(call_method(&Value::Int(3), "upper", &[]).is_err());
        assert!(call_method(&s("x"), "contains", &[]).is_err());
    }
}
