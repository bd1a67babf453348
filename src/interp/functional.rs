//! Functional combinators over session collections.
//!
//! `filter`, `map` and `for_each` visit each item under an iteration binding.
//! A failing item is logged and skipped unless `strict_combinators` is set;
//! everything else about a combinator call (bad collection, unknown function,
//! reduce errors) is fatal.

use tracing::{debug, warn};

use crate::dsl::{Arg, BinaryOp, Expr};
use crate::error::{DslError, Result};
use crate::value::Value;

use super::context::{IterationBinding, SkippedItem};
use super::eval::{apply_binary, call_method};
use super::handlers::Handler;
use super::{bind_args, Execution};

/// Calls that compute values rather than emit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Filter,
    Map,
    ForEach,
    Reduce,
    Store,
    GetTracks,
    GetFxChain,
    GetClips,
}

impl Combinator {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "filter" => Combinator::Filter,
            "map" => Combinator::Map,
            "for_each" => Combinator::ForEach,
            "reduce" => Combinator::Reduce,
            "store" => Combinator::Store,
            "get_tracks" => Combinator::GetTracks,
            "get_fx_chain" => Combinator::GetFxChain,
            "get_clips" => Combinator::GetClips,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Combinator::Filter => "filter",
            Combinator::Map => "map",
            Combinator::ForEach => "for_each",
            Combinator::Reduce => "reduce",
            Combinator::Store => "store",
            Combinator::GetTracks => "get_tracks",
            Combinator::GetFxChain => "get_fx_chain",
            Combinator::GetClips => "get_clips",
        }
    }

    fn params(self) -> &'static [&'static str] {
        match self {
            Combinator::Filter => &["collection", "predicate"],
            Combinator::Map => &["func", "collection"],
            Combinator::ForEach => &["collection", "func"],
            Combinator::Reduce => &["func", "collection", "initial"],
            Combinator::Store => &["name", "value"],
            Combinator::GetTracks => &[],
            Combinator::GetFxChain | Combinator::GetClips => &["track_index"],
        }
    }
}

/// Single-argument built-ins usable as `@len`, `@upper`, `@lower`, `@abs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryBuiltin {
    Len,
    Upper,
    Lower,
    Abs,
}

impl UnaryBuiltin {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => UnaryBuiltin::Len,
            "upper" => UnaryBuiltin::Upper,
            "lower" => UnaryBuiltin::Lower,
            "abs" => UnaryBuiltin::Abs,
            _ => return None,
        })
    }

    pub fn apply(self, item: &Value) -> Result<Value> {
        match (self, item) {
            (UnaryBuiltin::Len, v) => call_method(v, "len", &[]),
            (UnaryBuiltin::Upper, v) => call_method(v, "upper", &[]),
            (UnaryBuiltin::Lower, v) => call_method(v, "lower", &[]),
            (UnaryBuiltin::Abs, Value::Int(n)) => n
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| DslError::evaluation("integer overflow in abs")),
            (UnaryBuiltin::Abs, Value::Float(f)) => Ok(Value::Float(f.abs())),
            (UnaryBuiltin::Abs, v) => Err(DslError::evaluation(format!(
                "abs is not supported on {}",
                v.kind()
            ))),
        }
    }
}

/// Two-argument folds usable in `reduce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Add,
    Mul,
    Min,
    Max,
    Count,
}

impl Reducer {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "add" => Reducer::Add,
            "mul" => Reducer::Mul,
            "min" => Reducer::Min,
            "max" => Reducer::Max,
            "count" => Reducer::Count,
            _ => return None,
        })
    }

    /// Starting accumulator when `reduce` is given no initial value.
    /// `None` seeds the fold with the first element.
    fn seed(self) -> Option<Value> {
        match self {
            Reducer::Count => Some(Value::Int(0)),
            _ => None,
        }
    }

    pub fn apply(self, acc: Value, item: Value) -> Result<Value> {
        match self {
            Reducer::Add => apply_binary(BinaryOp::Add, &acc, &item),
            Reducer::Mul => apply_binary(BinaryOp::Mul, &acc, &item),
            Reducer::Min | Reducer::Max => {
                let op = if self == Reducer::Min {
                    BinaryOp::Lt
                } else {
                    BinaryOp::Gt
                };
                let replace = apply_binary(op, &item, &acc)?.is_truthy();
                Ok(if replace { item } else { acc })
            }
            Reducer::Count => apply_binary(BinaryOp::Add, &acc, &Value::Int(1)),
        }
    }
}

/// What a combinator runs per item.
#[derive(Debug, Clone, Copy)]
enum Callback<'e> {
    Handler(Handler, &'e [Arg]),
    Builtin(UnaryBuiltin),
    Expr(&'e Expr),
}

impl<'e> Callback<'e> {
    fn from_expr(expr: &'e Expr) -> Result<Self> {
        match expr {
            Expr::FuncRef { name, args } => {
                if let Some(handler) = Handler::from_name(name) {
                    return Ok(Callback::Handler(handler, args));
                }
                let builtin = UnaryBuiltin::from_name(name)
                    .ok_or_else(|| DslError::UnknownFunction(name.clone()))?;
                if let Some(arg) = args.first() {
                    return Err(DslError::UnexpectedArgument {
                        arg: arg.name.clone().unwrap_or_else(|| arg.value.to_string()),
                    });
                }
                Ok(Callback::Builtin(builtin))
            }
            other => Ok(Callback::Expr(other)),
        }
    }
}

/// Iteration variable for a collection name: `tracks` → `track`,
/// `fx_chain` → `fx`, `clip_list` → `clip`; anything too short → `item`.
pub fn iteration_variable(collection: &str) -> String {
    let mut var = collection.strip_suffix('s').unwrap_or(collection);
    for suffix in ["_chain", "_list"] {
        if let Some(stripped) = var.strip_suffix(suffix) {
            var = stripped;
            break;
        }
    }
    if var.chars().count() < 2 {
        "item".to_string()
    } else {
        var.to_string()
    }
}

fn required<'e>(expr: Option<&'e Expr>, arg: &str) -> Result<&'e Expr> {
    expr.ok_or_else(|| DslError::missing(arg))
}

impl Execution<'_> {
    pub(crate) fn run_combinator(
        &mut self,
        combinator: Combinator,
        args: &[Arg],
        binding: Option<&IterationBinding>,
    ) -> Result<Value> {
        // store(k=v) doesn't fit the declared parameters
        let bound = match combinator {
            Combinator::Store => Vec::new(),
            _ => bind_args(combinator.params(), args)?,
        };
        match combinator {
            Combinator::Filter => {
                let predicate = Callback::from_expr(required(bound[1], "predicate")?)?;
                let (items, var) = self.collection(required(bound[0], "collection")?, binding)?;
                let kept: Vec<Value> = self
                    .visit(combinator, items, &var, predicate)?
                    .into_iter()
                    .filter(|(_, result)| result.is_truthy())
                    .map(|(item, _)| item)
                    .collect();
                debug!(kept = kept.len(), "filter");
                Ok(Value::List(kept))
            }
            Combinator::Map => {
                let func = Callback::from_expr(required(bound[0], "func")?)?;
                let (items, var) = self.collection(required(bound[1], "collection")?, binding)?;
                let results = self.visit(combinator, items, &var, func)?;
                Ok(Value::List(results.into_iter().map(|(_, r)| r).collect()))
            }
            Combinator::ForEach => {
                let func = Callback::from_expr(required(bound[1], "func")?)?;
                let (items, var) = self.collection(required(bound[0], "collection")?, binding)?;
                self.visit(combinator, items, &var, func)?;
                Ok(Value::Null)
            }
            Combinator::Reduce => self.reduce(&bound, binding),
            Combinator::GetTracks => {
                let tracks = self
                    .snapshot
                    .map(|s| s.tracks_value())
                    .unwrap_or_else(|| Value::List(Vec::new()));
                self.ctx.set_symbol("tracks", tracks.clone());
                Ok(tracks)
            }
            Combinator::GetFxChain | Combinator::GetClips => {
                self.track_listing(combinator, bound[0], binding)
            }
            Combinator::Store => self.store(args, binding),
        }
    }

    /// Resolve a collection argument to its items and iteration variable.
    fn collection(
        &mut self,
        expr: &Expr,
        binding: Option<&IterationBinding>,
    ) -> Result<(Vec<Value>, String)> {
        let (value, var) = match expr.as_ident() {
            Some(name) => (
                self.ctx
                    .symbol(name)
                    .cloned()
                    .unwrap_or_else(|| Value::List(Vec::new())),
                iteration_variable(name),
            ),
            None => (self.evaluate(expr, binding)?, "item".to_string()),
        };
        match value {
            Value::List(items) => Ok((items, var)),
            other => Err(DslError::NotASequence(other.kind())),
        }
    }

    /// Run `callback` over each item; returns `(item, result)` for the items
    /// that succeeded.
    fn visit(
        &mut self,
        combinator: Combinator,
        items: Vec<Value>,
        var: &str,
        callback: Callback<'_>,
    ) -> Result<Vec<(Value, Value)>> {
        let mut out = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            let scope = IterationBinding::new(var, item);
            let outcome = self.invoke(callback, &scope);
            if let Some(result) = self.settle(combinator, position, outcome)? {
                out.push((scope.into_item(), result));
            }
        }
        Ok(out)
    }

    fn invoke(&mut self, callback: Callback<'_>, scope: &IterationBinding) -> Result<Value> {
        match callback {
            Callback::Expr(expr) => self.evaluate(expr, Some(scope)),
            Callback::Builtin(builtin) => builtin.apply(&scope.item),
            Callback::Handler(handler, args) => self.run_handler_on_item(handler, args, scope),
        }
    }

    /// Apply the skip policy to one item's outcome.
    fn settle(
        &mut self,
        combinator: Combinator,
        position: usize,
        outcome: Result<Value>,
    ) -> Result<Option<Value>> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err) if self.config.strict_combinators => Err(err),
            Err(err) => {
                warn!(combinator = combinator.name(), position, error = %err, "skipping item");
                self.ctx.record_skip(SkippedItem {
                    combinator: combinator.name().to_string(),
                    position,
                    reason: err.to_string(),
                });
                Ok(None)
            }
        }
    }

    fn reduce(
        &mut self,
        bound: &[Option<&Expr>],
        binding: Option<&IterationBinding>,
    ) -> Result<Value> {
        let reducer = match required(bound[0], "func")? {
            Expr::FuncRef { name, .. } => {
                Reducer::from_name(name).ok_or_else(|| DslError::UnknownFunction(name.clone()))?
            }
            other => {
                return Err(DslError::evaluation(format!(
                    "reduce expects a function reference, got {other}"
                )))
            }
        };
        let (items, _) = self.collection(required(bound[1], "collection")?, binding)?;
        let initial = match bound[2] {
            Some(expr) => Some(self.evaluate(expr, binding)?),
            None => reducer.seed(),
        };

        let mut items = items.into_iter();
        let mut acc = match initial.or_else(|| items.next()) {
            Some(acc) => acc,
            None => return Ok(Value::Null),
        };
        for item in items {
            acc = reducer.apply(acc, item)?;
        }
        Ok(acc)
    }

    fn store(&mut self, args: &[Arg], binding: Option<&IterationBinding>) -> Result<Value> {
        // store(key=value)
        if let [Arg {
            name: Some(key),
            value,
        }] = args
        {
            if key != "name" && key != "value" {
                let value = self.evaluate(value, binding)?;
                self.ctx.set_symbol(key.clone(), value);
                return Ok(Value::Null);
            }
        }

        let bound = bind_args(Combinator::Store.params(), args)?;
        let name_expr = required(bound[0], "name")?;
        let name = match name_expr.as_ident() {
            Some(ident) => ident.to_string(),
            None => match self.evaluate(name_expr, binding)? {
                Value::Str(name) => name,
                other => {
                    return Err(DslError::InvalidArgument {
                        arg: "name".to_string(),
                        expected: "identifier or string",
                        got: other.kind(),
                    })
                }
            },
        };
        let value = self.evaluate(required(bound[1], "value")?, binding)?;
        self.ctx.set_symbol(name, value);
        Ok(Value::Null)
    }

    /// `get_fx_chain` / `get_clips` for `track_index` or the bound track.
    fn track_listing(
        &mut self,
        combinator: Combinator,
        track_index: Option<&Expr>,
        binding: Option<&IterationBinding>,
    ) -> Result<Value> {
        let index = match track_index {
            Some(expr) => {
                let value = self.evaluate(expr, binding)?;
                value.as_i64().ok_or_else(|| DslError::InvalidArgument {
                    arg: "track_index".to_string(),
                    expected: "int",
                    got: value.kind(),
                })?
            }
            None => self.ctx.current_track_ref(),
        };
        let Some(snapshot) = self.snapshot.filter(|s| s.track(index).is_some()) else {
            return Ok(Value::List(Vec::new()));
        };
        let (symbol, value) = match combinator {
            Combinator::GetClips => ("clips", snapshot.clips(index)),
            _ => ("fx_chain", snapshot.fx_chain(index)),
        };
        self.ctx.set_symbol(symbol, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_variable_strips_plural_and_suffix() {
        assert_eq!(iteration_variable("tracks"), "track");
        assert_eq!(iteration_variable("fx_chain"), "fx");
        assert_eq!(iteration_variable("clips"), "clip");
        assert_eq!(iteration_variable("clip_lists"), "clip");
        assert_eq!(iteration_variable("items"), "item");
        assert_eq!(iteration_variable("fx"), "fx");
    }

    #[test]
    fn iteration_variable_falls_back_to_item() {
        assert_eq!(iteration_variable("s"), "item");
        assert_eq!(iteration_variable("xs"), "item");
        assert_eq!(iteration_variable(""), "item");
        assert_eq!(iteration_variable("_list"), "item");
    }

    #[test]
    fn builtins_apply() {
        assert_eq!(UnaryBuiltin::Len.apply(&Value::from("abc")).unwrap(), Value::Int(3));
        assert_eq!(UnaryBuiltin::Abs.apply(&Value::Int(-4)).unwrap(), Value::Int(4));
        assert!(UnaryBuiltin::Abs.apply(&Value::from("x")).is_err());
    }

    #[test]
    fn reducers_fold() {
        let min = Reducer::Min.apply(Value::Int(3), Value::Int(1)).unwrap();
        assert_eq!(min, Value::Int(1));
        let max = Reducer::Max.apply(Value::Int(3), Value::Int(1)).unwrap();
        assert_eq!(max, Value::Int(3));
        let count = Reducer::Count.apply(Value::Int(2), Value::from("ignored")).unwrap();
        assert_eq!(count, Value::Int(3));
        assert!(Reducer::Add.apply(Value::Int(1), Value::from("a")).is_err());
    }

    #[test]
    fn callback_rejects_unknown_function() {
        let expr = Expr::func("explode");
        assert_eq!(
            Callback::from_expr(&expr).unwrap_err(),
            DslError::UnknownFunction("explode".to_string())
        );
        assert!(matches!(
            Callback::from_expr(&Expr::func("add_fx")).unwrap(),
            Callback::Handler(Handler::AddFx, _)
        ));
    }
}
