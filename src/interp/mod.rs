//! Interpreter: turns a call sequence into ordered DAW actions.
//!
//! Each `interpret` run gets a fresh [`InterpreterContext`]; the session
//! snapshot is only ever read.

pub mod context;
pub mod eval;
pub mod functional;
pub mod handlers;
pub mod resolve;

use std::collections::HashMap;
use std::mem;

use tracing::{error, info};

use crate::action::{self, Action, ActionSink};
use crate::config::InterpreterConfig;
use crate::dsl::{render_args, Arg, Call, Dsl, Expr};
use crate::error::{DslError, Result};
use crate::session::SessionSnapshot;
use crate::value::Value;

pub use context::{InterpreterContext, IterationBinding, SkippedItem, NO_TRACK};
pub use functional::{iteration_variable, Combinator};
pub use handlers::Handler;
pub use resolve::resolve;

/// The result of a successful interpretation.
#[derive(Debug, Clone)]
pub struct Interpretation {
    /// Actions in emission order.
    pub actions: Vec<Action>,
    /// Combinator items that failed and were skipped.
    pub skipped: Vec<SkippedItem>,
    /// Final symbol table.
    pub symbols: HashMap<String, Value>,
}

impl Interpretation {
    /// Actions as `{"action": kind, ...payload}` objects.
    pub fn to_api_actions(&self) -> Vec<serde_json::Value> {
        action::to_api_actions(&self.actions)
    }
}

/// Skipped items and final symbol table of a run into a caller-owned sink.
pub type RunState = (Vec<SkippedItem>, HashMap<String, Value>);

/// Interprets call sequences against an optional session snapshot.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    config: InterpreterConfig,
    snapshot: Option<SessionSnapshot>,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self {
            config,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: SessionSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn set_snapshot(&mut self, snapshot: Option<SessionSnapshot>) {
        self.snapshot = snapshot;
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.snapshot.as_ref()
    }

    /// Interpret calls in order. The first fatal error aborts the run.
    pub fn interpret(&self, calls: &[Call]) -> Result<Interpretation> {
        let mut sink = ActionSink::new();
        let (skipped, symbols) = self.interpret_into(calls, &mut sink)?;
        Ok(Interpretation {
            actions: sink.into_actions(),
            skipped,
            symbols,
        })
    }

    /// Interpret calls, appending actions to a caller-owned sink.
    ///
    /// Actions are never rolled back: when a call fails, `sink` still holds
    /// everything emitted before it. Returns the skipped items and the final
    /// symbol table.
    pub fn interpret_into(&self, calls: &[Call], sink: &mut ActionSink) -> Result<RunState> {
        let before = sink.len();
        let mut exec = Execution::new(self.snapshot.as_ref(), &self.config, mem::take(sink));
        let outcome = calls.iter().try_for_each(|call| exec.call(call, None).map(drop));
        let (actions, skipped, symbols) = exec.ctx.into_parts();
        *sink = actions;
        let emitted = sink.len() - before;

        if let Err(err) = outcome {
            error!(error = %err, emitted, "interpretation aborted");
            return Err(err);
        }
        if emitted == 0 {
            return Err(DslError::NoActionsProduced);
        }
        info!(actions = emitted, skipped = skipped.len(), "translated DSL to actions");
        Ok((skipped, symbols))
    }

    /// Parse DSL text, then interpret it.
    pub fn interpret_source(&self, source: &str) -> Result<Interpretation> {
        let calls = Self::parse_source(source)?;
        self.interpret(&calls)
    }

    /// Parse DSL text, then interpret it into a caller-owned sink.
    pub fn interpret_source_into(&self, source: &str, sink: &mut ActionSink) -> Result<RunState> {
        let calls = Self::parse_source(source)?;
        self.interpret_into(&calls, sink)
    }

    fn parse_source(source: &str) -> Result<Vec<Call>> {
        if source.trim().is_empty() {
            return Err(DslError::NoActionsProduced);
        }
        Dsl::calls(source)
    }
}

/// State of one interpretation run.
pub(crate) struct Execution<'a> {
    ctx: InterpreterContext,
    snapshot: Option<&'a SessionSnapshot>,
    config: &'a InterpreterConfig,
}

impl<'a> Execution<'a> {
    fn new(
        snapshot: Option<&'a SessionSnapshot>,
        config: &'a InterpreterConfig,
        sink: ActionSink,
    ) -> Self {
        let mut ctx = InterpreterContext::with_sink(sink);
        if let Some(snapshot) = snapshot {
            ctx.set_symbol("tracks", snapshot.tracks_value());
        }
        Self {
            ctx,
            snapshot,
            config,
        }
    }

    fn selected_track_index(&self) -> i64 {
        self.snapshot
            .map_or(NO_TRACK, SessionSnapshot::selected_track_index)
    }

    /// Dispatch one call; errors carry the call and its arguments.
    pub(crate) fn call(
        &mut self,
        call: &Call,
        binding: Option<&IterationBinding>,
    ) -> Result<Value> {
        let outcome = if let Some(combinator) = Combinator::from_name(&call.name) {
            self.run_combinator(combinator, &call.args, binding)
        } else if let Some(handler) = Handler::from_name(&call.name) {
            self.run_handler(handler, &call.args, binding)
        } else {
            Err(DslError::UnknownMethod(call.name.clone()))
        };
        outcome.map_err(|err| err.in_call(&call.name, render_args(&call.args)))
    }
}

/// Match arguments to declared parameters: positionals in order, keywords by
/// name. The result is aligned with `params`.
pub(crate) fn bind_args<'e>(
    params: &[&'static str],
    args: &'e [Arg],
) -> Result<Vec<Option<&'e Expr>>> {
    let mut bound: Vec<Option<&Expr>> = vec![None; params.len()];
    for (position, arg) in args.iter().enumerate() {
        let slot = match &arg.name {
            Some(name) => params.iter().position(|p| p == name),
            None => (position < params.len()).then_some(position),
        };
        let unexpected = || DslError::UnexpectedArgument {
            arg: arg
                .name
                .clone()
                .unwrap_or_else(|| format!("#{}", position + 1)),
        };
        let slot = slot.ok_or_else(unexpected)?;
        if bound[slot].is_some() {
            return Err(unexpected());
        }
        bound[slot] = Some(&arg.value);
    }
    Ok(bound)
}
