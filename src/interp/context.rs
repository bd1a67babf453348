//! Interpreter context: the only mutable state of one interpretation.

use std::collections::HashMap;

use tracing::debug;

use crate::action::{Action, ActionSink};
use crate::error::{DslError, Result};
use crate::value::Value;

/// Sentinel for "no track bound".
pub const NO_TRACK: i64 = -1;

fn counter_exhausted() -> DslError {
    DslError::InvalidArgument {
        arg: "index".to_string(),
        expected: "int below i64::MAX",
        got: "int",
    }
}

/// The item a combinator is currently visiting, under its iteration variable.
///
/// Lives for exactly one item of one combinator call.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationBinding {
    pub var: String,
    pub item: Value,
}

impl IterationBinding {
    pub fn new(var: impl Into<String>, item: Value) -> Self {
        Self {
            var: var.into(),
            item,
        }
    }

    /// The bound item if `name` is the iteration variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        (self.var == name).then_some(&self.item)
    }

    pub fn into_item(self) -> Value {
        self.item
    }
}

/// A combinator item whose evaluation failed and was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    pub combinator: String,
    pub position: usize,
    pub reason: String,
}

/// Current track, track counter, symbol table and action sink.
#[derive(Debug, Clone)]
pub struct InterpreterContext {
    current_track_ref: i64,
    track_counter: i64,
    symbols: HashMap<String, Value>,
    sink: ActionSink,
    skipped: Vec<SkippedItem>,
}

impl InterpreterContext {
    pub fn new() -> Self {
        Self::with_sink(ActionSink::new())
    }

    /// A fresh context that appends to an existing sink.
    pub fn with_sink(sink: ActionSink) -> Self {
        Self {
            current_track_ref: NO_TRACK,
            track_counter: 0,
            symbols: HashMap::new(),
            sink,
            skipped: Vec::new(),
        }
    }

    /// The bound track reference; -1 when none is bound.
    pub fn current_track_ref(&self) -> i64 {
        self.current_track_ref
    }

    /// The bound track, if any.
    pub fn current_track(&self) -> Option<i64> {
        (self.current_track_ref >= 0).then_some(self.current_track_ref)
    }

    pub fn bind_track(&mut self, index: i64) {
        debug!(track = index, "bind track");
        self.current_track_ref = index;
    }

    pub fn track_counter(&self) -> i64 {
        self.track_counter
    }

    /// Consume the next auto-assigned track index.
    pub fn next_track_index(&mut self) -> Result<i64> {
        let index = self.track_counter;
        self.track_counter = index.checked_add(1).ok_or_else(counter_exhausted)?;
        Ok(index)
    }

    /// Continue auto-assignment right after an explicitly placed track.
    pub fn resume_counter_after(&mut self, index: i64) -> Result<()> {
        self.track_counter = index.checked_add(1).ok_or_else(counter_exhausted)?;
        Ok(())
    }

    /// Store a value, replacing anything previously under `name`.
    pub fn set_symbol(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        debug!(symbol = %name, kind = value.kind(), "store");
        self.symbols.insert(name, value);
    }

    pub fn symbol(&self, name: &str) -> Option<&Value> {
        self.symbols.get(name)
    }

    pub fn symbols(&self) -> &HashMap<String, Value> {
        &self.symbols
    }

    pub fn emit(&mut self, action: Action) {
        self.sink.emit(action);
    }

    pub fn action_count(&self) -> usize {
        self.sink.len()
    }

    pub fn record_skip(&mut self, skipped: SkippedItem) {
        self.skipped.push(skipped);
    }

    pub fn skipped(&self) -> &[SkippedItem] {
        &self.skipped
    }

    pub fn into_parts(self) -> (ActionSink, Vec<SkippedItem>, HashMap<String, Value>) {
        (self.sink, self.skipped, self.symbols)
    }
}

impl Default for InterpreterContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    #[test]
    fn fresh_context_has_no_track() {
        let ctx = InterpreterContext::new();
        assert_eq!(ctx.current_track_ref(), NO_TRACK);
        assert_eq!(ctx.current_track(), None);
        assert_eq!(ctx.track_counter(), 0);
        assert_eq!(ctx.action_count(), 0);
    }

    #[test]
    fn counter_post_increments() {
        let mut ctx = InterpreterContext::new();
        assert_eq!(ctx.next_track_index().unwrap(), 0);
        assert_eq!(ctx.next_track_index().unwrap(), 1);
        ctx.resume_counter_after(5).unwrap();
        assert_eq!(ctx.next_track_index().unwrap(), 6);
    }

    #[test]
    fn counter_refuses_to_overflow() {
        let mut ctx = InterpreterContext::new();
        assert!(ctx.resume_counter_after(i64::MAX).is_err());
        ctx.resume_counter_after(i64::MAX - 1).unwrap();
        assert!(matches!(
            ctx.next_track_index().unwrap_err(),
            DslError::InvalidArgument { arg, .. } if arg == "index"
        ));
        assert_eq!(ctx.track_counter(), i64::MAX);
    }

    #[test]
    fn store_overwrites() {
        let mut ctx = InterpreterContext::new();
        ctx.set_symbol("x", Value::Int(1));
        ctx.set_symbol("x", Value::from("two"));
        assert_eq!(ctx.symbol("x"), Some(&Value::from("two")));
        assert_eq!(ctx.symbol("missing"), None);
    }

    #[test]
    fn binding_only_answers_its_variable() {
        let binding = IterationBinding::new("track", Value::Int(3));
        assert_eq!(binding.get("track"), Some(&Value::Int(3)));
        assert_eq!(binding.get("clip"), None);
    }

    #[test]
    fn into_parts_keeps_emission_order() {
        let mut ctx = InterpreterContext::new();
        ctx.emit(Action::new(ActionKind::CreateTrack).with("index", 0i64));
        ctx.emit(Action::new(ActionKind::AddTrackFx).with("track", 0i64));
        ctx.record_skip(SkippedItem {
            combinator: "filter".to_string(),
            position: 2,
            reason: "boom".to_string(),
        });
        let (sink, skipped, _) = ctx.into_parts();
        assert_eq!(sink.actions()[0].kind, ActionKind::CreateTrack);
        assert_eq!(sink.actions()[1].kind, ActionKind::AddTrackFx);
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn with_sink_appends_after_existing_actions() {
        let mut sink = ActionSink::new();
        sink.emit(Action::new(ActionKind::CreateTrack).with("index", 0i64));
        let mut ctx = InterpreterContext::with_sink(sink);
        assert_eq!(ctx.action_count(), 1);
        assert_eq!(ctx.current_track(), None);
        ctx.emit(Action::new(ActionKind::SetTrackMute).with("track", 0i64));
        let (sink, _, _) = ctx.into_parts();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.actions()[1].kind, ActionKind::SetTrackMute);
    }
}
