//! Action handlers: the DSL calls that compile into DAW actions.

use std::collections::HashMap;

use tracing::debug;

use crate::action::{Action, ActionKind};
use crate::dsl::Arg;
use crate::error::{DslError, Result};
use crate::value::Value;

use super::context::IterationBinding;
use super::{bind_args, Execution};

/// A call that emits an action or moves the track binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Track,
    NewClip,
    AddMidi,
    AddFx,
    SetVolume,
    SetPan,
    SetMute,
    SetSolo,
    SetName,
}

impl Handler {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "track" => Handler::Track,
            "new_clip" => Handler::NewClip,
            "add_midi" => Handler::AddMidi,
            "add_fx" => Handler::AddFx,
            "set_volume" => Handler::SetVolume,
            "set_pan" => Handler::SetPan,
            "set_mute" => Handler::SetMute,
            "set_solo" => Handler::SetSolo,
            "set_name" => Handler::SetName,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Handler::Track => "track",
            Handler::NewClip => "new_clip",
            Handler::AddMidi => "add_midi",
            Handler::AddFx => "add_fx",
            Handler::SetVolume => "set_volume",
            Handler::SetPan => "set_pan",
            Handler::SetMute => "set_mute",
            Handler::SetSolo => "set_solo",
            Handler::SetName => "set_name",
        }
    }

    /// Parameter names; positional arguments bind in this order.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            Handler::Track => &["instrument", "name", "index", "id", "selected"],
            Handler::NewClip => &["bar", "start", "end", "length_bars", "length", "position"],
            Handler::AddMidi => &["notes", "note"],
            Handler::AddFx => &["fxname", "instrument"],
            Handler::SetVolume => &["volume_db", "value"],
            Handler::SetPan => &["pan", "value"],
            Handler::SetMute => &["mute", "value"],
            Handler::SetSolo => &["solo", "value"],
            Handler::SetName => &["name", "value"],
        }
    }
}

/// Expected payload type of a `set_*` property.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Number,
    Bool,
    Text,
}

/// What a `set_*` handler emits and which field carries the value.
#[derive(Debug, Clone, Copy)]
struct Property {
    kind: ActionKind,
    field: &'static str,
    expect: Expect,
}

const VOLUME: Property = Property {
    kind: ActionKind::SetTrackVolume,
    field: "volume_db",
    expect: Expect::Number,
};
const PAN: Property = Property {
    kind: ActionKind::SetTrackPan,
    field: "pan",
    expect: Expect::Number,
};
const MUTE: Property = Property {
    kind: ActionKind::SetTrackMute,
    field: "mute",
    expect: Expect::Bool,
};
const SOLO: Property = Property {
    kind: ActionKind::SetTrackSolo,
    field: "solo",
    expect: Expect::Bool,
};
const NAME: Property = Property {
    kind: ActionKind::SetTrackName,
    field: "name",
    expect: Expect::Text,
};

/// Evaluated handler arguments. `null` counts as absent.
#[derive(Debug, Default)]
pub(crate) struct HandlerArgs {
    values: HashMap<&'static str, Value>,
}

impl HandlerArgs {
    pub(crate) fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn invalid(name: &str, expected: &'static str, got: &Value) -> DslError {
        DslError::InvalidArgument {
            arg: name.to_string(),
            expected,
            got: got.kind(),
        }
    }

    pub(crate) fn int(&self, name: &str) -> Result<Option<i64>> {
        self.value(name)
            .map(|v| v.as_i64().ok_or_else(|| Self::invalid(name, "int", v)))
            .transpose()
    }

    pub(crate) fn float(&self, name: &str) -> Result<Option<f64>> {
        self.value(name)
            .map(|v| v.as_f64().ok_or_else(|| Self::invalid(name, "number", v)))
            .transpose()
    }

    pub(crate) fn bool(&self, name: &str) -> Result<Option<bool>> {
        self.value(name)
            .map(|v| v.as_bool().ok_or_else(|| Self::invalid(name, "bool", v)))
            .transpose()
    }

    pub(crate) fn string(&self, name: &str) -> Result<Option<String>> {
        self.value(name)
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Self::invalid(name, "string", v))
            })
            .transpose()
    }

    pub(crate) fn list(&self, name: &str) -> Result<Option<Vec<Value>>> {
        self.value(name)
            .map(|v| {
                v.as_list()
                    .map(<[Value]>::to_vec)
                    .ok_or_else(|| Self::invalid(name, "list", v))
            })
            .transpose()
    }
}

impl Execution<'_> {
    /// Bind and evaluate `args`, then run the handler.
    pub(crate) fn run_handler(
        &mut self,
        handler: Handler,
        args: &[Arg],
        binding: Option<&IterationBinding>,
    ) -> Result<Value> {
        let values = self.handler_args(handler, args, binding)?;
        self.dispatch(handler, &values)
    }

    /// Run a handler passed to a combinator as `@name`.
    ///
    /// A track record item (a map with an integer `index`) becomes the target
    /// track for the duration of the call, and `add_fx` without a plugin
    /// falls back to `default_fx`. Any other item fills the first parameter
    /// the call left unset.
    pub(crate) fn run_handler_on_item(
        &mut self,
        handler: Handler,
        args: &[Arg],
        scope: &IterationBinding,
    ) -> Result<Value> {
        let mut values = self.handler_args(handler, args, Some(scope))?;
        let Some(track) = scope.item.get("index").and_then(Value::as_i64) else {
            let unset = handler
                .params()
                .iter()
                .copied()
                .find(|param| values.value(param).is_none());
            match unset {
                Some(param) if !scope.item.is_null() => {
                    values.values.insert(param, scope.item.clone());
                }
                _ => {}
            }
            return self.dispatch(handler, &values);
        };

        let no_plugin = values.value("fxname").is_none() && values.value("instrument").is_none();
        if handler == Handler::AddFx && no_plugin {
            values
                .values
                .insert("fxname", Value::from(self.config.default_fx.as_str()));
        }
        let previous = self.ctx.current_track_ref();
        self.ctx.bind_track(track);
        let result = self.dispatch(handler, &values);
        self.ctx.bind_track(previous);
        result
    }

    fn handler_args(
        &mut self,
        handler: Handler,
        args: &[Arg],
        binding: Option<&IterationBinding>,
    ) -> Result<HandlerArgs> {
        let params = handler.params();
        let bound = bind_args(params, args)?;
        let mut values = HandlerArgs::default();
        for (param, expr) in params.iter().zip(bound) {
            if let Some(expr) = expr {
                let value = self.evaluate(expr, binding)?;
                if !value.is_null() {
                    values.values.insert(*param, value);
                }
            }
        }
        Ok(values)
    }

    fn dispatch(&mut self, handler: Handler, values: &HandlerArgs) -> Result<Value> {
        let outcome = match handler {
            Handler::Track => self.track(values),
            Handler::NewClip => self.new_clip(values),
            Handler::AddMidi => self.add_midi(values),
            Handler::AddFx => self.add_fx(values),
            Handler::SetVolume => self.set_property(handler, VOLUME, values),
            Handler::SetPan => self.set_property(handler, PAN, values),
            Handler::SetMute => self.set_property(handler, MUTE, values),
            Handler::SetSolo => self.set_property(handler, SOLO, values),
            Handler::SetName => self.set_property(handler, NAME, values),
        };
        outcome.map(|()| Value::Null)
    }

    /// The track a track-scoped call applies to: the bound track, else the
    /// snapshot's selected track.
    fn require_track(&self, call: &str) -> Result<i64> {
        if let Some(track) = self.ctx.current_track() {
            return Ok(track);
        }
        let selected = self.selected_track_index();
        if selected >= 0 {
            debug!(call, track = selected, "no bound track, using selected track");
            return Ok(selected);
        }
        Err(DslError::no_track(call))
    }

    fn track(&mut self, args: &HandlerArgs) -> Result<()> {
        if let Some(id) = args.int("id")? {
            let index = id.checked_sub(1).ok_or_else(|| DslError::InvalidArgument {
                arg: "id".to_string(),
                expected: "int above i64::MIN",
                got: "int",
            })?;
            self.ctx.bind_track(index);
            return Ok(());
        }
        if args.bool("selected")? == Some(true) {
            let selected = self.selected_track_index();
            if selected < 0 {
                return Err(DslError::NoSelectedTrack);
            }
            self.ctx.bind_track(selected);
            return Ok(());
        }

        let mut action = Action::new(ActionKind::CreateTrack);
        if let Some(instrument) = args.string("instrument")? {
            action = action.with("instrument", instrument);
        }
        if let Some(name) = args.string("name")? {
            action = action.with("name", name);
        }
        let index = match args.int("index")? {
            Some(index) if index < 0 => {
                return Err(DslError::InvalidArgument {
                    arg: "index".to_string(),
                    expected: "non-negative int",
                    got: "negative int",
                })
            }
            Some(index) => {
                self.ctx.resume_counter_after(index)?;
                index
            }
            None => self.ctx.next_track_index()?,
        };
        self.ctx.bind_track(index);
        self.ctx.emit(action.with("index", index));
        Ok(())
    }

    fn new_clip(&mut self, args: &HandlerArgs) -> Result<()> {
        let track = self.require_track("new_clip")?;

        if let Some(bar) = args.int("bar")? {
            let length_bars = args
                .int("length_bars")?
                .unwrap_or(self.config.default_length_bars);
            self.ctx.emit(
                Action::new(ActionKind::CreateClipAtBar)
                    .with("track", track)
                    .with("bar", bar)
                    .with("length_bars", length_bars),
            );
            return Ok(());
        }

        let position = match args.float("start")? {
            Some(start) => start,
            None => args.float("position")?.ok_or(DslError::MissingClipAnchor)?,
        };
        let length = args.float("length")?.unwrap_or(self.config.default_clip_length);
        self.ctx.emit(
            Action::new(ActionKind::CreateClip)
                .with("track", track)
                .with("position", position)
                .with("length", length),
        );
        Ok(())
    }

    fn add_midi(&mut self, args: &HandlerArgs) -> Result<()> {
        let track = self.require_track("add_midi")?;
        let mut notes = args.list("notes")?.unwrap_or_default();
        if let Some(note) = args.value("note") {
            notes = vec![note.clone()];
        }
        self.ctx.emit(
            Action::new(ActionKind::AddMidi)
                .with("track", track)
                .with("notes", notes),
        );
        Ok(())
    }

    fn add_fx(&mut self, args: &HandlerArgs) -> Result<()> {
        let track = self.require_track("add_fx")?;
        let (kind, fxname) = if let Some(fxname) = args.string("fxname")? {
            (ActionKind::AddTrackFx, fxname)
        } else if let Some(instrument) = args.string("instrument")? {
            (ActionKind::AddInstrument, instrument)
        } else {
            return Err(DslError::MissingFxTarget);
        };
        self.ctx.emit(
            Action::new(kind)
                .with("track", track)
                .with("fxname", fxname),
        );
        Ok(())
    }

    /// `set_volume`, `set_pan`, `set_mute`, `set_solo`, `set_name`.
    fn set_property(
        &mut self,
        handler: Handler,
        property: Property,
        args: &HandlerArgs,
    ) -> Result<()> {
        let Property {
            kind,
            field,
            expect,
        } = property;
        let track = self.require_track(handler.name())?;
        let (name, raw) = match (args.value(field), args.value("value")) {
            (Some(v), _) => (field, v),
            (None, Some(v)) => ("value", v),
            (None, None) => return Err(DslError::missing(field)),
        };
        let value = match expect {
            Expect::Number => raw.as_f64().map(Value::Float),
            Expect::Bool => raw.as_bool().map(Value::Bool),
            Expect::Text => raw.as_str().map(Value::from),
        };
        let value = value.ok_or_else(|| {
            let expected = match expect {
                Expect::Number => "number",
                Expect::Bool => "bool",
                Expect::Text => "string",
            };
            HandlerArgs::invalid(name, expected, raw)
        })?;
        self.ctx.emit(Action::new(kind).with("track", track).with(field, value));
        Ok(())
    }
}
