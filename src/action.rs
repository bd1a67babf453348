//! Domain actions and the append-only sink that collects them.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::value::Value;

/// What an action does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    CreateTrack,
    CreateClip,
    CreateClipAtBar,
    AddMidi,
    AddTrackFx,
    AddInstrument,
    SetTrackVolume,
    SetTrackPan,
    SetTrackMute,
    SetTrackSolo,
    SetTrackName,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::CreateTrack => "create_track",
            ActionKind::CreateClip => "create_clip",
            ActionKind::CreateClipAtBar => "create_clip_at_bar",
            ActionKind::AddMidi => "add_midi",
            ActionKind::AddTrackFx => "add_track_fx",
            ActionKind::AddInstrument => "add_instrument",
            ActionKind::SetTrackVolume => "set_track_volume",
            ActionKind::SetTrackPan => "set_track_pan",
            ActionKind::SetTrackMute => "set_track_mute",
            ActionKind::SetTrackSolo => "set_track_solo",
            ActionKind::SetTrackName => "set_track_name",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single intended effect on the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub payload: BTreeMap<String, Value>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            payload: BTreeMap::new(),
        }
    }

    /// Builder-style payload field.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    /// The track this action targets, if it has one.
    pub fn track(&self) -> Option<i64> {
        self.get("track").and_then(Value::as_i64)
    }

    /// Render as `{"action": kind, ...payload}`.
    pub fn to_api(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "action".to_string(),
            serde_json::Value::String(self.kind.as_str().to_string()),
        );
        for (field, value) in &self.payload {
            obj.insert(field.clone(), serde_json::Value::from(value));
        }
        serde_json::Value::Object(obj)
    }
}

/// Ordered, append-only buffer of emitted actions.
///
/// Nothing is ever removed or reordered; whoever consumes the sink decides
/// whether to stream the actions to a live session or just read them back.
#[derive(Debug, Clone, Default)]
pub struct ActionSink {
    actions: Vec<Action>,
}

impl ActionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, action: Action) {
        debug!(kind = %action.kind, payload = ?action.payload, "emit action");
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }

    pub fn to_api_actions(&self) -> Vec<serde_json::Value> {
        to_api_actions(&self.actions)
    }
}

/// Render a slice of actions in the DAW's flat action format.
pub fn to_api_actions(actions: &[Action]) -> Vec<serde_json::Value> {
    actions.iter().map(Action::to_api).collect()
}
