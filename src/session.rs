//! Session snapshot: a read-only view of the DAW's current state.
//!
//! Snapshots arrive as JSON, either bare (`{"tracks": [...]}`) or wrapped
//! under a top-level `"state"` key. Both forms load to the same value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DslError, Result};
use crate::value::Value;

const UNSET_INDEX: i64 = -1;

fn unset_index() -> i64 {
    UNSET_INDEX
}

/// An effect plugin on a track.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FxRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn enabled_by_default() -> bool {
    true
}

/// A clip placed on a track.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClipRecord {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One track in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Position in the track list unless the snapshot names one explicitly.
    #[serde(default = "unset_index")]
    pub index: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub fx: Vec<FxRecord>,
    #[serde(default)]
    pub clips: Vec<ClipRecord>,
    /// Fields the snapshot carries that the interpreter doesn't model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TrackRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            index: UNSET_INDEX,
            name: name.into(),
            selected: false,
            fx: Vec::new(),
            clips: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        to_value(self)
    }
}

/// The session's tracks at the moment interpretation starts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

impl SessionSnapshot {
    /// Build a snapshot from track records, filling in missing indices.
    pub fn from_tracks(tracks: Vec<TrackRecord>) -> Self {
        let mut snapshot = Self { tracks };
        snapshot.assign_indices();
        snapshot
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            DslError::syntax(format!("invalid session JSON: {e}"), e.line(), e.column())
        })?;
        Self::from_json_value(json)
    }

    /// Load a snapshot from a JSON value, unwrapping an optional `"state"` key.
    pub fn from_json_value(json: serde_json::Value) -> Result<Self> {
        let inner = match json {
            serde_json::Value::Object(mut map)
                if map.get("state").is_some_and(serde_json::Value::is_object) =>
            {
                map.remove("state").unwrap_or_default()
            }
            other => other,
        };
        let mut snapshot: SessionSnapshot = serde_json::from_value(inner)
            .map_err(|e| DslError::syntax(format!("invalid session state: {e}"), 0, 0))?;
        snapshot.assign_indices();
        Ok(snapshot)
    }

    fn assign_indices(&mut self) {
        for (pos, track) in self.tracks.iter_mut().enumerate() {
            if track.index == UNSET_INDEX {
                track.index = pos as i64;
            }
        }
    }

    /// Position of the first selected track, or -1 when nothing is selected.
    pub fn selected_track_index(&self) -> i64 {
        self.tracks
            .iter()
            .position(|t| t.selected)
            .map_or(-1, |i| i as i64)
    }

    /// The track at a 0-based position.
    pub fn track(&self, index: i64) -> Option<&TrackRecord> {
        usize::try_from(index).ok().and_then(|i| self.tracks.get(i))
    }

    /// All tracks as a list value.
    pub fn tracks_value(&self) -> Value {
        Value::List(self.tracks.iter().map(TrackRecord::to_value).collect())
    }

    /// The FX chain of one track as a list value; empty when the track doesn't exist.
    pub fn fx_chain(&self, index: i64) -> Value {
        let fx = self
            .track(index)
            .map(|t| t.fx.iter().map(to_value).collect())
            .unwrap_or_default();
        Value::List(fx)
    }

    /// The clips of one track as a list value; empty when the track doesn't exist.
    pub fn clips(&self, index: i64) -> Value {
        let clips = self
            .track(index)
            .map(|t| t.clips.iter().map(to_value).collect())
            .unwrap_or_default();
        Value::List(clips)
    }

    pub fn to_value(&self) -> Value {
        to_value(self)
    }
}

fn to_value<T: Serialize>(record: &T) -> Value {
    serde_json::to_value(record)
        .map(Value::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = r#"{
        "state": {
            "tracks": [
                {"index": 0, "name": "Drums", "selected": false,
                 "fx": [{"name": "ReaEQ", "enabled": true}, {"name": "ReaComp", "enabled": false}],
                 "clips": [{"start": 0.0, "length": 4.0, "name": "Kick"}]},
                {"index": 1, "name": "FX", "selected": true,
                 "fx": [{"name": "ReaVerb", "enabled": true}], "clips": []},
                {"index": 2, "name": "Bass", "selected": false, "fx": [], "clips": []}
            ]
        }
    }"#;

    #[test]
    fn wrapped_and_bare_forms_load_identically() {
        let wrapped = SessionSnapshot::from_json_str(WRAPPED).unwrap();
        let json: serde_json::Value = serde_json::from_str(WRAPPED).unwrap();
        let bare = SessionSnapshot::from_json_value(json["state"].clone()).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.tracks.len(), 3);
    }

    #[test]
    fn selected_track_index_finds_first_selected() {
        let snapshot = SessionSnapshot::from_json_str(WRAPPED).unwrap();
        assert_eq!(snapshot.selected_track_index(), 1);
    }

    #[test]
    fn selected_track_index_without_selection() {
        let snapshot = SessionSnapshot::from_tracks(vec![TrackRecord::new("a")]);
        assert_eq!(snapshot.selected_track_index(), -1);
        assert_eq!(SessionSnapshot::default().selected_track_index(), -1);
    }

    #[test]
    fn missing_indices_follow_position() {
        let snapshot = SessionSnapshot::from_json_str(
            r#"{"tracks": [{"name": "a"}, {"name": "b", "index": 7}, {"name": "c"}]}"#,
        )
        .unwrap();
        let indices: Vec<i64> = snapshot.tracks.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 7, 2]);
    }

    #[test]
    fn track_lookup_by_position() {
        let snapshot = SessionSnapshot::from_json_str(WRAPPED).unwrap();
        assert_eq!(snapshot.track(2).map(|t| t.name.as_str()), Some("Bass"));
        assert!(snapshot.track(3).is_none());
        assert!(snapshot.track(-1).is_none());
    }

    #[test]
    fn unknown_track_fields_are_preserved() {
        let json = r#"{"tracks": [{"name": "a", "color": "red"}]}"#;
        let snapshot = SessionSnapshot::from_json_str(json).unwrap();
        let value = snapshot.tracks[0].to_value();
        assert_eq!(value.get("color"), Some(&Value::from("red")));
        assert_eq!(value.get("index"), Some(&Value::Int(0)));
    }

    #[test]
    fn fx_chain_and_clips_as_values() {
        let snapshot = SessionSnapshot::from_json_str(WRAPPED).unwrap();
        let fx = snapshot.fx_chain(0);
        assert_eq!(fx.as_list().map(<[Value]>::len), Some(2));
        assert_eq!(fx.as_list().unwrap()[1].get("enabled"), Some(&Value::Bool(false)));
        assert_eq!(snapshot.clips(0).as_list().map(<[Value]>::len), Some(1));
        assert_eq!(snapshot.clips(9), Value::List(vec![]));
    }

    #[test]
    fn invalid_json_is_a_syntax_error() {
        let err = SessionSnapshot::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, DslError::Syntax { .. }));
    }
}
