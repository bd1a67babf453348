//! CLI end-to-end tests: script files, snapshots, config and output formats.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn chainline(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chainline"))
        .args(args)
        .output()
        .unwrap()
}

fn write(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn prints_json_actions() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "song.chain", "track(instrument=\"Serum\").new_clip(bar=2)\n");
    let out = chainline(&[&script]);
    assert!(out.status.success());

    let actions: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(actions[0]["action"], "create_track");
    assert_eq!(actions[1]["action"], "create_clip_at_bar");
    assert_eq!(actions[1]["length_bars"], 4);
}

#[test]
fn uses_snapshot_and_config() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "fx.chain", "new_clip(bar=1)");
    let state = write(
        &dir,
        "state.json",
        r#"{"state": {"tracks": [{"name": "A"}, {"name": "B", "selected": true}]}}"#,
    );
    let config = write(&dir, "config.yaml", "default_length_bars: 2\n");
    let out = chainline(&[&script, "--state", &state, "--config", &config]);
    assert!(out.status.success());

    let actions: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(actions[0]["track"], 1);
    assert_eq!(actions[0]["length_bars"], 2);
}

#[test]
fn yaml_output() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "t.chain", "track()");
    let out = chainline(&[&script, "--format", "yaml"]);
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("action: create_track"));
}

#[test]
fn failure_exits_nonzero_with_message() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "bad.chain", "add_fx(fxname=\"ReaEQ\")");
    let out = chainline(&[&script]);
    assert!(!out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("no track context"));
}

#[test]
fn failure_still_prints_actions_emitted_before_it() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "half.chain", "track(name=\"A\")\ntrack()\nadd_fx()\n");
    let out = chainline(&[&script]);
    assert!(!out.status.success());

    let actions: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(actions.as_array().map(Vec::len), Some(2));
    assert_eq!(actions[0]["name"], "A");
    assert_eq!(actions[1]["index"], 1);
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("add_fx"));
}
