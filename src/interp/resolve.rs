//! Property-path resolution against the iteration binding, symbol table and
//! session snapshot.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{DslError, Result};
use crate::session::SessionSnapshot;
use crate::value::Value;

use super::context::IterationBinding;

/// Resolve `root.path...` to a value.
///
/// The root is looked up in the iteration binding, then the symbol table,
/// then the snapshot-derived names `tracks` and `state`.
pub fn resolve(
    root: &str,
    path: &[String],
    binding: Option<&IterationBinding>,
    symbols: &HashMap<String, Value>,
    snapshot: Option<&SessionSnapshot>,
) -> Result<Value> {
    let base = resolve_root(root, binding, symbols, snapshot)?;
    traverse(&base, path).cloned()
}

fn resolve_root<'a>(
    root: &str,
    binding: Option<&'a IterationBinding>,
    symbols: &'a HashMap<String, Value>,
    snapshot: Option<&SessionSnapshot>,
) -> Result<Cow<'a, Value>> {
    if let Some(item) = binding.and_then(|b| b.get(root)) {
        return Ok(Cow::Borrowed(item));
    }
    if let Some(value) = symbols.get(root) {
        return Ok(Cow::Borrowed(value));
    }
    match (root, snapshot) {
        ("tracks", Some(s)) => Ok(Cow::Owned(s.tracks_value())),
        ("state", Some(s)) => Ok(Cow::Owned(s.to_value())),
        _ => Err(DslError::UnknownIdentifier(root.to_string())),
    }
}

/// Walk `path` from `value`. Each segment is a map key, or a list index when
/// it is all digits. Fails on the first segment that doesn't resolve.
pub fn traverse<'v>(value: &'v Value, path: &[String]) -> Result<&'v Value> {
    let mut current = value;
    for segment in path {
        current = step(current, segment)?;
    }
    Ok(current)
}

fn step<'v>(current: &'v Value, segment: &str) -> Result<&'v Value> {
    let found = match current {
        Value::Map(map) => map.get(segment),
        Value::List(items) if is_index(segment) => {
            segment.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        _ => None,
    };
    found.ok_or_else(|| DslError::PropertyNotFound {
        segment: segment.to_string(),
        kind: current.kind(),
    })
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}
