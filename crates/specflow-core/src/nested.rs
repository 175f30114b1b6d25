//! Dot-separated path access into untyped JSON documents.
//!
//! Paths are plain object-key chains (`"appDetails.problemStatement"`). There
//! is no array-index syntax: a segment is always looked up as an object key.

use serde_json::{Map, Value};

/// Read the value at `path`, or `None` as soon as any segment is missing or
/// lands on something that is not an object.
///
/// A JSON `null` stored at the final segment is returned as `Some(&Value::Null)`.
/// A `null` at an intermediate segment ends the walk with `None`.
pub fn get_nested_value<'a>(obj: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(obj, |current, key| current.as_object()?.get(key))
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// Any intermediate segment that is missing or holds a non-object is replaced
/// by an empty object; the prior scalar or array is discarded. If `obj` itself
/// is not an object it is replaced by one. Siblings along the path are kept.
pub fn set_nested_value(obj: &mut Value, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    // split always yields at least one segment
    let last = segments.pop().unwrap_or_default();

    let mut current = ensure_object(obj);
    for key in segments {
        let slot = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = ensure_object(slot);
    }
    current.insert(last.to_string(), value);
}

fn ensure_object(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced with an object"),
    }
}
