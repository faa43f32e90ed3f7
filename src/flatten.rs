//! Flattening of nested JSON values into dotted-path scalar entries.
//!
//! `{"req": {"headers": {"x-hi": "Mom"}}, "scopes": ["a", "b"]}` flattens
//! (with `.` as separator) into `req.headers.x-hi = "Mom"`, `scopes.0 = "a"`
//! and `scopes.1 = "b"`. Empty objects and arrays have no leaves; they are
//! kept as their JSON text (`"{}"`, `"[]"`) so the path is not silently lost.

use serde_json::Value;

/// Separator used between path segments in GELF additional field names.
pub const PATH_SEPARATOR: &str = ".";

/// Walk `value` and call `emit` once per scalar leaf with its full path.
///
/// `prefix` is the path of `value` itself. A scalar `value` is emitted
/// under `prefix` unchanged.
pub fn flatten_with<F>(prefix: &str, value: &Value, separator: &str, emit: &mut F)
where
    F: FnMut(String, Value),
{
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_with(&join(prefix, key, separator), child, separator, emit);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_with(&join(prefix, &index.to_string(), separator), child, separator, emit);
            }
        }
        Value::Object(_) => emit(prefix.to_string(), Value::String("{}".to_string())),
        Value::Array(_) => emit(prefix.to_string(), Value::String("[]".to_string())),
        scalar => emit(prefix.to_string(), scalar.clone()),
    }
}

/// Collect the flattened leaves of `value` under `prefix` using
/// [`PATH_SEPARATOR`].
pub fn flatten(prefix: &str, value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_with(prefix, value, PATH_SEPARATOR, &mut |key, leaf| out.push((key, leaf)));
    out
}

fn join(prefix: &str, key: &str, separator: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", prefix, separator, key)
    }
}
