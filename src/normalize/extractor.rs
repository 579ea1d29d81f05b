//! Path lookups over partially-formed JSON
//!
//! Every lookup here is total: a missing key or a non-object along the way
//! is reported as [`Field::Absent`] (or replaced by the caller's default),
//! never as an error.

use serde_json::Value;

/// Result of looking up a key path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// Some segment was missing, or an intermediate value was not an object
    Absent,
    /// The path resolved, possibly to `null` or an empty container
    Present(&'a Value),
}

impl<'a> Field<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    /// The resolved value, or `default` when absent
    pub fn or(self, default: &'a Value) -> &'a Value {
        match self {
            Field::Absent => default,
            Field::Present(value) => value,
        }
    }

    /// Resolved value if it is truthy, `None` otherwise
    pub fn truthy(self) -> Option<&'a Value> {
        match self {
            Field::Present(value) if is_truthy(value) => Some(value),
            _ => None,
        }
    }
}

/// Iterate over the segments of a dotted key path. The empty path has none.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|_| !path.is_empty())
}

/// Walk `root` along a dotted key path like `"image.variations.bottle_medium"`
pub fn lookup<'a>(root: &'a Value, path: &str) -> Field<'a> {
    let mut current = root;
    for key in segments(path) {
        match current {
            Value::Object(map) => match map.get(key) {
                Some(next) => current = next,
                None => return Field::Absent,
            },
            _ => return Field::Absent,
        }
    }
    Field::Present(current)
}

/// Like [`lookup`], substituting `default` when the path does not resolve
pub fn extract<'a>(root: &'a Value, path: &str, default: &'a Value) -> &'a Value {
    lookup(root, path).or(default)
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// Render any value as cell text. Strings are taken verbatim, `null` is
/// empty, everything else uses its JSON text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Short type name used in error messages
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
