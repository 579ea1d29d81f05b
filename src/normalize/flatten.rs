use crate::normalize::extractor::lookup;
use serde_json::Value;

/// Separator between flattened values
pub const LIST_SEPARATOR: &str = ", ";

/// Flatten a list of objects into one string by pulling `key_path` out of
/// each element.
///
/// Only string values are kept; underscores become spaces and values that
/// end up empty are dropped. Numbers, objects and the like are skipped
/// rather than stringified.
pub fn flatten(items: &[Value], key_path: &str) -> String {
    let mut values = Vec::new();

    for item in items {
        if let Some(text) = lookup(item, key_path).truthy().and_then(Value::as_str) {
            let cleaned = text.replace('_', " ");
            if !cleaned.is_empty() {
                values.push(cleaned);
            }
        }
    }

    values.join(LIST_SEPARATOR)
}
