//! Empty-value pruning for nested JSON-like data
//!
//! Configuration and API payloads often carry keys that were never filled in:
//! `null`s, empty strings, empty lists and empty objects. [`remove_empty`]
//! strips them recursively, so a parent that ends up with nothing left inside
//! is dropped as well.
//!
//! ```rust
//! use serde_json::json;
//! use toolbox::prune::remove_empty;
//!
//! let pruned = remove_empty(json!([1, 2, [null, 4]]));
//! assert_eq!(pruned, json!([1, 2, [4]]));
//! ```

use serde_json::Value;

/// Returns `true` for `null`, `""`, `[]` and `{}`.
///
/// Numbers and booleans are never empty, including `0` and `false`.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Recursively remove empty values from mappings and sequences.
///
/// Children are pruned first and then dropped if they turned out empty, so
/// `{"a": {"b": null}}` collapses to `{}`. Key order and element order are
/// preserved. The value passed in is never dropped itself: an empty object at
/// the top level comes back unchanged, and scalars are returned as they are.
pub fn remove_empty(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, child)| (key, remove_empty(child)))
                .filter(|(_, child)| !is_empty(child))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(remove_empty)
                .filter(|child| !is_empty(child))
                .collect(),
        ),
        scalar => scalar,
    }
}
