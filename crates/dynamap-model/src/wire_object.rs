//! Detection of objects that are already in wire attribute-value shape.

use serde_json::{Map, Value};

use crate::wire_type::WireType;

/// Checks whether a JSON object is already a wire item.
///
/// Returns `None` for an empty object (it is valid in both shapes),
/// `Some(true)` when every top-level value is a single-key object keyed by a
/// known wire tag (and `M`/`L` contents recursively satisfy the same rule),
/// and `Some(false)` otherwise.
#[must_use]
pub fn is_wire_object(object: &Map<String, Value>) -> Option<bool> {
    if object.is_empty() {
        return None;
    }
    Some(object.values().all(is_wire_value))
}

fn is_wire_value(value: &Value) -> bool {
    let Some(inner) = value.as_object() else {
        return false;
    };
    if inner.len() != 1 {
        return false;
    }
    let Some((tag, content)) = inner.iter().next() else {
        return false;
    };
    match WireType::from_tag(tag) {
        Some(WireType::Map) => content
            .as_object()
            .is_some_and(|m| m.values().all(is_wire_value)),
        Some(WireType::List) => content
            .as_array()
            .is_some_and(|l| l.iter().all(is_wire_value)),
        Some(_) => true,
        None => false,
    }
}
