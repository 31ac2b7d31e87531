//! Native (application-side) values.
//!
//! [`Value`] is the in-memory shape of an item attribute before it is
//! marshalled to, or after it is decoded from, the wire. A [`Document`] is a
//! whole item or nested object.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A whole item or nested object: property name -> value.
///
/// Keys iterate in sorted order, not insertion order. Expressions built from
/// a document (flattened updates, [`Condition::from_document`]) therefore
/// allocate placeholder tokens alphabetically by attribute name.
///
/// [`Condition::from_document`]: crate::Condition::from_document
pub type Document = BTreeMap<String, Value>;

/// A native attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The explicit "undefined" sentinel. Distinct from leaving the property
    /// out: it always forces removal of the attribute.
    Undefined,
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(f64),
    /// String.
    String(String),
    /// Binary buffer.
    Binary(Bytes),
    /// Point in time, millisecond precision.
    Date(DateTime<Utc>),
    /// Ordered list.
    List(Vec<Value>),
    /// Set of strings, numbers, buffers or dates.
    Set(Vec<Value>),
    /// Nested object.
    Map(Document),
}

impl Value {
    /// Name of this value's type, as used in mismatch messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Binary(_) => "buffer",
            Self::Date(_) => "date",
            Self::List(_) => "array",
            Self::Set(_) => "set",
            Self::Map(_) => "object",
        }
    }

    /// Returns `true` for the "undefined" sentinel.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns the string if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map if this is a `Map`.
    #[must_use]
    pub fn as_map(&self) -> Option<&Document> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Renders a scalar the way it appears inside a combined attribute.
    ///
    /// Returns `None` for containers, null and the sentinel.
    #[must_use]
    pub fn to_combined_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(dynamap_model::format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            Self::Date(d) => Some(d.timestamp_millis().to_string()),
            _ => None,
        }
    }

    /// Converts a JSON value. Objects become maps, arrays become lists.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Converts a JSON object into a [`Document`]. Non-objects yield an empty
/// document.
#[must_use]
pub fn document_from_json(value: &serde_json::Value) -> Document {
    match Value::from_json(value) {
        Value::Map(doc) => doc,
        _ => Document::new(),
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    // Precision loss past 2^53 matches the wire's f64 handling elsewhere.
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Self::Binary(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}
