//! Candidate types an attribute may declare.

use std::fmt;
use std::sync::Arc;

use super::Schema;
use crate::value::Value;

/// Wire-primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// `S`
    String,
    /// `N`
    Number,
    /// `B`
    Binary,
    /// `BOOL`
    Boolean,
    /// `NULL`
    Null,
}

impl Primitive {
    /// Lowercase type name used in messages.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Binary => "buffer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }
}

/// How a `Date` attribute is stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStorage {
    /// `N`, milliseconds since the epoch.
    #[default]
    Milliseconds,
    /// `N`, whole seconds since the epoch.
    Seconds,
    /// `S`, RFC 3339 with millisecond precision.
    Iso,
}

/// One declared possibility for an attribute's type.
#[derive(Debug, Clone)]
pub enum CandidateType {
    /// A wire primitive.
    Primitive(Primitive),
    /// A date backed by a number or an ISO string.
    Date(DateStorage),
    /// A nested object with its own schema.
    Object(Arc<Schema>),
    /// A list whose elements may be any of the given types.
    Array(Vec<CandidateType>),
    /// A string, number, binary or date set.
    Set(Box<CandidateType>),
    /// A string derived by joining other attributes.
    Combine {
        /// Source attribute names, in join order.
        attributes: Vec<String>,
        /// Separator placed between source values.
        separator: String,
    },
    /// A fixed literal.
    Constant(Value),
    /// The shape of the model's own root schema.
    SelfReference,
    /// Another registered model, by name.
    ModelReference(String),
}

impl CandidateType {
    /// `S`
    #[must_use]
    pub fn string() -> Self {
        Self::Primitive(Primitive::String)
    }

    /// `N`
    #[must_use]
    pub fn number() -> Self {
        Self::Primitive(Primitive::Number)
    }

    /// `B`
    #[must_use]
    pub fn binary() -> Self {
        Self::Primitive(Primitive::Binary)
    }

    /// `BOOL`
    #[must_use]
    pub fn boolean() -> Self {
        Self::Primitive(Primitive::Boolean)
    }

    /// `NULL`
    #[must_use]
    pub fn null() -> Self {
        Self::Primitive(Primitive::Null)
    }

    /// Date stored as epoch milliseconds.
    #[must_use]
    pub fn date() -> Self {
        Self::Date(DateStorage::Milliseconds)
    }

    /// Nested object.
    #[must_use]
    pub fn object(schema: Schema) -> Self {
        Self::Object(Arc::new(schema))
    }

    /// List of a single element type.
    #[must_use]
    pub fn array(element: Self) -> Self {
        Self::Array(vec![element])
    }

    /// Set of the given element type.
    #[must_use]
    pub fn set(element: Self) -> Self {
        Self::Set(Box::new(element))
    }

    /// Combine the given attributes with the default `,` separator.
    #[must_use]
    pub fn combine<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::combine_with(attributes, ",")
    }

    /// Combine the given attributes with a custom separator.
    #[must_use]
    pub fn combine_with<I, S>(attributes: I, separator: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Combine {
            attributes: attributes.into_iter().map(Into::into).collect(),
            separator: separator.into(),
        }
    }

    /// Fixed literal.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    /// Reference to another model.
    #[must_use]
    pub fn model(name: impl Into<String>) -> Self {
        Self::ModelReference(name.into())
    }

    /// Name used in type mismatch messages.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Primitive(p) => p.type_name().to_owned(),
            Self::Date(_) => "date".to_owned(),
            Self::Object(_) | Self::SelfReference => "object".to_owned(),
            Self::Array(_) => "array".to_owned(),
            Self::Set(element) => format!("{} set", element.type_name()),
            Self::Combine { .. } => "combine".to_owned(),
            Self::Constant(value) => format!("constant {}", describe(value)),
            Self::ModelReference(name) => format!("model {name}"),
        }
    }

    /// Returns `true` for `Combine`.
    #[must_use]
    pub fn is_combine(&self) -> bool {
        matches!(self, Self::Combine { .. })
    }

    /// Returns `true` for types that may be the element of a set.
    #[must_use]
    pub fn is_set_element(&self) -> bool {
        matches!(
            self,
            Self::Primitive(Primitive::String | Primitive::Number | Primitive::Binary)
                | Self::Date(_)
        )
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

/// Short JSON-like rendering of a value for error messages.
#[must_use]
pub fn describe(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_owned(),
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => dynamap_model::format_number(*n),
        Value::String(s) => format!("{s:?}"),
        Value::Binary(b) => format!("<{} bytes>", b.len()),
        Value::Date(d) => d.to_rfc3339(),
        Value::List(items) | Value::Set(items) => {
            let inner: Vec<String> = items.iter().map(describe).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Map(m) => {
            let inner: Vec<String> = m.iter().map(|(k, v)| format!("{k}: {}", describe(v))).collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}
