//! Wire type tags.
//!
//! Every DynamoDB attribute value is a single-key object whose key is one of
//! ten type tags. [`WireType`] names those tags so the rest of the workspace
//! never matches on raw strings.

use std::fmt;

/// One of the ten DynamoDB attribute-value type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
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
    /// `M`
    Map,
    /// `L`
    List,
    /// `SS`
    StringSet,
    /// `NS`
    NumberSet,
    /// `BS`
    BinarySet,
}

impl WireType {
    /// All tags, in the order DynamoDB documents them.
    pub const ALL: [Self; 10] = [
        Self::String,
        Self::Number,
        Self::Binary,
        Self::StringSet,
        Self::NumberSet,
        Self::BinarySet,
        Self::Boolean,
        Self::Null,
        Self::List,
        Self::Map,
    ];

    /// Tag strings accepted on the wire.
    pub const TAGS: [&'static str; 10] = ["S", "N", "B", "SS", "NS", "BS", "BOOL", "NULL", "L", "M"];

    /// Returns the wire tag (e.g. `"S"`, `"BOOL"`).
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::String => "S",
            Self::Number => "N",
            Self::Binary => "B",
            Self::Boolean => "BOOL",
            Self::Null => "NULL",
            Self::Map => "M",
            Self::List => "L",
            Self::StringSet => "SS",
            Self::NumberSet => "NS",
            Self::BinarySet => "BS",
        }
    }

    /// Parses a wire tag. Tags are case-sensitive.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_tag() == tag)
    }

    /// Human-readable type name used in mismatch messages.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Binary => "buffer",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Map => "object",
            Self::List => "array",
            Self::StringSet | Self::NumberSet | Self::BinarySet => "set",
        }
    }

    /// Returns `true` for `SS`, `NS` and `BS`.
    #[must_use]
    pub fn is_set(self) -> bool {
        matches!(self, Self::StringSet | Self::NumberSet | Self::BinarySet)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}
