//! DynamoDB `AttributeValue` type with custom serialization.
//!
//! `AttributeValue` is a tagged union where exactly one variant is present.
//! The JSON wire format uses single-key objects like `{"S": "hello"}`.

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::wire_type::WireType;

/// DynamoDB attribute value.
///
/// Numbers are always string-encoded to preserve arbitrary precision.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// String value.
    S(String),
    /// Number value (string-encoded for arbitrary precision).
    N(String),
    /// Binary value (base64-encoded in JSON).
    B(bytes::Bytes),
    /// String Set.
    Ss(Vec<String>),
    /// Number Set (string-encoded).
    Ns(Vec<String>),
    /// Binary Set (base64-encoded in JSON).
    Bs(Vec<bytes::Bytes>),
    /// Boolean value.
    Bool(bool),
    /// Null value.
    Null(bool),
    /// List of attribute values.
    L(Vec<AttributeValue>),
    /// Map of attribute values.
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Builds an `N` value from a float, using integer notation when the
    /// value is integral.
    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::N(format_number(value))
    }

    /// Returns the wire tag of this value.
    #[must_use]
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::S(_) => WireType::String,
            Self::N(_) => WireType::Number,
            Self::B(_) => WireType::Binary,
            Self::Ss(_) => WireType::StringSet,
            Self::Ns(_) => WireType::NumberSet,
            Self::Bs(_) => WireType::BinarySet,
            Self::Bool(_) => WireType::Boolean,
            Self::Null(_) => WireType::Null,
            Self::L(_) => WireType::List,
            Self::M(_) => WireType::Map,
        }
    }

    /// Returns the string value if this is an `S` variant.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number string if this is an `N` variant.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the map if this is an `M` variant.
    #[must_use]
    pub fn as_m(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the list if this is an `L` variant.
    #[must_use]
    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(l) => Some(l),
            _ => None,
        }
    }

    /// Returns `true` for an empty `L`, `M` or set value.
    #[must_use]
    pub fn is_empty_container(&self) -> bool {
        match self {
            Self::L(v) => v.is_empty(),
            Self::M(m) => m.is_empty(),
            Self::Ss(v) | Self::Ns(v) => v.is_empty(),
            Self::Bs(v) => v.is_empty(),
            _ => false,
        }
    }
}

/// Formats a number the way DynamoDB clients expect: integral values without
/// a fractional part, everything else with the shortest round-trip form.
#[must_use]
pub fn format_number(v: f64) -> String {
    // Truncation is exact: the value is integral and within i64 range.
    #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        let tag = self.wire_type().as_tag();
        match self {
            Self::S(s) | Self::N(s) => map.serialize_entry(tag, s)?,
            Self::B(b) => map.serialize_entry(tag, &BASE64.encode(b))?,
            Self::Ss(v) | Self::Ns(v) => map.serialize_entry(tag, v)?,
            Self::Bs(v) => {
                let encoded: Vec<String> = v.iter().map(|b| BASE64.encode(b)).collect();
                map.serialize_entry(tag, &encoded)?;
            }
            Self::Bool(b) | Self::Null(b) => map.serialize_entry(tag, b)?,
            Self::L(list) => map.serialize_entry(tag, list)?,
            Self::M(m) => map.serialize_entry(tag, m)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a DynamoDB AttributeValue object with exactly one type key")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let Some(key) = map.next_key::<String>()? else {
            return Err(de::Error::custom(
                "AttributeValue must have exactly one key",
            ));
        };
        let Some(wire_type) = WireType::from_tag(&key) else {
            return Err(de::Error::unknown_field(&key, &WireType::TAGS));
        };

        let value = match wire_type {
            WireType::String => AttributeValue::S(map.next_value()?),
            WireType::Number => AttributeValue::N(map.next_value()?),
            WireType::Binary => {
                let encoded: String = map.next_value()?;
                AttributeValue::B(decode_base64(&encoded).map_err(de::Error::custom)?)
            }
            WireType::StringSet => AttributeValue::Ss(map.next_value()?),
            WireType::NumberSet => AttributeValue::Ns(map.next_value()?),
            WireType::BinarySet => {
                let encoded: Vec<String> = map.next_value()?;
                let decoded: Result<Vec<bytes::Bytes>, _> =
                    encoded.iter().map(|e| decode_base64(e)).collect();
                AttributeValue::Bs(decoded.map_err(de::Error::custom)?)
            }
            WireType::Boolean => AttributeValue::Bool(map.next_value()?),
            WireType::Null => AttributeValue::Null(map.next_value()?),
            WireType::List => AttributeValue::L(map.next_value()?),
            WireType::Map => AttributeValue::M(map.next_value()?),
        };

        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom(
                "AttributeValue must have exactly one key",
            ));
        }

        Ok(value)
    }
}

fn decode_base64(encoded: &str) -> Result<bytes::Bytes, base64::DecodeError> {
    BASE64.decode(encoded).map(bytes::Bytes::from)
}
