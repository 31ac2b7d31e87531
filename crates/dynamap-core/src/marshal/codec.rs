//! Value codec: encoding a native value as a resolved candidate type, and
//! decoding a wire value back.
//!
//! The functions here are synchronous and hook-free. The marshaller layers
//! defaults, modifiers and validation on top of them; the expression
//! compilers use them directly to encode operand values.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use dynamap_model::{AttributeValue, format_number};

use crate::error::MapperResult;
use crate::resolver::{Scope, Subject, child_path, mismatch};
use crate::schema::{CandidateType, DateStorage, PathMatch, Primitive, Schema};
use crate::value::{Document, Value};

/// Encodes a date in the given storage.
pub(crate) fn encode_date(date: &DateTime<Utc>, storage: DateStorage) -> AttributeValue {
    match storage {
        DateStorage::Milliseconds => AttributeValue::N(date.timestamp_millis().to_string()),
        DateStorage::Seconds => AttributeValue::N(date.timestamp().to_string()),
        DateStorage::Iso => AttributeValue::S(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
    }
}

/// Decodes a date stored in the given storage.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn decode_date(value: &AttributeValue, storage: DateStorage) -> Option<DateTime<Utc>> {
    match (storage, value) {
        (DateStorage::Milliseconds, AttributeValue::N(n)) => {
            DateTime::from_timestamp_millis(parse_number(n)?.round() as i64)
        }
        (DateStorage::Seconds, AttributeValue::N(n)) => {
            DateTime::from_timestamp_millis((parse_number(n)? * 1000.0).round() as i64)
        }
        (DateStorage::Iso, AttributeValue::S(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        _ => None,
    }
}

/// A native value read as a date: dates as-is, numbers as epoch milliseconds.
pub(crate) fn date_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Date(date) => Some(*date),
        #[allow(clippy::cast_possible_truncation)]
        Value::Number(ms) if ms.is_finite() => DateTime::from_timestamp_millis(ms.round() as i64),
        _ => None,
    }
}

fn parse_number(n: &str) -> Option<f64> {
    n.parse::<f64>().ok()
}

/// Encodes a value by its own shape, without a schema.
///
/// Dates become epoch milliseconds. Returns `None` for `Undefined` and for
/// empty sets, which the wire cannot represent.
pub(crate) fn encode_natural(value: &Value) -> Option<AttributeValue> {
    Some(match value {
        Value::Undefined => return None,
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::number(*n),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Binary(b) => AttributeValue::B(b.clone()),
        Value::Date(d) => encode_date(d, DateStorage::Milliseconds),
        Value::List(items) => AttributeValue::L(items.iter().filter_map(encode_natural).collect()),
        Value::Set(items) => {
            let element = match items.first()? {
                Value::String(_) => CandidateType::string(),
                Value::Binary(_) => CandidateType::binary(),
                Value::Date(_) => CandidateType::date(),
                _ => CandidateType::number(),
            };
            return encode_set(items, &element, "").ok().flatten();
        }
        Value::Map(map) => AttributeValue::M(
            map.iter()
                .filter_map(|(k, v)| encode_natural(v).map(|v| (k.clone(), v)))
                .collect(),
        ),
    })
}

/// Decodes a wire value by its own shape, without a schema.
pub(crate) fn decode_natural(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => Value::Number(parse_number(n).unwrap_or(f64::NAN)),
        AttributeValue::B(b) => Value::Binary(b.clone()),
        AttributeValue::Ss(items) => Value::Set(items.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(items) => Value::Set(
            items
                .iter()
                .map(|n| Value::Number(parse_number(n).unwrap_or(f64::NAN)))
                .collect(),
        ),
        AttributeValue::Bs(items) => Value::Set(items.iter().cloned().map(Value::Binary).collect()),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::List(items.iter().map(decode_natural).collect()),
        AttributeValue::M(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), decode_natural(v)))
                .collect(),
        ),
    }
}

/// Returns `true` when a wire set carries the tag of the element type.
pub(crate) fn set_tag_matches(value: &AttributeValue, element: &CandidateType) -> bool {
    matches!(
        (value, element),
        (
            AttributeValue::Ss(_),
            CandidateType::Primitive(Primitive::String) | CandidateType::Date(DateStorage::Iso)
        ) | (
            AttributeValue::Ns(_),
            CandidateType::Primitive(Primitive::Number)
                | CandidateType::Date(DateStorage::Milliseconds | DateStorage::Seconds)
        ) | (AttributeValue::Bs(_), CandidateType::Primitive(Primitive::Binary))
    )
}

/// Encodes set members as the element type. Duplicates are dropped and an
/// empty set yields `None`.
pub(crate) fn encode_set(
    items: &[Value],
    element: &CandidateType,
    path: &str,
) -> MapperResult<Option<AttributeValue>> {
    let element_mismatch = |item: &Value| mismatch(path, std::slice::from_ref(element), item.type_name());
    let mut strings: Vec<String> = Vec::with_capacity(items.len());
    let mut binaries: Vec<Bytes> = Vec::new();
    for item in items {
        match (element, item) {
            (CandidateType::Primitive(Primitive::String), Value::String(s)) => strings.push(s.clone()),
            (CandidateType::Primitive(Primitive::Number), Value::Number(n)) => {
                strings.push(format_number(*n));
            }
            (CandidateType::Primitive(Primitive::Binary), Value::Binary(b)) => {
                if !binaries.contains(b) {
                    binaries.push(b.clone());
                }
            }
            (CandidateType::Date(storage), _) => {
                let date = date_from_value(item).ok_or_else(|| element_mismatch(item))?;
                match encode_date(&date, *storage) {
                    AttributeValue::S(s) | AttributeValue::N(s) => strings.push(s),
                    _ => {}
                }
            }
            _ => return Err(element_mismatch(item)),
        }
    }
    let mut seen = std::collections::HashSet::new();
    strings.retain(|s| seen.insert(s.clone()));

    if strings.is_empty() && binaries.is_empty() {
        return Ok(None);
    }
    Ok(Some(match element {
        CandidateType::Primitive(Primitive::Binary) => AttributeValue::Bs(binaries),
        CandidateType::Primitive(Primitive::String) | CandidateType::Date(DateStorage::Iso) => {
            AttributeValue::Ss(strings)
        }
        _ => AttributeValue::Ns(strings),
    }))
}

fn decode_set(value: &AttributeValue, element: &CandidateType) -> Option<Value> {
    let members = match (value, element) {
        (AttributeValue::Ss(items) | AttributeValue::Ns(items), CandidateType::Date(storage)) => {
            let wrap: fn(String) -> AttributeValue = match value {
                AttributeValue::Ss(_) => AttributeValue::S,
                _ => AttributeValue::N,
            };
            items
                .iter()
                .map(|s| decode_date(&wrap(s.clone()), *storage).map(Value::Date))
                .collect::<Option<Vec<_>>>()?
        }
        _ => match decode_natural(value) {
            Value::Set(items) => items,
            _ => return None,
        },
    };
    Some(Value::Set(members))
}

impl Scope<'_> {
    /// Resolves the type of `value` among `candidates` and encodes it.
    /// Returns `None` for values the wire omits (`Undefined`, empty sets).
    pub(crate) fn encode(
        &self,
        value: &Value,
        candidates: &[CandidateType],
        path: &str,
    ) -> MapperResult<Option<AttributeValue>> {
        if value.is_undefined() {
            return Ok(None);
        }
        let candidate = self.resolve(Subject::Native(value), candidates, path)?;
        self.encode_as(value, candidate, path)
    }

    /// Encodes `value` as an already resolved candidate.
    pub(crate) fn encode_as(
        &self,
        value: &Value,
        candidate: &CandidateType,
        path: &str,
    ) -> MapperResult<Option<AttributeValue>> {
        let wrong_type = || mismatch(path, std::slice::from_ref(candidate), value.type_name());
        match candidate {
            CandidateType::Primitive(_) | CandidateType::Constant(_) | CandidateType::Combine { .. } => {
                Ok(encode_natural(value))
            }
            CandidateType::Date(storage) => {
                let date = date_from_value(value).ok_or_else(wrong_type)?;
                Ok(Some(encode_date(&date, *storage)))
            }
            CandidateType::Set(element) => match value {
                Value::Set(items) | Value::List(items) => encode_set(items, element, path),
                _ => Err(wrong_type()),
            },
            CandidateType::Array(elements) => match value {
                Value::List(items) => {
                    let mut encoded = Vec::with_capacity(items.len());
                    for (index, item) in items.iter().enumerate() {
                        let item_path = child_path(path, &index.to_string());
                        if let Some(item) = self.encode(item, elements, &item_path)? {
                            encoded.push(item);
                        }
                    }
                    Ok(Some(AttributeValue::L(encoded)))
                }
                _ => Err(wrong_type()),
            },
            CandidateType::Object(_) | CandidateType::SelfReference | CandidateType::ModelReference(_) => {
                match value {
                    Value::Map(map) => {
                        let (scope, schema) = self.enter(candidate, path).ok_or_else(wrong_type)?;
                        Ok(Some(scope.encode_document(&schema, map, path)?))
                    }
                    _ => self.encode_reference_key(value, candidate, path),
                }
            }
        }
    }

    fn encode_document(
        &self,
        schema: &Schema,
        map: &Document,
        path: &str,
    ) -> MapperResult<AttributeValue> {
        let mut encoded = HashMap::with_capacity(map.len());
        for (key, value) in map {
            let field_path = child_path(path, key);
            match schema.attribute_by_native_name(key) {
                Some(attribute) => {
                    if let Some(value) = self.encode(value, attribute.types(), &field_path)? {
                        encoded.insert(attribute.name().to_owned(), value);
                    }
                }
                None => {
                    if let Some(value) = self.encode_unknown(value, &field_path) {
                        encoded.insert(key.clone(), value);
                    }
                }
            }
        }
        Ok(AttributeValue::M(encoded))
    }

    /// Encodes the parts of an undeclared value that `saveUnknown` keeps.
    ///
    /// A matched path keeps its scalar value, but a matched map or list only
    /// keeps the children whose own paths match, so `extra.*` stops one level
    /// below `extra` while `extra.**` keeps everything under it.
    pub(crate) fn encode_unknown(&self, value: &Value, path: &str) -> Option<AttributeValue> {
        let matched = self.unknown_match(path);
        if matched == PathMatch::None {
            return None;
        }
        match value {
            Value::Map(map) => {
                let kept: HashMap<String, AttributeValue> = map
                    .iter()
                    .filter_map(|(k, v)| {
                        self.encode_unknown(v, &child_path(path, k)).map(|v| (k.clone(), v))
                    })
                    .collect();
                (matched == PathMatch::Full || !kept.is_empty()).then_some(AttributeValue::M(kept))
            }
            Value::List(items) => {
                let kept: Vec<AttributeValue> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| self.encode_unknown(v, &child_path(path, &i.to_string())))
                    .collect();
                (matched == PathMatch::Full || !kept.is_empty()).then_some(AttributeValue::L(kept))
            }
            _ if matched == PathMatch::Full => encode_natural(value),
            _ => None,
        }
    }

    /// Decodes the parts of an undeclared wire value that `saveUnknown`
    /// keeps, with the same depth rules as [`Self::encode_unknown`].
    pub(crate) fn decode_unknown(&self, stored: &AttributeValue, path: &str) -> Option<Value> {
        let matched = self.unknown_match(path);
        if matched == PathMatch::None {
            return None;
        }
        match stored {
            AttributeValue::M(map) => {
                let kept: Document = map
                    .iter()
                    .filter_map(|(k, v)| {
                        self.decode_unknown(v, &child_path(path, k)).map(|v| (k.clone(), v))
                    })
                    .collect();
                (matched == PathMatch::Full || !kept.is_empty()).then_some(Value::Map(kept))
            }
            AttributeValue::L(items) => {
                let kept: Vec<Value> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| self.decode_unknown(v, &child_path(path, &i.to_string())))
                    .collect();
                (matched == PathMatch::Full || !kept.is_empty()).then_some(Value::List(kept))
            }
            _ if matched == PathMatch::Full => Some(decode_natural(stored)),
            _ => None,
        }
    }

    /// A model reference given as the referenced item's hash key.
    fn encode_reference_key(
        &self,
        value: &Value,
        candidate: &CandidateType,
        path: &str,
    ) -> MapperResult<Option<AttributeValue>> {
        let wrong_type = || mismatch(path, std::slice::from_ref(candidate), value.type_name());
        let CandidateType::ModelReference(name) = candidate else {
            return Err(wrong_type());
        };
        let model = self.registry.get(name).ok_or_else(wrong_type)?;
        let hash_key = model.schema().hash_key().ok_or_else(wrong_type)?;
        let scope = Scope::new(self.registry, std::sync::Arc::clone(model.schema()));
        scope.encode(value, hash_key.types(), path)
    }

    /// Decodes a wire value as an already resolved leaf candidate.
    ///
    /// Documents and lists are walked by the caller; here they are decoded by
    /// shape.
    pub(crate) fn decode_leaf(
        &self,
        value: &AttributeValue,
        candidate: &CandidateType,
        path: &str,
    ) -> MapperResult<Value> {
        let wrong_type = || mismatch(path, std::slice::from_ref(candidate), value.wire_type().type_name());
        match candidate {
            CandidateType::Date(storage) => decode_date(value, *storage)
                .map(Value::Date)
                .ok_or_else(wrong_type),
            CandidateType::Constant(constant) => Ok(constant.clone()),
            CandidateType::Set(element) => decode_set(value, element).ok_or_else(wrong_type),
            CandidateType::ModelReference(name) if !matches!(value, AttributeValue::M(_)) => {
                let model = self.registry.get(name).ok_or_else(wrong_type)?;
                let hash_key = model.schema().hash_key().ok_or_else(wrong_type)?;
                let scope = Scope::new(self.registry, std::sync::Arc::clone(model.schema()));
                let key_type = scope.resolve(Subject::Wire(value), hash_key.types(), path)?;
                scope.decode_leaf(value, key_type, path)
            }
            _ => Ok(decode_natural(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::registry::ModelRegistry;
    use crate::schema::AttributeDefinition;

    fn sample_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap() + chrono::Duration::milliseconds(250)
    }

    #[test]
    fn test_should_encode_dates_per_storage() {
        let date = sample_date();
        assert_eq!(
            encode_date(&date, DateStorage::Milliseconds),
            AttributeValue::N("1709296200250".to_owned())
        );
        assert_eq!(
            encode_date(&date, DateStorage::Seconds),
            AttributeValue::N("1709296200".to_owned())
        );
        assert_eq!(
            encode_date(&date, DateStorage::Iso),
            AttributeValue::S("2024-03-01T12:30:00.250Z".to_owned())
        );
    }

    #[test]
    fn test_should_round_trip_dates_to_the_millisecond() {
        let date = sample_date();
        for storage in [DateStorage::Milliseconds, DateStorage::Iso] {
            let encoded = encode_date(&date, storage);
            assert_eq!(decode_date(&encoded, storage), Some(date));
        }
        assert_eq!(decode_date(&AttributeValue::S("x".to_owned()), DateStorage::Iso), None);
        assert_eq!(
            decode_date(&AttributeValue::S("1".to_owned()), DateStorage::Milliseconds),
            None
        );
    }

    #[test]
    fn test_should_encode_natural_shapes() {
        assert_eq!(encode_natural(&Value::Undefined), None);
        assert_eq!(encode_natural(&Value::from(5)), Some(AttributeValue::N("5".to_owned())));
        assert_eq!(encode_natural(&Value::Set(Vec::new())), None);
        assert_eq!(
            encode_natural(&Value::Set(vec![Value::from("a"), Value::from("a")])),
            Some(AttributeValue::Ss(vec!["a".to_owned()]))
        );
    }

    #[test]
    fn test_should_match_set_tags() {
        let ns = AttributeValue::Ns(vec!["1".to_owned()]);
        assert!(set_tag_matches(&ns, &CandidateType::number()));
        assert!(set_tag_matches(&ns, &CandidateType::date()));
        assert!(!set_tag_matches(&ns, &CandidateType::string()));
        let ss = AttributeValue::Ss(vec!["a".to_owned()]);
        assert!(set_tag_matches(&ss, &CandidateType::Date(DateStorage::Iso)));
    }

    #[test]
    fn test_should_encode_nested_document_plainly() {
        let registry = ModelRegistry::new();
        let address = Schema::builder()
            .attribute("city", AttributeDefinition::new(CandidateType::string()))
            .build()
            .unwrap();
        let root = Schema::builder()
            .attribute("id", AttributeDefinition::new(CandidateType::number()))
            .build()
            .unwrap();
        let scope = Scope::new(&registry, std::sync::Arc::new(root));
        let value = Value::Map(Document::from([
            ("city".to_owned(), Value::from("Oslo")),
            ("zip".to_owned(), Value::from("0150")),
        ]));
        let encoded = scope
            .encode(&value, &[CandidateType::object(address)], "address")
            .unwrap()
            .unwrap();
        let map = encoded.as_m().unwrap();
        assert_eq!(map.get("city"), Some(&AttributeValue::S("Oslo".to_owned())));
        assert!(!map.contains_key("zip"));
    }
}
