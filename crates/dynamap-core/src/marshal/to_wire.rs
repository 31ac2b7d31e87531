//! Native document -> wire item.

use chrono::Utc;
use dynamap_model::{AttributeValue, Item};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::codec::encode_natural;
use super::{
    MarshalOptions, RequiredCheck, TimestampMode, apply_set_modifiers, check_value,
    evaluate_default, join_sources, missing_required,
};
use crate::error::{MapperError, MapperResult};
use crate::resolver::{Scope, Subject, child_path, mismatch};
use crate::schema::{CandidateType, Schema};
use crate::value::{Document, Value};

/// Runs the write pipeline over one document (the item itself or a nested
/// object) and encodes it.
pub(crate) fn document_to_wire<'s>(
    scope: &'s Scope<'s>,
    schema: &'s Schema,
    document: &'s Document,
    path: &'s str,
    options: &'s MarshalOptions,
) -> BoxFuture<'s, MapperResult<Item>> {
    async move {
        let mut working = normalize_aliases(schema, document);
        stamp_timestamps(schema, &mut working, options.timestamps);

        // Pass 1: defaults and set modifiers.
        for attribute in schema.attributes() {
            let name = attribute.name();
            let attribute_path = child_path(path, name);
            let current = working.get(name);
            let wants_default = match current {
                None => options.defaults,
                Some(Value::Undefined) => false,
                Some(_) => attribute.settings().force_default && options.force_defaults,
            };
            if wants_default {
                if let Some(value) = evaluate_default(attribute, &working, &attribute_path).await? {
                    working.insert(name.to_owned(), value);
                }
            }
            if options.modifiers && !attribute.settings().set.is_empty() {
                if let Some(value) = working.get(name).filter(|v| !v.is_undefined()).cloned() {
                    let value = apply_set_modifiers(attribute, value, &attribute_path).await?;
                    working.insert(name.to_owned(), value);
                }
            }
        }

        if options.combine {
            recompute_combines(schema, &mut working, path)?;
        }

        // Pass 2: checks and encoding.
        let mut item = Item::new();
        for attribute in schema.attributes() {
            let name = attribute.name();
            let attribute_path = child_path(path, name);
            let value = working.get(name).filter(|v| !v.is_undefined());
            let is_missing = value.is_none();
            match options.required {
                RequiredCheck::All if attribute.settings().required && is_missing => {
                    return Err(missing_required(&attribute_path));
                }
                RequiredCheck::Present
                    if attribute.settings().required
                        && matches!(working.get(name), Some(Value::Undefined)) =>
                {
                    return Err(missing_required(&attribute_path));
                }
                _ => {}
            }
            let Some(value) = value else {
                continue;
            };
            check_value(attribute, value, &attribute_path, options).await?;
            if let Some(encoded) =
                value_to_wire(scope, value, attribute.types(), &attribute_path, options).await?
            {
                item.insert(name.to_owned(), encoded);
            }
        }

        for (key, value) in &working {
            if schema.attribute(key).is_some() {
                continue;
            }
            let unknown_path = child_path(path, key);
            match scope.encode_unknown(value, &unknown_path) {
                Some(encoded) => {
                    item.insert(key.clone(), encoded);
                }
                None => debug!(path = %unknown_path, "dropped undeclared attribute"),
            }
        }

        Ok(item)
    }
    .boxed()
}

/// Encodes one attribute value, running the nested pipeline for documents.
pub(crate) fn value_to_wire<'s>(
    scope: &'s Scope<'s>,
    value: &'s Value,
    candidates: &'s [CandidateType],
    path: &'s str,
    options: &'s MarshalOptions,
) -> BoxFuture<'s, MapperResult<Option<AttributeValue>>> {
    async move {
        if value.is_undefined() {
            return Ok(None);
        }
        let candidate = match scope.resolve(Subject::Native(value), candidates, path) {
            Ok(candidate) => candidate,
            Err(_) if !options.type_check => return Ok(encode_natural(value)),
            Err(err) => return Err(err),
        };
        match (candidate, value) {
            (
                CandidateType::Object(_)
                | CandidateType::SelfReference
                | CandidateType::ModelReference(_),
                Value::Map(map),
            ) => {
                let (nested, schema) = scope.enter(candidate, path).ok_or_else(|| {
                    mismatch(path, std::slice::from_ref(candidate), value.type_name())
                })?;
                let item = document_to_wire(&nested, &schema, map, path, options).await?;
                Ok(Some(AttributeValue::M(item)))
            }
            (CandidateType::Array(elements), Value::List(items)) => {
                let mut encoded = Vec::with_capacity(items.len());
                for (index, element) in items.iter().enumerate() {
                    let element_path = child_path(path, &index.to_string());
                    if let Some(element) =
                        value_to_wire(scope, element, elements, &element_path, options).await?
                    {
                        encoded.push(element);
                    }
                }
                Ok(Some(AttributeValue::L(encoded)))
            }
            _ => scope.encode_as(value, candidate, path),
        }
    }
    .boxed()
}

/// Keys declared attributes by stored name, whichever name the caller used.
fn normalize_aliases(schema: &Schema, document: &Document) -> Document {
    document
        .iter()
        .map(|(key, value)| {
            let key = schema
                .attribute_by_native_name(key)
                .map_or_else(|| key.clone(), |a| a.name().to_owned());
            (key, value.clone())
        })
        .collect()
}

fn stamp_timestamps(schema: &Schema, document: &mut Document, mode: TimestampMode) {
    let Some(timestamps) = &schema.settings().timestamps else {
        return;
    };
    let now = Value::Date(Utc::now());
    if mode == TimestampMode::Create {
        if let Some(created_at) = &timestamps.created_at {
            document.entry(created_at.clone()).or_insert_with(|| now.clone());
        }
    }
    if mode != TimestampMode::Off {
        if let Some(updated_at) = &timestamps.updated_at {
            document.insert(updated_at.clone(), now);
        }
    }
}

/// Joins the sources of every combine attribute into it.
///
/// A value supplied for a combine attribute is replaced when its sources are
/// present, rejected when some are missing, and dropped when all are.
fn recompute_combines(schema: &Schema, document: &mut Document, path: &str) -> MapperResult<()> {
    for attribute in schema.attributes() {
        let Some((sources, separator)) = attribute.combine() else {
            continue;
        };
        let attribute_path = child_path(path, attribute.name());
        let present: Vec<&Value> = sources
            .iter()
            .filter_map(|s| document.get(s).filter(|v| !v.is_undefined()))
            .collect();
        let missing: Vec<&str> = sources
            .iter()
            .filter(|s| document.get(*s).is_none_or(Value::is_undefined))
            .map(String::as_str)
            .collect();
        let supplied = document
            .get(attribute.name())
            .is_some_and(|v| !v.is_undefined());

        if supplied && !missing.is_empty() {
            return Err(MapperError::invalid(format!(
                "{attribute_path} can not be set directly while its sources are missing: {}",
                missing.join(", ")
            )));
        }
        if present.is_empty() {
            document.remove(attribute.name());
            continue;
        }
        let combined = join_sources(&present, separator, &attribute_path)?;
        document.insert(attribute.name().to_owned(), Value::String(combined));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::marshal::document_from_wire;
    use crate::registry::ModelRegistry;
    use crate::schema::{AttributeDefinition, DefaultValue, SaveUnknown};

    async fn write(schema: Schema, document: Document, options: MarshalOptions) -> MapperResult<Item> {
        let registry = ModelRegistry::new();
        let scope = Scope::new(&registry, Arc::new(schema));
        let root = Arc::clone(&scope.root);
        document_to_wire(&scope, &root, &document, "", &options).await
    }

    fn id_only() -> crate::schema::SchemaBuilder {
        Schema::builder().attribute("id", AttributeDefinition::new(CandidateType::number()))
    }

    fn doc<const N: usize>(entries: [(&str, Value); N]) -> Document {
        entries.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
    }

    fn n(value: &str) -> AttributeValue {
        AttributeValue::N(value.to_owned())
    }

    fn unknown_schema() -> Schema {
        id_only()
            .save_unknown(SaveUnknown::Patterns(vec![
                "extra.*".to_owned(),
                "meta.**".to_owned(),
            ]))
            .build()
            .unwrap()
    }

    fn nested() -> Value {
        Value::Map(doc([
            ("a", Value::Map(doc([("deep", Value::from(1))]))),
            ("b", Value::from(2)),
        ]))
    }

    #[tokio::test]
    async fn test_should_keep_unknown_attributes_to_pattern_depth() {
        let document = doc([("id", Value::from(1)), ("extra", nested()), ("meta", nested())]);
        let item = write(unknown_schema(), document, MarshalOptions::plain())
            .await
            .unwrap();

        let one_level = AttributeValue::M(
            [
                ("a".to_owned(), AttributeValue::M(Item::new())),
                ("b".to_owned(), n("2")),
            ]
            .into(),
        );
        assert_eq!(item.get("extra"), Some(&one_level));
        let AttributeValue::M(meta) = &item["meta"] else {
            panic!("meta should be a map");
        };
        assert_eq!(
            meta.get("a"),
            Some(&AttributeValue::M([("deep".to_owned(), n("1"))].into()))
        );
    }

    #[tokio::test]
    async fn test_should_read_unknown_attributes_to_pattern_depth() {
        let stored: Item = [
            ("id".to_owned(), n("1")),
            (
                "extra".to_owned(),
                AttributeValue::M(
                    [
                        (
                            "a".to_owned(),
                            AttributeValue::M([("deep".to_owned(), n("1"))].into()),
                        ),
                        ("b".to_owned(), n("2")),
                    ]
                    .into(),
                ),
            ),
        ]
        .into();
        let registry = ModelRegistry::new();
        let scope = Scope::new(&registry, Arc::new(unknown_schema()));
        let root = Arc::clone(&scope.root);
        let options = MarshalOptions::plain();
        let document = document_from_wire(&scope, &root, &stored, "", &options)
            .await
            .unwrap();
        assert_eq!(
            document.get("extra"),
            Some(&Value::Map(doc([
                ("a", Value::Map(Document::new())),
                ("b", Value::from(2)),
            ])))
        );
    }

    #[tokio::test]
    async fn test_should_not_default_over_undefined() {
        let schema = id_only()
            .attribute(
                "status",
                AttributeDefinition::new(CandidateType::string()).default_value("active"),
            )
            .build()
            .unwrap();
        let item = write(
            schema.clone(),
            doc([("id", Value::from(1)), ("status", Value::Undefined)]),
            MarshalOptions::save(),
        )
        .await
        .unwrap();
        assert!(!item.contains_key("status"));

        let item = write(schema, doc([("id", Value::from(1))]), MarshalOptions::save())
            .await
            .unwrap();
        assert_eq!(item.get("status"), Some(&AttributeValue::S("active".to_owned())));
    }

    #[tokio::test]
    async fn test_should_force_default_over_supplied_value() {
        let schema = id_only()
            .attribute(
                "b",
                AttributeDefinition::new(CandidateType::string())
                    .default_value("f")
                    .force_default(),
            )
            .build()
            .unwrap();
        let item = write(
            schema,
            doc([("id", Value::from(1)), ("b", Value::from("caller"))]),
            MarshalOptions::save(),
        )
        .await
        .unwrap();
        assert_eq!(item.get("b"), Some(&AttributeValue::S("f".to_owned())));
        assert_eq!(item.get("id"), Some(&n("1")));
    }

    #[tokio::test]
    async fn test_should_run_defaults_in_declared_order() {
        let schema = id_only()
            .attribute(
                "first",
                AttributeDefinition::new(CandidateType::string()).default_value("Ada"),
            )
            .attribute(
                "greeting",
                AttributeDefinition::new(CandidateType::string()).default(
                    DefaultValue::asynchronous(|document: Document| async move {
                        let first = document
                            .get("first")
                            .and_then(Value::as_str)
                            .unwrap_or("nobody")
                            .to_owned();
                        Ok(Value::String(format!("hi {first}")))
                    }),
                ),
            )
            .build()
            .unwrap();
        let item = write(schema, doc([("id", Value::from(1))]), MarshalOptions::save())
            .await
            .unwrap();
        assert_eq!(
            item.get("greeting"),
            Some(&AttributeValue::S("hi Ada".to_owned()))
        );
    }
}
