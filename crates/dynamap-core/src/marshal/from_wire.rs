//! Wire item -> native document.

use dynamap_model::{AttributeValue, Item};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::codec::decode_natural;
use super::{MarshalOptions, apply_get_modifiers};
use crate::error::MapperResult;
use crate::resolver::{Scope, Subject, child_path, mismatch};
use crate::schema::{CandidateType, Schema};
use crate::value::{Document, Value};

/// Decodes one wire document (the item itself or a nested map). Declared
/// attributes come out under their native names.
pub(crate) fn document_from_wire<'s>(
    scope: &'s Scope<'s>,
    schema: &'s Schema,
    item: &'s Item,
    path: &'s str,
    options: &'s MarshalOptions,
) -> BoxFuture<'s, MapperResult<Document>> {
    async move {
        let mut document = Document::new();
        for attribute in schema.attributes() {
            let Some(stored) = item.get(attribute.name()) else {
                continue;
            };
            let attribute_path = child_path(path, attribute.name());
            let mut value =
                value_from_wire(scope, stored, attribute.types(), &attribute_path, options).await?;
            if options.modifiers {
                value = apply_get_modifiers(attribute, value, &attribute_path).await?;
            }
            document.insert(attribute.native_name().to_owned(), value);
        }

        // Sorted for a deterministic result.
        let mut unknown: Vec<(&String, &AttributeValue)> = item
            .iter()
            .filter(|(key, _)| schema.attribute(key).is_none())
            .collect();
        unknown.sort_by(|a, b| a.0.cmp(b.0));
        for (key, stored) in unknown {
            let unknown_path = child_path(path, key);
            match scope.decode_unknown(stored, &unknown_path) {
                Some(value) => {
                    document.insert(key.clone(), value);
                }
                None => debug!(path = %unknown_path, "dropped undeclared attribute"),
            }
        }
        Ok(document)
    }
    .boxed()
}

fn value_from_wire<'s>(
    scope: &'s Scope<'s>,
    stored: &'s AttributeValue,
    candidates: &'s [CandidateType],
    path: &'s str,
    options: &'s MarshalOptions,
) -> BoxFuture<'s, MapperResult<Value>> {
    async move {
        let candidate = match scope.resolve(Subject::Wire(stored), candidates, path) {
            Ok(candidate) => candidate,
            Err(_) if !options.type_check => return Ok(decode_natural(stored)),
            Err(err) => return Err(err),
        };
        match (candidate, stored) {
            (
                CandidateType::Object(_)
                | CandidateType::SelfReference
                | CandidateType::ModelReference(_),
                AttributeValue::M(map),
            ) => {
                let (nested, schema) = scope.enter(candidate, path).ok_or_else(|| {
                    mismatch(
                        path,
                        std::slice::from_ref(candidate),
                        stored.wire_type().type_name(),
                    )
                })?;
                let document = document_from_wire(&nested, &schema, map, path, options).await?;
                Ok(Value::Map(document))
            }
            (CandidateType::Array(elements), AttributeValue::L(items)) => {
                let mut decoded = Vec::with_capacity(items.len());
                for (index, element) in items.iter().enumerate() {
                    let element_path = child_path(path, &index.to_string());
                    decoded.push(
                        value_from_wire(scope, element, elements, &element_path, options).await?,
                    );
                }
                Ok(Value::List(decoded))
            }
            _ => scope.decode_leaf(stored, candidate, path),
        }
    }
    .boxed()
}
