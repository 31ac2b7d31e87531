//! Per-model entry point for marshalling and expression compilation.

use std::sync::Arc;

use chrono::Utc;
use dynamap_model::{CompiledExpression, Item};
use tracing::debug;

use crate::error::MapperResult;
use crate::expression::{Condition, UpdateOptions, compile_condition, compile_update};
use crate::marshal::codec::date_from_value;
use crate::marshal::{MarshalOptions, document_from_wire, document_to_wire, missing_required};
use crate::registry::{Model, ModelRegistry};
use crate::resolver::{Scope, Subject};
use crate::schema::CandidateType;
use crate::value::{Document, Value};

/// Marshals items of one model and compiles expressions against its schema.
///
/// Obtained from [`ModelRegistry::mapper`]; model references inside the
/// schema resolve through the same registry.
#[derive(Debug, Clone)]
pub struct Mapper<'a> {
    registry: &'a ModelRegistry,
    model: Arc<Model>,
}

impl<'a> Mapper<'a> {
    pub(crate) fn new(registry: &'a ModelRegistry, model: Arc<Model>) -> Self {
        Self { registry, model }
    }

    /// The model this mapper works on.
    #[must_use]
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    fn scope(&self) -> Scope<'a> {
        Scope::new(self.registry, Arc::clone(self.model.schema()))
    }

    /// Runs the write pipeline and encodes `document` as a wire item.
    pub async fn to_wire(&self, document: &Document, options: &MarshalOptions) -> MapperResult<Item> {
        let scope = self.scope();
        let schema = Arc::clone(&scope.root);
        let item = document_to_wire(&scope, &schema, document, "", options).await?;
        debug!(
            model = %self.model.name(),
            attributes = item.len(),
            "marshalled item"
        );
        Ok(item)
    }

    /// Decodes a wire item. Returns `None` for an expired item when the model
    /// hides expired items and `options.check_expiry` is on.
    pub async fn from_wire(
        &self,
        item: &Item,
        options: &MarshalOptions,
    ) -> MapperResult<Option<Document>> {
        let scope = self.scope();
        let schema = Arc::clone(&scope.root);
        let document = document_from_wire(&scope, &schema, item, "", options).await?;
        if options.check_expiry && self.is_expired(&document) {
            debug!(model = %self.model.name(), "skipped expired item");
            return Ok(None);
        }
        Ok(Some(document))
    }

    fn is_expired(&self, document: &Document) -> bool {
        let Some(expires) = &self.model.settings().expires else {
            return false;
        };
        if expires.return_expired {
            return false;
        }
        document
            .get(&expires.attribute)
            .and_then(date_from_value)
            .is_some_and(|expiry| expiry < Utc::now())
    }

    /// Compiles a condition into expression text and placeholder maps.
    pub fn compile_condition(&self, condition: &Condition) -> MapperResult<CompiledExpression> {
        compile_condition(&self.scope(), condition)
    }

    /// Compiles an update document into an `UpdateExpression`.
    pub async fn compile_update(
        &self,
        update: &Document,
        options: &UpdateOptions,
    ) -> MapperResult<CompiledExpression> {
        compile_update(&self.scope(), update, options).await
    }

    /// Resolves which candidate type `value` takes at the dotted `path`.
    ///
    /// Returns `None` for undeclared paths kept by `saveUnknown`.
    pub fn resolve_type(&self, value: &Value, path: &str) -> MapperResult<Option<CandidateType>> {
        let scope = self.scope();
        let resolved = scope.lookup(path)?;
        let Some(candidates) = resolved.candidates else {
            return Ok(None);
        };
        scope
            .resolve(Subject::Native(value), &candidates, path)
            .map(|candidate| Some(candidate.clone()))
    }

    /// Encodes only the hash and range key attributes of `document`.
    pub fn key_to_wire(&self, document: &Document) -> MapperResult<Item> {
        let scope = self.scope();
        let schema = self.model.schema();
        let mut key = Item::new();
        for attribute in [schema.hash_key(), schema.range_key()].into_iter().flatten() {
            let name = attribute.name();
            let value = document
                .get(attribute.native_name())
                .or_else(|| document.get(name))
                .ok_or_else(|| missing_required(name))?;
            let encoded = scope
                .encode(value, attribute.types(), name)?
                .ok_or_else(|| missing_required(name))?;
            key.insert(name.to_owned(), encoded);
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dynamap_model::AttributeValue;

    use super::*;
    use crate::registry::{ExpiresSettings, ModelSettings};
    use crate::schema::{AttributeDefinition, Schema};

    fn registry(expires: Option<ExpiresSettings>) -> ModelRegistry {
        let schema = Schema::builder()
            .attribute("id", AttributeDefinition::new(CandidateType::string()).hash_key())
            .attribute("sort", AttributeDefinition::new(CandidateType::number()).range_key())
            .attribute(
                "value",
                AttributeDefinition::union(vec![CandidateType::number(), CandidateType::string()]),
            )
            .build()
            .unwrap();
        let registry = ModelRegistry::new();
        registry
            .register(Model::new("Thing", schema, ModelSettings { expires }).unwrap())
            .unwrap();
        registry
    }

    fn thing() -> Document {
        Document::from([
            ("id".to_owned(), Value::from("a")),
            ("sort".to_owned(), Value::from(1)),
            ("value".to_owned(), Value::from("x")),
        ])
    }

    #[tokio::test]
    async fn test_should_round_trip_item() {
        let registry = registry(None);
        let mapper = registry.mapper("Thing").unwrap();
        let item = mapper.to_wire(&thing(), &MarshalOptions::save()).await.unwrap();
        assert_eq!(item.get("value"), Some(&AttributeValue::S("x".to_owned())));
        let back = mapper.from_wire(&item, &MarshalOptions::read()).await.unwrap();
        assert_eq!(back, Some(thing()));
    }

    #[test]
    fn test_should_encode_key_only() {
        let registry = registry(None);
        let mapper = registry.mapper("Thing").unwrap();
        let key = mapper.key_to_wire(&thing()).unwrap();
        assert_eq!(key.len(), 2);
        assert_eq!(key.get("sort"), Some(&AttributeValue::N("1".to_owned())));

        let mut partial = thing();
        partial.remove("sort");
        assert!(mapper.key_to_wire(&partial).is_err());
    }

    #[test]
    fn test_should_resolve_type_of_union() {
        let registry = registry(None);
        let mapper = registry.mapper("Thing").unwrap();
        let resolved = mapper.resolve_type(&Value::from("x"), "value").unwrap();
        assert_eq!(resolved.map(|c| c.type_name()), Some("string".to_owned()));
        let resolved = mapper.resolve_type(&Value::from(3), "value").unwrap();
        assert_eq!(resolved.map(|c| c.type_name()), Some("number".to_owned()));
        assert!(mapper.resolve_type(&Value::Bool(true), "value").is_err());
    }

    #[tokio::test]
    async fn test_should_hide_expired_items() {
        let mut expires = ExpiresSettings::new(Duration::from_secs(60));
        expires.return_expired = false;
        let registry = registry(Some(expires));
        let mapper = registry.mapper("Thing").unwrap();

        let mut item = mapper.to_wire(&thing(), &MarshalOptions::save()).await.unwrap();
        assert!(item.contains_key("ttl"));
        assert!(mapper.from_wire(&item, &MarshalOptions::read()).await.unwrap().is_some());

        item.insert("ttl".to_owned(), AttributeValue::N("1000".to_owned()));
        assert!(mapper.from_wire(&item, &MarshalOptions::read()).await.unwrap().is_none());
        assert!(
            mapper
                .from_wire(&item, &MarshalOptions::plain())
                .await
                .unwrap()
                .is_some()
        );
    }
}
