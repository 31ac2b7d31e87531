//! Models and the model registry.
//!
//! A [`Model`] pairs a name with its root [`Schema`]. Models are registered in
//! a [`ModelRegistry`], which resolves `ModelReference` handles by name at
//! marshal and compile time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::error::{MapperError, MapperResult};
use crate::mapper::Mapper;
use crate::schema::{AttributeDefinition, CandidateType, DateStorage, DefaultValue, Schema};
use crate::value::Value;

/// Item expiry backed by the DynamoDB TTL attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiresSettings {
    /// Lifetime of a new item.
    pub ttl: Duration,
    /// Name of the expiry attribute.
    pub attribute: String,
    /// Return items whose expiry has passed but which DynamoDB has not
    /// deleted yet.
    pub return_expired: bool,
}

impl ExpiresSettings {
    /// Expiry stored in the `ttl` attribute, returning expired items.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            attribute: "ttl".to_owned(),
            return_expired: true,
        }
    }
}

/// Model-level settings.
#[derive(Debug, Clone, Default)]
pub struct ModelSettings {
    /// Item expiry.
    pub expires: Option<ExpiresSettings>,
}

/// A named schema.
#[derive(Debug)]
pub struct Model {
    name: String,
    schema: Arc<Schema>,
    settings: ModelSettings,
}

impl Model {
    /// Creates a model. With `expires`, an expiry attribute stored as epoch
    /// seconds and defaulting to now + ttl is added unless already declared.
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        settings: ModelSettings,
    ) -> MapperResult<Self> {
        let schema = match &settings.expires {
            Some(expires) if schema.attribute(&expires.attribute).is_none() => {
                let ttl = chrono::Duration::from_std(expires.ttl).map_err(|e| {
                    MapperError::invalid(format!("expires ttl is out of range: {e}"))
                })?;
                let definition = AttributeDefinition::new(CandidateType::Date(DateStorage::Seconds))
                    .default(DefaultValue::from_fn(move |_| Value::Date(Utc::now() + ttl)));
                schema.with_attribute(&expires.attribute, definition)?
            }
            _ => schema,
        };
        Ok(Self {
            name: name.into(),
            schema: Arc::new(schema),
            settings,
        })
    }

    /// Model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Model settings.
    #[must_use]
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }
}

/// Concurrent map of models keyed by name.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: DashMap<String, Arc<Model>>,
}

impl ModelRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model. Names are unique.
    pub fn register(&self, model: Model) -> MapperResult<Arc<Model>> {
        let name = model.name().to_owned();
        match self.models.entry(name) {
            Entry::Occupied(entry) => Err(MapperError::invalid(format!(
                "Model {} is already registered",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                let model = Arc::new(model);
                debug!(
                    model = %model.name(),
                    attributes = model.schema().attributes().len(),
                    "registered model"
                );
                entry.insert(Arc::clone(&model));
                Ok(model)
            }
        }
    }

    /// Looks up a model.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).map(|m| Arc::clone(m.value()))
    }

    /// Returns `true` when a model with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Marshalling and compilation entry point for a registered model.
    pub fn mapper(&self, name: &str) -> MapperResult<Mapper<'_>> {
        let model = self
            .get(name)
            .ok_or_else(|| MapperError::invalid(format!("Model {name} is not registered")))?;
        Ok(Mapper::new(self, model))
    }
}
