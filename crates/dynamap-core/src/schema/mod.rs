//! Schema registry: immutable, ordered attribute definitions.
//!
//! A [`Schema`] is built once through [`SchemaBuilder`], which checks the
//! structural invariants (unique dot-free names, at most one hash and one range
//! key, combine types standing alone) and never changes afterwards. Nested
//! objects hold their own `Arc<Schema>`; self and cross-model references are
//! named handles resolved at marshal time, so schemas never form cycles.

mod attribute;
mod hooks;
mod types;

use std::collections::HashSet;

pub use attribute::{AttributeDefinition, AttributeSettings, KeyType};
pub use hooks::{DefaultValue, Modifier, Validator};
pub use types::{CandidateType, DateStorage, Primitive, describe};

use crate::config::MapperConfig;
use crate::error::{MapperError, MapperResult};

/// Which undeclared attributes are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveUnknown {
    /// Undeclared attributes are dropped.
    #[default]
    Disabled,
    /// Every undeclared attribute is kept, at any depth.
    All,
    /// Undeclared attributes are kept when their dotted path matches one of
    /// these patterns. `*` matches one level, `**` one or more levels.
    Patterns(Vec<String>),
}

/// How a path relates to the `saveUnknown` patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum PathMatch {
    /// No pattern can match this path or anything below it.
    None,
    /// A pattern matches something below this path.
    Prefix,
    /// A pattern matches this path itself.
    Full,
}

impl SaveUnknown {
    /// Returns `true` when an undeclared attribute at `path` is kept.
    #[must_use]
    pub fn allows(&self, path: &str) -> bool {
        self.match_path(path) == PathMatch::Full
    }

    pub(crate) fn match_path(&self, path: &str) -> PathMatch {
        match self {
            Self::Disabled => PathMatch::None,
            Self::All => PathMatch::Full,
            Self::Patterns(patterns) => {
                let segments: Vec<&str> = path.split('.').collect();
                patterns
                    .iter()
                    .map(|pattern| {
                        let pattern: Vec<&str> = pattern.split('.').collect();
                        match_segments(&pattern, &segments)
                    })
                    .max()
                    .unwrap_or(PathMatch::None)
            }
        }
    }
}

fn match_segments(pattern: &[&str], path: &[&str]) -> PathMatch {
    match (pattern.split_first(), path.split_first()) {
        (None, None) => PathMatch::Full,
        (None, Some(_)) => PathMatch::None,
        (Some(_), None) => PathMatch::Prefix,
        (Some((&"**", rest)), Some((_, path_rest))) => {
            match_segments(rest, path_rest).max(match_segments(pattern, path_rest))
        }
        (Some((&"*", rest)), Some((_, path_rest))) => match_segments(rest, path_rest),
        (Some((head, rest)), Some((segment, path_rest))) if head == segment => {
            match_segments(rest, path_rest)
        }
        _ => PathMatch::None,
    }
}

/// Automatic `createdAt` / `updatedAt` attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampSettings {
    /// Name of the creation timestamp, if any.
    pub created_at: Option<String>,
    /// Name of the last-update timestamp, if any.
    pub updated_at: Option<String>,
    /// Storage of both timestamps.
    pub storage: DateStorage,
}

impl Default for TimestampSettings {
    fn default() -> Self {
        Self {
            created_at: Some("createdAt".to_owned()),
            updated_at: Some("updatedAt".to_owned()),
            storage: DateStorage::Milliseconds,
        }
    }
}

/// Schema-level settings.
#[derive(Debug, Clone, Default)]
pub struct SchemaSettings {
    /// Which undeclared attributes are kept.
    pub save_unknown: SaveUnknown,
    /// Automatic timestamps.
    pub timestamps: Option<TimestampSettings>,
}

/// An immutable, ordered set of attribute definitions.
#[derive(Debug, Clone)]
pub struct Schema {
    attributes: Vec<AttributeDefinition>,
    settings: SchemaSettings,
}

impl Schema {
    /// Starts a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Starts a schema whose defaults come from `config`.
    #[must_use]
    pub fn builder_with(config: &MapperConfig) -> SchemaBuilder {
        let mut builder = SchemaBuilder::default();
        if config.save_unknown_by_default {
            builder.settings.save_unknown = SaveUnknown::All;
        }
        builder
    }

    /// Looks up an attribute by stored name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Looks up an attribute by native property name (alias or stored name).
    #[must_use]
    pub fn attribute_by_native_name(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes
            .iter()
            .find(|a| a.settings().alias.as_deref() == Some(name))
            .or_else(|| self.attribute(name))
    }

    /// Attributes, in declared order.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    /// Schema settings.
    #[must_use]
    pub fn settings(&self) -> &SchemaSettings {
        &self.settings
    }

    /// The partition key: the attribute marked `hash_key`, or the first one.
    #[must_use]
    pub fn hash_key(&self) -> Option<&AttributeDefinition> {
        self.attributes
            .iter()
            .find(|a| a.settings().key == Some(KeyType::Hash))
            .or_else(|| self.attributes.first())
    }

    /// The sort key, if declared.
    #[must_use]
    pub fn range_key(&self) -> Option<&AttributeDefinition> {
        self.attributes
            .iter()
            .find(|a| a.settings().key == Some(KeyType::Range))
    }

    /// Returns `true` for the hash or range key.
    #[must_use]
    pub fn is_key(&self, name: &str) -> bool {
        self.hash_key().is_some_and(|a| a.name() == name)
            || self.range_key().is_some_and(|a| a.name() == name)
    }

    /// Returns a copy with one more attribute appended.
    pub(crate) fn with_attribute(
        &self,
        name: &str,
        definition: AttributeDefinition,
    ) -> MapperResult<Self> {
        let builder = SchemaBuilder {
            attributes: self.attributes.clone(),
            settings: SchemaSettings {
                timestamps: None,
                ..self.settings.clone()
            },
        };
        let mut schema = builder.attribute(name, definition).build()?;
        schema.settings.timestamps.clone_from(&self.settings.timestamps);
        Ok(schema)
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    attributes: Vec<AttributeDefinition>,
    settings: SchemaSettings,
}

impl SchemaBuilder {
    /// Declares an attribute. Declaration order is significant.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, definition: AttributeDefinition) -> Self {
        self.attributes.push(definition.named(name));
        self
    }

    /// Sets which undeclared attributes are kept.
    #[must_use]
    pub fn save_unknown(mut self, save_unknown: SaveUnknown) -> Self {
        self.settings.save_unknown = save_unknown;
        self
    }

    /// Enables automatic timestamps.
    #[must_use]
    pub fn timestamps(mut self, timestamps: TimestampSettings) -> Self {
        self.settings.timestamps = Some(timestamps);
        self
    }

    /// Validates and freezes the schema.
    pub fn build(mut self) -> MapperResult<Schema> {
        if let Some(timestamps) = self.settings.timestamps.clone() {
            for name in [&timestamps.created_at, &timestamps.updated_at]
                .into_iter()
                .flatten()
            {
                if !self.attributes.iter().any(|a| a.name() == name) {
                    let definition =
                        AttributeDefinition::new(CandidateType::Date(timestamps.storage));
                    self.attributes.push(definition.named(name.clone()));
                }
            }
        }

        let mut seen = HashSet::new();
        let mut hash_key = None;
        let mut range_key = None;
        for attribute in &self.attributes {
            let name = attribute.name();
            if name.is_empty() || name.contains('.') {
                return Err(MapperError::invalid(format!(
                    "Attribute name {name:?} is invalid: names can not be empty or contain '.'"
                )));
            }
            if !seen.insert(name) {
                return Err(MapperError::invalid(format!(
                    "Attribute {name} is declared more than once"
                )));
            }
            match attribute.settings().key {
                Some(KeyType::Hash) if hash_key.replace(name).is_some() => {
                    return Err(MapperError::invalid("Only one hashKey allowed per schema"));
                }
                Some(KeyType::Range) if range_key.replace(name).is_some() => {
                    return Err(MapperError::invalid("Only one rangeKey allowed per schema"));
                }
                _ => {}
            }
            validate_types(name, attribute.types(), true)?;
        }

        if hash_key.is_none() && range_key.is_some() {
            if let Some(first) = self.attributes.first() {
                if range_key == Some(first.name()) {
                    return Err(MapperError::invalid(format!(
                        "Attribute {} can not be both hashKey and rangeKey",
                        first.name()
                    )));
                }
            }
        }

        for attribute in &self.attributes {
            if let Some(alias) = attribute.settings().alias.as_deref() {
                if self.attributes.iter().any(|a| a.name() == alias) {
                    return Err(MapperError::invalid(format!(
                        "Alias {alias} of {} collides with a declared attribute",
                        attribute.name()
                    )));
                }
            }
            if let Some((sources, _)) = attribute.combine() {
                for source in sources {
                    let declared = self.attributes.iter().find(|a| a.name() == source);
                    match declared {
                        None => {
                            return Err(MapperError::invalid(format!(
                                "Combine attribute {} references undeclared attribute {source}",
                                attribute.name()
                            )));
                        }
                        Some(a) if a.combine().is_some() => {
                            return Err(MapperError::invalid(format!(
                                "Combine attribute {} can not source another combine attribute {source}",
                                attribute.name()
                            )));
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        Ok(Schema {
            attributes: self.attributes,
            settings: self.settings,
        })
    }
}

fn validate_types(name: &str, types: &[CandidateType], top_level: bool) -> MapperResult<()> {
    if types.is_empty() {
        return Err(MapperError::invalid(format!(
            "Attribute {name} must declare at least one type"
        )));
    }
    if types.iter().any(CandidateType::is_combine) && (types.len() > 1 || !top_level) {
        return Err(MapperError::invalid(format!(
            "Attribute {name}: a Combine type must be the only type of a top-level attribute"
        )));
    }
    for candidate in types {
        match candidate {
            CandidateType::Array(elements) => validate_types(name, elements, false)?,
            CandidateType::Set(element) if !element.is_set_element() => {
                return Err(MapperError::invalid(format!(
                    "Attribute {name}: sets may only hold strings, numbers, buffers or dates, not {}",
                    element.type_name()
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_invalid(result: MapperResult<Schema>, needle: &str) {
        match result {
            Err(MapperError::InvalidParameter { message }) => {
                assert!(message.contains(needle), "unexpected message: {message}");
            }
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_should_default_hash_key_to_first_attribute() {
        let schema = Schema::builder()
            .attribute("id", AttributeDefinition::new(CandidateType::number()))
            .attribute("name", AttributeDefinition::new(CandidateType::string()))
            .build()
            .unwrap();
        assert_eq!(schema.hash_key().unwrap().name(), "id");
        assert!(schema.range_key().is_none());
    }

    #[test]
    fn test_should_honor_explicit_keys() {
        let schema = Schema::builder()
            .attribute("name", AttributeDefinition::new(CandidateType::string()))
            .attribute("id", AttributeDefinition::new(CandidateType::number()).hash_key())
            .attribute("at", AttributeDefinition::new(CandidateType::date()).range_key())
            .build()
            .unwrap();
        assert_eq!(schema.hash_key().unwrap().name(), "id");
        assert_eq!(schema.range_key().unwrap().name(), "at");
        assert!(schema.is_key("at"));
        assert!(!schema.is_key("name"));
    }

    #[test]
    fn test_should_reject_dotted_name() {
        let result = Schema::builder()
            .attribute("a.b", AttributeDefinition::new(CandidateType::string()))
            .build();
        expect_invalid(result, "can not be empty or contain '.'");
    }

    #[test]
    fn test_should_reject_second_hash_key() {
        let result = Schema::builder()
            .attribute("a", AttributeDefinition::new(CandidateType::string()).hash_key())
            .attribute("b", AttributeDefinition::new(CandidateType::string()).hash_key())
            .build();
        expect_invalid(result, "Only one hashKey");
    }

    #[test]
    fn test_should_reject_implicit_hash_key_as_range_key() {
        let result = Schema::builder()
            .attribute("a", AttributeDefinition::new(CandidateType::string()).range_key())
            .build();
        expect_invalid(result, "both hashKey and rangeKey");
    }

    #[test]
    fn test_should_reject_combine_mixed_with_other_type() {
        let result = Schema::builder()
            .attribute("a", AttributeDefinition::new(CandidateType::string()))
            .attribute(
                "c",
                AttributeDefinition::union(vec![
                    CandidateType::combine(["a"]),
                    CandidateType::string(),
                ]),
            )
            .build();
        expect_invalid(result, "Combine type must be the only type");
    }

    #[test]
    fn test_should_reject_combine_of_undeclared_source() {
        let result = Schema::builder()
            .attribute("c", AttributeDefinition::new(CandidateType::combine(["missing"])))
            .build();
        expect_invalid(result, "undeclared attribute missing");
    }

    #[test]
    fn test_should_reject_set_of_objects() {
        let nested = Schema::builder().build().unwrap();
        let result = Schema::builder()
            .attribute(
                "s",
                AttributeDefinition::new(CandidateType::set(CandidateType::object(nested))),
            )
            .build();
        expect_invalid(result, "sets may only hold");
    }

    #[test]
    fn test_should_add_timestamp_attributes() {
        let schema = Schema::builder()
            .attribute("id", AttributeDefinition::new(CandidateType::string()))
            .timestamps(TimestampSettings::default())
            .build()
            .unwrap();
        let names: Vec<&str> = schema.attributes().iter().map(AttributeDefinition::name).collect();
        assert_eq!(names, vec!["id", "createdAt", "updatedAt"]);
    }

    #[test]
    fn test_should_match_save_unknown_patterns() {
        let save = SaveUnknown::Patterns(vec!["meta.*".to_owned(), "extra.**".to_owned()]);
        assert!(save.allows("meta.a"));
        assert!(!save.allows("meta.a.b"));
        assert!(!save.allows("meta"));
        assert_eq!(save.match_path("meta"), PathMatch::Prefix);
        assert!(save.allows("extra.a"));
        assert!(save.allows("extra.a.b.c"));
        assert!(!save.allows("other"));
        assert!(SaveUnknown::All.allows("anything.at.all"));
        assert!(!SaveUnknown::Disabled.allows("a"));
    }
}
