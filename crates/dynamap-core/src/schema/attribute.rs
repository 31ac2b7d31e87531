//! Attribute definitions and their settings.

use std::fmt;

use super::hooks::{DefaultValue, Modifier, Validator};
use super::types::CandidateType;
use crate::value::Value;

/// Key role of an attribute.
///
/// `Hash` denotes the partition key; `Range` denotes the sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Partition key.
    Hash,
    /// Sort key.
    Range,
}

impl KeyType {
    /// Returns the DynamoDB wire-format string representation of this key type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "HASH",
            Self::Range => "RANGE",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-attribute settings.
#[derive(Debug, Clone, Default)]
pub struct AttributeSettings {
    /// The attribute must have a value on save.
    pub required: bool,
    /// Value used when the attribute is omitted.
    pub default: Option<DefaultValue>,
    /// Apply the default even when a value was supplied.
    pub force_default: bool,
    /// Custom validation rule.
    pub validate: Option<Validator>,
    /// Allowed values.
    pub enum_values: Option<Vec<Value>>,
    /// Read modifiers, applied in order.
    pub get: Vec<Modifier>,
    /// Write modifiers, applied in order.
    pub set: Vec<Modifier>,
    /// Native-side property name, if different from the stored name.
    pub alias: Option<String>,
    /// Key role, if any.
    pub key: Option<KeyType>,
}

/// A declared attribute: its name, its candidate types and its settings.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    pub(crate) name: String,
    types: Vec<CandidateType>,
    settings: AttributeSettings,
}

impl AttributeDefinition {
    /// Attribute with a single type.
    #[must_use]
    pub fn new(candidate: CandidateType) -> Self {
        Self::union(vec![candidate])
    }

    /// Attribute whose value may be any of the given types, tried in order.
    #[must_use]
    pub fn union(types: Vec<CandidateType>) -> Self {
        Self {
            name: String::new(),
            types,
            settings: AttributeSettings::default(),
        }
    }

    /// Marks the attribute as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.settings.required = true;
        self
    }

    /// Sets a default.
    #[must_use]
    pub fn default(mut self, default: DefaultValue) -> Self {
        self.settings.default = Some(default);
        self
    }

    /// Sets a literal default.
    #[must_use]
    pub fn default_value(self, value: impl Into<Value>) -> Self {
        self.default(DefaultValue::Literal(value.into()))
    }

    /// Applies the default even over supplied values.
    #[must_use]
    pub fn force_default(mut self) -> Self {
        self.settings.force_default = true;
        self
    }

    /// Sets the validation rule.
    #[must_use]
    pub fn validate(mut self, validator: Validator) -> Self {
        self.settings.validate = Some(validator);
        self
    }

    /// Restricts the attribute to the given values.
    #[must_use]
    pub fn enum_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.settings.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Appends a read modifier.
    #[must_use]
    pub fn get(mut self, modifier: Modifier) -> Self {
        self.settings.get.push(modifier);
        self
    }

    /// Appends a write modifier.
    #[must_use]
    pub fn set(mut self, modifier: Modifier) -> Self {
        self.settings.set.push(modifier);
        self
    }

    /// Sets the native-side property name.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.settings.alias = Some(alias.into());
        self
    }

    /// Marks the attribute as the partition key.
    #[must_use]
    pub fn hash_key(mut self) -> Self {
        self.settings.key = Some(KeyType::Hash);
        self
    }

    /// Marks the attribute as the sort key.
    #[must_use]
    pub fn range_key(mut self) -> Self {
        self.settings.key = Some(KeyType::Range);
        self
    }

    /// Stored attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property name on the native side: the alias, or the stored name.
    #[must_use]
    pub fn native_name(&self) -> &str {
        self.settings.alias.as_deref().unwrap_or(&self.name)
    }

    /// Candidate types, in declared order.
    #[must_use]
    pub fn types(&self) -> &[CandidateType] {
        &self.types
    }

    /// Settings.
    #[must_use]
    pub fn settings(&self) -> &AttributeSettings {
        &self.settings
    }

    /// Source attributes and separator when this is a combine attribute.
    #[must_use]
    pub fn combine(&self) -> Option<(&[String], &str)> {
        match self.types.as_slice() {
            [CandidateType::Combine {
                attributes,
                separator,
            }] => Some((attributes, separator)),
            _ => None,
        }
    }

    pub(crate) fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
