//! Item marshaller: native documents to wire items and back.
//!
//! Writing runs a fixed pipeline over the schema's attributes, in declared
//! order: defaults and `set` modifiers, combine recomputation, then
//! `required` / `enum` / `validate` checks and encoding. Reading decodes each
//! declared attribute by scoring its wire shape and runs `get` modifiers.
//! Hooks are awaited one at a time.

pub(crate) mod codec;
mod from_wire;
mod to_wire;

pub(crate) use from_wire::document_from_wire;
pub(crate) use to_wire::{document_to_wire, value_to_wire};

use crate::config::MapperConfig;
use crate::error::{MapperError, MapperResult};
use crate::schema::{AttributeDefinition, describe};
use crate::value::{Document, Value};

/// Which `required` attributes are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequiredCheck {
    /// No check.
    Off,
    /// Only attributes present in the document (partial writes).
    Present,
    /// Every required attribute.
    #[default]
    All,
}

/// Which automatic timestamps are stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampMode {
    /// None.
    Off,
    /// `createdAt` (when absent) and `updatedAt`.
    #[default]
    Create,
    /// `updatedAt` only.
    Update,
}

/// Switches for the marshalling pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct MarshalOptions {
    /// Fill absent attributes from their defaults.
    pub defaults: bool,
    /// Re-apply `force_default` attributes over supplied values.
    pub force_defaults: bool,
    /// Run `set` modifiers on write and `get` modifiers on read.
    pub modifiers: bool,
    /// Run custom validators.
    pub validate: bool,
    /// Required-attribute checking.
    pub required: RequiredCheck,
    /// Check `enum` restrictions.
    pub enum_check: bool,
    /// Recompute combine attributes.
    pub combine: bool,
    /// Reject values no candidate type accepts. When off, such values are
    /// encoded or decoded by their own shape.
    pub type_check: bool,
    /// Automatic timestamps.
    pub timestamps: TimestampMode,
    /// Hide expired items on read.
    pub check_expiry: bool,
}

impl MarshalOptions {
    /// Full write pipeline, as used when saving a new item.
    #[must_use]
    pub fn save() -> Self {
        Self {
            defaults: true,
            force_defaults: true,
            modifiers: true,
            validate: true,
            required: RequiredCheck::All,
            enum_check: true,
            combine: true,
            type_check: true,
            timestamps: TimestampMode::Create,
            check_expiry: false,
        }
    }

    /// Read pipeline: typed decode, `get` modifiers and expiry.
    #[must_use]
    pub fn read() -> Self {
        Self {
            modifiers: true,
            check_expiry: true,
            ..Self::plain()
        }
    }

    /// Type-checked encoding and decoding only; no hooks, checks or stamps.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            defaults: false,
            force_defaults: false,
            modifiers: false,
            validate: false,
            required: RequiredCheck::Off,
            enum_check: false,
            combine: false,
            type_check: true,
            timestamps: TimestampMode::Off,
            check_expiry: false,
        }
    }

    /// Partial-write pipeline applied to the SET values of an update.
    #[must_use]
    pub fn update() -> Self {
        Self {
            defaults: false,
            required: RequiredCheck::Present,
            timestamps: TimestampMode::Update,
            ..Self::save()
        }
    }

    /// The save pipeline with the checks `config` controls.
    #[must_use]
    pub fn from_config(config: &MapperConfig) -> Self {
        Self::save().with_config(config)
    }

    /// Applies `config` to these options.
    #[must_use]
    pub fn with_config(mut self, config: &MapperConfig) -> Self {
        self.type_check = config.type_check;
        self.check_expiry = config.check_expiry;
        self
    }
}

impl Default for MarshalOptions {
    fn default() -> Self {
        Self::save()
    }
}

/// Runs the `set` modifiers of `attribute` in order.
pub(crate) async fn apply_set_modifiers(
    attribute: &AttributeDefinition,
    mut value: Value,
    path: &str,
) -> MapperResult<Value> {
    for modifier in &attribute.settings().set {
        value = modifier.apply(value).await.map_err(|source| MapperError::Hook {
            path: path.to_owned(),
            source,
        })?;
    }
    Ok(value)
}

/// Runs the `get` modifiers of `attribute` in order.
pub(crate) async fn apply_get_modifiers(
    attribute: &AttributeDefinition,
    mut value: Value,
    path: &str,
) -> MapperResult<Value> {
    for modifier in &attribute.settings().get {
        value = modifier.apply(value).await.map_err(|source| MapperError::Hook {
            path: path.to_owned(),
            source,
        })?;
    }
    Ok(value)
}

/// Evaluates the default of `attribute` against the document built so far.
pub(crate) async fn evaluate_default(
    attribute: &AttributeDefinition,
    document: &Document,
    path: &str,
) -> MapperResult<Option<Value>> {
    let Some(default) = &attribute.settings().default else {
        return Ok(None);
    };
    default
        .evaluate(document)
        .await
        .map(Some)
        .map_err(|source| MapperError::Hook {
            path: path.to_owned(),
            source,
        })
}

/// Checks `enum` and `validate` for a present value.
pub(crate) async fn check_value(
    attribute: &AttributeDefinition,
    value: &Value,
    path: &str,
    options: &MarshalOptions,
) -> MapperResult<()> {
    let settings = attribute.settings();
    if options.enum_check {
        if let Some(allowed) = &settings.enum_values {
            if !allowed.contains(value) {
                return Err(MapperError::validation(format!(
                    "{path} must equal {}, but is set to {}",
                    describe(&Value::List(allowed.clone())),
                    plain_text(value)
                )));
            }
        }
    }
    if options.validate {
        if let Some(validator) = &settings.validate {
            if !validator.check(value).await {
                return Err(MapperError::validation(format!(
                    "{path} with a value of {} had a validation error when trying to save the item",
                    plain_text(value)
                )));
            }
        }
    }
    Ok(())
}

/// Error for a required attribute without a value.
pub(crate) fn missing_required(path: &str) -> MapperError {
    MapperError::validation(format!(
        "{path} is a required property but has no value when trying to save item"
    ))
}

/// Joins combine sources with `separator`.
pub(crate) fn join_sources(values: &[&Value], separator: &str, path: &str) -> MapperResult<String> {
    let parts = values
        .iter()
        .map(|value| {
            value.to_combined_string().ok_or_else(|| {
                MapperError::invalid(format!(
                    "{path} can only combine scalar values, found {}",
                    value.type_name()
                ))
            })
        })
        .collect::<MapperResult<Vec<_>>>()?;
    Ok(parts.join(separator))
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => describe(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CandidateType, Validator};

    #[test]
    fn test_should_build_presets() {
        let save = MarshalOptions::save();
        assert!(save.defaults && save.modifiers && save.combine);
        assert_eq!(save.required, RequiredCheck::All);

        let update = MarshalOptions::update();
        assert!(!update.defaults);
        assert_eq!(update.required, RequiredCheck::Present);
        assert_eq!(update.timestamps, TimestampMode::Update);

        let read = MarshalOptions::read();
        assert!(read.modifiers && read.check_expiry && !read.validate);
    }

    #[test]
    fn test_should_apply_config() {
        let config = MapperConfig {
            type_check: false,
            check_expiry: false,
            save_unknown_by_default: false,
        };
        let options = MarshalOptions::read().with_config(&config);
        assert!(!options.type_check);
        assert!(!options.check_expiry);
    }

    #[tokio::test]
    async fn test_should_report_enum_violation() {
        let attribute = AttributeDefinition::new(CandidateType::string()).enum_values(["a", "b"]);
        let err = check_value(&attribute, &Value::from("c"), "kind", &MarshalOptions::save())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "kind must equal [\"a\", \"b\"], but is set to c");
    }

    #[tokio::test]
    async fn test_should_report_validation_failure() {
        let attribute = AttributeDefinition::new(CandidateType::number())
            .validate(Validator::from_fn(|v| matches!(v, Value::Number(n) if *n > 0.0)));
        let err = check_value(&attribute, &Value::from(-1), "age", &MarshalOptions::save())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "age with a value of -1 had a validation error when trying to save the item"
        );
        assert!(
            check_value(&attribute, &Value::from(-1), "age", &MarshalOptions::plain())
                .await
                .is_ok()
        );
    }

    #[test]
    fn test_should_join_combine_sources() {
        let a = Value::from("x");
        let b = Value::from(2);
        assert_eq!(join_sources(&[&a, &b], "#", "c").unwrap(), "x#2");
        let list = Value::List(Vec::new());
        assert!(join_sources(&[&list], ",", "c").is_err());
    }
}
