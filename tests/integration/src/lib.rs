//! Acceptance tests for the dynamap public API.
//!
//! These run without any server; set `RUST_LOG=dynamap_core=debug` to see
//! the compiled expressions:
//! ```text
//! RUST_LOG=dynamap_core=debug cargo test -p dynamap-integration
//! ```

use std::sync::Once;

use dynamap_core::{
    AttributeDefinition, CandidateType, Mapper, Model, ModelRegistry, ModelSettings, Schema,
};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Registers `schema` as the model `name` in a fresh registry.
#[must_use]
pub fn registry_with(name: &str, schema: Schema) -> ModelRegistry {
    init_tracing();
    let registry = ModelRegistry::new();
    registry
        .register(
            Model::new(name, schema, ModelSettings::default())
                .unwrap_or_else(|e| panic!("invalid model {name}: {e}")),
        )
        .unwrap_or_else(|e| panic!("failed to register {name}: {e}"));
    registry
}

/// A user model: numeric `id`, `name`, `age` with a default, and a
/// string `tags` set.
#[must_use]
pub fn user_schema() -> Schema {
    Schema::builder()
        .attribute("id", AttributeDefinition::new(CandidateType::number()))
        .attribute("name", AttributeDefinition::new(CandidateType::string()))
        .attribute(
            "age",
            AttributeDefinition::new(CandidateType::number()).default_value(1),
        )
        .attribute(
            "tags",
            AttributeDefinition::new(CandidateType::set(CandidateType::string())),
        )
        .build()
        .unwrap_or_else(|e| panic!("invalid user schema: {e}"))
}

/// Mapper for `model` in `registry`.
#[must_use]
pub fn mapper<'a>(registry: &'a ModelRegistry, model: &str) -> Mapper<'a> {
    registry
        .mapper(model)
        .unwrap_or_else(|e| panic!("missing model {model}: {e}"))
}

mod test_condition;
mod test_marshal;
mod test_update;
