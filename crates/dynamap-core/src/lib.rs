//! Schema-driven DynamoDB item marshalling and expression compilation.
//!
//! Applications declare per-attribute types in a [`Schema`], register it as
//! a [`Model`] in a [`ModelRegistry`], and obtain a [`Mapper`] that
//!
//! * encodes native [`Document`]s as wire items and decodes them back,
//!   running defaults, modifiers, validation and combine recomputation;
//! * compiles [`Condition`] trees and update documents into expression text
//!   with `ExpressionAttributeNames` / `ExpressionAttributeValues` maps.
//!
//! Nothing here performs I/O.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]

mod config;
mod error;
pub mod expression;
mod mapper;
mod marshal;
mod registry;
mod resolver;
pub mod schema;
mod value;

pub use config::MapperConfig;
pub use dynamap_model::{
    AttributeValue, CompiledExpression, ExpressionKind, Item, WireType, is_wire_object,
};
pub use error::{MapperError, MapperResult};
pub use expression::{Condition, UpdateOptions};
pub use mapper::Mapper;
pub use marshal::{MarshalOptions, RequiredCheck, TimestampMode};
pub use registry::{ExpiresSettings, Model, ModelRegistry, ModelSettings};
pub use schema::{
    AttributeDefinition, CandidateType, DateStorage, DefaultValue, KeyType, Modifier, Primitive,
    SaveUnknown, Schema, SchemaBuilder, TimestampSettings, Validator,
};
pub use value::{Document, Value, document_from_json};
