//! DynamoDB wire model for dynamap.
//!
//! This crate holds the pure data shapes exchanged with DynamoDB: the
//! tagged-union [`AttributeValue`], its [`WireType`] tags, whole items, and
//! the compiled expression fragments that accompany a request.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]

use std::collections::HashMap;

pub mod attribute_value;
pub mod request;
pub mod wire_object;
pub mod wire_type;

pub use attribute_value::{AttributeValue, format_number};
pub use request::{CompiledExpression, ExpressionKind};
pub use wire_object::is_wire_object;
pub use wire_type::WireType;

/// A whole item in wire shape: attribute name -> attribute value.
pub type Item = HashMap<String, AttributeValue>;
