//! Per-compile placeholder allocation.

use std::collections::HashMap;

use dynamap_model::{AttributeValue, CompiledExpression};

use super::ast::{AttributePath, PathElement};
use crate::resolver::PathSegment;

/// Allocates `#aN` name tokens and `:vN` value tokens for one compile call.
///
/// A name token is keyed by the full path prefix it ends, so the same path
/// always gets the same token and paths sharing a prefix share its tokens.
#[derive(Debug, Default)]
pub(crate) struct PlaceholderTable {
    tokens_by_path: HashMap<String, String>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    next_value: usize,
}

impl PlaceholderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens for a resolved path, e.g. `#a0.#a1[2]`.
    pub fn path(&mut self, segments: &[PathSegment]) -> AttributePath {
        let mut key = String::new();
        let mut elements = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                PathSegment::Name(name) => {
                    if !key.is_empty() {
                        key.push('.');
                    }
                    key.push_str(name);
                    let token = self.name_token(&key, name);
                    elements.push(PathElement::Attribute(token));
                }
                PathSegment::Index(index) => {
                    key.push_str(&format!("[{index}]"));
                    elements.push(PathElement::Index(*index));
                }
            }
        }
        AttributePath { elements }
    }

    fn name_token(&mut self, key: &str, name: &str) -> String {
        if let Some(token) = self.tokens_by_path.get(key) {
            return token.clone();
        }
        let token = format!("#a{}", self.tokens_by_path.len());
        self.tokens_by_path.insert(key.to_owned(), token.clone());
        self.names.insert(token.clone(), name.to_owned());
        token
    }

    /// A single `:vN` token.
    pub fn value(&mut self, value: AttributeValue) -> String {
        let token = format!(":v{}", self.next_value);
        self.next_value += 1;
        self.values.insert(token.clone(), value);
        token
    }

    /// `:vN_1`, `:vN_2`, ... for a multi-value operator.
    pub fn values(&mut self, values: Vec<AttributeValue>) -> Vec<String> {
        let base = self.next_value;
        self.next_value += 1;
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let token = format!(":v{base}_{}", i + 1);
                self.values.insert(token.clone(), value);
                token
            })
            .collect()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Pairs the expression text with the allocated placeholders.
    pub fn finish(self, expression: String) -> CompiledExpression {
        CompiledExpression {
            expression,
            names: self.names,
            values: self.values,
        }
    }
}
