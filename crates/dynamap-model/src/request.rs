//! Compiled expression fragments ready to be merged into a request body.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::attribute_value::AttributeValue;

/// The request member a compiled expression is sent as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    /// `FilterExpression` (query/scan).
    Filter,
    /// `ConditionExpression` (put/update/delete).
    Condition,
    /// `KeyConditionExpression` (query).
    KeyCondition,
    /// `UpdateExpression` (update).
    Update,
}

impl ExpressionKind {
    /// Returns the request member name.
    #[must_use]
    pub fn member_name(self) -> &'static str {
        match self {
            Self::Filter => "FilterExpression",
            Self::Condition => "ConditionExpression",
            Self::KeyCondition => "KeyConditionExpression",
            Self::Update => "UpdateExpression",
        }
    }
}

/// An expression string with its placeholder maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledExpression {
    /// The expression text, using `#aN` / `:vN` placeholders.
    pub expression: String,
    /// `ExpressionAttributeNames`: placeholder -> attribute name.
    pub names: HashMap<String, String>,
    /// `ExpressionAttributeValues`: placeholder -> wire value.
    pub values: HashMap<String, AttributeValue>,
}

impl CompiledExpression {
    /// Returns `true` when no expression was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expression.is_empty()
    }

    /// Renders the request fragment, e.g.
    /// `{"FilterExpression": "...", "ExpressionAttributeNames": {...}, ...}`.
    ///
    /// Empty members are omitted.
    #[must_use]
    pub fn to_request(&self, kind: ExpressionKind) -> Value {
        let mut request = Map::new();
        if !self.expression.is_empty() {
            request.insert(
                kind.member_name().to_owned(),
                Value::String(self.expression.clone()),
            );
        }
        if !self.names.is_empty() {
            let names = self
                .names
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            request.insert("ExpressionAttributeNames".to_owned(), Value::Object(names));
        }
        if !self.values.is_empty() {
            let values = self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
                .collect();
            request.insert(
                "ExpressionAttributeValues".to_owned(),
                Value::Object(values),
            );
        }
        Value::Object(request)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_should_render_filter_request() {
        let compiled = CompiledExpression {
            expression: "#a0 = :v0".to_owned(),
            names: HashMap::from([("#a0".to_owned(), "id".to_owned())]),
            values: HashMap::from([(":v0".to_owned(), AttributeValue::N("5".to_owned()))]),
        };
        assert_eq!(
            compiled.to_request(ExpressionKind::Filter),
            json!({
                "FilterExpression": "#a0 = :v0",
                "ExpressionAttributeNames": {"#a0": "id"},
                "ExpressionAttributeValues": {":v0": {"N": "5"}}
            })
        );
    }

    #[test]
    fn test_should_omit_empty_members() {
        let compiled = CompiledExpression {
            expression: "REMOVE #a0".to_owned(),
            names: HashMap::from([("#a0".to_owned(), "age".to_owned())]),
            values: HashMap::new(),
        };
        assert_eq!(
            compiled.to_request(ExpressionKind::Update),
            json!({
                "UpdateExpression": "REMOVE #a0",
                "ExpressionAttributeNames": {"#a0": "age"}
            })
        );
        assert_eq!(
            CompiledExpression::default().to_request(ExpressionKind::Condition),
            json!({})
        );
    }
}
