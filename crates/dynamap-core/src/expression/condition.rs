//! Condition builder.
//!
//! A [`Condition`] is threaded by value through its methods:
//!
//! ```ignore
//! let condition = Condition::new()
//!     .filter("age").ge(18)?
//!     .and()
//!     .filter("status").not().eq("banned")?;
//! ```
//!
//! `filter` names the attribute the next terminal (`eq`, `between`, ...)
//! applies to. `not()` toggles a pending negation, which the terminal folds
//! into its operator. `and()` / `or()` set the joiner placed before the next
//! comparison; the default is `AND`.

use super::ast::{Comparison, ComparisonOperator, ConditionNode, Group, LogicalOp};
use crate::error::{MapperError, MapperResult};
use crate::value::{Document, Value};

/// Declarative condition, compiled by [`Mapper::compile_condition`].
///
/// [`Mapper::compile_condition`]: crate::Mapper::compile_condition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    root: Group,
    pending: Option<String>,
    negate: bool,
    joiner: Option<LogicalOp>,
}

impl Condition {
    /// Empty condition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an `AND` of comparisons from a document. Plain values compare
    /// with `eq`; a single-key map whose key is an operator name applies that
    /// operator (`{"age": {"between": [1, 5]}}`, `{"deleted": {"exists": false}}`).
    ///
    /// Comparisons are joined in sorted key order.
    pub fn from_document(document: &Document) -> MapperResult<Self> {
        let mut condition = Self::new();
        for (path, value) in document {
            condition = condition.filter(path.clone());
            let operator = match value {
                Value::Map(map) if map.len() == 1 => map
                    .iter()
                    .next()
                    .and_then(|(k, v)| k.parse::<ComparisonOperator>().ok().map(|op| (op, v))),
                _ => None,
            };
            condition = match operator {
                None => condition.eq(value.clone())?,
                Some((ComparisonOperator::Exists, Value::Bool(false))) => condition.not().exists()?,
                Some((op @ (ComparisonOperator::Exists | ComparisonOperator::NotExists), _)) => {
                    condition.push(op, Vec::new())?
                }
                Some((op @ (ComparisonOperator::Between | ComparisonOperator::In), Value::List(items))) => {
                    condition.push(op, items.clone())?
                }
                Some((op, operand)) => condition.push(op, vec![operand.clone()])?,
            };
        }
        Ok(condition)
    }

    /// Names the attribute the next terminal applies to. Nested attributes
    /// use dots (`address.city`), list elements their index (`tags.0`).
    #[must_use]
    pub fn filter(mut self, path: impl Into<String>) -> Self {
        self.pending = Some(path.into());
        self
    }

    /// Alias of [`filter`](Self::filter).
    #[must_use]
    pub fn attribute(self, path: impl Into<String>) -> Self {
        self.filter(path)
    }

    /// Toggles negation of the next terminal.
    #[must_use]
    pub fn not(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// Joins the next comparison with `AND`.
    #[must_use]
    pub fn and(mut self) -> Self {
        self.joiner = Some(LogicalOp::And);
        self
    }

    /// Joins the next comparison with `OR`.
    #[must_use]
    pub fn or(mut self) -> Self {
        self.joiner = Some(LogicalOp::Or);
        self
    }

    /// `attribute = value`
    pub fn eq(self, value: impl Into<Value>) -> MapperResult<Self> {
        self.push(ComparisonOperator::Eq, vec![value.into()])
    }

    /// `attribute <> value`
    pub fn ne(self, value: impl Into<Value>) -> MapperResult<Self> {
        self.push(ComparisonOperator::Ne, vec![value.into()])
    }

    /// `attribute < value`
    pub fn lt(self, value: impl Into<Value>) -> MapperResult<Self> {
        self.push(ComparisonOperator::Lt, vec![value.into()])
    }

    /// `attribute <= value`
    pub fn le(self, value: impl Into<Value>) -> MapperResult<Self> {
        self.push(ComparisonOperator::Le, vec![value.into()])
    }

    /// `attribute > value`
    pub fn gt(self, value: impl Into<Value>) -> MapperResult<Self> {
        self.push(ComparisonOperator::Gt, vec![value.into()])
    }

    /// `attribute >= value`
    pub fn ge(self, value: impl Into<Value>) -> MapperResult<Self> {
        self.push(ComparisonOperator::Ge, vec![value.into()])
    }

    /// `attribute_exists(attribute)`
    pub fn exists(self) -> MapperResult<Self> {
        self.push(ComparisonOperator::Exists, Vec::new())
    }

    /// `contains(attribute, value)`: substring, or set/list membership.
    pub fn contains(self, value: impl Into<Value>) -> MapperResult<Self> {
        self.push(ComparisonOperator::Contains, vec![value.into()])
    }

    /// `begins_with(attribute, prefix)`
    pub fn begins_with(self, prefix: impl Into<Value>) -> MapperResult<Self> {
        self.push(ComparisonOperator::BeginsWith, vec![prefix.into()])
    }

    /// `attribute IN (values...)`
    pub fn in_list<I, V>(self, values: I) -> MapperResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push(
            ComparisonOperator::In,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// `attribute BETWEEN low AND high`
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> MapperResult<Self> {
        self.push(ComparisonOperator::Between, vec![low.into(), high.into()])
    }

    /// Applies an operator given by name, e.g. `compare("ge", vec![18.into()])`.
    pub fn compare(self, operator: &str, operands: Vec<Value>) -> MapperResult<Self> {
        let op = operator.parse::<ComparisonOperator>()?;
        self.push(op, operands)
    }

    /// Builds a sub-condition on a fresh builder and appends it as one
    /// parenthesized group.
    pub fn parenthesis<F>(self, build: F) -> MapperResult<Self>
    where
        F: FnOnce(Self) -> MapperResult<Self>,
    {
        if self.negate {
            return Err(MapperError::invalid("PARENTHESIS can not follow not()"));
        }
        let inner = build(Self::new())?;
        if let Some(path) = &inner.pending {
            return Err(dangling(path));
        }
        let mut inner_root = inner.root;
        let node = match inner_root.children.len() {
            0 => return Ok(self),
            1 => inner_root.children.remove(0),
            _ => ConditionNode::Group(inner_root),
        };
        Ok(self.append(node))
    }

    /// Returns `true` when nothing has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// The recorded tree.
    #[must_use]
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Fails when a `filter` has no terminal yet.
    pub(crate) fn ensure_complete(&self) -> MapperResult<()> {
        match &self.pending {
            Some(path) => Err(dangling(path)),
            None => Ok(()),
        }
    }

    fn push(mut self, op: ComparisonOperator, operands: Vec<Value>) -> MapperResult<Self> {
        let Some(path) = self.pending.take() else {
            return Err(MapperError::invalid(format!(
                "{op} needs an attribute: call filter() first"
            )));
        };
        let op = if std::mem::take(&mut self.negate) {
            op.negate()
                .ok_or_else(|| MapperError::invalid(format!("{op} can not follow not()")))?
        } else {
            op
        };
        op.check_arity(operands.len())?;
        Ok(self.append(ConditionNode::Comparison(Comparison { path, op, operands })))
    }

    fn append(mut self, node: ConditionNode) -> Self {
        let joiner = self.joiner.take().unwrap_or_default();
        self.root.push(joiner, node);
        self
    }
}

fn dangling(path: &str) -> MapperError {
    MapperError::invalid(format!("Condition on {path} has no comparison"))
}
