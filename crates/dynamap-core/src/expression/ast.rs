//! AST types for generated DynamoDB expressions.
//!
//! Condition trees ([`ConditionNode`]) are what the builder records. The
//! compilers lower them, and update documents, to the placeholder-level
//! [`Expr`] and [`UpdateExpr`] trees, whose `Display` impls produce the final
//! expression text.

use std::fmt;
use std::str::FromStr;

use crate::error::MapperError;
use crate::value::Value;

/// Comparison operators a condition can apply to an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `attribute_exists`
    Exists,
    /// `attribute_not_exists`
    NotExists,
    /// `contains`
    Contains,
    /// `NOT contains`
    NotContains,
    /// `begins_with`
    BeginsWith,
    /// `IN (...)`
    In,
    /// `BETWEEN ... AND ...`
    Between,
}

impl ComparisonOperator {
    /// Upper-case operator name, as used in messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Exists => "EXISTS",
            Self::NotExists => "NOT_EXISTS",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT_CONTAINS",
            Self::BeginsWith => "BEGINS_WITH",
            Self::In => "IN",
            Self::Between => "BETWEEN",
        }
    }

    /// The logical complement, if the operator has one.
    #[must_use]
    pub fn negate(self) -> Option<Self> {
        Some(match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Ge => Self::Lt,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
            Self::Exists => Self::NotExists,
            Self::NotExists => Self::Exists,
            Self::Contains => Self::NotContains,
            Self::NotContains => Self::Contains,
            Self::BeginsWith | Self::In | Self::Between => return None,
        })
    }

    /// Infix symbol of the plain comparison operators.
    pub(crate) fn symbol(self) -> Option<&'static str> {
        Some(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            _ => return None,
        })
    }

    /// Returns `true` when the operator compares against a set or list
    /// member rather than the attribute's own type.
    #[must_use]
    pub fn is_membership(self) -> bool {
        matches!(self, Self::Contains | Self::NotContains)
    }

    /// Checks the number of operands.
    pub(crate) fn check_arity(self, count: usize) -> Result<(), MapperError> {
        let ok = match self {
            Self::Exists | Self::NotExists => count == 0,
            Self::Between => count == 2,
            Self::In => count >= 1,
            _ => count == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(MapperError::invalid(format!(
                "{} does not take {count} value(s)",
                self.name()
            )))
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComparisonOperator {
    type Err = MapperError;

    /// Accepts the operator name or the builder method name, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Ok(match normalized.as_str() {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "lt" => Self::Lt,
            "le" => Self::Le,
            "gt" => Self::Gt,
            "ge" => Self::Ge,
            "exists" => Self::Exists,
            "notexists" => Self::NotExists,
            "contains" => Self::Contains,
            "notcontains" => Self::NotContains,
            "beginswith" => Self::BeginsWith,
            "in" => Self::In,
            "between" => Self::Between,
            _ => {
                return Err(MapperError::invalid(format!(
                    "Unknown comparison operator: {s}"
                )));
            }
        })
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicalOp {
    /// Logical AND.
    #[default]
    And,
    /// Logical OR.
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// One comparison recorded by the builder. Negation is already folded into
/// `op`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Dotted attribute path as written by the caller.
    pub path: String,
    /// Operator.
    pub op: ComparisonOperator,
    /// Operand values, unencoded.
    pub operands: Vec<Value>,
}

/// A parenthesizable sequence of nodes. `joiners[i]` sits between
/// `children[i]` and `children[i + 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    /// Child nodes.
    pub children: Vec<ConditionNode>,
    /// Joiners, one fewer than children.
    pub joiners: Vec<LogicalOp>,
}

impl Group {
    pub(crate) fn push(&mut self, joiner: LogicalOp, node: ConditionNode) {
        if !self.children.is_empty() {
            self.joiners.push(joiner);
        }
        self.children.push(node);
    }
}

/// A node of a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    /// A single comparison.
    Comparison(Comparison),
    /// A nested group.
    Group(Group),
}

/// Built-in DynamoDB functions used by generated conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FunctionName {
    AttributeExists,
    AttributeNotExists,
    BeginsWith,
    Contains,
    ListAppend,
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeExists => write!(f, "attribute_exists"),
            Self::AttributeNotExists => write!(f, "attribute_not_exists"),
            Self::BeginsWith => write!(f, "begins_with"),
            Self::Contains => write!(f, "contains"),
            Self::ListAppend => write!(f, "list_append"),
        }
    }
}

/// A placeholder-level document path, e.g. `#a0.#a1[2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttributePath {
    pub elements: Vec<PathElement>,
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, elem) in self.elements.iter().enumerate() {
            match elem {
                PathElement::Attribute(token) => {
                    if i > 0 {
                        write!(f, ".{token}")?;
                    } else {
                        write!(f, "{token}")?;
                    }
                }
                PathElement::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// A single element in an attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathElement {
    /// A `#aN` name token.
    Attribute(String),
    /// A list index.
    Index(usize),
}

/// A placeholder-level condition expression.
#[derive(Debug, Clone)]
pub(crate) enum Expr {
    /// `path op :v`
    Compare {
        path: AttributePath,
        op: &'static str,
        value: String,
    },
    /// `path BETWEEN :v_1 AND :v_2`
    Between {
        path: AttributePath,
        low: String,
        high: String,
    },
    /// `path IN (:v_1, ...)`
    In {
        path: AttributePath,
        list: Vec<String>,
    },
    /// `name(path)` or `name(path,:v)`
    Function {
        name: FunctionName,
        path: AttributePath,
        value: Option<String>,
    },
    /// `NOT expr`
    Not(Box<Expr>),
    /// Children joined by their joiners, optionally wrapped in parentheses.
    Group {
        children: Vec<Expr>,
        joiners: Vec<LogicalOp>,
        wrapped: bool,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { path, op, value } => write!(f, "{path} {op} {value}"),
            Self::Between { path, low, high } => write!(f, "{path} BETWEEN {low} AND {high}"),
            Self::In { path, list } => write!(f, "{path} IN ({})", list.join(", ")),
            Self::Function {
                name,
                path,
                value: Some(value),
            } => write!(f, "{name}({path},{value})"),
            Self::Function {
                name,
                path,
                value: None,
            } => write!(f, "{name}({path})"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
            Self::Group {
                children,
                joiners,
                wrapped,
            } => {
                if *wrapped {
                    f.write_str("(")?;
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        let joiner = joiners.get(i - 1).copied().unwrap_or_default();
                        write!(f, " {joiner} ")?;
                    }
                    write!(f, "{child}")?;
                }
                if *wrapped {
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}

/// Update expression AST containing all four clause types.
#[derive(Debug, Clone, Default)]
pub(crate) struct UpdateExpr {
    /// ADD actions: add to numbers or sets.
    pub add_actions: Vec<AddAction>,
    /// REMOVE actions: remove attributes.
    pub remove_paths: Vec<AttributePath>,
    /// SET actions: assign values to attributes.
    pub set_actions: Vec<SetAction>,
    /// DELETE actions: remove elements from sets.
    pub delete_actions: Vec<DeleteAction>,
}

impl UpdateExpr {
    pub fn is_empty(&self) -> bool {
        self.add_actions.is_empty()
            && self.remove_paths.is_empty()
            && self.set_actions.is_empty()
            && self.delete_actions.is_empty()
    }
}

impl fmt::Display for UpdateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clauses: Vec<String> = Vec::with_capacity(4);
        if !self.add_actions.is_empty() {
            let items: Vec<String> = self
                .add_actions
                .iter()
                .map(|a| format!("{} {}", a.path, a.value))
                .collect();
            clauses.push(format!("ADD {}", items.join(", ")));
        }
        if !self.remove_paths.is_empty() {
            let items: Vec<String> = self.remove_paths.iter().map(ToString::to_string).collect();
            clauses.push(format!("REMOVE {}", items.join(", ")));
        }
        if !self.set_actions.is_empty() {
            let items: Vec<String> = self
                .set_actions
                .iter()
                .map(|a| format!("{} = {}", a.path, a.value))
                .collect();
            clauses.push(format!("SET {}", items.join(", ")));
        }
        if !self.delete_actions.is_empty() {
            let items: Vec<String> = self
                .delete_actions
                .iter()
                .map(|a| format!("{} {}", a.path, a.value))
                .collect();
            clauses.push(format!("DELETE {}", items.join(", ")));
        }
        f.write_str(&clauses.join(" "))
    }
}

/// A single SET action: `path = value`.
#[derive(Debug, Clone)]
pub(crate) struct SetAction {
    pub path: AttributePath,
    pub value: SetValue,
}

/// The right-hand side of a SET action.
#[derive(Debug, Clone)]
pub(crate) enum SetValue {
    /// A `:vN` token.
    Value(String),
    /// `list_append(path, :vN)`
    ListAppend(AttributePath, String),
}

impl fmt::Display for SetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(token) => f.write_str(token),
            Self::ListAppend(path, token) => {
                write!(f, "{}({path}, {token})", FunctionName::ListAppend)
            }
        }
    }
}

/// A single ADD action: `path value`.
#[derive(Debug, Clone)]
pub(crate) struct AddAction {
    pub path: AttributePath,
    pub value: String,
}

/// A single DELETE action: `path value`.
#[derive(Debug, Clone)]
pub(crate) struct DeleteAction {
    pub path: AttributePath,
    pub value: String,
}
