//! DynamoDB expression compilation.
//!
//! Conditions are recorded with the [`Condition`] builder and updates are
//! plain documents. Both compile against a model schema into expression
//! text plus `#aN` name and `:vN` value placeholder maps:
//!
//! 1. **Resolution**: each dotted path is checked against the schema.
//! 2. **Encoding**: operands are typed by the attribute's candidate types.
//! 3. **Rendering**: tokens are allocated in emission order and the AST is
//!    printed.

pub mod ast;
mod compiler;
mod condition;
mod placeholder;
mod update;

pub use ast::{Comparison, ComparisonOperator, ConditionNode, Group, LogicalOp};
pub(crate) use compiler::compile_condition;
pub use condition::Condition;
pub(crate) use update::compile_update;
pub use update::UpdateOptions;
