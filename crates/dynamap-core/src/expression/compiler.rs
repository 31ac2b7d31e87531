//! Condition compilation: builder tree -> expression text and placeholders.

use dynamap_model::{AttributeValue, CompiledExpression};
use tracing::debug;

use super::ast::{ComparisonOperator, ConditionNode, Expr, FunctionName, Group};
use super::condition::Condition;
use super::placeholder::PlaceholderTable;
use crate::error::{MapperError, MapperResult};
use crate::marshal::codec::encode_natural;
use crate::resolver::Scope;
use crate::schema::CandidateType;
use crate::value::Value;

/// Compiles a condition. Name and value tokens are numbered in depth-first,
/// left-to-right order; the root group is never parenthesized.
pub(crate) fn compile_condition(
    scope: &Scope<'_>,
    condition: &Condition,
) -> MapperResult<CompiledExpression> {
    condition.ensure_complete()?;
    let mut table = PlaceholderTable::new();
    let expression = match lower_group(scope, condition.root(), &mut table, false)? {
        Some(expr) => expr.to_string(),
        None => String::new(),
    };
    debug!(
        expression = %expression,
        names = table.name_count(),
        values = table.value_count(),
        "compiled condition"
    );
    Ok(table.finish(expression))
}

fn lower_group(
    scope: &Scope<'_>,
    group: &Group,
    table: &mut PlaceholderTable,
    nested: bool,
) -> MapperResult<Option<Expr>> {
    let mut children = Vec::with_capacity(group.children.len());
    for child in &group.children {
        let expr = match child {
            ConditionNode::Comparison(comparison) => {
                lower_comparison(scope, &comparison.path, comparison.op, &comparison.operands, table)?
            }
            ConditionNode::Group(inner) => match lower_group(scope, inner, table, true)? {
                Some(expr) => expr,
                None => continue,
            },
        };
        children.push(expr);
    }
    Ok(match children.len() {
        0 => None,
        1 => children.pop(),
        len => Some(Expr::Group {
            children,
            joiners: group.joiners.iter().copied().take(len - 1).collect(),
            wrapped: nested,
        }),
    })
}

fn lower_comparison(
    scope: &Scope<'_>,
    path: &str,
    op: ComparisonOperator,
    operands: &[Value],
    table: &mut PlaceholderTable,
) -> MapperResult<Expr> {
    let resolved = scope.lookup(path)?;
    let attribute = table.path(&resolved.segments);

    let candidates = resolved.candidates.map(|candidates| {
        if op.is_membership() {
            member_candidates(candidates)
        } else {
            candidates
        }
    });
    let mut encoded = Vec::with_capacity(operands.len());
    for operand in operands {
        encoded.push(encode_operand(scope, operand, candidates.as_deref(), path)?);
    }

    Ok(match op {
        ComparisonOperator::Exists | ComparisonOperator::NotExists => Expr::Function {
            name: if op == ComparisonOperator::Exists {
                FunctionName::AttributeExists
            } else {
                FunctionName::AttributeNotExists
            },
            path: attribute,
            value: None,
        },
        ComparisonOperator::Between => {
            let mut tokens = table.values(encoded).into_iter();
            let (Some(low), Some(high)) = (tokens.next(), tokens.next()) else {
                return Err(MapperError::invalid("BETWEEN needs two values"));
            };
            Expr::Between {
                path: attribute,
                low,
                high,
            }
        }
        ComparisonOperator::In => Expr::In {
            path: attribute,
            list: table.values(encoded),
        },
        ComparisonOperator::BeginsWith | ComparisonOperator::Contains | ComparisonOperator::NotContains => {
            let name = if op == ComparisonOperator::BeginsWith {
                FunctionName::BeginsWith
            } else {
                FunctionName::Contains
            };
            let value = single(encoded, op).map(|v| table.value(v))?;
            let function = Expr::Function {
                name,
                path: attribute,
                value: Some(value),
            };
            if op == ComparisonOperator::NotContains {
                Expr::Not(Box::new(function))
            } else {
                function
            }
        }
        ComparisonOperator::Eq
        | ComparisonOperator::Ne
        | ComparisonOperator::Lt
        | ComparisonOperator::Le
        | ComparisonOperator::Gt
        | ComparisonOperator::Ge => {
            let value = single(encoded, op).map(|v| table.value(v))?;
            Expr::Compare {
                path: attribute,
                op: op.symbol().unwrap_or("="),
                value,
            }
        }
    })
}

fn single(mut encoded: Vec<AttributeValue>, op: ComparisonOperator) -> MapperResult<AttributeValue> {
    encoded
        .pop()
        .ok_or_else(|| MapperError::invalid(format!("{op} needs a value")))
}

/// Element types of set and list candidates; other candidates are kept so
/// `contains` also works as a substring test.
fn member_candidates(candidates: Vec<CandidateType>) -> Vec<CandidateType> {
    candidates
        .into_iter()
        .flat_map(|candidate| match candidate {
            CandidateType::Set(element) => vec![*element],
            CandidateType::Array(elements) => elements,
            other => vec![other],
        })
        .collect()
}

fn encode_operand(
    scope: &Scope<'_>,
    operand: &Value,
    candidates: Option<&[CandidateType]>,
    path: &str,
) -> MapperResult<AttributeValue> {
    let encoded = match candidates {
        Some(candidates) => scope.encode(operand, candidates, path)?,
        None => encode_natural(operand),
    };
    encoded.ok_or_else(|| {
        MapperError::invalid(format!("{path} can not be compared with an empty value"))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::registry::ModelRegistry;
    use crate::schema::{AttributeDefinition, SaveUnknown, Schema};

    fn schema() -> Arc<Schema> {
        let address = Schema::builder()
            .attribute("city", AttributeDefinition::new(CandidateType::string()))
            .build()
            .unwrap();
        Arc::new(
            Schema::builder()
                .attribute("id", AttributeDefinition::new(CandidateType::number()))
                .attribute("name", AttributeDefinition::new(CandidateType::string()))
                .attribute(
                    "tags",
                    AttributeDefinition::new(CandidateType::set(CandidateType::string())),
                )
                .attribute("born", AttributeDefinition::new(CandidateType::date()))
                .attribute("address", AttributeDefinition::new(CandidateType::object(address)))
                .save_unknown(SaveUnknown::Patterns(vec!["meta.**".to_owned()]))
                .build()
                .unwrap(),
        )
    }

    fn compile(condition: &Condition) -> MapperResult<CompiledExpression> {
        let registry = ModelRegistry::new();
        let scope = Scope::new(&registry, schema());
        compile_condition(&scope, condition)
    }

    #[test]
    fn test_should_compile_simple_equality() {
        let compiled = compile(&Condition::new().filter("id").eq(5).unwrap()).unwrap();
        assert_eq!(compiled.expression, "#a0 = :v0");
        assert_eq!(compiled.names.get("#a0").map(String::as_str), Some("id"));
        assert_eq!(
            compiled.values.get(":v0"),
            Some(&AttributeValue::N("5".to_owned()))
        );
    }

    #[test]
    fn test_should_compile_multi_value_operators() {
        let condition = Condition::new()
            .filter("id")
            .between(1, 3)
            .unwrap()
            .or()
            .filter("name")
            .in_list(["a", "b"])
            .unwrap();
        let compiled = compile(&condition).unwrap();
        assert_eq!(
            compiled.expression,
            "#a0 BETWEEN :v0_1 AND :v0_2 OR #a1 IN (:v1_1, :v1_2)"
        );
        assert_eq!(compiled.values.len(), 4);
    }

    #[test]
    fn test_should_compile_functions() {
        let condition = Condition::new()
            .filter("name")
            .exists()
            .unwrap()
            .filter("name")
            .begins_with("Bo")
            .unwrap()
            .filter("tags")
            .not()
            .contains("x")
            .unwrap();
        let compiled = compile(&condition).unwrap();
        assert_eq!(
            compiled.expression,
            "attribute_exists(#a0) AND begins_with(#a0,:v0) AND NOT contains(#a1,:v1)"
        );
        assert_eq!(
            compiled.values.get(":v1"),
            Some(&AttributeValue::S("x".to_owned()))
        );
    }

    #[test]
    fn test_should_encode_dates_in_storage_units() {
        let date = chrono::DateTime::from_timestamp_millis(1_000).unwrap();
        let compiled = compile(&Condition::new().filter("born").lt(date).unwrap()).unwrap();
        assert_eq!(
            compiled.values.get(":v0"),
            Some(&AttributeValue::N("1000".to_owned()))
        );
    }

    #[test]
    fn test_should_render_nested_paths_per_segment() {
        let condition = Condition::new()
            .filter("address.city")
            .eq("Oslo")
            .unwrap()
            .filter("meta.source.kind")
            .eq("api")
            .unwrap();
        let compiled = compile(&condition).unwrap();
        assert_eq!(compiled.expression, "#a0.#a1 = :v0 AND #a2.#a3.#a4 = :v1");
        assert_eq!(compiled.names.get("#a4").map(String::as_str), Some("kind"));
    }

    #[test]
    fn test_should_reject_unknown_attribute() {
        let err = compile(&Condition::new().filter("nope").eq(1).unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown attribute: nope");
    }

    #[test]
    fn test_should_reject_mistyped_value() {
        let err = compile(&Condition::new().filter("id").eq("x").unwrap()).unwrap_err();
        assert!(matches!(err, MapperError::TypeMismatch { .. }));
    }

    #[test]
    fn test_should_reject_dangling_attribute() {
        assert!(matches!(
            compile(&Condition::new().filter("id")),
            Err(MapperError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_should_compile_empty_condition() {
        let compiled = compile(&Condition::new()).unwrap();
        assert!(compiled.is_empty());
        assert!(compiled.names.is_empty());
    }
}
