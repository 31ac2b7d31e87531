//! Condition builder and compiler acceptance tests.

#[cfg(test)]
mod tests {
    use dynamap_core::{
        AttributeDefinition, CandidateType, Condition, Document, ExpressionKind, MapperError,
        Schema, Value,
    };
    use serde_json::json;

    use crate::{mapper, registry_with, user_schema};

    #[test]
    fn test_should_compile_filter_request() {
        let registry = registry_with("User", user_schema());
        let compiled = mapper(&registry, "User")
            .compile_condition(&Condition::new().filter("id").eq(5).unwrap())
            .unwrap();
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
    fn test_should_reject_between_after_not() {
        let err = Condition::new().filter("id").not().between(1, 3).unwrap_err();
        assert!(matches!(err, MapperError::InvalidParameter { .. }));
        assert_eq!(err.to_string(), "BETWEEN can not follow not()");
    }

    /// A repeated path reuses its name token, so both `id` comparisons in the
    /// group share `#a2` instead of taking a fourth `#a3`.
    #[test]
    fn test_should_compile_document_with_parenthesis() {
        let schema = Schema::builder()
            .attribute("id", AttributeDefinition::new(CandidateType::number()))
            .attribute("name", AttributeDefinition::new(CandidateType::string()))
            .attribute("x", AttributeDefinition::new(CandidateType::number()))
            .build()
            .unwrap();
        let registry = registry_with("Person", schema);

        let document = Document::from([("name".to_owned(), Value::from("Charlie"))]);
        let condition = Condition::from_document(&document)
            .unwrap()
            .and()
            .filter("x")
            .le(18)
            .unwrap()
            .parenthesis(|c| c.filter("id").eq(1)?.or().filter("id").eq(2))
            .unwrap();
        let compiled = mapper(&registry, "Person").compile_condition(&condition).unwrap();

        assert_eq!(
            compiled.expression,
            "#a0 = :v0 AND #a1 <= :v1 AND (#a2 = :v2 OR #a2 = :v3)"
        );
        assert_eq!(compiled.names.len(), 3);
        assert_eq!(compiled.values.len(), 4);
        assert_eq!(
            compiled.to_request(ExpressionKind::Condition)["ExpressionAttributeValues"][":v0"],
            json!({"S": "Charlie"})
        );
    }

    #[test]
    fn test_should_cancel_double_negation() {
        let registry = registry_with("User", user_schema());
        let mapper = mapper(&registry, "User");
        let plain = Condition::new()
            .filter("id")
            .lt(3)
            .unwrap()
            .filter("name")
            .exists()
            .unwrap()
            .filter("tags")
            .contains("a")
            .unwrap();
        let doubled = Condition::new()
            .filter("id")
            .not()
            .not()
            .lt(3)
            .unwrap()
            .filter("name")
            .not()
            .not()
            .exists()
            .unwrap()
            .filter("tags")
            .not()
            .not()
            .contains("a")
            .unwrap();
        assert_eq!(
            mapper.compile_condition(&plain).unwrap(),
            mapper.compile_condition(&doubled).unwrap()
        );
    }

    #[test]
    fn test_should_negate_comparisons() {
        let registry = registry_with("User", user_schema());
        let compiled = mapper(&registry, "User")
            .compile_condition(
                &Condition::new()
                    .filter("age")
                    .not()
                    .le(30)
                    .unwrap()
                    .filter("name")
                    .not()
                    .exists()
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(compiled.expression, "#a0 > :v0 AND attribute_not_exists(#a1)");
    }

    #[test]
    fn test_should_reject_undeclared_attribute() {
        let registry = registry_with("User", user_schema());
        let err = mapper(&registry, "User")
            .compile_condition(&Condition::new().filter("email").eq("a@b.c").unwrap())
            .unwrap_err();
        assert!(matches!(err, MapperError::UnknownAttribute { .. }));
    }
}
