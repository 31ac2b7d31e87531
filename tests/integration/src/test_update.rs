//! Update compiler acceptance tests.

#[cfg(test)]
mod tests {
    use dynamap_core::{
        AttributeValue, ExpressionKind, MapperError, UpdateOptions, Value, document_from_json,
    };
    use serde_json::json;

    use crate::{mapper, registry_with, user_schema};

    #[tokio::test]
    async fn test_should_restore_default_instead_of_remove() {
        let registry = registry_with("User", user_schema());
        let update = document_from_json(&json!({"$REMOVE": {"age": null}}));
        let compiled = mapper(&registry, "User")
            .compile_update(&update, &UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(
            compiled.to_request(ExpressionKind::Update),
            json!({
                "UpdateExpression": "SET #a0 = :v0",
                "ExpressionAttributeNames": {"#a0": "age"},
                "ExpressionAttributeValues": {":v0": {"N": "1"}}
            })
        );
    }

    #[tokio::test]
    async fn test_should_remove_flattened_undefined() {
        let registry = registry_with("User", user_schema());
        let mut update = document_from_json(&json!({"name": "Bob"}));
        update.insert("age".to_owned(), Value::Undefined);
        let compiled = mapper(&registry, "User")
            .compile_update(&update, &UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(compiled.expression, "REMOVE #a0 SET #a1 = :v0");
        assert_eq!(compiled.names.get("#a0").map(String::as_str), Some("age"));
    }

    #[tokio::test]
    async fn test_should_add_to_sets_and_numbers() {
        let registry = registry_with("User", user_schema());
        let update = document_from_json(&json!({
            "$ADD": {"age": 2, "tags": ["x", "y", "x"]},
            "$DELETE": {"tags": ["z"]}
        }));
        let compiled = mapper(&registry, "User")
            .compile_update(&update, &UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(
            compiled.expression,
            "ADD #a0 :v0, #a1 :v1 DELETE #a1 :v2"
        );
        assert_eq!(
            compiled.values.get(":v1"),
            Some(&AttributeValue::Ss(vec!["x".to_owned(), "y".to_owned()]))
        );
    }

    #[tokio::test]
    async fn test_should_reject_key_and_unknown_bucket() {
        let registry = registry_with("User", user_schema());
        let mapper = mapper(&registry, "User");

        let err = mapper
            .compile_update(&document_from_json(&json!({"id": 2})), &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MapperError::InvalidParameter { .. }));

        let err = mapper
            .compile_update(
                &document_from_json(&json!({"$FOO": {"name": "x"}})),
                &UpdateOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown update operator: $FOO");
    }
}
