//! Item marshalling acceptance tests.

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use dynamap_core::{
        AttributeDefinition, AttributeValue, CandidateType, DateStorage, Document, MapperError,
        MarshalOptions, SaveUnknown, Schema, TimestampSettings, Value, document_from_json,
        is_wire_object,
    };
    use serde_json::json;

    use crate::{mapper, registry_with};

    fn event_schema() -> Schema {
        let location = Schema::builder()
            .attribute("city", AttributeDefinition::new(CandidateType::string()))
            .attribute("zip", AttributeDefinition::new(CandidateType::number()))
            .build()
            .unwrap();
        Schema::builder()
            .attribute("id", AttributeDefinition::new(CandidateType::string()).hash_key())
            .attribute("at", AttributeDefinition::new(CandidateType::date()))
            .attribute(
                "day",
                AttributeDefinition::new(CandidateType::Date(DateStorage::Iso)),
            )
            .attribute(
                "tags",
                AttributeDefinition::new(CandidateType::set(CandidateType::string())),
            )
            .attribute("location", AttributeDefinition::new(CandidateType::object(location)))
            .attribute(
                "history",
                AttributeDefinition::new(CandidateType::array(CandidateType::number())),
            )
            .save_unknown(SaveUnknown::Patterns(vec!["extra.*".to_owned()]))
            .build()
            .unwrap()
    }

    fn instant() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_709_296_200_250).unwrap()
    }

    fn event() -> Document {
        let mut document = document_from_json(&json!({
            "id": "e1",
            "location": {"city": "Oslo", "zip": 150},
            "history": [1, 2.5, 3],
            "extra": {"source": "api"}
        }));
        document.insert("at".to_owned(), Value::Date(instant()));
        document.insert("day".to_owned(), Value::Date(instant()));
        document.insert(
            "tags".to_owned(),
            Value::Set(vec![Value::from("a"), Value::from("b")]),
        );
        document
    }

    #[test]
    fn test_should_detect_wire_objects() {
        let object = |value: serde_json::Value| value.as_object().cloned().unwrap();
        assert_eq!(is_wire_object(&object(json!({}))), None);
        assert_eq!(is_wire_object(&object(json!({"id": {"N": "1"}}))), Some(true));
        assert_eq!(is_wire_object(&object(json!({"id": 1}))), Some(false));
    }

    #[tokio::test]
    async fn test_should_round_trip_typed_document() {
        let registry = registry_with("Event", event_schema());
        let mapper = mapper(&registry, "Event");

        let item = mapper.to_wire(&event(), &MarshalOptions::save()).await.unwrap();
        assert_eq!(
            item.get("at"),
            Some(&AttributeValue::N("1709296200250".to_owned()))
        );
        assert_eq!(
            item.get("day"),
            Some(&AttributeValue::S("2024-03-01T12:30:00.250Z".to_owned()))
        );
        assert_eq!(
            item.get("tags"),
            Some(&AttributeValue::Ss(vec!["a".to_owned(), "b".to_owned()]))
        );

        let back = mapper.from_wire(&item, &MarshalOptions::read()).await.unwrap();
        assert_eq!(back, Some(event()));
    }

    #[tokio::test]
    async fn test_should_drop_unmatched_unknown_attributes() {
        let registry = registry_with("Event", event_schema());
        let mapper = mapper(&registry, "Event");
        let mut document = event();
        document.insert("loose".to_owned(), Value::from(1));
        let item = mapper.to_wire(&document, &MarshalOptions::save()).await.unwrap();
        assert!(!item.contains_key("loose"));
        assert!(item.contains_key("extra"));
    }

    #[tokio::test]
    async fn test_should_report_type_mismatch() {
        let registry = registry_with("Event", event_schema());
        let mapper = mapper(&registry, "Event");
        let document = document_from_json(&json!({"id": "e1", "at": true}));
        let err = mapper
            .to_wire(&document, &MarshalOptions::save())
            .await
            .unwrap_err();
        assert!(matches!(err, MapperError::TypeMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "Expected at to be of type date, instead found type boolean."
        );
    }

    #[tokio::test]
    async fn test_should_stamp_timestamps_and_combine() {
        let schema = Schema::builder()
            .attribute("id", AttributeDefinition::new(CandidateType::string()))
            .attribute("first", AttributeDefinition::new(CandidateType::string()))
            .attribute("last", AttributeDefinition::new(CandidateType::string()))
            .attribute(
                "full",
                AttributeDefinition::new(CandidateType::combine_with(["first", "last"], " ")),
            )
            .timestamps(TimestampSettings::default())
            .build()
            .unwrap();
        let registry = registry_with("Person", schema);
        let mapper = mapper(&registry, "Person");

        let document = document_from_json(&json!({"id": "p1", "first": "Ada", "last": "Lovelace"}));
        let item = mapper.to_wire(&document, &MarshalOptions::save()).await.unwrap();
        assert_eq!(
            item.get("full"),
            Some(&AttributeValue::S("Ada Lovelace".to_owned()))
        );
        assert!(matches!(item.get("createdAt"), Some(AttributeValue::N(_))));
        assert!(matches!(item.get("updatedAt"), Some(AttributeValue::N(_))));

        let partial = document_from_json(&json!({"id": "p1", "first": "Ada", "full": "x"}));
        let err = mapper
            .to_wire(&partial, &MarshalOptions::save())
            .await
            .unwrap_err();
        assert!(matches!(err, MapperError::InvalidParameter { .. }));
    }
}
