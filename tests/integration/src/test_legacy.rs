//! Requests using the legacy condition map parameters.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tablequery_core::{KeySchema, MemoryTable};
    use tablequery_model::types::{
        ComparisonOperator, Condition, ConditionalOperator, ScalarAttributeType,
    };
    use tablequery_model::{QueryErrorCode, QueryInput};

    use crate::{column, engine_for, item, n, s};

    fn events() -> MemoryTable {
        let table = MemoryTable::new(KeySchema::composite(
            "device",
            ScalarAttributeType::S,
            "at",
            ScalarAttributeType::S,
        ));
        let rows = [
            ("2024-01-01T00:00", "boot", 1),
            ("2024-01-01T06:00", "ping", 3),
            ("2024-01-02T00:00", "ping", 5),
            ("2024-01-02T09:30", "alarm", 9),
            ("2024-02-01T00:00", "ping", 2),
        ];
        for (at, kind, level) in rows {
            table
                .put_item(item(&[
                    ("device", s("d1")),
                    ("at", s(at)),
                    ("kind", s(kind)),
                    ("level", n(level)),
                ]))
                .unwrap();
        }
        table
    }

    fn key_conditions(sort: Option<Condition>) -> HashMap<String, Condition> {
        let mut conditions = HashMap::from([(
            "device".to_owned(),
            Condition::new(ComparisonOperator::Eq, [s("d1")]),
        )]);
        if let Some(sort) = sort {
            conditions.insert("at".to_owned(), sort);
        }
        conditions
    }

    #[test]
    fn test_should_match_sort_prefix_with_begins_with() {
        let table = events();
        let (engine, name) = engine_for(&table, "legacy-prefix");
        let input = QueryInput::builder()
            .table_name(name.as_str())
            .key_conditions(key_conditions(Some(Condition::new(
                ComparisonOperator::BeginsWith,
                [s("2024-01-02")],
            ))))
            .build();

        let page = engine.execute(&input).unwrap();
        assert_eq!(column(&page, "kind"), vec![s("ping"), s("alarm")]);
    }

    #[test]
    fn test_should_combine_query_filter_with_or() {
        let table = events();
        let (engine, name) = engine_for(&table, "legacy-or");
        let filter = HashMap::from([
            ("kind".to_owned(), Condition::new(ComparisonOperator::Eq, [s("alarm")])),
            ("level".to_owned(), Condition::new(ComparisonOperator::Lt, [n(2)])),
        ]);
        let mut input = QueryInput::builder()
            .table_name(name.as_str())
            .key_conditions(key_conditions(None))
            .query_filter(filter)
            .conditional_operator(ConditionalOperator::Or)
            .attributes_to_get(vec!["at".to_owned(), "kind".to_owned()])
            .build();

        let page = engine.execute(&input).unwrap();
        assert_eq!(column(&page, "kind"), vec![s("boot"), s("alarm")]);
        assert_eq!(page.scanned_count, 5);
        assert!(page.items().iter().all(|row| row.len() == 2));

        input.conditional_operator = Some(ConditionalOperator::And);
        let page = engine.execute(&input).unwrap();
        assert_eq!(page.count, 0);
    }

    #[test]
    fn test_should_evaluate_membership_and_null_operators() {
        let table = events();
        let (engine, name) = engine_for(&table, "legacy-ops");
        let cases = [
            (
                Condition::new(ComparisonOperator::In, [s("boot"), s("alarm")]),
                vec![s("boot"), s("alarm")],
            ),
            (
                Condition::new(ComparisonOperator::NotContains, [s("in")]),
                vec![s("boot"), s("alarm")],
            ),
            (Condition::new(ComparisonOperator::NotNull, []), vec![
                s("boot"),
                s("ping"),
                s("ping"),
                s("alarm"),
                s("ping"),
            ]),
        ];
        for (condition, expected) in cases {
            let input = QueryInput::builder()
                .table_name(name.as_str())
                .key_conditions(key_conditions(None))
                .query_filter(HashMap::from([("kind".to_owned(), condition.clone())]))
                .build();
            let page = engine.execute(&input).unwrap();
            assert_eq!(column(&page, "kind"), expected, "{:?}", condition.comparison_operator);
        }

        let missing = QueryInput::builder()
            .table_name(name.as_str())
            .key_conditions(key_conditions(None))
            .query_filter(HashMap::from([(
                "comment".to_owned(),
                Condition::new(ComparisonOperator::Null, []),
            )]))
            .build();
        assert_eq!(engine.execute(&missing).unwrap().count, 5);
    }

    #[test]
    fn test_should_reject_malformed_legacy_conditions() {
        let table = events();
        let (engine, name) = engine_for(&table, "legacy-reject");

        let wrong_arity = QueryInput::builder()
            .table_name(name.as_str())
            .key_conditions(key_conditions(Some(Condition::new(
                ComparisonOperator::Between,
                [s("2024")],
            ))))
            .build();
        assert_eq!(
            engine.execute(&wrong_arity).unwrap_err().code,
            QueryErrorCode::InvalidOperandCount
        );

        let non_key_operator = QueryInput::builder()
            .table_name(name.as_str())
            .key_conditions(key_conditions(Some(Condition::new(
                ComparisonOperator::Ne,
                [s("2024")],
            ))))
            .build();
        assert_eq!(
            engine.execute(&non_key_operator).unwrap_err().code,
            QueryErrorCode::InvalidKeyCondition
        );

        let missing_partition = QueryInput::builder()
            .table_name(name.as_str())
            .key_conditions(HashMap::from([(
                "at".to_owned(),
                Condition::new(ComparisonOperator::Gt, [s("2024")]),
            )]))
            .build();
        assert!(engine.execute(&missing_partition).unwrap_err().message.contains("device"));

        let operator_without_filter = QueryInput::builder()
            .table_name(name.as_str())
            .key_conditions(key_conditions(None))
            .conditional_operator(ConditionalOperator::Or)
            .build();
        assert_eq!(
            engine.execute(&operator_without_filter).unwrap_err().code,
            QueryErrorCode::InvalidQuerySpec
        );

        let key_in_filter = QueryInput::builder()
            .table_name(name.as_str())
            .key_conditions(key_conditions(None))
            .query_filter(HashMap::from([(
                "at".to_owned(),
                Condition::new(ComparisonOperator::NotNull, []),
            )]))
            .build();
        assert_eq!(
            engine.execute(&key_in_filter).unwrap_err().code,
            QueryErrorCode::KeyAttributeInFilter
        );
    }

    #[test]
    fn test_should_parse_wire_form_request() {
        let table = events();
        let (engine, name) = engine_for(&table, "legacy-json");
        let body = serde_json::json!({
            "TableName": name,
            "KeyConditions": {
                "device": {"ComparisonOperator": "EQ", "AttributeValueList": [{"S": "d1"}]},
                "at": {"ComparisonOperator": "GE", "AttributeValueList": [{"S": "2024-01-02"}]}
            },
            "QueryFilter": {
                "level": {"ComparisonOperator": "GT", "AttributeValueList": [{"N": "4"}]}
            },
            "ScanIndexForward": false,
            "Limit": 2
        });
        let input: QueryInput = serde_json::from_value(body).unwrap();

        let page = engine.execute(&input).unwrap();
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["Count"], 1);
        assert_eq!(json["ScannedCount"], 2);
        assert_eq!(json["Items"][0]["kind"]["S"], "alarm");
        assert_eq!(json["LastEvaluatedKey"]["at"]["S"], "2024-01-02T09:30");
    }
}
