//! Post-read filtering and projection.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tablequery_core::{KeySchema, MemoryTable};
    use tablequery_model::types::ScalarAttributeType;
    use tablequery_model::{AttributeValue, QueryInput};

    use crate::{column, engine_for, item, n, s, values};

    fn catalog_table() -> MemoryTable {
        let table = MemoryTable::new(KeySchema::composite(
            "pk",
            ScalarAttributeType::N,
            "sk",
            ScalarAttributeType::N,
        ));
        for sk in 1..=5 {
            let mut row = item(&[
                ("pk", n(1)),
                ("sk", n(sk)),
                ("rank", n(sk)),
                ("name", s(&format!("item-{sk}"))),
            ]);
            if sk % 2 == 0 {
                row.insert(
                    "tags".to_owned(),
                    AttributeValue::Ss(vec!["even".to_owned(), format!("t{sk}")]),
                );
            }
            table.put_item(row).unwrap();
        }
        table
    }

    fn query(table: &str, filter: &str, extra: &[(&str, AttributeValue)]) -> QueryInput {
        let mut placeholders = values(extra);
        placeholders.insert(":pk".to_owned(), n(1));
        QueryInput::builder()
            .table_name(table)
            .key_condition_expression("pk = :pk")
            .filter_expression(filter)
            .expression_attribute_values(placeholders)
            .build()
    }

    #[test]
    fn test_should_count_filtered_items_as_scanned() {
        let table = catalog_table();
        let (engine, name) = engine_for(&table, "not-equal");
        let mut input = query(&name, "rank <> :three", &[(":three", n(3))]);
        input.limit = Some(3);

        let page = engine.execute(&input).unwrap();
        assert_eq!(column(&page, "sk"), vec![n(1), n(2)]);
        assert_eq!((page.count, page.scanned_count), (2, 3));
        assert_eq!(page.last_evaluated_key, Some(item(&[("pk", n(1)), ("sk", n(3))])));
    }

    #[test]
    fn test_should_filter_sort_key_and_keep_page_budget() {
        let table = catalog_table();
        let (engine, name) = engine_for(&table, "key-filter");
        let mut input = query(&name, "sk <> :three", &[(":three", n(3))]);
        input.limit = Some(3);

        let first = engine.execute(&input).unwrap();
        assert_eq!(column(&first, "sk"), vec![n(1), n(2)]);
        assert_eq!((first.count, first.scanned_count), (2, 3));
        assert_eq!(first.last_evaluated_key, Some(item(&[("pk", n(1)), ("sk", n(3))])));

        input.exclusive_start_key = first.last_evaluated_key;
        let second = engine.execute(&input).unwrap();
        assert_eq!(column(&second, "sk"), vec![n(4), n(5)]);
        assert_eq!((second.count, second.scanned_count), (2, 2));
        assert!(second.last_evaluated_key.is_none());
    }

    #[test]
    fn test_should_evaluate_functions_and_boolean_operators() {
        let table = catalog_table();
        let (engine, name) = engine_for(&table, "functions");

        let cases: Vec<(&str, Vec<(&str, AttributeValue)>, Vec<AttributeValue>)> = vec![
            ("attribute_exists(tags)", vec![], vec![n(2), n(4)]),
            ("attribute_not_exists(tags)", vec![], vec![n(1), n(3), n(5)]),
            ("contains(tags, :t)", vec![(":t", s("t4"))], vec![n(4)]),
            ("begins_with(#n, :p)", vec![(":p", s("item-3"))], vec![n(3)]),
            ("size(tags) = :two", vec![(":two", n(2))], vec![n(2), n(4)]),
            ("attribute_type(tags, :ss)", vec![(":ss", s("SS"))], vec![n(2), n(4)]),
            (
                "rank IN (:a, :b) OR NOT (rank < :c)",
                vec![(":a", n(1)), (":b", n(2)), (":c", n(5))],
                vec![n(1), n(2), n(5)],
            ),
            (
                "rank BETWEEN :lo AND :hi AND #n <> :skip",
                vec![(":lo", n(2)), (":hi", n(4)), (":skip", s("item-3"))],
                vec![n(2), n(4)],
            ),
        ];

        for (filter, placeholders, expected) in cases {
            let mut input = query(&name, filter, &placeholders);
            if filter.contains("#n") {
                input.expression_attribute_names =
                    Some(HashMap::from([("#n".to_owned(), "name".to_owned())]));
            }
            let page = engine.execute(&input).unwrap();
            assert_eq!(column(&page, "sk"), expected, "{filter}");
            assert_eq!(page.scanned_count, 5, "{filter}");
        }
    }

    #[test]
    fn test_should_treat_mismatched_types_as_non_matching() {
        let table = catalog_table();
        let (engine, name) = engine_for(&table, "types");
        let input = query(&name, "rank = :six", &[(":six", s("6"))]);

        let page = engine.execute(&input).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.last_evaluated_key.is_none());
    }

    #[test]
    fn test_should_project_expression_attributes() {
        let table = catalog_table();
        let (engine, name) = engine_for(&table, "projection");
        let input = QueryInput::builder()
            .table_name(name.as_str())
            .key_condition_expression("pk = :pk")
            .projection_expression("#n, tags, missing")
            .expression_attribute_names(HashMap::from([("#n".to_owned(), "name".to_owned())]))
            .expression_attribute_values(values(&[(":pk", n(1))]))
            .limit(2)
            .build();

        let page = engine.execute(&input).unwrap();
        assert_eq!(page.items().len(), 2);
        assert_eq!(page.items()[0], item(&[("name", s("item-1"))]));
        assert_eq!(page.items()[1].len(), 2);
        assert_eq!(page.last_evaluated_key, Some(item(&[("pk", n(1)), ("sk", n(2))])));
    }

    #[test]
    fn test_should_reject_malformed_filter_before_scanning() {
        let table = catalog_table();
        let (engine, name) = engine_for(&table, "malformed");

        for (filter, placeholders) in [
            ("rank = ", vec![]),
            ("rank.sub = :v", vec![(":v", n(1))]),
            ("rank BETWEEN :hi AND :lo", vec![(":lo", n(1)), (":hi", n(9))]),
            ("begins_with(rank, :v)", vec![(":v", n(1))]),
            ("unknown_fn(rank)", vec![]),
        ] {
            let input = query(&name, filter, &placeholders);
            let err = engine.execute(&input).unwrap_err();
            assert!(err.is_validation(), "{filter}: {err}");
        }
    }
}
