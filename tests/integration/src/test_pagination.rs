//! Key range scans, ordering and continuation across pages.

#[cfg(test)]
mod tests {
    use tablequery_core::{EngineConfig, KeySchema, MemoryTable};
    use tablequery_model::types::{ScalarAttributeType, Select};
    use tablequery_model::{AttributeValue, QueryInput};

    use crate::{collect_pages, column, engine_for, engine_with_config, item, n, s, values};

    /// Partition `1` holds sort keys `1..=count`.
    fn numbered_table(count: u32) -> MemoryTable {
        let table = MemoryTable::new(KeySchema::composite(
            "pk",
            ScalarAttributeType::N,
            "sk",
            ScalarAttributeType::N,
        ));
        for sk in 1..=count {
            table
                .put_item(item(&[("pk", n(1)), ("sk", n(sk)), ("rank", n(sk))]))
                .unwrap();
        }
        table.put_item(item(&[("pk", n(2)), ("sk", n(1))])).unwrap();
        table
    }

    fn between(table: &str, lo: u32, hi: u32) -> QueryInput {
        QueryInput::builder()
            .table_name(table)
            .key_condition_expression("pk = :pk AND sk BETWEEN :lo AND :hi")
            .expression_attribute_values(values(&[(":pk", n(1)), (":lo", n(lo)), (":hi", n(hi))]))
            .build()
    }

    #[test]
    fn test_should_resume_between_range_from_last_evaluated_key() {
        let table = numbered_table(5);
        let (engine, name) = engine_for(&table, "between");
        let mut input = between(&name, 2, 4);
        input.limit = Some(2);

        let first = engine.execute(&input).unwrap();
        assert_eq!(column(&first, "sk"), vec![n(2), n(3)]);
        assert_eq!(
            first.last_evaluated_key,
            Some(item(&[("pk", n(1)), ("sk", n(3))]))
        );

        input.exclusive_start_key = first.last_evaluated_key;
        let second = engine.execute(&input).unwrap();
        assert_eq!(column(&second, "sk"), vec![n(4)]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[test]
    fn test_should_scan_descending_when_requested() {
        let table = numbered_table(5);
        let (engine, name) = engine_for(&table, "descending");
        let mut input = between(&name, 2, 4);
        input.scan_index_forward = Some(false);

        let page = engine.execute(&input).unwrap();
        assert_eq!(column(&page, "sk"), vec![n(4), n(3), n(2)]);
        assert!(!page.has_more());
    }

    #[test]
    fn test_should_omit_last_evaluated_key_when_limit_meets_range_end() {
        let table = numbered_table(5);
        let (engine, name) = engine_for(&table, "exact");
        let mut input = between(&name, 2, 4);
        input.limit = Some(3);

        let page = engine.execute(&input).unwrap();
        assert_eq!(page.count, 3);
        assert!(page.last_evaluated_key.is_none());
    }

    #[test]
    fn test_should_yield_same_sequence_for_any_page_size() {
        let table = numbered_table(23);
        let (engine, name) = engine_for(&table, "continuation");
        let mut input = QueryInput::builder()
            .table_name(name.as_str())
            .key_condition_expression("pk = :pk AND sk >= :lo")
            .filter_expression("rank <> :skip")
            .expression_attribute_values(values(&[(":pk", n(1)), (":lo", n(3)), (":skip", n(10))]))
            .build();

        let full = engine.execute(&input).unwrap();
        assert!(full.last_evaluated_key.is_none());
        let expected = column(&full, "sk");
        assert_eq!(expected.len(), 20);

        for direction in [true, false] {
            input.scan_index_forward = Some(direction);
            let reference = column(&engine.execute(&input).unwrap(), "sk");

            for limit in [1, 2, 3, 7, 20, 21, 50] {
                input.limit = Some(limit);
                let pages = collect_pages(&engine, &input).unwrap();
                let paged: Vec<AttributeValue> =
                    pages.iter().flat_map(|page| column(page, "sk")).collect();
                assert_eq!(paged, reference, "limit {limit}, forward {direction}");
                let scanned: i32 = pages.iter().map(|page| page.scanned_count).sum();
                assert_eq!(scanned, 21, "limit {limit}, forward {direction}");
            }
            input.limit = None;
        }
    }

    #[test]
    fn test_should_stop_at_size_ceiling_and_continue() {
        let table = numbered_table(0);
        let padding = "x".repeat(300);
        for sk in 1..=10 {
            table
                .put_item(item(&[("pk", n(1)), ("sk", n(sk)), ("body", s(&padding))]))
                .unwrap();
        }
        let config = EngineConfig::builder().page_size_limit(1000).build();
        let (engine, name) = engine_with_config(&table, "ceiling", config);
        let input = QueryInput::builder()
            .table_name(name.as_str())
            .key_condition_expression("pk = :pk")
            .expression_attribute_values(values(&[(":pk", n(1))]))
            .build();

        let first = engine.execute(&input).unwrap();
        // Each item is a little over 300 bytes; the fourth crosses 1000.
        assert_eq!(first.scanned_count, 4);
        assert!(first.has_more());

        let pages = collect_pages(&engine, &input).unwrap();
        let total: usize = pages.iter().map(|page| page.items().len()).sum();
        assert_eq!(total, 10);
        assert_eq!(pages.len(), 3);
    }

    #[test]
    fn test_should_count_without_returning_items() {
        let table = numbered_table(5);
        let (engine, name) = engine_for(&table, "count");
        let mut input = between(&name, 1, 5);
        input.select = Some(Select::Count);

        let page = engine.execute(&input).unwrap();
        assert!(page.items.is_none());
        assert_eq!(page.count, 5);
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("Items").is_none());
        assert_eq!(json["Count"], 5);
    }

    #[test]
    fn test_should_order_numbers_by_value() {
        let table = numbered_table(0);
        for sk in ["10", "-1", "2.5", "1e2", "0.001"] {
            table
                .put_item(item(&[("pk", n(7)), ("sk", AttributeValue::N(sk.to_owned()))]))
                .unwrap();
        }
        let (engine, name) = engine_for(&table, "numbers");
        let input = QueryInput::builder()
            .table_name(name.as_str())
            .key_condition_expression("pk = :pk AND sk < :hi")
            .expression_attribute_values(values(&[(":pk", n(7)), (":hi", n(100))]))
            .build();

        let page = engine.execute(&input).unwrap();
        assert_eq!(column(&page, "sk"), vec![n(-1), n("0.001"), n("2.5"), n(10)]);
    }

    #[test]
    fn test_should_order_strings_and_binary_by_unsigned_bytes() {
        let strings = MemoryTable::new(KeySchema::composite(
            "pk",
            ScalarAttributeType::S,
            "sk",
            ScalarAttributeType::S,
        ));
        for sk in ["b", "abc", "A", "a", "ab", "é"] {
            strings.put_item(item(&[("pk", s("p")), ("sk", s(sk))])).unwrap();
        }
        let (engine, name) = engine_for(&strings, "strings");
        let input = QueryInput::builder()
            .table_name(name.as_str())
            .key_condition_expression("pk = :pk")
            .expression_attribute_values(values(&[(":pk", s("p"))]))
            .build();
        let page = engine.execute(&input).unwrap();
        assert_eq!(
            column(&page, "sk"),
            vec![s("A"), s("a"), s("ab"), s("abc"), s("b"), s("é")]
        );

        let mut prefixed = input.clone();
        prefixed.key_condition_expression =
            Some("pk = :pk AND begins_with(sk, :prefix)".to_owned());
        prefixed.expression_attribute_values =
            Some(values(&[(":pk", s("p")), (":prefix", s("a"))]));
        let page = engine.execute(&prefixed).unwrap();
        assert_eq!(column(&page, "sk"), vec![s("a"), s("ab"), s("abc")]);

        let binary = MemoryTable::new(KeySchema::composite(
            "pk",
            ScalarAttributeType::S,
            "sk",
            ScalarAttributeType::B,
        ));
        for byte in [0xff_u8, 0x01, 0x80, 0x7f] {
            binary
                .put_item(item(&[
                    ("pk", s("p")),
                    ("sk", AttributeValue::B(bytes::Bytes::from(vec![byte]))),
                ]))
                .unwrap();
        }
        let (engine, name) = engine_for(&binary, "binary");
        let mut input = input;
        input.table_name = name;
        let page = engine.execute(&input).unwrap();
        let order: Vec<u8> = column(&page, "sk")
            .iter()
            .filter_map(|value| value.as_bytes().and_then(|b| b.first().copied()))
            .collect();
        assert_eq!(order, vec![0x01, 0x7f, 0x80, 0xff]);
    }
}
