//! Queries against global and local secondary indexes.

#[cfg(test)]
mod tests {
    use tablequery_core::{IndexKind, KeySchema, MemoryTable};
    use tablequery_model::types::{Projection, ReturnConsumedCapacity, ScalarAttributeType, Select};
    use tablequery_model::{QueryErrorCode, QueryInput};

    use crate::{collect_pages, column, engine_for, item, n, s, values};

    fn orders() -> MemoryTable {
        let table = MemoryTable::new(KeySchema::composite(
            "customer",
            ScalarAttributeType::S,
            "order_id",
            ScalarAttributeType::N,
        ))
        .with_index(
            "by_status",
            IndexKind::Global,
            KeySchema::composite(
                "status",
                ScalarAttributeType::S,
                "created",
                ScalarAttributeType::N,
            ),
            Projection::include(["total"]),
        )
        .with_index(
            "by_total",
            IndexKind::Local,
            KeySchema::composite(
                "customer",
                ScalarAttributeType::S,
                "total",
                ScalarAttributeType::N,
            ),
            Projection::all(),
        );
        let rows = [
            ("alice", 1, Some("open"), 100, 30),
            ("alice", 2, Some("closed"), 110, 70),
            ("alice", 3, Some("open"), 120, 90),
            ("bob", 1, Some("open"), 100, 10),
            ("bob", 2, None, 130, 55),
        ];
        for (customer, order_id, status, created, total) in rows {
            let mut row = item(&[
                ("customer", s(customer)),
                ("order_id", n(order_id)),
                ("created", n(created)),
                ("total", n(total)),
                ("note", s("fragile")),
            ]);
            if let Some(status) = status {
                row.insert("status".to_owned(), s(status));
            }
            table.put_item(row).unwrap();
        }
        table
    }

    fn by_status(table: &str, status: &str) -> QueryInput {
        QueryInput::builder()
            .table_name(table)
            .index_name("by_status")
            .key_condition_expression("#s = :s")
            .expression_attribute_names([("#s".to_owned(), "status".to_owned())].into())
            .expression_attribute_values(values(&[(":s", s(status))]))
            .build()
    }

    #[test]
    fn test_should_page_global_index_with_table_keys_in_continuation() {
        let table = orders();
        let (engine, name) = engine_for(&table, "gsi-paging");
        let mut input = by_status(&name, "open");
        input.limit = Some(2);

        let first = engine.execute(&input).unwrap();
        assert_eq!(column(&first, "customer"), vec![s("alice"), s("bob")]);
        assert_eq!(
            first.last_evaluated_key,
            Some(item(&[
                ("status", s("open")),
                ("created", n(100)),
                ("customer", s("bob")),
                ("order_id", n(1)),
            ]))
        );

        let pages = collect_pages(&engine, &input).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(column(&pages[1], "order_id"), vec![n(3)]);
        assert!(pages[1].last_evaluated_key.is_none());
    }

    #[test]
    fn test_should_return_only_projected_attributes_from_global_index() {
        let table = orders();
        let (engine, name) = engine_for(&table, "gsi-projection");
        let page = engine.execute(&by_status(&name, "open")).unwrap();
        assert_eq!(page.count, 3);
        for row in page.items() {
            let mut attributes: Vec<&str> = row.keys().map(String::as_str).collect();
            attributes.sort_unstable();
            assert_eq!(attributes, vec!["created", "customer", "order_id", "status", "total"]);
        }

        // The filter cannot see attributes the index does not carry.
        let mut filtered = by_status(&name, "open");
        filtered.filter_expression = Some("attribute_exists(note)".to_owned());
        let page = engine.execute(&filtered).unwrap();
        assert_eq!((page.count, page.scanned_count), (0, 3));
    }

    #[test]
    fn test_should_leave_items_without_index_keys_out_of_sparse_index() {
        let table = orders();
        let (engine, name) = engine_for(&table, "sparse");
        let mut input = by_status(&name, "open");
        input.select = Some(Select::Count);
        assert_eq!(engine.execute(&input).unwrap().count, 3);

        table
            .delete_item(&item(&[("customer", s("alice")), ("order_id", n(3))]))
            .unwrap();
        assert_eq!(engine.execute(&input).unwrap().count, 2);
    }

    #[test]
    fn test_should_reject_unsupported_global_index_reads() {
        let table = orders();
        let (engine, name) = engine_for(&table, "gsi-reject");

        let mut consistent = by_status(&name, "open");
        consistent.consistent_read = Some(true);
        let err = engine.execute(&consistent).unwrap_err();
        assert_eq!(err.code, QueryErrorCode::InvalidQuerySpec);

        let mut everything = by_status(&name, "open");
        everything.select = Some(Select::AllAttributes);
        assert!(engine.execute(&everything).unwrap_err().message.contains("ALL_ATTRIBUTES"));

        let mut unknown = by_status(&name, "open");
        unknown.index_name = Some("by_colour".to_owned());
        let err = engine.execute(&unknown).unwrap_err();
        assert!(err.message.contains("by_colour"));
    }

    #[test]
    fn test_should_query_local_index_in_index_order() {
        let table = orders();
        let (engine, name) = engine_for(&table, "lsi");
        let input = QueryInput::builder()
            .table_name(name.as_str())
            .index_name("by_total")
            .key_condition_expression("customer = :c AND total > :min")
            .expression_attribute_values(values(&[(":c", s("alice")), (":min", n(50))]))
            .consistent_read(true)
            .select(Select::AllAttributes)
            .scan_index_forward(false)
            .build();

        let page = engine.execute(&input).unwrap();
        assert_eq!(column(&page, "order_id"), vec![n(3), n(2)]);
        assert!(page.items().iter().all(|row| row.contains_key("note")));
    }

    #[test]
    fn test_should_report_index_capacity() {
        let table = orders();
        let (engine, name) = engine_for(&table, "capacity");
        let mut input = by_status(&name, "open");
        input.return_consumed_capacity = Some(ReturnConsumedCapacity::Indexes);

        let consumed = engine.execute(&input).unwrap().consumed_capacity.unwrap();
        assert_eq!(consumed.capacity_units, Some(0.5));
        assert_eq!(consumed.table.and_then(|t| t.capacity_units), Some(0.0));
        assert_eq!(
            consumed.global_secondary_indexes["by_status"].capacity_units,
            Some(0.5)
        );
        assert!(consumed.local_secondary_indexes.is_empty());

        input.return_consumed_capacity = Some(ReturnConsumedCapacity::Total);
        let consumed = engine.execute(&input).unwrap().consumed_capacity.unwrap();
        assert!(consumed.table.is_none());
        assert!(consumed.global_secondary_indexes.is_empty());
    }
}
