//! Concurrent queries and writes against one table.

#[cfg(test)]
mod tests {
    use std::thread;

    use tablequery_core::{KeySchema, MemoryTable};
    use tablequery_model::QueryInput;
    use tablequery_model::types::ScalarAttributeType;

    use crate::{collect_pages, column, engine_for, item, n, values};

    fn partitioned_table(partitions: u32, per_partition: u32) -> MemoryTable {
        let table = MemoryTable::new(KeySchema::composite(
            "pk",
            ScalarAttributeType::N,
            "sk",
            ScalarAttributeType::N,
        ));
        for pk in 0..partitions {
            for sk in 0..per_partition {
                table
                    .put_item(item(&[("pk", n(pk)), ("sk", n(sk)), ("v", n(pk * 1000 + sk))]))
                    .unwrap();
            }
        }
        table
    }

    fn partition_query(table: &str, pk: u32, limit: i32) -> QueryInput {
        QueryInput::builder()
            .table_name(table)
            .key_condition_expression("pk = :pk")
            .expression_attribute_values(values(&[(":pk", n(pk))]))
            .limit(limit)
            .build()
    }

    #[test]
    fn test_should_serve_independent_queries_from_many_threads() {
        let table = partitioned_table(8, 50);
        let (engine, name) = engine_for(&table, "parallel");

        thread::scope(|scope| {
            for pk in 0..8 {
                let engine = &engine;
                let name = name.as_str();
                scope.spawn(move || {
                    for limit in [1, 7, 50] {
                        let pages =
                            collect_pages(engine, &partition_query(name, pk, limit)).unwrap();
                        let seen: Vec<_> = pages.iter().flat_map(|p| column(p, "v")).collect();
                        let expected: Vec<_> = (0..50).map(|sk| n(pk * 1000 + sk)).collect();
                        assert_eq!(seen, expected, "partition {pk}, limit {limit}");
                    }
                });
            }
        });
    }

    #[test]
    fn test_should_keep_in_flight_pages_ordered_during_writes() {
        let table = partitioned_table(1, 200);
        let (engine, name) = engine_for(&table, "writes");

        thread::scope(|scope| {
            let table = &table;
            scope.spawn(move || {
                for sk in 200..400 {
                    table
                        .put_item(item(&[("pk", n(0)), ("sk", n(sk)), ("v", n(sk))]))
                        .unwrap();
                }
                for sk in (0..200).step_by(3) {
                    table
                        .delete_item(&item(&[("pk", n(0)), ("sk", n(sk))]))
                        .unwrap();
                }
            });

            for _ in 0..4 {
                let engine = &engine;
                let name = name.as_str();
                scope.spawn(move || {
                    let pages = collect_pages(engine, &partition_query(name, 0, 16)).unwrap();
                    let keys: Vec<_> = pages.iter().flat_map(|p| column(p, "sk")).collect();
                    assert!(
                        keys.windows(2)
                            .all(|w| w[0].compare(&w[1]).is_some_and(|o| o.is_lt()))
                    );
                });
            }
        });

        assert_eq!(table.item_count(), 400 - 67);
    }
}
