//! End-to-end query scenarios.
//!
//! Each test builds its own [`MemoryTable`], registers it in a fresh catalog
//! under a unique name and drives [`QueryEngine::execute`] the way a caller
//! would, including following `LastEvaluatedKey` across pages.
//!
//! ```text
//! cargo test -p tablequery-integration
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Once};

use tablequery_core::{EngineConfig, MemoryTable, QueryEngine, TableCatalog};
use tablequery_model::types::{ExpressionAttributeValues, Item};
use tablequery_model::{AttributeValue, QueryError, QueryInput, QueryPage};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Generate a unique table name for a test.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Register `table` under a unique name and return an engine over it.
#[must_use]
pub fn engine_for(table: &MemoryTable, prefix: &str) -> (QueryEngine, String) {
    engine_with_config(table, prefix, EngineConfig::default())
}

/// Like [`engine_for`], with explicit engine limits.
#[must_use]
pub fn engine_with_config(
    table: &MemoryTable,
    prefix: &str,
    config: EngineConfig,
) -> (QueryEngine, String) {
    init_tracing();
    let name = test_table_name(prefix);
    let catalog = Arc::new(TableCatalog::new());
    catalog.register(table.definition(name.clone()));
    tracing::debug!(table = %name, items = table.item_count(), "registered test table");
    (QueryEngine::new(catalog, config), name)
}

/// A number attribute value.
#[must_use]
pub fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

/// A string attribute value.
#[must_use]
pub fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_owned())
}

/// Build an item from name/value pairs.
#[must_use]
pub fn item(pairs: &[(&str, AttributeValue)]) -> Item {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), value.clone()))
        .collect()
}

/// Build an `ExpressionAttributeValues` map from placeholder/value pairs.
#[must_use]
pub fn values(pairs: &[(&str, AttributeValue)]) -> ExpressionAttributeValues {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), value.clone()))
        .collect::<HashMap<_, _>>()
}

/// Follow `LastEvaluatedKey` until the query is exhausted, returning every
/// page.
pub fn collect_pages(
    engine: &QueryEngine,
    input: &QueryInput,
) -> Result<Vec<QueryPage>, QueryError> {
    let mut input = input.clone();
    let mut pages = Vec::new();
    loop {
        let page = engine.execute(&input)?;
        let next = page.last_evaluated_key.clone();
        pages.push(page);
        match next {
            Some(key) => input.exclusive_start_key = Some(key),
            None => return Ok(pages),
        }
    }
}

/// Values of attribute `name` across the returned items, skipping items
/// without it.
#[must_use]
pub fn column(page: &QueryPage, name: &str) -> Vec<AttributeValue> {
    page.items()
        .iter()
        .filter_map(|item| item.get(name).cloned())
        .collect()
}

mod test_concurrency;
mod test_filter;
mod test_index;
mod test_legacy;
mod test_pagination;
