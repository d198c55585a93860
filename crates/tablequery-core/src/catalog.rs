//! Table catalog: the tables and indexes the engine can query.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use typed_builder::TypedBuilder;

use tablequery_model::error::QueryError;
use tablequery_model::types::Projection;

use crate::storage::{ItemSource, KeySchema};

/// Kind of secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Own partition key; eventually consistent only.
    Global,
    /// Shares the table's partition key.
    Local,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("GLOBAL"),
            Self::Local => f.write_str("LOCAL"),
        }
    }
}

/// A secondary index and the source that scans it.
#[derive(Debug, Clone, TypedBuilder)]
pub struct IndexDefinition {
    /// Index name.
    #[builder(setter(into))]
    pub name: String,
    /// Global or local.
    pub kind: IndexKind,
    /// Index key schema.
    pub key_schema: KeySchema,
    /// Attributes copied into the index.
    #[builder(default)]
    pub projection: Projection,
    /// Items ordered by the index keys, ties broken by the table key.
    pub source: Arc<dyn ItemSource>,
}

/// A table and the source that scans it.
#[derive(Debug, Clone, TypedBuilder)]
pub struct TableDefinition {
    /// Table name.
    #[builder(setter(into))]
    pub name: String,
    /// Primary key schema.
    pub key_schema: KeySchema,
    /// Items ordered by the primary key.
    pub source: Arc<dyn ItemSource>,
    /// Secondary indexes.
    #[builder(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    /// Look up a secondary index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|index| index.name == name)
    }
}

/// All queryable tables, keyed by name.
#[derive(Debug, Default)]
pub struct TableCatalog {
    tables: DashMap<String, Arc<TableDefinition>>,
}

impl TableCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, returning the definition it replaced.
    pub fn register(&self, table: TableDefinition) -> Option<Arc<TableDefinition>> {
        self.tables.insert(table.name.clone(), Arc::new(table))
    }

    /// Get a table by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<TableDefinition>> {
        self.tables.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Get a table or return `ResourceNotFound`.
    pub fn require_table(&self, name: &str) -> Result<Arc<TableDefinition>, QueryError> {
        self.get(name).ok_or_else(|| {
            QueryError::resource_not_found(format!(
                "Requested resource not found: Table: {name} not found"
            ))
        })
    }

    /// Remove a table by name.
    pub fn remove(&self, name: &str) -> Option<Arc<TableDefinition>> {
        self.tables.remove(name).map(|(_, table)| table)
    }

    /// All table names, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}
