//! Table query engine.
//!
//! Plans a partition and sort key range from a key condition, walks the
//! matching items through a storage collaborator in key order, filters and
//! projects them, and cuts the result into pages with resumable continuation
//! keys.
//!
//! The pipeline, leaf first:
//!
//! 1. [`condition`]: operator semantics over attribute values.
//! 2. [`planner`]: key condition to partition value plus sort range.
//! 3. [`filter`]: post-read predicate over a whole item.
//! 4. [`pagination`]: the scan loop with count and size limits.
//! 5. [`engine`]: request validation and orchestration.

pub mod catalog;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod expression;
pub mod filter;
pub mod memory;
pub mod pagination;
pub mod planner;
pub mod projection;
pub mod storage;

pub use catalog::{IndexDefinition, IndexKind, TableCatalog, TableDefinition};
pub use config::EngineConfig;
pub use engine::QueryEngine;
pub use memory::MemoryTable;
pub use storage::{ItemSource, KeyAttribute, KeySchema, ScanDirection, SortRange, StorageError};
