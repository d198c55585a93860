//! Model types for the table query engine.
//!
//! This crate holds the data that crosses the engine boundary: attribute
//! values with their typed comparison rules, the `Query` request and page
//! types, the legacy condition model and the error taxonomy. All types use the
//! DynamoDB-style JSON wire format (`PascalCase` fields, single-key attribute
//! value objects) so requests can be deserialized straight from a payload.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod number;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{QueryError, QueryErrorCode};
pub use input::QueryInput;
pub use output::QueryPage;
