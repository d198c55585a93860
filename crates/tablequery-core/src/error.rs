//! Bridges from internal layer errors to [`QueryError`].

use tablequery_model::error::{QueryError, QueryErrorCode};

use crate::expression::ExpressionError;
use crate::storage::StorageError;

/// Convert an expression error into a request validation error.
///
/// `context` names the offending parameter, e.g. `"FilterExpression"`.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn expression_error_to_query(context: &str, e: ExpressionError) -> QueryError {
    QueryError::with_message(QueryErrorCode::InvalidQuerySpec, format!("Invalid {context}: {e}"))
}

/// Convert a storage collaborator failure into `StorageUnavailable`.
///
/// The storage error is kept as the source so callers can inspect it.
#[must_use]
pub fn storage_error_to_query(e: StorageError) -> QueryError {
    QueryError::with_message(QueryErrorCode::StorageUnavailable, e.to_string()).with_source(e)
}
