//! Query error taxonomy.
//!
//! Every failure of a query call is a [`QueryError`] carrying one of the
//! [`QueryErrorCode`] kinds. Validation kinds are raised before any storage
//! access; `StorageUnavailable` wraps a failure reported by the storage
//! collaborator and is surfaced unchanged.

use std::fmt;

/// Well-known query error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum QueryErrorCode {
    /// Structurally malformed request.
    #[default]
    InvalidQuerySpec,
    /// Key condition does not constrain the key schema correctly.
    InvalidKeyCondition,
    /// Operand list does not match the operator's arity or type rules.
    InvalidOperandCount,
    /// A filter references a key attribute.
    KeyAttributeInFilter,
    /// The storage collaborator failed.
    StorageUnavailable,
    /// The table does not exist.
    ResourceNotFound,
}

impl QueryErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidQuerySpec => "InvalidQuerySpec",
            Self::InvalidKeyCondition => "InvalidKeyCondition",
            Self::InvalidOperandCount => "InvalidOperandCount",
            Self::KeyAttributeInFilter => "KeyAttributeInFilter",
            Self::StorageUnavailable => "StorageUnavailable",
            Self::ResourceNotFound => "ResourceNotFound",
        }
    }

    /// Returns `true` for the request validation family.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuerySpec
                | Self::InvalidKeyCondition
                | Self::InvalidOperandCount
                | Self::KeyAttributeInFilter
        )
    }
}

impl fmt::Display for QueryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed query call.
#[derive(Debug)]
pub struct QueryError {
    /// The error code.
    pub code: QueryErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl QueryError {
    /// Create a new `QueryError` from an error code.
    #[must_use]
    pub fn new(code: QueryErrorCode) -> Self {
        Self {
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create a new `QueryError` with a custom message.
    #[must_use]
    pub fn with_message(code: QueryErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns `true` if the request was rejected during validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.code.is_validation()
    }

    // -- Convenience constructors --

    /// Malformed request.
    #[must_use]
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::with_message(QueryErrorCode::InvalidQuerySpec, message)
    }

    /// Unsupported key condition shape.
    #[must_use]
    pub fn invalid_key_condition(message: impl Into<String>) -> Self {
        Self::with_message(QueryErrorCode::InvalidKeyCondition, message)
    }

    /// Wrong number or type of condition operands.
    #[must_use]
    pub fn invalid_operand_count(message: impl Into<String>) -> Self {
        Self::with_message(QueryErrorCode::InvalidOperandCount, message)
    }

    /// Filter references a key attribute.
    #[must_use]
    pub fn key_attribute_in_filter(name: &str) -> Self {
        Self::with_message(
            QueryErrorCode::KeyAttributeInFilter,
            format!("Filter Expression can not contain key attribute {name}"),
        )
    }

    /// Storage collaborator failure.
    #[must_use]
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::with_message(QueryErrorCode::StorageUnavailable, message)
    }

    /// Table not found.
    #[must_use]
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::with_message(QueryErrorCode::ResourceNotFound, message)
    }
}

/// Create a `QueryError` from an error code.
///
/// # Examples
///
/// ```
/// use tablequery_model::query_error;
/// use tablequery_model::error::QueryErrorCode;
///
/// let err = query_error!(InvalidQuerySpec);
/// assert_eq!(err.code, QueryErrorCode::InvalidQuerySpec);
///
/// let err = query_error!(InvalidKeyCondition, "Query key condition not supported");
/// assert_eq!(err.message, "Query key condition not supported");
/// ```
#[macro_export]
macro_rules! query_error {
    ($code:ident) => {
        $crate::error::QueryError::new($crate::error::QueryErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::QueryError::with_message($crate::error::QueryErrorCode::$code, $msg)
    };
}
