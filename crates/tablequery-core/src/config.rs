//! Engine configuration.
//!
//! Provides [`EngineConfig`], the fixed limits the query engine enforces on
//! every call. Values can be overridden from environment variables.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default page size ceiling: 1 MiB of scanned item data.
pub const DEFAULT_PAGE_SIZE_LIMIT: u64 = 1_048_576;

/// Default maximum expression length in bytes.
pub const DEFAULT_MAX_EXPRESSION_LENGTH: usize = 4096;

/// Default maximum nesting depth of a parsed expression.
pub const DEFAULT_MAX_EXPRESSION_DEPTH: usize = 16;

/// Query engine configuration.
///
/// # Examples
///
/// ```
/// use tablequery_core::config::EngineConfig;
///
/// let config = EngineConfig::builder().page_size_limit(4096).build();
/// assert_eq!(config.page_size_limit, 4096);
/// assert_eq!(config.max_expression_depth, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// A page stops once the scanned item bytes exceed this ceiling.
    #[builder(default = DEFAULT_PAGE_SIZE_LIMIT)]
    pub page_size_limit: u64,

    /// Longest accepted key condition, filter or projection expression.
    #[builder(default = DEFAULT_MAX_EXPRESSION_LENGTH)]
    pub max_expression_length: usize,

    /// Deepest accepted nesting of `NOT`, `AND`/`OR` and parentheses.
    #[builder(default = DEFAULT_MAX_EXPRESSION_DEPTH)]
    pub max_expression_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size_limit: DEFAULT_PAGE_SIZE_LIMIT,
            max_expression_length: DEFAULT_MAX_EXPRESSION_LENGTH,
            max_expression_depth: DEFAULT_MAX_EXPRESSION_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `TABLEQUERY_PAGE_SIZE_LIMIT` | `1048576` |
    /// | `TABLEQUERY_MAX_EXPRESSION_LENGTH` | `4096` |
    /// | `TABLEQUERY_MAX_EXPRESSION_DEPTH` | `16` |
    ///
    /// Values that are not positive integers are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(n) = positive(lookup("TABLEQUERY_PAGE_SIZE_LIMIT")) {
            config.page_size_limit = n;
        }
        if let Some(n) = positive(lookup("TABLEQUERY_MAX_EXPRESSION_LENGTH")) {
            config.max_expression_length = n;
        }
        if let Some(n) = positive(lookup("TABLEQUERY_MAX_EXPRESSION_DEPTH")) {
            config.max_expression_depth = n;
        }

        config
    }
}

fn positive<T: std::str::FromStr + PartialOrd + Default>(value: Option<String>) -> Option<T> {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .filter(|n| *n > T::default())
}
