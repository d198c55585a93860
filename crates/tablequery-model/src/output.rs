//! The `Query` result page.

use serde::{Deserialize, Serialize};

use crate::types::{ConsumedCapacity, Item, Key};

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryPage {
    /// Matching items after projection, in scan order. `None` for
    /// `Select=COUNT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,

    /// The number of items that passed the filter.
    pub count: i32,

    /// The number of items evaluated before the filter was applied.
    pub scanned_count: i32,

    /// Key of the last evaluated item. Present only when the page stopped
    /// before the requested range was exhausted; pass it back as
    /// `ExclusiveStartKey` to continue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Key>,

    /// The capacity units consumed, when requested and reported by storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_capacity: Option<ConsumedCapacity>,
}

impl QueryPage {
    /// Returns `true` if the caller should issue another call to continue.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.last_evaluated_key.is_some()
    }

    /// The returned items, or an empty slice for `Select=COUNT`.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        self.items.as_deref().unwrap_or_default()
    }
}
