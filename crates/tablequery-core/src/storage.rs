//! The storage collaborator interface.
//!
//! The engine never touches physical storage. It asks an [`ItemSource`] for a
//! lazy, key-ordered stream over one partition, optionally narrowed to a sort
//! key range and resumed after a previously returned key. Read consistency is
//! passed through untouched.
//!
//! ```text
//! QueryEngine ──ScanRequest──▶ ItemSource ──ItemStream──▶ Paginator
//! ```

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use tablequery_model::AttributeValue;
use tablequery_model::types::{Item, Key, ScalarAttributeType};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported by a storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
    /// A required key attribute was not found in the item.
    #[error("missing required key attribute: {attr}")]
    MissingKeyAttribute {
        /// The name of the missing attribute.
        attr: String,
    },
    /// A key attribute has the wrong type.
    #[error("key attribute '{attr}' has wrong type: expected {expected}, got {actual}")]
    InvalidKeyType {
        /// The name of the attribute.
        attr: String,
        /// The expected type descriptor.
        expected: String,
        /// The actual type descriptor.
        actual: String,
    },
}

// ---------------------------------------------------------------------------
// Key schema
// ---------------------------------------------------------------------------

/// A single key attribute definition with its name and scalar type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    /// The attribute name.
    pub name: String,
    /// The scalar type (S, N, or B).
    pub attr_type: ScalarAttributeType,
}

impl KeyAttribute {
    /// Create a key attribute definition.
    #[must_use]
    pub fn new(name: impl Into<String>, attr_type: ScalarAttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
        }
    }

    /// Read this attribute from `item`, checking its type.
    pub fn extract<'a>(&self, item: &'a Item) -> Result<&'a AttributeValue, StorageError> {
        let value = item
            .get(&self.name)
            .ok_or_else(|| StorageError::MissingKeyAttribute {
                attr: self.name.clone(),
            })?;
        if self.attr_type.matches(value) {
            Ok(value)
        } else {
            Err(StorageError::InvalidKeyType {
                attr: self.name.clone(),
                expected: self.attr_type.as_str().to_owned(),
                actual: value.type_descriptor().to_owned(),
            })
        }
    }
}

/// Key schema of a table or index: a partition key and an optional sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition (HASH) key name and type.
    pub partition_key: KeyAttribute,
    /// Optional sort (RANGE) key name and type.
    pub sort_key: Option<KeyAttribute>,
}

impl KeySchema {
    /// A schema with only a partition key.
    #[must_use]
    pub fn hash(name: impl Into<String>, attr_type: ScalarAttributeType) -> Self {
        Self {
            partition_key: KeyAttribute::new(name, attr_type),
            sort_key: None,
        }
    }

    /// A schema with a partition key and a sort key.
    #[must_use]
    pub fn composite(
        partition: impl Into<String>,
        partition_type: ScalarAttributeType,
        sort: impl Into<String>,
        sort_type: ScalarAttributeType,
    ) -> Self {
        Self {
            partition_key: KeyAttribute::new(partition, partition_type),
            sort_key: Some(KeyAttribute::new(sort, sort_type)),
        }
    }

    /// The key attributes, partition key first.
    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.partition_key).chain(self.sort_key.as_ref())
    }

    /// Look up a key attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&KeyAttribute> {
        self.attributes().find(|attr| attr.name == name)
    }

    /// Returns `true` if `name` is one of the key attributes.
    #[must_use]
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Copy the key attributes out of `item`, checking presence and types.
    pub fn extract_key(&self, item: &Item) -> Result<Key, StorageError> {
        self.attributes()
            .map(|attr| -> Result<_, StorageError> {
                Ok((attr.name.clone(), attr.extract(item)?.clone()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Scan requests
// ---------------------------------------------------------------------------

/// Order in which a partition is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    /// Ascending sort key order.
    #[default]
    Forward,
    /// Descending sort key order.
    Backward,
}

impl ScanDirection {
    /// Map the `ScanIndexForward` flag to a direction.
    #[must_use]
    pub fn from_scan_forward(forward: bool) -> Self {
        if forward { Self::Forward } else { Self::Backward }
    }
}

/// A sort key constraint resolved from a key condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortRange {
    /// `sk = v`
    Eq(AttributeValue),
    /// `sk < v`
    Lt(AttributeValue),
    /// `sk <= v`
    Le(AttributeValue),
    /// `sk > v`
    Gt(AttributeValue),
    /// `sk >= v`
    Ge(AttributeValue),
    /// `sk BETWEEN low AND high`, inclusive.
    Between(AttributeValue, AttributeValue),
    /// `begins_with(sk, prefix)`
    BeginsWith(AttributeValue),
}

impl SortRange {
    /// Returns `true` if `value` satisfies the constraint.
    #[must_use]
    pub fn contains(&self, value: &AttributeValue) -> bool {
        let cmp = |bound: &AttributeValue| value.compare(bound);
        match self {
            Self::Eq(v) => cmp(v) == Some(Ordering::Equal),
            Self::Lt(v) => cmp(v) == Some(Ordering::Less),
            Self::Le(v) => cmp(v).is_some_and(Ordering::is_le),
            Self::Gt(v) => cmp(v) == Some(Ordering::Greater),
            Self::Ge(v) => cmp(v).is_some_and(Ordering::is_ge),
            Self::Between(low, high) => {
                cmp(low).is_some_and(Ordering::is_ge) && cmp(high).is_some_and(Ordering::is_le)
            }
            Self::BeginsWith(prefix) => value.begins_with(prefix),
        }
    }
}

/// One partition scan handed to an [`ItemSource`].
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    /// Partition key value to read.
    pub partition: &'a AttributeValue,
    /// Optional sort key constraint.
    pub range: Option<&'a SortRange>,
    /// Walk order.
    pub direction: ScanDirection,
    /// Resume strictly after this key (exclusive).
    pub after: Option<&'a Key>,
    /// Strongly consistent read requested.
    pub consistent_read: bool,
}

/// A lazy, key-ordered stream of items.
pub type ItemStream<'a> = Box<dyn Iterator<Item = Result<Item, StorageError>> + Send + 'a>;

/// A sorted key-value source the engine can scan.
///
/// Implementations must yield items of one partition in key order for the
/// requested direction, restart cleanly from `after` on every call and be safe
/// to scan from many threads at once.
pub trait ItemSource: Send + Sync + fmt::Debug {
    /// Open a stream over the requested partition range.
    fn scan<'a>(&'a self, request: ScanRequest<'a>) -> Result<ItemStream<'a>, StorageError>;

    /// Read capacity consumed by reading `bytes` of item data, if the source
    /// meters reads.
    fn read_capacity(&self, bytes: u64, consistent_read: bool) -> Option<f64> {
        let _ = (bytes, consistent_read);
        None
    }
}

// ---------------------------------------------------------------------------
// Item size
// ---------------------------------------------------------------------------

/// Approximate serialized size of an item: attribute names plus values.
#[must_use]
pub fn item_size(item: &Item) -> u64 {
    item.iter()
        .map(|(name, value)| name.len() as u64 + value_size(value))
        .sum()
}

fn value_size(value: &AttributeValue) -> u64 {
    match value {
        AttributeValue::S(s) => s.len() as u64,
        AttributeValue::N(n) => number_size(n),
        AttributeValue::B(b) => b.len() as u64,
        AttributeValue::Bool(_) | AttributeValue::Null(_) => 1,
        AttributeValue::Ss(v) => v.iter().map(|s| s.len() as u64).sum(),
        AttributeValue::Ns(v) => v.iter().map(|n| number_size(n)).sum(),
        AttributeValue::Bs(v) => v.iter().map(|b| b.len() as u64).sum(),
        AttributeValue::L(list) => 3 + list.iter().map(|v| 1 + value_size(v)).sum::<u64>(),
        AttributeValue::M(map) => {
            3 + map
                .iter()
                .map(|(k, v)| k.len() as u64 + 1 + value_size(v))
                .sum::<u64>()
        }
    }
}

fn number_size(text: &str) -> u64 {
    (text.len().div_ceil(2) + 1) as u64
}
