//! In-memory reference store.
//!
//! Every table and index is a [`MemoryIndex`]: partitions in a [`DashMap`],
//! each an `Arc<BTreeMap>` of rows ordered by the typed sort key. Writers
//! copy a partition on write with [`Arc::make_mut`], so a scan works on the
//! snapshot it started with.
//!
//! # Architecture
//!
//! ```text
//! DashMap<PartitionValue, Arc<BTreeMap<RowKey, Arc<Item>>>>
//!
//! RowKey = (sort ordinal, tie-break ordinals)
//! ```
//!
//! - Numbers order by exact decimal value, strings and binaries by unsigned
//!   bytes.
//! - Index rows break ties on the table key, so equal index keys still have
//!   a total, resumable order.
//! - Index rows exist only for items that carry all index key attributes.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use dashmap::DashMap;
use tracing::debug;

use tablequery_model::AttributeValue;
use tablequery_model::number::parse_number;
use tablequery_model::types::{Item, Key, Projection};

use crate::catalog::{IndexDefinition, IndexKind, TableDefinition};
use crate::storage::{
    ItemSource, ItemStream, KeyAttribute, KeySchema, ScanDirection, ScanRequest, SortRange,
    StorageError,
};

/// Bytes of item data per read capacity unit.
const READ_UNIT_BYTES: u64 = 4096;

// ---------------------------------------------------------------------------
// Row keys
// ---------------------------------------------------------------------------

/// Order-preserving form of a key value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Ordinal {
    Bytes(Vec<u8>),
    Num(BigDecimal),
}

impl Ordinal {
    fn of(attr: &str, value: &AttributeValue) -> Result<Self, StorageError> {
        match value {
            AttributeValue::S(s) => Ok(Self::Bytes(s.as_bytes().to_vec())),
            AttributeValue::B(b) => Ok(Self::Bytes(b.to_vec())),
            AttributeValue::N(n) => parse_number(n).map(Self::Num).map_err(|e| {
                StorageError::InvalidKeyType {
                    attr: attr.to_owned(),
                    expected: "N".to_owned(),
                    actual: format!("malformed number ({e})"),
                }
            }),
            other => Err(StorageError::InvalidKeyType {
                attr: attr.to_owned(),
                expected: "S, N, or B".to_owned(),
                actual: other.type_descriptor().to_owned(),
            }),
        }
    }
}

/// Position among rows sharing a sort value. `Low` and `High` only appear in
/// range bounds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Low,
    At(Vec<Ordinal>),
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RowKey {
    sort: Option<Ordinal>,
    slot: Slot,
}

impl RowKey {
    fn bound(sort: Ordinal, slot: Slot) -> Self {
        Self {
            sort: Some(sort),
            slot,
        }
    }
}

type Rows = BTreeMap<RowKey, Arc<Item>>;

/// Smallest byte string greater than every string starting with `prefix`.
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut successor = prefix.to_vec();
    while successor.last() == Some(&0xFF) {
        successor.pop();
    }
    let last = successor.last_mut()?;
    *last += 1;
    Some(successor)
}

fn range_bounds(
    attr: &str,
    range: &SortRange,
) -> Result<(Bound<RowKey>, Bound<RowKey>), StorageError> {
    let ord = |value: &AttributeValue| Ordinal::of(attr, value);
    let bounds = match range {
        SortRange::Eq(v) => (
            Bound::Included(RowKey::bound(ord(v)?, Slot::Low)),
            Bound::Included(RowKey::bound(ord(v)?, Slot::High)),
        ),
        SortRange::Lt(v) => (
            Bound::Unbounded,
            Bound::Excluded(RowKey::bound(ord(v)?, Slot::Low)),
        ),
        SortRange::Le(v) => (
            Bound::Unbounded,
            Bound::Included(RowKey::bound(ord(v)?, Slot::High)),
        ),
        SortRange::Gt(v) => (
            Bound::Excluded(RowKey::bound(ord(v)?, Slot::High)),
            Bound::Unbounded,
        ),
        SortRange::Ge(v) => (
            Bound::Included(RowKey::bound(ord(v)?, Slot::Low)),
            Bound::Unbounded,
        ),
        SortRange::Between(low, high) => (
            Bound::Included(RowKey::bound(ord(low)?, Slot::Low)),
            Bound::Included(RowKey::bound(ord(high)?, Slot::High)),
        ),
        SortRange::BeginsWith(prefix) => {
            let Ordinal::Bytes(bytes) = ord(prefix)? else {
                return Err(StorageError::InvalidKeyType {
                    attr: attr.to_owned(),
                    expected: "S or B".to_owned(),
                    actual: prefix.type_descriptor().to_owned(),
                });
            };
            let upper = prefix_successor(&bytes).map_or(Bound::Unbounded, |next| {
                Bound::Excluded(RowKey::bound(Ordinal::Bytes(next), Slot::Low))
            });
            (Bound::Included(RowKey::bound(Ordinal::Bytes(bytes), Slot::Low)), upper)
        }
    };
    Ok(bounds)
}

fn bound_key(bound: &Bound<RowKey>) -> Option<&RowKey> {
    match bound {
        Bound::Included(key) | Bound::Excluded(key) => Some(key),
        Bound::Unbounded => None,
    }
}

/// The stricter of two lower bounds.
fn tighter_lower(a: Bound<RowKey>, b: Bound<RowKey>) -> Bound<RowKey> {
    let keep_a = match (bound_key(&a), bound_key(&b)) {
        (None, _) => false,
        (_, None) => true,
        (Some(x), Some(y)) => match x.cmp(y) {
            Ordering::Less => false,
            Ordering::Greater => true,
            Ordering::Equal => matches!(a, Bound::Excluded(_)),
        },
    };
    if keep_a { a } else { b }
}

/// The stricter of two upper bounds.
fn tighter_upper(a: Bound<RowKey>, b: Bound<RowKey>) -> Bound<RowKey> {
    let keep_a = match (bound_key(&a), bound_key(&b)) {
        (None, _) => false,
        (_, None) => true,
        (Some(x), Some(y)) => match x.cmp(y) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => matches!(a, Bound::Excluded(_)),
        },
    };
    if keep_a { a } else { b }
}

/// `BTreeMap::range` panics on inverted ranges, so check first.
fn is_empty_range(lower: &Bound<RowKey>, upper: &Bound<RowKey>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (
            Bound::Included(l) | Bound::Excluded(l),
            Bound::Included(u) | Bound::Excluded(u),
        ) => l >= u,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Lazy walk over one partition snapshot, re-seeking past the last row it
/// returned.
#[derive(Debug)]
struct PartitionCursor {
    rows: Arc<Rows>,
    lower: Bound<RowKey>,
    upper: Bound<RowKey>,
    direction: ScanDirection,
}

impl Iterator for PartitionCursor {
    type Item = Result<Item, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if is_empty_range(&self.lower, &self.upper) {
            return None;
        }
        let mut range = self.rows.range((self.lower.clone(), self.upper.clone()));
        let (key, item) = match self.direction {
            ScanDirection::Forward => range.next(),
            ScanDirection::Backward => range.next_back(),
        }?;
        let (key, item) = (key.clone(), Item::clone(item));
        match self.direction {
            ScanDirection::Forward => self.lower = Bound::Excluded(key),
            ScanDirection::Backward => self.upper = Bound::Excluded(key),
        }
        Some(Ok(item))
    }
}

// ---------------------------------------------------------------------------
// MemoryIndex
// ---------------------------------------------------------------------------

/// One ordered copy of a table's items: the table itself or a secondary index.
#[derive(Debug)]
pub struct MemoryIndex {
    keys: KeySchema,
    tiebreak: Vec<KeyAttribute>,
    sparse: bool,
    partitions: DashMap<AttributeValue, Arc<Rows>>,
}

impl MemoryIndex {
    fn primary(keys: KeySchema) -> Self {
        Self {
            keys,
            tiebreak: Vec::new(),
            sparse: false,
            partitions: DashMap::new(),
        }
    }

    fn secondary(keys: KeySchema, table_keys: &KeySchema) -> Self {
        Self {
            keys,
            tiebreak: table_keys.attributes().cloned().collect(),
            sparse: true,
            partitions: DashMap::new(),
        }
    }

    /// Partition value and row key of `item`, or `None` when a sparse index
    /// does not hold it.
    fn locate(&self, item: &Item) -> Result<Option<(AttributeValue, RowKey)>, StorageError> {
        if self.sparse && self.keys.attributes().any(|attr| !item.contains_key(&attr.name)) {
            return Ok(None);
        }
        let partition = self.keys.partition_key.extract(item)?.clone();
        let sort = self
            .keys
            .sort_key
            .as_ref()
            .map(|attr| Ordinal::of(&attr.name, attr.extract(item)?))
            .transpose()?;
        let tie = self
            .tiebreak
            .iter()
            .map(|attr| Ordinal::of(&attr.name, attr.extract(item)?))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some((
            partition,
            RowKey {
                sort,
                slot: Slot::At(tie),
            },
        )))
    }

    fn insert(&self, item: Arc<Item>) -> Result<Option<Arc<Item>>, StorageError> {
        let Some((partition, row)) = self.locate(&item)? else {
            return Ok(None);
        };
        let mut rows = self.partitions.entry(partition).or_default();
        Ok(Arc::make_mut(&mut *rows).insert(row, item))
    }

    fn remove(&self, item: &Item) -> Result<Option<Arc<Item>>, StorageError> {
        let Some((partition, row)) = self.locate(item)? else {
            return Ok(None);
        };
        let removed = match self.partitions.get_mut(&partition) {
            Some(mut rows) => Arc::make_mut(&mut *rows).remove(&row),
            None => None,
        };
        self.partitions.remove_if(&partition, |_, rows| rows.is_empty());
        Ok(removed)
    }

    fn get(&self, key: &Key) -> Result<Option<Arc<Item>>, StorageError> {
        let Some((partition, row)) = self.locate(key)? else {
            return Ok(None);
        };
        Ok(self
            .partitions
            .get(&partition)
            .and_then(|rows| rows.get(&row).cloned()))
    }

    fn after_key(&self, after: &Key) -> Result<RowKey, StorageError> {
        match self.locate(after)? {
            Some((_, row)) => Ok(row),
            None => Err(StorageError::MissingKeyAttribute {
                attr: self.keys.partition_key.name.clone(),
            }),
        }
    }

    /// Number of rows held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|rows| rows.len()).sum()
    }

    /// Returns `true` if no rows are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

impl ItemSource for MemoryIndex {
    fn scan<'a>(&'a self, request: ScanRequest<'a>) -> Result<ItemStream<'a>, StorageError> {
        let Some(rows) = self
            .partitions
            .get(request.partition)
            .map(|rows| Arc::clone(rows.value()))
        else {
            return Ok(Box::new(std::iter::empty()));
        };

        let (mut lower, mut upper) = match (request.range, &self.keys.sort_key) {
            (Some(range), Some(sort_key)) => range_bounds(&sort_key.name, range)?,
            _ => (Bound::Unbounded, Bound::Unbounded),
        };
        if let Some(after) = request.after {
            let after = Bound::Excluded(self.after_key(after)?);
            match request.direction {
                ScanDirection::Forward => lower = tighter_lower(lower, after),
                ScanDirection::Backward => upper = tighter_upper(upper, after),
            }
        }

        Ok(Box::new(PartitionCursor {
            rows,
            lower,
            upper,
            direction: request.direction,
        }))
    }

    #[allow(clippy::cast_precision_loss)]
    fn read_capacity(&self, bytes: u64, consistent_read: bool) -> Option<f64> {
        let units = bytes.div_ceil(READ_UNIT_BYTES).max(1) as f64;
        Some(if consistent_read { units } else { units / 2.0 })
    }
}

// ---------------------------------------------------------------------------
// MemoryTable
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct MemorySecondaryIndex {
    name: String,
    kind: IndexKind,
    projection: Projection,
    store: Arc<MemoryIndex>,
}

/// An in-memory table with its secondary indexes.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
///
/// use tablequery_core::memory::MemoryTable;
/// use tablequery_core::storage::KeySchema;
/// use tablequery_model::AttributeValue;
/// use tablequery_model::types::ScalarAttributeType;
///
/// let table = MemoryTable::new(KeySchema::hash("id", ScalarAttributeType::S));
/// let item = HashMap::from([("id".to_owned(), AttributeValue::S("a".into()))]);
/// assert!(table.put_item(item.clone()).unwrap().is_none());
/// assert_eq!(table.get_item(&item).unwrap(), Some(item));
/// ```
#[derive(Debug)]
pub struct MemoryTable {
    key_schema: KeySchema,
    base: Arc<MemoryIndex>,
    indexes: Vec<MemorySecondaryIndex>,
}

impl MemoryTable {
    /// Create an empty table keyed by `key_schema`.
    #[must_use]
    pub fn new(key_schema: KeySchema) -> Self {
        Self {
            base: Arc::new(MemoryIndex::primary(key_schema.clone())),
            key_schema,
            indexes: Vec::new(),
        }
    }

    /// Add a secondary index, filling it from the items already stored.
    #[must_use]
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        kind: IndexKind,
        key_schema: KeySchema,
        projection: Projection,
    ) -> Self {
        let name = name.into();
        let store = Arc::new(MemoryIndex::secondary(key_schema, &self.key_schema));
        for partition in &self.base.partitions {
            for item in partition.values() {
                if let Err(e) = store.insert(Arc::clone(item)) {
                    debug!(index = %name, error = %e, "item left out of index");
                }
            }
        }
        self.indexes.push(MemorySecondaryIndex {
            name,
            kind,
            projection,
            store,
        });
        self
    }

    /// Store `item`, replacing any item with the same key. Returns the
    /// replaced item.
    pub fn put_item(&self, item: Item) -> Result<Option<Item>, StorageError> {
        self.key_schema.extract_key(&item)?;
        for index in &self.indexes {
            index.store.locate(&item)?;
        }

        let item = Arc::new(item);
        let previous = self.base.insert(Arc::clone(&item))?;
        for index in &self.indexes {
            if let Some(old) = &previous {
                index.store.remove(old)?;
            }
            index.store.insert(Arc::clone(&item))?;
        }
        debug!(replaced = previous.is_some(), "put item");
        Ok(previous.map(|old| Item::clone(&old)))
    }

    /// Fetch the item stored under `key`.
    pub fn get_item(&self, key: &Key) -> Result<Option<Item>, StorageError> {
        Ok(self.base.get(key)?.map(|item| Item::clone(&item)))
    }

    /// Remove the item stored under `key`, returning it.
    pub fn delete_item(&self, key: &Key) -> Result<Option<Item>, StorageError> {
        let Some(removed) = self.base.remove(key)? else {
            return Ok(None);
        };
        for index in &self.indexes {
            index.store.remove(&removed)?;
        }
        debug!("deleted item");
        Ok(Some(Item::clone(&removed)))
    }

    /// Number of items in the table.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.base.len()
    }

    /// The primary key schema.
    #[must_use]
    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    /// A catalog entry named `name` whose sources read this table.
    #[must_use]
    pub fn definition(&self, name: impl Into<String>) -> TableDefinition {
        let indexes = self
            .indexes
            .iter()
            .map(|index| {
                IndexDefinition::builder()
                    .name(index.name.clone())
                    .kind(index.kind)
                    .key_schema(index.store.keys.clone())
                    .projection(index.projection.clone())
                    .source(Arc::clone(&index.store) as Arc<dyn ItemSource>)
                    .build()
            })
            .collect();
        TableDefinition::builder()
            .name(name)
            .key_schema(self.key_schema.clone())
            .source(Arc::clone(&self.base) as Arc<dyn ItemSource>)
            .indexes(indexes)
            .build()
    }
}
