//! The page scan loop.
//!
//! ```text
//! Scanning ──limit / size ceiling──▶ EmitPage ──peek──▶ page
//!     │                                  (+ LastEvaluatedKey when more items remain)
//!     └──stream ends──▶ Exhausted ──▶ page (no LastEvaluatedKey)
//! ```
//!
//! Every item pulled from the stream counts as scanned and adds its size to
//! the page budget, whether or not it passes the filter.

use std::iter::Peekable;

use typed_builder::TypedBuilder;

use tablequery_model::types::{Item, Key};

use crate::storage::{ItemStream, StorageError, item_size};

/// Why a page ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `Limit` items were scanned.
    Limit,
    /// Scanned bytes passed the page size ceiling.
    SizeCeiling,
    /// The requested range has no more items.
    Exhausted,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome {
    /// Items that passed the filter, already projected.
    pub items: Vec<Item>,
    /// Items read from storage.
    pub scanned: usize,
    /// Items that passed the filter.
    pub matched: usize,
    /// Size of every scanned item, summed.
    pub bytes: u64,
    /// Key of the last scanned item when more items remain.
    pub last_evaluated_key: Option<Key>,
    /// Why the page ended.
    pub stop: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    EmitPage(StopReason),
    Exhausted,
}

/// Drives a key-ordered stream until a page is complete.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Paginator {
    /// Maximum number of items to scan.
    #[builder(default)]
    limit: Option<usize>,
    /// A page ends once scanned bytes exceed this.
    page_size_limit: u64,
    /// Attributes copied from the last scanned item into the
    /// `LastEvaluatedKey`.
    key_attributes: Vec<String>,
}

impl Paginator {
    /// Scan `stream` into one page.
    ///
    /// `accept` sees every scanned item and returns the output item when it
    /// passes the filter. A storage error ends the call without a page.
    pub fn run<F>(&self, stream: ItemStream<'_>, mut accept: F) -> Result<PageOutcome, StorageError>
    where
        F: FnMut(&Item) -> Option<Item>,
    {
        let mut stream: Peekable<ItemStream<'_>> = stream.peekable();
        let mut items = Vec::new();
        let mut scanned = 0_usize;
        let mut bytes = 0_u64;
        let mut last_key: Option<Key> = None;
        let mut state = ScanState::Scanning;

        let stop = loop {
            state = match state {
                ScanState::Scanning => match stream.next() {
                    None => ScanState::Exhausted,
                    Some(Err(e)) => return Err(e),
                    Some(Ok(item)) => {
                        scanned += 1;
                        bytes += item_size(&item);
                        last_key = Some(self.key_of(&item));
                        if let Some(output) = accept(&item) {
                            items.push(output);
                        }

                        if self.limit.is_some_and(|limit| scanned >= limit) {
                            ScanState::EmitPage(StopReason::Limit)
                        } else if bytes > self.page_size_limit {
                            ScanState::EmitPage(StopReason::SizeCeiling)
                        } else {
                            ScanState::Scanning
                        }
                    }
                },
                // A pending error still means the range is not done.
                ScanState::EmitPage(reason) => match stream.peek() {
                    Some(_) => break reason,
                    None => ScanState::Exhausted,
                },
                ScanState::Exhausted => break StopReason::Exhausted,
            };
        };

        if stop == StopReason::Exhausted {
            last_key = None;
        }
        Ok(PageOutcome {
            matched: items.len(),
            items,
            scanned,
            bytes,
            last_evaluated_key: last_key,
            stop,
        })
    }

    fn key_of(&self, item: &Item) -> Key {
        self.key_attributes
            .iter()
            .filter_map(|name| item.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }
}
