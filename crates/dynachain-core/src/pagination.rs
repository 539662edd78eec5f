//! Pagination driver for `Query` and `Scan`.
//!
//! A [`Cursor`] is either [`Cursor::Exhausted`] or [`Cursor::HasMore`] with
//! the `LastEvaluatedKey` of the previous page. Every page updates it: a
//! reply with a non-empty `LastEvaluatedKey` moves it to `HasMore`, any other
//! reply to `Exhausted`. The `_all` loops fetch at least once and stop at the
//! first page without a cursor; there is no page bound.

use dynachain_model::output::{QueryOutput, ScanOutput};
use dynachain_model::types::ConsumedCapacity;
use dynachain_model::{DynamoDBOperation, Item};
use futures::Stream;
use tracing::debug;

use crate::dispatch::{Dispatcher, TableService};
use crate::error::Result;
use crate::request::RequestDocument;

/// Continuation state between pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cursor {
    /// No further page (also the initial state).
    #[default]
    Exhausted,
    /// The next page starts after this key.
    HasMore(Item),
}

impl Cursor {
    /// Derive the cursor from a reply's `LastEvaluatedKey`.
    #[must_use]
    pub fn from_last_evaluated_key(key: Item) -> Self {
        if key.is_empty() {
            Self::Exhausted
        } else {
            Self::HasMore(key)
        }
    }

    /// Returns `true` if another page is available.
    #[must_use]
    pub fn has_more(&self) -> bool {
        matches!(self, Self::HasMore(_))
    }

    /// Returns `true` if no further page is available.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        !self.has_more()
    }

    /// The `ExclusiveStartKey` for the next page.
    #[must_use]
    pub fn start_key(&self) -> Option<&Item> {
        match self {
            Self::HasMore(key) => Some(key),
            Self::Exhausted => None,
        }
    }
}

/// Which multi-item read a paginator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadKind {
    /// `Query`.
    Query,
    /// `Scan`.
    Scan,
}

impl ReadKind {
    /// The matching operation.
    #[must_use]
    pub fn operation(self) -> DynamoDBOperation {
        match self {
            Self::Query => DynamoDBOperation::Query,
            Self::Scan => DynamoDBOperation::Scan,
        }
    }
}

/// One page of a `Query` or `Scan`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items on this page; empty for `Select=COUNT`.
    pub items: Vec<Item>,
    /// `Count`: items on this page after the filter.
    pub count: usize,
    /// `ScannedCount`: items evaluated before the filter.
    pub scanned_count: usize,
    /// `LastEvaluatedKey`; empty on the final page.
    pub last_evaluated_key: Item,
    /// Capacity consumed by this page, when requested.
    pub consumed_capacity: Option<ConsumedCapacity>,
}

fn to_count(n: i32) -> usize {
    usize::try_from(n).unwrap_or(0)
}

impl From<QueryOutput> for Page {
    fn from(out: QueryOutput) -> Self {
        Self {
            items: out.items,
            count: to_count(out.count),
            scanned_count: to_count(out.scanned_count),
            last_evaluated_key: out.last_evaluated_key,
            consumed_capacity: out.consumed_capacity,
        }
    }
}

impl From<ScanOutput> for Page {
    fn from(out: ScanOutput) -> Self {
        Self {
            items: out.items,
            count: to_count(out.count),
            scanned_count: to_count(out.scanned_count),
            last_evaluated_key: out.last_evaluated_key,
            consumed_capacity: out.consumed_capacity,
        }
    }
}

/// Drives repeated reads of one compiled document, advancing a cursor.
#[derive(Debug)]
pub struct Paginator<'a, S: ?Sized> {
    dispatcher: Dispatcher<'a, S>,
    kind: ReadKind,
    document: RequestDocument,
    cursor: &'a mut Cursor,
    fetched: usize,
}

impl<'a, S: TableService + ?Sized> Paginator<'a, S> {
    /// Page through `document`, resuming from `cursor`.
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher<'a, S>,
        kind: ReadKind,
        document: RequestDocument,
        cursor: &'a mut Cursor,
    ) -> Self {
        Self {
            dispatcher,
            kind,
            document,
            cursor,
            fetched: 0,
        }
    }

    /// Fetch the next page and advance the cursor.
    pub async fn next_page(&mut self) -> Result<Page> {
        self.document.exclusive_start_key = self.cursor.start_key().cloned().unwrap_or_default();
        let page = self
            .dispatcher
            .read_page(&mut self.document, self.kind)
            .await?;
        self.fetched += 1;
        *self.cursor = Cursor::from_last_evaluated_key(page.last_evaluated_key.clone());
        debug!(
            operation = %self.kind.operation(),
            page = self.fetched,
            count = page.count,
            has_more = self.cursor.has_more(),
            "fetched page"
        );
        Ok(page)
    }

    /// Fetch every remaining page and concatenate the items.
    pub async fn collect_all(mut self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        loop {
            let page = self.next_page().await?;
            items.extend(page.items);
            if self.cursor.is_exhausted() {
                break;
            }
        }
        Ok(items)
    }

    /// Fetch every remaining page and sum `Count`.
    pub async fn count_all(mut self) -> Result<usize> {
        let mut total = 0;
        loop {
            total += self.next_page().await?.count;
            if self.cursor.is_exhausted() {
                break;
            }
        }
        Ok(total)
    }

    /// The remaining pages as a stream. The first page is always fetched;
    /// the stream ends after the first page without a cursor or on error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page>> + 'a {
        futures::stream::try_unfold((self, false), |(mut paginator, done)| async move {
            if done {
                return Ok(None);
            }
            let page = paginator.next_page().await?;
            let done = paginator.cursor.is_exhausted();
            Ok(Some((page, (paginator, done))))
        })
    }
}
