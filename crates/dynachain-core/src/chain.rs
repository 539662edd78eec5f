//! The fluent chain API.
//!
//! A [`Table`] binds a table name to a [`TableService`]; [`Table::chain`]
//! starts a [`Chain`] whose builder methods take and return it by value, so
//! calls interleave freely before a terminal call. Terminal calls borrow the
//! chain mutably: they compile a request document from the accumulated
//! state, dispatch it, and advance the pagination cursor the chain keeps
//! between pages.
//!
//! ```no_run
//! # async fn demo<S: dynachain_core::TableService>(table: dynachain_core::Table<S>)
//! # -> dynachain_core::Result<()> {
//! use dynachain_core::condition::{Attr, Key};
//!
//! let items = table
//!     .chain()
//!     .partition_key(Key::new("ForumName").eq("Amazon S3"))
//!     .sort_key(Key::new("Subject").gte("S3 Thread 2"))
//!     .filter(Attr::new("LastPostedBy").eq("User A"))
//!     .or()
//!     .filter(Attr::new("Views").eq(1))
//!     .limit(2)
//!     .desc()
//!     .query_all()
//!     .await?;
//! # let _ = items;
//! # Ok(())
//! # }
//! ```

use dynachain_model::types::{ReturnConsumedCapacity, Select};
use dynachain_model::{AttributeValue, DynamoDBOperation, Item};
use futures::Stream;

use crate::condition::Condition;
use crate::config::ChainConfig;
use crate::dispatch::{Dispatcher, TableService};
use crate::error::{ChainError, Result};
use crate::pagination::{Page, Paginator, ReadKind};
use crate::projection::Projection;
use crate::request::RequestDocument;
use crate::state::{ChainState, Combinator};

/// A named table reached through a table service.
#[derive(Debug, Clone)]
pub struct Table<S> {
    service: S,
    name: String,
    consistent_read: bool,
    return_consumed_capacity: ReturnConsumedCapacity,
}

impl<S: TableService> Table<S> {
    /// Bind `name` to `service` with eventually consistent reads and no
    /// consumed-capacity reporting.
    #[must_use]
    pub fn new(service: S, name: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
            consistent_read: false,
            return_consumed_capacity: ReturnConsumedCapacity::None,
        }
    }

    /// Bind the configured table name, if one is set, applying the
    /// configured chain defaults.
    #[must_use]
    pub fn from_config(service: S, config: &ChainConfig) -> Option<Self> {
        let name = config.table_name.clone()?;
        Some(Self::new(service, name).with_config(config))
    }

    /// Apply the chain defaults from `config`.
    #[must_use]
    pub fn with_config(mut self, config: &ChainConfig) -> Self {
        self.consistent_read = config.consistent_read;
        self.return_consumed_capacity = config.return_consumed_capacity;
        self
    }

    /// The table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying service.
    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Start a new chain with this table's defaults.
    #[must_use]
    pub fn chain(&self) -> Chain<'_, S> {
        Chain {
            table: self,
            state: self.fresh_state(),
        }
    }

    fn fresh_state(&self) -> ChainState {
        ChainState {
            consistent_read: self.consistent_read,
            return_consumed_capacity: self.return_consumed_capacity,
            ..ChainState::default()
        }
    }
}

/// A query in progress against one table.
#[derive(Debug)]
pub struct Chain<'t, S> {
    table: &'t Table<S>,
    state: ChainState,
}

// ---------------------------------------------------------------------------
// Builder methods
// ---------------------------------------------------------------------------

impl<S: TableService> Chain<'_, S> {
    /// AND `cond` onto the key condition.
    #[must_use]
    pub fn key_condition(mut self, cond: Condition) -> Self {
        self.state.add_key_condition(cond);
        self
    }

    /// AND a partition-key condition onto the key condition.
    #[must_use]
    pub fn partition_key(self, cond: Condition) -> Self {
        self.key_condition(cond)
    }

    /// AND a sort-key condition onto the key condition.
    #[must_use]
    pub fn sort_key(self, cond: Condition) -> Self {
        self.key_condition(cond)
    }

    /// Compose `cond` onto the filter with the pending combinator (AND
    /// unless [`or`](Self::or) was called just before).
    #[must_use]
    pub fn filter(mut self, cond: Condition) -> Self {
        self.state.add_filter(cond);
        self
    }

    /// Compose `cond` onto the filter with an explicit combinator.
    #[must_use]
    pub fn filter_with(mut self, combinator: Combinator, cond: Condition) -> Self {
        self.state.add_filter_with(combinator, cond);
        self
    }

    /// Compose `cond` onto the write condition with the pending combinator.
    #[must_use]
    pub fn condition(mut self, cond: Condition) -> Self {
        self.state.add_condition(cond);
        self
    }

    /// Compose `cond` onto the write condition with an explicit combinator.
    #[must_use]
    pub fn condition_with(mut self, combinator: Combinator, cond: Condition) -> Self {
        self.state.add_condition_with(combinator, cond);
        self
    }

    /// Use OR for the next `filter`/`condition` only.
    #[must_use]
    pub fn or(mut self) -> Self {
        self.state.set_or();
        self
    }

    /// Use AND for the next `filter`/`condition` (the default).
    #[must_use]
    pub fn and(mut self) -> Self {
        self.state.set_and();
        self
    }

    /// Append attribute names to project: a single name, a comma-separated
    /// string, or a list.
    #[must_use]
    pub fn projection(mut self, names: impl Into<Projection>) -> Self {
        self.state
            .projection
            .extend(names.into().into_entries());
        self
    }

    /// Append attribute names from a dynamic value, which must be a string
    /// or an array of strings.
    pub fn projection_value(self, value: &serde_json::Value) -> Result<Self> {
        let projection = Projection::from_value(value)?;
        Ok(self.projection(projection))
    }

    /// Evaluate at most `n` items per page.
    #[must_use]
    pub fn limit(mut self, n: u32) -> Self {
        self.state.limit = Some(n);
        self
    }

    /// Ascending sort-key order (the default).
    #[must_use]
    pub fn asc(mut self) -> Self {
        self.state.ascending = true;
        self
    }

    /// Descending sort-key order.
    #[must_use]
    pub fn desc(mut self) -> Self {
        self.state.ascending = false;
        self
    }

    /// Request strongly consistent reads.
    #[must_use]
    pub fn consistent_read(mut self, flag: bool) -> Self {
        self.state.consistent_read = flag;
        self
    }

    /// Request consumed-capacity reporting.
    #[must_use]
    pub fn return_consumed_capacity(mut self, mode: ReturnConsumedCapacity) -> Self {
        self.state.return_consumed_capacity = mode;
        self
    }

    /// Read from a secondary index.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.state.index_name = Some(name.into());
        self
    }

    /// Set one primary-key attribute for get/put/delete.
    #[must_use]
    pub fn key(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.state.set_key(name, value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Terminal operations
// ---------------------------------------------------------------------------

impl<'t, S: TableService> Chain<'t, S> {
    fn dispatcher(&self) -> Dispatcher<'t, S> {
        Dispatcher::new(&self.table.service)
    }

    fn document(
        &self,
        operation: DynamoDBOperation,
        select: Option<Select>,
    ) -> Result<RequestDocument> {
        self.state.document(&self.table.name, operation, select)
    }

    fn read_kind(&self) -> ReadKind {
        if self.state.has_key_condition() {
            ReadKind::Query
        } else {
            ReadKind::Scan
        }
    }

    fn paginator(&mut self, kind: ReadKind, select: Option<Select>) -> Result<Paginator<'_, S>> {
        let document = self.document(kind.operation(), select)?;
        Ok(Paginator::new(
            self.dispatcher(),
            kind,
            document,
            &mut self.state.cursor,
        ))
    }

    async fn read_page(&mut self, kind: ReadKind) -> Result<Vec<Item>> {
        Ok(self.paginator(kind, None)?.next_page().await?.items)
    }

    /// The item for the accumulated key, or `NotFound`.
    pub async fn get(&mut self) -> Result<Item> {
        self.get_optional()
            .await?
            .ok_or_else(|| ChainError::NotFound {
                table: self.table.name.clone(),
            })
    }

    /// The item for the accumulated key, if present.
    pub async fn get_optional(&mut self) -> Result<Option<Item>> {
        let mut doc = self.document(DynamoDBOperation::GetItem, None)?;
        self.dispatcher().get_item(&mut doc).await
    }

    /// Write `item` merged with the accumulated key, honouring the write
    /// condition. Key attributes win over same-named item attributes.
    pub async fn put(&mut self, item: Item) -> Result<()> {
        let mut doc = self.document(DynamoDBOperation::PutItem, None)?;
        let key = std::mem::take(&mut doc.item);
        doc.item = item;
        doc.item.extend(key);
        self.dispatcher().put_item(&mut doc).await
    }

    /// Delete the item for the accumulated key, honouring the write condition.
    pub async fn delete(&mut self) -> Result<()> {
        let mut doc = self.document(DynamoDBOperation::DeleteItem, None)?;
        self.dispatcher().delete_item(&mut doc).await
    }

    /// One `Scan` page.
    pub async fn scan(&mut self) -> Result<Vec<Item>> {
        self.read_page(ReadKind::Scan).await
    }

    /// One `Query` page.
    pub async fn query(&mut self) -> Result<Vec<Item>> {
        self.read_page(ReadKind::Query).await
    }

    /// Every remaining `Scan` page, concatenated.
    pub async fn scan_all(&mut self) -> Result<Vec<Item>> {
        self.paginator(ReadKind::Scan, None)?.collect_all().await
    }

    /// Every remaining `Query` page, concatenated.
    pub async fn query_all(&mut self) -> Result<Vec<Item>> {
        self.paginator(ReadKind::Query, None)?.collect_all().await
    }

    /// One page with `Select=COUNT`: `Query` when a key condition is set,
    /// `Scan` otherwise.
    pub async fn count(&mut self) -> Result<usize> {
        let kind = self.read_kind();
        Ok(self
            .paginator(kind, Some(Select::Count))?
            .next_page()
            .await?
            .count)
    }

    /// Every remaining page with `Select=COUNT`, summed.
    pub async fn count_all(&mut self) -> Result<usize> {
        let kind = self.read_kind();
        self.paginator(kind, Some(Select::Count))?.count_all().await
    }

    /// One page of items: `Query` when a key condition is set, `Scan`
    /// otherwise.
    pub async fn run(&mut self) -> Result<Vec<Item>> {
        let kind = self.read_kind();
        self.read_page(kind).await
    }

    /// Every remaining page of [`run`](Self::run), concatenated.
    pub async fn run_all(&mut self) -> Result<Vec<Item>> {
        let kind = self.read_kind();
        self.paginator(kind, None)?.collect_all().await
    }

    /// The remaining pages of [`run`](Self::run) as a stream. Fails up
    /// front if the chain cannot be sent as that read.
    pub fn pages(&mut self) -> Result<impl Stream<Item = Result<Page>> + '_> {
        let kind = self.read_kind();
        Ok(self.paginator(kind, None)?.into_stream())
    }

    /// Returns `true` if the last page carried a continuation cursor.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.state.cursor().has_more()
    }

    /// Reset all accumulated state, the combinator and cursor included.
    pub fn clear(&mut self) {
        self.state = self.table.fresh_state();
    }

    /// [`clear`](Self::clear) inside a fluent chain.
    #[must_use]
    pub fn cleared(mut self) -> Self {
        self.clear();
        self
    }

    /// The compiled request document for `operation`, without dispatching.
    pub fn compile(&self, operation: DynamoDBOperation) -> Result<RequestDocument> {
        let mut doc = self.document(operation, None)?;
        doc.compile()?;
        Ok(doc)
    }

    /// The accumulated state.
    #[must_use]
    pub fn state(&self) -> &ChainState {
        &self.state
    }
}
