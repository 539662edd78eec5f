//! Per-chain accumulated state.

use dynachain_model::types::{ReturnConsumedCapacity, Select};
use dynachain_model::{AttributeValue, DynamoDBOperation, Item};

use crate::condition::{Condition, LogicalOp};
use crate::error::{ChainError, Result};
use crate::pagination::Cursor;
use crate::request::{ExpressionField, ProjectionField, RequestDocument};

/// How the next `filter`/`condition` call composes onto the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Combinator {
    /// `existing AND new`.
    #[default]
    And,
    /// `existing OR new`.
    Or,
}

impl From<Combinator> for LogicalOp {
    fn from(c: Combinator) -> Self {
        match c {
            Combinator::And => Self::And,
            Combinator::Or => Self::Or,
        }
    }
}

/// Everything a chain has accumulated before its terminal call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    pub(crate) key_condition: Option<Condition>,
    pub(crate) filter: Option<Condition>,
    pub(crate) condition: Option<Condition>,
    pub(crate) projection: Vec<String>,
    pub(crate) pending: Combinator,
    pub(crate) limit: Option<u32>,
    pub(crate) ascending: bool,
    pub(crate) consistent_read: bool,
    pub(crate) return_consumed_capacity: ReturnConsumedCapacity,
    pub(crate) index_name: Option<String>,
    pub(crate) key: Item,
    pub(crate) cursor: Cursor,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            key_condition: None,
            filter: None,
            condition: None,
            projection: Vec::new(),
            pending: Combinator::And,
            limit: None,
            ascending: true,
            consistent_read: false,
            return_consumed_capacity: ReturnConsumedCapacity::None,
            index_name: None,
            key: Item::new(),
            cursor: Cursor::Exhausted,
        }
    }
}

fn compose(slot: &mut Option<Condition>, op: LogicalOp, cond: Condition) {
    *slot = Some(match slot.take() {
        Some(existing) => existing.combine(op, cond),
        None => cond,
    });
}

impl ChainState {
    /// AND the condition onto the key condition.
    pub fn add_key_condition(&mut self, cond: Condition) {
        compose(&mut self.key_condition, LogicalOp::And, cond);
    }

    /// Compose onto the filter, consuming the pending combinator.
    pub fn add_filter(&mut self, cond: Condition) {
        let op = self.take_combinator();
        compose(&mut self.filter, op.into(), cond);
    }

    /// Compose onto the filter with an explicit combinator. The pending
    /// combinator is left as it is.
    pub fn add_filter_with(&mut self, combinator: Combinator, cond: Condition) {
        compose(&mut self.filter, combinator.into(), cond);
    }

    /// Compose onto the write condition, consuming the pending combinator.
    pub fn add_condition(&mut self, cond: Condition) {
        let op = self.take_combinator();
        compose(&mut self.condition, op.into(), cond);
    }

    /// Compose onto the write condition with an explicit combinator.
    pub fn add_condition_with(&mut self, combinator: Combinator, cond: Condition) {
        compose(&mut self.condition, combinator.into(), cond);
    }

    /// Use OR for the next `filter`/`condition` composition only.
    pub fn set_or(&mut self) {
        self.pending = Combinator::Or;
    }

    /// Use AND for the next composition (the default).
    pub fn set_and(&mut self) {
        self.pending = Combinator::And;
    }

    fn take_combinator(&mut self) -> Combinator {
        std::mem::take(&mut self.pending)
    }

    /// The combinator the next `filter`/`condition` call will use.
    #[must_use]
    pub fn pending_combinator(&self) -> Combinator {
        self.pending
    }

    /// Merge `name = value` into the primary key; a later value for the same
    /// name overwrites the earlier one.
    pub fn set_key(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.key.insert(name.into(), value);
    }

    /// Returns `true` if a key condition has been set.
    #[must_use]
    pub fn has_key_condition(&self) -> bool {
        self.key_condition.is_some()
    }

    /// The pagination cursor.
    #[must_use]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Reset everything, the combinator and cursor included.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Build the request document for `operation`.
    ///
    /// Conditions the operation cannot carry are rejected rather than
    /// dropped, so a constraint never silently widens a read or a write. A
    /// `Select=COUNT` read carries no projection.
    pub fn document(
        &self,
        table_name: &str,
        operation: DynamoDBOperation,
        select: Option<Select>,
    ) -> Result<RequestDocument> {
        self.check_accepted(operation)?;

        let mut doc = RequestDocument::new(table_name);
        doc.return_consumed_capacity =
            Some(self.return_consumed_capacity).filter(ReturnConsumedCapacity::should_report);
        let raw = |c: &Option<Condition>| c.clone().map(ExpressionField::Raw);
        let projection = (!self.projection.is_empty() && select != Some(Select::Count))
            .then(|| ProjectionField::Raw(self.projection.clone()));

        match operation {
            DynamoDBOperation::GetItem => {
                doc.key = self.key.clone();
                doc.projection = projection;
                doc.consistent_read = Some(self.consistent_read);
            }
            DynamoDBOperation::PutItem => {
                doc.item = self.key.clone();
                doc.condition = raw(&self.condition);
            }
            DynamoDBOperation::DeleteItem => {
                doc.key = self.key.clone();
                doc.condition = raw(&self.condition);
            }
            DynamoDBOperation::Query | DynamoDBOperation::Scan => {
                if operation == DynamoDBOperation::Query {
                    doc.key_condition = raw(&self.key_condition);
                    doc.scan_index_forward = Some(self.ascending);
                }
                doc.index_name.clone_from(&self.index_name);
                doc.filter = raw(&self.filter);
                doc.projection = projection;
                doc.limit = self.limit;
                doc.select = select;
                doc.consistent_read = Some(self.consistent_read);
                if let Some(start) = self.cursor.start_key() {
                    doc.exclusive_start_key = start.clone();
                }
            }
        }
        Ok(doc)
    }

    fn check_accepted(&self, operation: DynamoDBOperation) -> Result<()> {
        let reject = |what: &str| -> Result<()> {
            Err(ChainError::invalid_request(format!(
                "{operation} does not accept a {what}"
            )))
        };
        let is_read = matches!(
            operation,
            DynamoDBOperation::Query | DynamoDBOperation::Scan
        );
        if self.key_condition.is_some() && operation != DynamoDBOperation::Query {
            return reject("key condition");
        }
        if self.filter.is_some() && !is_read {
            return reject("filter");
        }
        if self.condition.is_some()
            && !matches!(
                operation,
                DynamoDBOperation::PutItem | DynamoDBOperation::DeleteItem
            )
        {
            return reject("write condition");
        }
        if operation == DynamoDBOperation::Query && self.key_condition.is_none() {
            return Err(ChainError::invalid_key_condition(
                "Query requires a key condition",
            ));
        }
        match self.limit {
            Some(0) if is_read => Err(ChainError::invalid_request("limit must be greater than 0")),
            Some(n) if is_read && i32::try_from(n).is_err() => Err(ChainError::invalid_request(
                format!("limit {n} exceeds {}", i32::MAX),
            )),
            _ => Ok(()),
        }
    }
}
