//! In-memory table storage.
//!
//! Items live in a [`DashMap`] keyed by partition key, each partition a
//! [`BTreeMap`] ordered by sort key:
//!
//! ```text
//! DashMap<SortableAttributeValue, BTreeMap<SortableAttributeValue, Item>>
//! ```
//!
//! Tables without a sort key store one item per partition under
//! [`SortableAttributeValue::Sentinel`]. Secondary indexes are key schemas
//! over the same items; index reads order the matching items by the index
//! keys, then by the table keys.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;
use dynachain_model::types::ScalarAttributeType;
use dynachain_model::{AttributeValue, Item};
use thiserror::Error;
use tracing::debug;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A required key attribute was not found in the item.
    #[error("One of the required keys was not given a value: {attr}")]
    MissingKeyAttribute {
        /// The missing attribute.
        attr: String,
    },
    /// A key attribute has the wrong type.
    #[error("Type mismatch for key {attr}: expected {expected}, got {actual}")]
    InvalidKeyType {
        /// The attribute.
        attr: String,
        /// The schema type.
        expected: ScalarAttributeType,
        /// The supplied type descriptor.
        actual: &'static str,
    },
    /// A key carried attributes outside the key schema.
    #[error("The provided key element does not match the schema")]
    KeyMismatch,
    /// The index is not defined on the table.
    #[error("The table does not have the specified index: {index}")]
    UnknownIndex {
        /// The index name.
        index: String,
    },
}

// ---------------------------------------------------------------------------
// Key schema
// ---------------------------------------------------------------------------

/// One key attribute: its name and scalar type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    /// The attribute name.
    pub name: String,
    /// The scalar type (S, N, or B).
    pub attr_type: ScalarAttributeType,
}

/// Partition key plus optional sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition (HASH) key.
    pub partition_key: KeyAttribute,
    /// Sort (RANGE) key.
    pub sort_key: Option<KeyAttribute>,
}

impl KeySchema {
    /// A schema with only a partition key.
    #[must_use]
    pub fn new(partition_key: &str, attr_type: ScalarAttributeType) -> Self {
        Self {
            partition_key: KeyAttribute {
                name: partition_key.to_owned(),
                attr_type,
            },
            sort_key: None,
        }
    }

    /// Add a sort key.
    #[must_use]
    pub fn with_sort_key(mut self, sort_key: &str, attr_type: ScalarAttributeType) -> Self {
        self.sort_key = Some(KeyAttribute {
            name: sort_key.to_owned(),
            attr_type,
        });
        self
    }

    /// Key attributes in schema order.
    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.partition_key).chain(self.sort_key.as_ref())
    }

    /// Returns `true` if `name` is one of the key attributes.
    #[must_use]
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.attributes().any(|k| k.name == name)
    }

    /// Extract and type-check the primary key of `item`.
    pub fn primary_key(&self, item: &Item) -> Result<PrimaryKey, StorageError> {
        let partition = key_value(&self.partition_key, item)?;
        let sort = match &self.sort_key {
            Some(sk) => key_value(sk, item)?,
            None => SortableAttributeValue::Sentinel,
        };
        Ok(PrimaryKey { partition, sort })
    }

    /// Like [`KeySchema::primary_key`], but `key` must hold the key
    /// attributes and nothing else.
    pub fn exact_key(&self, key: &Item) -> Result<PrimaryKey, StorageError> {
        if key.len() != self.attributes().count() {
            return Err(StorageError::KeyMismatch);
        }
        self.primary_key(key)
    }

    /// Copy the key attributes of `item` into `target`.
    pub fn copy_key(&self, item: &Item, target: &mut Item) {
        for attr in self.attributes() {
            if let Some(value) = item.get(&attr.name) {
                target.insert(attr.name.clone(), value.clone());
            }
        }
    }
}

fn key_value(attr: &KeyAttribute, item: &Item) -> Result<SortableAttributeValue, StorageError> {
    let value = item
        .get(&attr.name)
        .ok_or_else(|| StorageError::MissingKeyAttribute {
            attr: attr.name.clone(),
        })?;
    SortableAttributeValue::typed(attr, value)
}

/// A primary key; `sort` is [`SortableAttributeValue::Sentinel`] for tables
/// without a sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimaryKey {
    /// Partition key value.
    pub partition: SortableAttributeValue,
    /// Sort key value.
    pub sort: SortableAttributeValue,
}

// ---------------------------------------------------------------------------
// SortableAttributeValue
// ---------------------------------------------------------------------------

/// A key-eligible value with DynamoDB ordering: strings by UTF-8 bytes,
/// numbers numerically, binary by unsigned bytes.
#[derive(Debug, Clone)]
pub enum SortableAttributeValue {
    /// String key.
    S(String),
    /// Number key, in its original string form.
    N(String),
    /// Binary key.
    B(bytes::Bytes),
    /// Placeholder sort key for tables without one.
    Sentinel,
}

impl SortableAttributeValue {
    /// Convert a value checked against the key attribute's type.
    pub fn typed(attr: &KeyAttribute, value: &AttributeValue) -> Result<Self, StorageError> {
        match (attr.attr_type, value) {
            (ScalarAttributeType::S, AttributeValue::S(s)) => Ok(Self::S(s.clone())),
            (ScalarAttributeType::N, AttributeValue::N(n)) => Ok(Self::N(n.clone())),
            (ScalarAttributeType::B, AttributeValue::B(b)) => Ok(Self::B(b.clone())),
            (expected, other) => Err(StorageError::InvalidKeyType {
                attr: attr.name.clone(),
                expected,
                actual: other.type_descriptor(),
            }),
        }
    }

    #[allow(clippy::float_cmp)]
    fn number(n: &str) -> f64 {
        let v = n.trim().parse::<f64>().unwrap_or(f64::NAN);
        // -0 and 0 must hash alike.
        if v == 0.0 { 0.0 } else { v }
    }
}

impl PartialEq for SortableAttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortableAttributeValue {}

impl PartialOrd for SortableAttributeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortableAttributeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::S(a), Self::S(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::N(a), Self::N(b)) => Self::number(a).total_cmp(&Self::number(b)),
            (Self::B(a), Self::B(b)) => a.as_ref().cmp(b.as_ref()),
            (Self::Sentinel, Self::Sentinel) => Ordering::Equal,
            (Self::S(_), _) => Ordering::Less,
            (_, Self::S(_)) => Ordering::Greater,
            (Self::N(_), _) => Ordering::Less,
            (_, Self::N(_)) => Ordering::Greater,
            (Self::B(_), _) => Ordering::Less,
            (_, Self::B(_)) => Ordering::Greater,
        }
    }
}

impl Hash for SortableAttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::S(s) => s.hash(state),
            Self::N(n) => Self::number(n).to_bits().hash(state),
            Self::B(b) => b.hash(state),
            Self::Sentinel => {}
        }
    }
}

// ---------------------------------------------------------------------------
// SortKeyCondition
// ---------------------------------------------------------------------------

/// Sort-key condition of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyCondition {
    /// `sk = v`.
    Eq(SortableAttributeValue),
    /// `sk < v`.
    Lt(SortableAttributeValue),
    /// `sk <= v`.
    Le(SortableAttributeValue),
    /// `sk > v`.
    Gt(SortableAttributeValue),
    /// `sk >= v`.
    Ge(SortableAttributeValue),
    /// `sk BETWEEN low AND high`, inclusive.
    Between(SortableAttributeValue, SortableAttributeValue),
    /// `begins_with(sk, prefix)` on string or binary keys.
    BeginsWith(SortableAttributeValue),
}

impl SortKeyCondition {
    /// Returns `true` if `key` satisfies the condition.
    #[must_use]
    pub fn matches(&self, key: &SortableAttributeValue) -> bool {
        match self {
            Self::Eq(v) => key == v,
            Self::Lt(v) => key < v,
            Self::Le(v) => key <= v,
            Self::Gt(v) => key > v,
            Self::Ge(v) => key >= v,
            Self::Between(low, high) => low <= key && key <= high,
            Self::BeginsWith(prefix) => match (key, prefix) {
                (SortableAttributeValue::S(s), SortableAttributeValue::S(p)) => {
                    s.starts_with(p.as_str())
                }
                (SortableAttributeValue::B(b), SortableAttributeValue::B(p)) => b.starts_with(p),
                _ => false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// One page-sized read over a table or index.
#[derive(Debug, Clone, Copy)]
pub struct ReadRequest<'r> {
    /// Secondary index to read instead of the table.
    pub index: Option<&'r str>,
    /// Partition to query; `None` scans every partition.
    pub partition: Option<&'r AttributeValue>,
    /// Sort-key condition within the partition.
    pub sort: Option<&'r SortKeyCondition>,
    /// Ascending sort-key order.
    pub forward: bool,
    /// Maximum number of items to evaluate.
    pub limit: Option<usize>,
    /// Resume after this key (`ExclusiveStartKey`).
    pub start: Option<&'r Item>,
}

impl Default for ReadRequest<'_> {
    fn default() -> Self {
        Self {
            index: None,
            partition: None,
            sort: None,
            forward: true,
            limit: None,
            start: None,
        }
    }
}

/// Items evaluated by one read, before any filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResult {
    /// Evaluated items in read order.
    pub items: Vec<Item>,
    /// Key of the last evaluated item when the limit stopped the read;
    /// empty otherwise.
    pub last_evaluated_key: Item,
}

// ---------------------------------------------------------------------------
// TableStorage
// ---------------------------------------------------------------------------

/// Storage for one table.
#[derive(Debug)]
pub struct TableStorage {
    key_schema: KeySchema,
    indexes: DashMap<String, KeySchema>,
    data: DashMap<SortableAttributeValue, BTreeMap<SortableAttributeValue, Item>>,
}

impl TableStorage {
    /// An empty table.
    #[must_use]
    pub fn new(key_schema: KeySchema) -> Self {
        Self {
            key_schema,
            indexes: DashMap::new(),
            data: DashMap::new(),
        }
    }

    /// The table's key schema.
    #[must_use]
    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    /// Define a secondary index. Returns `false` if the name is taken.
    pub fn add_index(&self, name: &str, key_schema: KeySchema) -> bool {
        if self.indexes.contains_key(name) {
            return false;
        }
        self.indexes.insert(name.to_owned(), key_schema);
        true
    }

    /// The key schema of `index`, or of the table when `None`.
    pub fn schema_for(&self, index: Option<&str>) -> Result<KeySchema, StorageError> {
        match index {
            None => Ok(self.key_schema.clone()),
            Some(name) => self
                .indexes
                .get(name)
                .map(|schema| schema.value().clone())
                .ok_or_else(|| StorageError::UnknownIndex {
                    index: name.to_owned(),
                }),
        }
    }

    /// Number of stored items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.data.iter().map(|p| p.value().len()).sum()
    }

    /// Fetch one item.
    #[must_use]
    pub fn get_item(&self, key: &PrimaryKey) -> Option<Item> {
        self.data
            .get(&key.partition)
            .and_then(|partition| partition.get(&key.sort).cloned())
    }

    /// Insert or replace an item once `check` accepts the current one.
    ///
    /// The partition stays locked between the check and the write. Returns
    /// the replaced item.
    pub fn put_item_if<E>(
        &self,
        item: Item,
        check: impl FnOnce(Option<&Item>) -> Result<(), E>,
    ) -> Result<Option<Item>, E>
    where
        E: From<StorageError>,
    {
        let key = self.key_schema.primary_key(&item)?;
        let mut partition = self.data.entry(key.partition).or_default();
        check(partition.get(&key.sort))?;
        let old = partition.insert(key.sort, item);
        debug!(replaced = old.is_some(), "stored item");
        Ok(old)
    }

    /// Delete an item once `check` accepts the current one. Returns the
    /// deleted item.
    pub fn delete_item_if<E>(
        &self,
        key: &PrimaryKey,
        check: impl FnOnce(Option<&Item>) -> Result<(), E>,
    ) -> Result<Option<Item>, E> {
        let Some(mut partition) = self.data.get_mut(&key.partition) else {
            check(None)?;
            return Ok(None);
        };
        check(partition.get(&key.sort))?;
        let removed = partition.remove(&key.sort);
        let now_empty = partition.is_empty();
        drop(partition);
        if now_empty {
            self.data.remove_if(&key.partition, |_, p| p.is_empty());
        }
        debug!(deleted = removed.is_some(), "deleted item");
        Ok(removed)
    }

    /// Read up to `limit` items from one partition (query) or from every
    /// partition (scan), in key order, after `start`.
    pub fn read(&self, request: ReadRequest<'_>) -> Result<ReadResult, StorageError> {
        let schema = self.schema_for(request.index)?;
        let is_index = request.index.is_some();
        let partition = request
            .partition
            .map(|value| SortableAttributeValue::typed(&schema.partition_key, value))
            .transpose()?;
        let is_query = partition.is_some();
        let order = |item: &Item| self.position(&schema, is_index, is_query, item);

        let mut rows: Vec<(Vec<SortableAttributeValue>, Item)> = Vec::new();
        let mut consider = |item: &Item| {
            let Ok(key) = schema.primary_key(item) else {
                // sparse index: item lacks the index keys
                return;
            };
            if partition.as_ref().is_some_and(|p| *p != key.partition) {
                return;
            }
            if request.sort.is_some_and(|cond| !cond.matches(&key.sort)) {
                return;
            }
            if let Some(position) = order(item) {
                rows.push((position, item.clone()));
            }
        };
        match (&partition, is_index) {
            (Some(pk), false) => {
                if let Some(items) = self.data.get(pk) {
                    items.values().for_each(&mut consider);
                }
            }
            _ => {
                for entry in &self.data {
                    entry.value().values().for_each(&mut consider);
                }
            }
        }

        rows.sort_by(|a, b| a.0.cmp(&b.0));
        if !request.forward {
            rows.reverse();
        }

        if let Some(start) = request.start.filter(|s| !s.is_empty()) {
            let start_position = order(start).ok_or(StorageError::KeyMismatch)?;
            rows.retain(|(position, _)| match position.cmp(&start_position) {
                Ordering::Greater => request.forward,
                Ordering::Less => !request.forward,
                Ordering::Equal => false,
            });
        }

        let limit = request.limit.unwrap_or(usize::MAX);
        let limited = rows.len() >= limit;
        let items: Vec<Item> = rows.into_iter().take(limit).map(|(_, item)| item).collect();

        let mut last_evaluated_key = Item::new();
        if limited {
            if let Some(last) = items.last() {
                self.key_schema.copy_key(last, &mut last_evaluated_key);
                if is_index {
                    schema.copy_key(last, &mut last_evaluated_key);
                }
            }
        }
        Ok(ReadResult {
            items,
            last_evaluated_key,
        })
    }

    // Query: [sort]. Scan: [partition, sort]. Index reads append the table
    // keys so items sharing index keys keep a stable order.
    fn position(
        &self,
        schema: &KeySchema,
        is_index: bool,
        is_query: bool,
        item: &Item,
    ) -> Option<Vec<SortableAttributeValue>> {
        let key = schema.primary_key(item).ok()?;
        let mut position = Vec::with_capacity(4);
        if !is_query {
            position.push(key.partition);
        }
        position.push(key.sort);
        if is_index {
            let table_key = self.key_schema.primary_key(item).ok()?;
            position.push(table_key.partition);
            position.push(table_key.sort);
        }
        Some(position)
    }
}
