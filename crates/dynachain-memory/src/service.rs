//! In-memory implementation of the table service.
//!
//! Requests arrive as compiled documents: every expression refers to
//! attributes through `#name`/`:value` placeholders. Each handler resolves
//! them, rejects placeholders nothing referenced, and evaluates the result
//! against [`TableStorage`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dynachain_core::TableService;
use dynachain_core::condition::{AttributePath, Condition};
use dynachain_model::input::{DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput};
use dynachain_model::output::{
    DeleteItemOutput, GetItemOutput, PutItemOutput, QueryOutput, ScanOutput,
};
use dynachain_model::types::{ConsumedCapacity, ReturnConsumedCapacity, Select};
use dynachain_model::{AttributeValue, DynamoDBError, Item};
use tracing::debug;

use crate::expression::{ExpressionError, Placeholders, matches, project};
use crate::key_condition;
use crate::storage::{KeySchema, ReadRequest, ReadResult, TableStorage};

/// Tables held in process memory.
#[derive(Debug, Default)]
pub struct MemoryTableService {
    tables: DashMap<String, Arc<TableStorage>>,
}

impl MemoryTableService {
    /// A service with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table.
    pub fn create_table(&self, name: &str, key_schema: KeySchema) -> Result<(), DynamoDBError> {
        if self.tables.contains_key(name) {
            return Err(DynamoDBError::resource_in_use(format!(
                "Table already exists: {name}"
            )));
        }
        self.tables
            .insert(name.to_owned(), Arc::new(TableStorage::new(key_schema)));
        debug!(table = name, "created table");
        Ok(())
    }

    /// Add a secondary index to an existing table.
    pub fn create_index(
        &self,
        table: &str,
        index: &str,
        key_schema: KeySchema,
    ) -> Result<(), DynamoDBError> {
        if !self.table(table)?.add_index(index, key_schema) {
            return Err(DynamoDBError::resource_in_use(format!(
                "Index already exists: {index}"
            )));
        }
        debug!(table, index, "created index");
        Ok(())
    }

    /// Drop a table and all of its items.
    pub fn delete_table(&self, name: &str) -> Result<(), DynamoDBError> {
        if self.tables.remove(name).is_none() {
            return Err(not_found(name));
        }
        debug!(table = name, "deleted table");
        Ok(())
    }

    /// Number of items stored in a table.
    pub fn item_count(&self, name: &str) -> Result<usize, DynamoDBError> {
        Ok(self.table(name)?.item_count())
    }

    fn table(&self, name: &str) -> Result<Arc<TableStorage>, DynamoDBError> {
        self.tables
            .get(name)
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| not_found(name))
    }

    // -----------------------------------------------------------------------
    // Item CRUD
    // -----------------------------------------------------------------------

    /// Fetch one item by its full primary key.
    pub fn handle_get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        let table = self.table(&input.table_name)?;
        let key = table.key_schema().exact_key(&input.key)?;

        let values = HashMap::new();
        let mut placeholders = Placeholders::new(&input.expression_attribute_names, &values);
        let projection = parse_projection(&mut placeholders, input.projection_expression.as_deref())?;
        placeholders.finish().map_err(invalid("ProjectionExpression"))?;

        let item = table.get_item(&key);
        let consistent = input.consistent_read.unwrap_or(false);
        let consumed_capacity = report(input.return_consumed_capacity, || {
            read_capacity(&input.table_name, item.iter().map(item_size).sum(), consistent)
        });
        debug!(
            table = %input.table_name,
            found = item.is_some(),
            "get item"
        );
        Ok(GetItemOutput {
            item: item.map(|item| match &projection {
                Some(paths) => project(&item, paths),
                None => item,
            }),
            consumed_capacity,
        })
    }

    /// Store an item, replacing any item with the same key once the
    /// condition holds.
    pub fn handle_put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        let table = self.table(&input.table_name)?;
        let condition = parse_write_condition(
            &input.expression_attribute_names,
            &input.expression_attribute_values,
            input.condition_expression.as_deref(),
        )?;

        let size = item_size(&input.item);
        table.put_item_if(input.item, |existing| check(condition.as_ref(), existing))?;
        debug!(
            table = %input.table_name,
            conditional = condition.is_some(),
            "put item"
        );
        Ok(PutItemOutput {
            consumed_capacity: report(input.return_consumed_capacity, || {
                write_capacity(&input.table_name, size)
            }),
        })
    }

    /// Delete an item by its full primary key once the condition holds.
    pub fn handle_delete_item(
        &self,
        input: DeleteItemInput,
    ) -> Result<DeleteItemOutput, DynamoDBError> {
        let table = self.table(&input.table_name)?;
        let key = table.key_schema().exact_key(&input.key)?;
        let condition = parse_write_condition(
            &input.expression_attribute_names,
            &input.expression_attribute_values,
            input.condition_expression.as_deref(),
        )?;

        let removed =
            table.delete_item_if(&key, |existing| check(condition.as_ref(), existing))?;
        debug!(
            table = %input.table_name,
            deleted = removed.is_some(),
            "delete item"
        );
        let size = removed.as_ref().map_or(0, item_size);
        Ok(DeleteItemOutput {
            consumed_capacity: report(input.return_consumed_capacity, || {
                write_capacity(&input.table_name, size)
            }),
        })
    }

    // -----------------------------------------------------------------------
    // Query & Scan
    // -----------------------------------------------------------------------

    /// Read one page of a partition, in sort-key order.
    pub fn handle_query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        let table = self.table(&input.table_name)?;
        let limit = validate_limit(input.limit)?;
        validate_select(input.select, input.projection_expression.as_deref())?;

        let key_expression = input.key_condition_expression.as_deref().ok_or_else(|| {
            DynamoDBError::validation("Either the KeyConditions or KeyConditionExpression parameter must be specified in the request.")
        })?;
        let mut placeholders = Placeholders::new(
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        );
        let key_condition = placeholders
            .condition(key_expression)
            .map_err(invalid("KeyConditionExpression"))?;
        let filter = parse_filter(&mut placeholders, input.filter_expression.as_deref())?;
        let projection = parse_projection(&mut placeholders, input.projection_expression.as_deref())?;
        placeholders
            .finish()
            .map_err(invalid("ExpressionAttributes"))?;

        let schema = table.schema_for(input.index_name.as_deref())?;
        let key = key_condition::extract(&key_condition, &schema)?;
        let read = table.read(ReadRequest {
            index: input.index_name.as_deref(),
            partition: Some(&key.partition),
            sort: key.sort.as_ref(),
            forward: input.scan_index_forward.unwrap_or(true),
            limit,
            start: Some(&input.exclusive_start_key),
        })?;

        let consistent = input.consistent_read.unwrap_or(false);
        let page = evaluate(read, filter.as_ref(), projection.as_deref(), input.select)?;
        debug!(
            table = %input.table_name,
            index = input.index_name.as_deref().unwrap_or("-"),
            count = page.count,
            scanned = page.scanned_count,
            more = !page.last_evaluated_key.is_empty(),
            "query"
        );
        Ok(QueryOutput {
            consumed_capacity: report(input.return_consumed_capacity, || {
                read_capacity(&input.table_name, page.scanned_size, consistent)
            }),
            items: page.items,
            count: page.count,
            scanned_count: page.scanned_count,
            last_evaluated_key: page.last_evaluated_key,
        })
    }

    /// Read one page of the whole table, partition by partition.
    pub fn handle_scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        let table = self.table(&input.table_name)?;
        let limit = validate_limit(input.limit)?;
        validate_select(input.select, input.projection_expression.as_deref())?;

        let mut placeholders = Placeholders::new(
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        );
        let filter = parse_filter(&mut placeholders, input.filter_expression.as_deref())?;
        let projection = parse_projection(&mut placeholders, input.projection_expression.as_deref())?;
        placeholders
            .finish()
            .map_err(invalid("ExpressionAttributes"))?;

        let read = table.read(ReadRequest {
            index: input.index_name.as_deref(),
            limit,
            start: Some(&input.exclusive_start_key),
            ..ReadRequest::default()
        })?;

        let consistent = input.consistent_read.unwrap_or(false);
        let page = evaluate(read, filter.as_ref(), projection.as_deref(), input.select)?;
        debug!(
            table = %input.table_name,
            index = input.index_name.as_deref().unwrap_or("-"),
            count = page.count,
            scanned = page.scanned_count,
            more = !page.last_evaluated_key.is_empty(),
            "scan"
        );
        Ok(ScanOutput {
            consumed_capacity: report(input.return_consumed_capacity, || {
                read_capacity(&input.table_name, page.scanned_size, consistent)
            }),
            items: page.items,
            count: page.count,
            scanned_count: page.scanned_count,
            last_evaluated_key: page.last_evaluated_key,
        })
    }
}

#[async_trait]
impl TableService for MemoryTableService {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        self.handle_get_item(input)
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        self.handle_put_item(input)
    }

    async fn delete_item(
        &self,
        input: DeleteItemInput,
    ) -> Result<DeleteItemOutput, DynamoDBError> {
        self.handle_delete_item(input)
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        self.handle_query(input)
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        self.handle_scan(input)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct EvaluatedPage {
    items: Vec<Item>,
    count: i32,
    scanned_count: i32,
    scanned_size: usize,
    last_evaluated_key: Item,
}

// Limit bounds the items read, not the items returned: the filter runs on
// the page afterwards.
fn evaluate(
    read: ReadResult,
    filter: Option<&Condition>,
    projection: Option<&[AttributePath]>,
    select: Option<Select>,
) -> Result<EvaluatedPage, DynamoDBError> {
    let scanned_count = read.items.len();
    let scanned_size = read.items.iter().map(item_size).sum();
    let mut items = Vec::with_capacity(scanned_count);
    for item in read.items {
        let keep = match filter {
            Some(condition) => matches(condition, &item).map_err(invalid("FilterExpression"))?,
            None => true,
        };
        if keep {
            items.push(match projection {
                Some(paths) => project(&item, paths),
                None => item,
            });
        }
    }
    let count = items.len();
    if select == Some(Select::Count) {
        items.clear();
    }
    Ok(EvaluatedPage {
        items,
        count: to_i32(count),
        scanned_count: to_i32(scanned_count),
        scanned_size,
        last_evaluated_key: read.last_evaluated_key,
    })
}

fn check(condition: Option<&Condition>, existing: Option<&Item>) -> Result<(), DynamoDBError> {
    let Some(condition) = condition else {
        return Ok(());
    };
    let empty = Item::new();
    let current = existing.unwrap_or(&empty);
    if matches(condition, current).map_err(invalid("ConditionExpression"))? {
        Ok(())
    } else {
        Err(DynamoDBError::conditional_check_failed(
            "The conditional request failed",
        ))
    }
}

fn parse_write_condition(
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
    expression: Option<&str>,
) -> Result<Option<Condition>, DynamoDBError> {
    let mut placeholders = Placeholders::new(names, values);
    let condition = expression
        .map(|e| placeholders.condition(e))
        .transpose()
        .map_err(invalid("ConditionExpression"))?;
    placeholders
        .finish()
        .map_err(invalid("ExpressionAttributes"))?;
    Ok(condition)
}

fn parse_filter(
    placeholders: &mut Placeholders<'_>,
    expression: Option<&str>,
) -> Result<Option<Condition>, DynamoDBError> {
    expression
        .map(|e| placeholders.condition(e))
        .transpose()
        .map_err(invalid("FilterExpression"))
}

fn parse_projection(
    placeholders: &mut Placeholders<'_>,
    expression: Option<&str>,
) -> Result<Option<Vec<AttributePath>>, DynamoDBError> {
    expression
        .map(|e| placeholders.projection(e))
        .transpose()
        .map_err(invalid("ProjectionExpression"))
}

fn invalid(kind: &'static str) -> impl Fn(ExpressionError) -> DynamoDBError {
    move |e| DynamoDBError::validation(format!("Invalid {kind}: {e}"))
}

fn validate_limit(limit: Option<i32>) -> Result<Option<usize>, DynamoDBError> {
    match limit {
        None => Ok(None),
        Some(n) => usize::try_from(n)
            .ok()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or_else(|| DynamoDBError::validation("Limit must be greater than 0")),
    }
}

fn validate_select(select: Option<Select>, projection: Option<&str>) -> Result<(), DynamoDBError> {
    match (select, projection) {
        (Some(Select::Count | Select::AllAttributes), Some(_)) => Err(DynamoDBError::validation(
            "Cannot specify the ProjectionExpression when choosing to get ALL_ATTRIBUTES or COUNT",
        )),
        (Some(Select::SpecificAttributes), None) => Err(DynamoDBError::validation(
            "SPECIFIC_ATTRIBUTES requires a ProjectionExpression",
        )),
        _ => Ok(()),
    }
}

fn not_found(name: &str) -> DynamoDBError {
    DynamoDBError::resource_not_found(format!(
        "Requested resource not found: Table: {name} not found"
    ))
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Consumed capacity
// ---------------------------------------------------------------------------

const READ_UNIT_BYTES: usize = 4096;
const WRITE_UNIT_BYTES: usize = 1024;

fn report(
    mode: Option<ReturnConsumedCapacity>,
    compute: impl FnOnce() -> ConsumedCapacity,
) -> Option<ConsumedCapacity> {
    mode.filter(ReturnConsumedCapacity::should_report)
        .map(|_| compute())
}

#[allow(clippy::cast_precision_loss)]
fn read_capacity(table: &str, bytes: usize, consistent: bool) -> ConsumedCapacity {
    let units = bytes.div_ceil(READ_UNIT_BYTES).max(1) as f64;
    let units = if consistent { units } else { units / 2.0 };
    ConsumedCapacity {
        table_name: Some(table.to_owned()),
        capacity_units: Some(units),
        read_capacity_units: Some(units),
        write_capacity_units: None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn write_capacity(table: &str, bytes: usize) -> ConsumedCapacity {
    let units = bytes.div_ceil(WRITE_UNIT_BYTES).max(1) as f64;
    ConsumedCapacity {
        table_name: Some(table.to_owned()),
        capacity_units: Some(units),
        read_capacity_units: None,
        write_capacity_units: Some(units),
    }
}

fn item_size(item: &Item) -> usize {
    item.iter()
        .map(|(name, value)| name.len() + value_size(value))
        .sum()
}

fn value_size(value: &AttributeValue) -> usize {
    match value {
        AttributeValue::S(s) | AttributeValue::N(s) => s.len(),
        AttributeValue::B(b) => b.len(),
        AttributeValue::Ss(v) | AttributeValue::Ns(v) => v.iter().map(String::len).sum(),
        AttributeValue::Bs(v) => v.iter().map(|b| b.len()).sum(),
        AttributeValue::Bool(_) | AttributeValue::Null(_) => 1,
        AttributeValue::L(v) => 3 + v.iter().map(|e| 1 + value_size(e)).sum::<usize>(),
        AttributeValue::M(m) => 3 + m.iter().map(|(k, v)| 1 + k.len() + value_size(v)).sum::<usize>(),
    }
}
