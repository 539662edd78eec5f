//! The request document a chain assembles for one operation.
//!
//! Expression fields carry a [`Raw`](ExpressionField::Raw) condition until
//! [`RequestDocument::compile`] renders them; compiling an already compiled
//! document changes nothing, so a paginated read can re-dispatch the same
//! document with only its `ExclusiveStartKey` advanced.

use std::collections::HashMap;

use dynachain_model::input::{DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput};
use dynachain_model::types::{ReturnConsumedCapacity, Select};
use dynachain_model::{AttributeValue, Item};

use crate::compiler::PlaceholderTable;
use crate::condition::Condition;
use crate::error::{ChainError, Result};

/// A key, filter or write condition field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionField {
    /// Not yet rendered.
    Raw(Condition),
    /// Rendered expression string, placeholders only.
    Compiled(String),
}

impl ExpressionField {
    /// The rendered expression, if compiled.
    #[must_use]
    pub fn as_compiled(&self) -> Option<&str> {
        match self {
            Self::Compiled(expr) => Some(expr),
            Self::Raw(_) => None,
        }
    }
}

/// A projection field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionField {
    /// Attribute names as the caller supplied them.
    Raw(Vec<String>),
    /// Comma-joined name placeholders.
    Compiled(String),
}

impl ProjectionField {
    /// The rendered projection, if compiled.
    #[must_use]
    pub fn as_compiled(&self) -> Option<&str> {
        match self {
            Self::Compiled(expr) => Some(expr),
            Self::Raw(_) => None,
        }
    }
}

/// Request fields for one DynamoDB call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDocument {
    /// `TableName`.
    pub table_name: String,
    /// `IndexName`.
    pub index_name: Option<String>,
    /// `Key` for get/delete.
    pub key: Item,
    /// `Item` for put.
    pub item: Item,
    /// `KeyConditionExpression`.
    pub key_condition: Option<ExpressionField>,
    /// `FilterExpression`.
    pub filter: Option<ExpressionField>,
    /// `ConditionExpression`.
    pub condition: Option<ExpressionField>,
    /// `ProjectionExpression`.
    pub projection: Option<ProjectionField>,
    /// `ExpressionAttributeNames`.
    pub names: HashMap<String, String>,
    /// `ExpressionAttributeValues`.
    pub values: HashMap<String, AttributeValue>,
    /// `ConsistentRead`.
    pub consistent_read: Option<bool>,
    /// `Limit`.
    pub limit: Option<u32>,
    /// `ScanIndexForward`.
    pub scan_index_forward: Option<bool>,
    /// `Select`.
    pub select: Option<Select>,
    /// `ExclusiveStartKey`; empty when starting from the beginning.
    pub exclusive_start_key: Item,
    /// `ReturnConsumedCapacity`.
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

impl RequestDocument {
    /// Create an empty document for `table_name`.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if no field still holds a raw condition or name list.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        let raw_expr = |f: &Option<ExpressionField>| matches!(f, Some(ExpressionField::Raw(_)));
        !raw_expr(&self.key_condition)
            && !raw_expr(&self.filter)
            && !raw_expr(&self.condition)
            && !matches!(self.projection, Some(ProjectionField::Raw(_)))
    }

    /// Render every raw field into placeholders.
    ///
    /// Placeholders already on the document are reused. The key condition is
    /// validated first; on error the document is left untouched.
    pub fn compile(&mut self) -> Result<()> {
        if self.is_compiled() {
            return Ok(());
        }
        let mut table = PlaceholderTable::seeded(&self.names, &self.values);

        let key_condition = match &self.key_condition {
            Some(ExpressionField::Raw(cond)) => {
                Some(ExpressionField::Compiled(table.render_key_condition(cond)?))
            }
            other => other.clone(),
        };
        let mut render = |field: &Option<ExpressionField>| match field {
            Some(ExpressionField::Raw(cond)) => Some(ExpressionField::Compiled(table.render(cond))),
            other => other.clone(),
        };
        let filter = render(&self.filter);
        let condition = render(&self.condition);
        let projection = match &self.projection {
            Some(ProjectionField::Raw(names)) => {
                table.render_projection(names).map(ProjectionField::Compiled)
            }
            other => other.clone(),
        };

        let (names, values) = table.into_maps();
        self.key_condition = key_condition;
        self.filter = filter;
        self.condition = condition;
        self.projection = projection;
        self.names = names;
        self.values = values;
        Ok(())
    }

    fn compiled(field: Option<&ExpressionField>) -> Option<String> {
        field.and_then(ExpressionField::as_compiled).map(ToOwned::to_owned)
    }

    fn compiled_projection(&self) -> Option<String> {
        self.projection
            .as_ref()
            .and_then(ProjectionField::as_compiled)
            .map(ToOwned::to_owned)
    }

    fn limit_i32(&self) -> Result<Option<i32>> {
        self.limit
            .map(|n| {
                i32::try_from(n).map_err(|_| {
                    ChainError::invalid_request(format!("limit {n} exceeds {}", i32::MAX))
                })
            })
            .transpose()
    }

    /// Compile, then build a `GetItem` input.
    pub fn get_item_input(&mut self) -> Result<GetItemInput> {
        self.compile()?;
        Ok(GetItemInput {
            table_name: self.table_name.clone(),
            key: self.key.clone(),
            consistent_read: self.consistent_read,
            projection_expression: self.compiled_projection(),
            expression_attribute_names: self.names.clone(),
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }

    /// Compile, then build a `PutItem` input.
    pub fn put_item_input(&mut self) -> Result<PutItemInput> {
        self.compile()?;
        Ok(PutItemInput {
            table_name: self.table_name.clone(),
            item: self.item.clone(),
            condition_expression: Self::compiled(self.condition.as_ref()),
            expression_attribute_names: self.names.clone(),
            expression_attribute_values: self.values.clone(),
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }

    /// Compile, then build a `DeleteItem` input.
    pub fn delete_item_input(&mut self) -> Result<DeleteItemInput> {
        self.compile()?;
        Ok(DeleteItemInput {
            table_name: self.table_name.clone(),
            key: self.key.clone(),
            condition_expression: Self::compiled(self.condition.as_ref()),
            expression_attribute_names: self.names.clone(),
            expression_attribute_values: self.values.clone(),
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }

    /// Compile, then build a `Query` input.
    pub fn query_input(&mut self) -> Result<QueryInput> {
        self.compile()?;
        Ok(QueryInput {
            table_name: self.table_name.clone(),
            index_name: self.index_name.clone(),
            key_condition_expression: Self::compiled(self.key_condition.as_ref()),
            filter_expression: Self::compiled(self.filter.as_ref()),
            projection_expression: self.compiled_projection(),
            expression_attribute_names: self.names.clone(),
            expression_attribute_values: self.values.clone(),
            scan_index_forward: self.scan_index_forward,
            limit: self.limit_i32()?,
            exclusive_start_key: self.exclusive_start_key.clone(),
            select: self.select,
            consistent_read: self.consistent_read,
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }

    /// Compile, then build a `Scan` input.
    pub fn scan_input(&mut self) -> Result<ScanInput> {
        self.compile()?;
        Ok(ScanInput {
            table_name: self.table_name.clone(),
            index_name: self.index_name.clone(),
            filter_expression: Self::compiled(self.filter.as_ref()),
            projection_expression: self.compiled_projection(),
            expression_attribute_names: self.names.clone(),
            expression_attribute_values: self.values.clone(),
            limit: self.limit_i32()?,
            exclusive_start_key: self.exclusive_start_key.clone(),
            select: self.select,
            consistent_read: self.consistent_read,
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Attr, Key};

    fn forum_query() -> RequestDocument {
        RequestDocument {
            key_condition: Some(ExpressionField::Raw(
                Key::new("ForumName").eq("Amazon S3") & Key::new("Subject").gte("S3 Thread 2"),
            )),
            filter: Some(ExpressionField::Raw(
                Attr::new("LastPostedBy").eq("User A") | Attr::new("Views").eq(1),
            )),
            projection: Some(ProjectionField::Raw(vec![
                "Subject, ForumName".to_owned(),
                "Views".to_owned(),
            ])),
            ..RequestDocument::new("Thread")
        }
    }

    #[test]
    fn test_should_compile_all_fields_with_one_table() {
        let mut doc = forum_query();
        doc.compile().unwrap();
        assert!(doc.is_compiled());
        assert_eq!(
            doc.key_condition,
            Some(ExpressionField::Compiled(
                "((#n0 = :v0) AND (#n1 >= :v1))".to_owned()
            ))
        );
        assert_eq!(
            doc.filter,
            Some(ExpressionField::Compiled(
                "((#n2 = :v2) OR (#n3 = :v3))".to_owned()
            ))
        );
        assert_eq!(
            doc.projection,
            Some(ProjectionField::Compiled("#n1,#n0,#n3".to_owned()))
        );
        assert_eq!(doc.names.len(), 4);
        assert_eq!(doc.values.len(), 4);
    }

    #[test]
    fn test_should_leave_compiled_document_unchanged() {
        let mut doc = forum_query();
        doc.compile().unwrap();
        let snapshot = doc.clone();
        doc.compile().unwrap();
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_should_not_touch_document_on_invalid_key_condition() {
        let mut doc = RequestDocument {
            key_condition: Some(ExpressionField::Raw(
                Key::new("ForumName").eq("a") | Key::new("ForumName").eq("b"),
            )),
            filter: Some(ExpressionField::Raw(Attr::new("Views").eq(0))),
            ..RequestDocument::new("Thread")
        };
        let snapshot = doc.clone();
        assert!(doc.compile().is_err());
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_should_drop_empty_projection() {
        let mut doc = RequestDocument {
            projection: Some(ProjectionField::Raw(vec![" ".to_owned()])),
            ..RequestDocument::new("Thread")
        };
        let input = doc.scan_input().unwrap();
        assert!(input.projection_expression.is_none());
        assert!(doc.projection.is_none());
    }

    #[test]
    fn test_should_reject_limit_beyond_i32() {
        let mut doc = RequestDocument {
            limit: Some(u32::MAX),
            ..RequestDocument::new("Thread")
        };
        let err = doc.scan_input().unwrap_err();
        assert!(matches!(err, ChainError::InvalidRequest { .. }));
    }

    #[test]
    fn test_should_build_query_input() {
        let mut doc = forum_query();
        doc.limit = Some(2);
        doc.scan_index_forward = Some(false);
        doc.consistent_read = Some(true);
        let input = doc.query_input().unwrap();
        assert_eq!(input.table_name, "Thread");
        assert_eq!(input.limit, Some(2));
        assert_eq!(input.scan_index_forward, Some(false));
        assert_eq!(
            input.key_condition_expression.as_deref(),
            Some("((#n0 = :v0) AND (#n1 >= :v1))")
        );
        assert_eq!(input.expression_attribute_names["#n2"], "LastPostedBy");
        assert_eq!(
            input.expression_attribute_values[":v3"],
            AttributeValue::N("1".to_owned())
        );
    }
}
