//! Operation dispatcher and the table-service boundary.
//!
//! A [`Dispatcher`] maps one request document plus an operation kind onto
//! exactly one [`TableService`] call, compiling the document first (a no-op
//! when it is already compiled) and unwrapping the reply.

use std::sync::Arc;

use async_trait::async_trait;
use dynachain_model::input::{DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput};
use dynachain_model::output::{
    DeleteItemOutput, GetItemOutput, PutItemOutput, QueryOutput, ScanOutput,
};
use dynachain_model::{DynamoDBError, DynamoDBOperation, Item};
use tracing::debug;

use crate::error::Result;
use crate::pagination::{Page, ReadKind};
use crate::request::RequestDocument;

/// The five item-level calls of a DynamoDB table.
#[async_trait]
pub trait TableService: Send + Sync {
    /// Read one item by primary key.
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError>;

    /// Insert or replace one item.
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError>;

    /// Delete one item by primary key.
    async fn delete_item(&self, input: DeleteItemInput)
    -> Result<DeleteItemOutput, DynamoDBError>;

    /// Read one page of items by key condition.
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError>;

    /// Read one page of items from the whole table.
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError>;
}

#[async_trait]
impl<T: TableService + ?Sized> TableService for Arc<T> {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        (**self).get_item(input).await
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        (**self).put_item(input).await
    }

    async fn delete_item(
        &self,
        input: DeleteItemInput,
    ) -> Result<DeleteItemOutput, DynamoDBError> {
        (**self).delete_item(input).await
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        (**self).query(input).await
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        (**self).scan(input).await
    }
}

/// The unwrapped reply of one dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `GetItem`: the item, if one matched the key.
    Item(Option<Item>),
    /// `PutItem` / `DeleteItem` succeeded.
    Written,
    /// `Query` / `Scan`: one page.
    Page(Page),
}

/// Sends request documents to a table service.
#[derive(Debug)]
pub struct Dispatcher<'s, S: ?Sized> {
    service: &'s S,
}

impl<S: ?Sized> Clone for Dispatcher<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for Dispatcher<'_, S> {}

impl<'s, S: TableService + ?Sized> Dispatcher<'s, S> {
    /// Dispatch through `service`.
    #[must_use]
    pub fn new(service: &'s S) -> Self {
        Self { service }
    }

    /// Compile `doc` and send it as `operation`.
    pub async fn dispatch(
        &self,
        doc: &mut RequestDocument,
        operation: DynamoDBOperation,
    ) -> Result<Reply> {
        match operation {
            DynamoDBOperation::GetItem => self.get_item(doc).await.map(Reply::Item),
            DynamoDBOperation::PutItem => self.put_item(doc).await.map(|()| Reply::Written),
            DynamoDBOperation::DeleteItem => self.delete_item(doc).await.map(|()| Reply::Written),
            DynamoDBOperation::Query => self.read_page(doc, ReadKind::Query).await.map(Reply::Page),
            DynamoDBOperation::Scan => self.read_page(doc, ReadKind::Scan).await.map(Reply::Page),
        }
    }

    /// `GetItem`, returning the item if present.
    pub async fn get_item(&self, doc: &mut RequestDocument) -> Result<Option<Item>> {
        let input = doc.get_item_input()?;
        debug!(operation = "GetItem", table = %input.table_name, "dispatching request");
        let output = self.service.get_item(input).await?;
        Ok(output.item)
    }

    /// `PutItem`.
    pub async fn put_item(&self, doc: &mut RequestDocument) -> Result<()> {
        let input = doc.put_item_input()?;
        debug!(
            operation = "PutItem",
            table = %input.table_name,
            conditional = input.condition_expression.is_some(),
            "dispatching request"
        );
        self.service.put_item(input).await?;
        Ok(())
    }

    /// `DeleteItem`.
    pub async fn delete_item(&self, doc: &mut RequestDocument) -> Result<()> {
        let input = doc.delete_item_input()?;
        debug!(
            operation = "DeleteItem",
            table = %input.table_name,
            conditional = input.condition_expression.is_some(),
            "dispatching request"
        );
        self.service.delete_item(input).await?;
        Ok(())
    }

    /// One `Query` or `Scan` page.
    pub async fn read_page(&self, doc: &mut RequestDocument, kind: ReadKind) -> Result<Page> {
        let page = match kind {
            ReadKind::Query => {
                let input = doc.query_input()?;
                debug!(
                    operation = "Query",
                    table = %input.table_name,
                    resumed = !input.exclusive_start_key.is_empty(),
                    "dispatching request"
                );
                Page::from(self.service.query(input).await?)
            }
            ReadKind::Scan => {
                let input = doc.scan_input()?;
                debug!(
                    operation = "Scan",
                    table = %input.table_name,
                    resumed = !input.exclusive_start_key.is_empty(),
                    "dispatching request"
                );
                Page::from(self.service.scan(input).await?)
            }
        };
        Ok(page)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use dynachain_model::AttributeValue;
    use dynachain_model::input::{
        DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput,
    };

    use super::*;
    use crate::condition::Attr;
    use crate::error::ChainError;
    use crate::request::ExpressionField;

    /// Records every call and answers reads from a fixed list of pages keyed
    /// by the `ExclusiveStartKey` they follow.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingService {
        pub(crate) pages: Vec<(Item, ScanOutput)>,
        pub(crate) stored: Option<Item>,
        pub(crate) fail_writes: bool,
        pub(crate) calls: Mutex<Vec<String>>,
        pub(crate) queries: Mutex<Vec<QueryInput>>,
        pub(crate) scans: Mutex<Vec<ScanInput>>,
        pub(crate) puts: Mutex<Vec<PutItemInput>>,
    }

    impl RecordingService {
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_owned());
        }

        fn page_after(&self, start: &Item) -> ScanOutput {
            self.pages
                .iter()
                .find(|(after, _)| after == start)
                .map(|(_, page)| page.clone())
                .unwrap_or_default()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TableService for RecordingService {
        async fn get_item(&self, _input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
            self.record("GetItem");
            Ok(GetItemOutput {
                item: self.stored.clone(),
                consumed_capacity: None,
            })
        }

        async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
            self.record("PutItem");
            self.puts.lock().unwrap().push(input);
            if self.fail_writes {
                return Err(DynamoDBError::conditional_check_failed(
                    "The conditional request failed",
                ));
            }
            Ok(PutItemOutput::default())
        }

        async fn delete_item(
            &self,
            _input: DeleteItemInput,
        ) -> Result<DeleteItemOutput, DynamoDBError> {
            self.record("DeleteItem");
            Ok(DeleteItemOutput::default())
        }

        async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
            self.record("Query");
            let page = self.page_after(&input.exclusive_start_key);
            self.queries.lock().unwrap().push(input);
            Ok(QueryOutput {
                items: page.items,
                count: page.count,
                scanned_count: page.scanned_count,
                last_evaluated_key: page.last_evaluated_key,
                consumed_capacity: page.consumed_capacity,
            })
        }

        async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
            self.record("Scan");
            let page = self.page_after(&input.exclusive_start_key);
            self.scans.lock().unwrap().push(input);
            Ok(page)
        }
    }

    pub(crate) fn key(subject: &str) -> Item {
        Item::from([("Subject".to_owned(), AttributeValue::from(subject))])
    }

    /// Pages of one item each, chained by `LastEvaluatedKey`.
    pub(crate) fn chained_pages(subjects: &[&str]) -> Vec<(Item, ScanOutput)> {
        let mut after = Item::new();
        let mut pages = Vec::new();
        for (i, subject) in subjects.iter().enumerate() {
            let last = if i + 1 == subjects.len() {
                Item::new()
            } else {
                key(subject)
            };
            pages.push((
                after.clone(),
                ScanOutput {
                    items: vec![key(subject)],
                    count: 1,
                    scanned_count: 1,
                    last_evaluated_key: last.clone(),
                    consumed_capacity: None,
                },
            ));
            after = last;
        }
        pages
    }

    #[tokio::test]
    async fn test_should_dispatch_each_operation_to_one_call() {
        let service = RecordingService {
            stored: Some(key("S3 Thread 1")),
            pages: chained_pages(&["S3 Thread 1"]),
            ..RecordingService::default()
        };
        let dispatcher = Dispatcher::new(&service);
        for op in [
            DynamoDBOperation::GetItem,
            DynamoDBOperation::PutItem,
            DynamoDBOperation::DeleteItem,
            DynamoDBOperation::Query,
            DynamoDBOperation::Scan,
        ] {
            let mut doc = RequestDocument::new("Thread");
            dispatcher.dispatch(&mut doc, op).await.unwrap();
        }
        assert_eq!(
            *service.calls.lock().unwrap(),
            vec!["GetItem", "PutItem", "DeleteItem", "Query", "Scan"]
        );
    }

    #[tokio::test]
    async fn test_should_unwrap_get_reply() {
        let service = RecordingService {
            stored: Some(key("S3 Thread 1")),
            ..RecordingService::default()
        };
        let mut doc = RequestDocument::new("Thread");
        let reply = Dispatcher::new(&service)
            .dispatch(&mut doc, DynamoDBOperation::GetItem)
            .await
            .unwrap();
        assert_eq!(reply, Reply::Item(Some(key("S3 Thread 1"))));
    }

    #[tokio::test]
    async fn test_should_compile_before_sending() {
        let service = RecordingService::default();
        let mut doc = RequestDocument {
            filter: Some(ExpressionField::Raw(Attr::new("Views").eq(0))),
            ..RequestDocument::new("Thread")
        };
        Dispatcher::new(&service)
            .read_page(&mut doc, ReadKind::Scan)
            .await
            .unwrap();
        assert!(doc.is_compiled());
        let sent = service.scans.lock().unwrap();
        assert_eq!(sent[0].filter_expression.as_deref(), Some("(#n0 = :v0)"));
    }

    #[tokio::test]
    async fn test_should_surface_conditional_check_failure() {
        let service = RecordingService {
            fail_writes: true,
            ..RecordingService::default()
        };
        let mut doc = RequestDocument::new("Thread");
        let err = Dispatcher::new(&service)
            .put_item(&mut doc)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::ConditionalCheckFailed { .. }));
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test]
    async fn test_should_not_call_backend_on_compile_error() {
        let service = RecordingService::default();
        let mut doc = RequestDocument {
            key_condition: Some(ExpressionField::Raw(!Attr::new("ForumName").eq("x"))),
            ..RequestDocument::new("Thread")
        };
        let err = Dispatcher::new(&service)
            .read_page(&mut doc, ReadKind::Query)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidKeyCondition { .. }));
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn test_should_dispatch_through_shared_service() {
        let service: Arc<dyn TableService> = Arc::new(RecordingService::default());
        let mut doc = RequestDocument::new("Thread");
        let reply = Dispatcher::new(&service)
            .dispatch(&mut doc, DynamoDBOperation::GetItem)
            .await
            .unwrap();
        assert_eq!(reply, Reply::Item(None));
    }
}
