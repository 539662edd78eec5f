//! Integration tests for dynachain.
//!
//! Most tests run chains end to end against the in-memory table service,
//! seeded with the forum `Thread` table. Tests against a real DynamoDB
//! endpoint (default `localhost:4566`) are marked `#[ignore]` so they don't
//! run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p dynachain-integration -- --ignored
//! ```

use std::sync::{Arc, Once};

use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use dynachain_core::Table;
use dynachain_memory::{KeySchema, MemoryTableService};
use dynachain_model::types::ScalarAttributeType;
use dynachain_model::{AttributeValue, Item};

static INIT: Once = Once::new();

/// Name of the seeded forum table.
pub const THREAD_TABLE: &str = "Thread";

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the DynamoDB-compatible server.
fn endpoint_url() -> String {
    std::env::var("DYNAMODB_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// One forum thread.
#[must_use]
pub fn thread(forum: &str, subject: &str, last_posted_by: &str, views: i64) -> Item {
    Item::from([
        ("ForumName".to_owned(), AttributeValue::from(forum)),
        ("Subject".to_owned(), AttributeValue::from(subject)),
        ("LastPostedBy".to_owned(), AttributeValue::from(last_posted_by)),
        ("Views".to_owned(), AttributeValue::from(views)),
        (
            "Message".to_owned(),
            AttributeValue::from(format!("Last post by {last_posted_by}")),
        ),
    ])
}

/// The four seeded threads, in scan order.
#[must_use]
pub fn forum_threads() -> Vec<Item> {
    vec![
        thread("Amazon DynamoDB", "DynamoDB Thread 1", "User A", 0),
        thread("Amazon DynamoDB", "DynamoDB Thread 2", "User B", 3),
        thread("Amazon S3", "S3 Thread 1", "User A", 0),
        thread("Amazon S3", "S3 Thread 2", "User A", 1),
    ]
}

/// The `Thread` key schema: `ForumName` (HASH), `Subject` (RANGE).
#[must_use]
pub fn thread_key_schema() -> KeySchema {
    KeySchema::new("ForumName", ScalarAttributeType::S)
        .with_sort_key("Subject", ScalarAttributeType::S)
}

/// An in-memory service holding the seeded `Thread` table, with a
/// `ByAuthor` index on `LastPostedBy`/`Subject`.
#[must_use]
pub fn forum_service() -> Arc<MemoryTableService> {
    init_tracing();

    let service = MemoryTableService::new();
    service
        .create_table(THREAD_TABLE, thread_key_schema())
        .unwrap_or_else(|e| panic!("failed to create table: {e}"));
    service
        .create_index(
            THREAD_TABLE,
            "ByAuthor",
            KeySchema::new("LastPostedBy", ScalarAttributeType::S)
                .with_sort_key("Subject", ScalarAttributeType::S),
        )
        .unwrap_or_else(|e| panic!("failed to create index: {e}"));
    for item in forum_threads() {
        service
            .handle_put_item(dynachain_model::input::PutItemInput {
                table_name: THREAD_TABLE.to_owned(),
                item,
                ..Default::default()
            })
            .unwrap_or_else(|e| panic!("failed to seed item: {e}"));
    }
    Arc::new(service)
}

/// The seeded `Thread` table.
#[must_use]
pub fn forum_table() -> Table<Arc<MemoryTableService>> {
    Table::new(forum_service(), THREAD_TABLE)
}

/// The `Subject` of each item, in order.
#[must_use]
pub fn subjects(items: &[Item]) -> Vec<&str> {
    items
        .iter()
        .filter_map(|item| item.get("Subject").and_then(AttributeValue::as_s))
        .collect()
}

/// Create a configured DynamoDB client pointing at the local server.
#[must_use]
pub fn dynamodb_client() -> aws_sdk_dynamodb::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    let config = aws_sdk_dynamodb::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .build();

    aws_sdk_dynamodb::Client::from_conf(config)
}

/// Generate a unique table name for a DynamoDB test.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

mod test_aws;
mod test_pagination;
mod test_query;
mod test_scan;
mod test_write;
