//! In-memory DynamoDB table service.
//!
//! [`MemoryTableService`] implements [`dynachain_core::TableService`] over
//! process-local tables, so chains can run against it in tests and local
//! tools without a DynamoDB endpoint. It parses the compiled expressions the
//! builder sends, resolving every `#name`/`:value` placeholder, and answers
//! with DynamoDB's paging, `Limit`, `Select=COUNT` and conditional-write
//! semantics.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod expression;
mod key_condition;
pub mod service;
pub mod storage;

use dynachain_model::DynamoDBError;

pub use service::MemoryTableService;
pub use storage::{KeySchema, StorageError, TableStorage};

// Every storage failure is a malformed request.
impl From<StorageError> for DynamoDBError {
    fn from(err: StorageError) -> Self {
        DynamoDBError::validation(err.to_string())
    }
}
