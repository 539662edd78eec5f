//! DynamoDB wire model types for dynachain.
//!
//! Hand-written serde types for the five item-level operations the query
//! builder dispatches (`GetItem`, `PutItem`, `DeleteItem`, `Query`, `Scan`).
//! Field names follow the DynamoDB JSON protocol so the same types can be
//! logged, snapshot-tested, or sent over the wire unchanged.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::{AttributeValue, Item};
pub use error::{DynamoDBError, DynamoDBErrorCode};
pub use operations::DynamoDBOperation;
