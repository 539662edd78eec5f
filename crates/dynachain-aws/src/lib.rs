//! AWS SDK backend for dynachain.
//!
//! [`AwsTableService`] sends the request documents built by a chain to
//! DynamoDB (or any endpoint speaking its protocol) through
//! `aws-sdk-dynamodb`, and maps SDK errors onto [`DynamoDBError`] by their
//! service error code.
//!
//! [`DynamoDBError`]: dynachain_model::DynamoDBError
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod convert;
pub mod service;

pub use service::AwsTableService;
