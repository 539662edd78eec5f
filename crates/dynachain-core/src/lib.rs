//! Fluent DynamoDB query builder.
//!
//! Chained method calls accumulate key, filter and write conditions, a
//! projection list and scalar options; a terminal call compiles them into a
//! request document whose attribute names and values are all replaced by
//! `#nX`/`:vX` placeholders, dispatches it to a [`TableService`], and pages
//! through `Query`/`Scan` results while a `LastEvaluatedKey` is returned.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod chain;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pagination;
pub mod projection;
pub mod request;
pub mod state;

pub use chain::{Chain, Table};
pub use condition::{Attr, Condition, Key};
pub use config::ChainConfig;
pub use dispatch::{Dispatcher, TableService};
pub use error::{ChainError, Result};
pub use pagination::{Cursor, Page};
pub use state::Combinator;
