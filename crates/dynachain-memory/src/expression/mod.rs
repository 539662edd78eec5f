//! Expression parsing and evaluation.
//!
//! Request expressions are parsed back into [`Condition`] trees with every
//! placeholder resolved, then evaluated against stored items.
//!
//! [`Condition`]: dynachain_core::condition::Condition

pub mod evaluator;
pub mod parser;

pub use evaluator::{matches, project, resolve_path};
pub use parser::{ExpressionError, Placeholders};
