//! Error type for chain operations.

use dynachain_model::error::{DynamoDBError, DynamoDBErrorCode};

/// Errors raised by the query builder.
///
/// Compile-time errors (`TypeMismatch`, `InvalidKeyCondition`,
/// `InvalidRequest`) are raised before any backend call. Backend failures are never retried.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// A dynamic value had the wrong shape (for example a projection that is
    /// neither a string nor a list of strings).
    #[error("type mismatch: {message}")]
    TypeMismatch {
        /// What was expected and what was found.
        message: String,
    },

    /// A key condition used a construct DynamoDB rejects in a
    /// `KeyConditionExpression`.
    #[error("invalid key condition: {message}")]
    InvalidKeyCondition {
        /// The offending construct.
        message: String,
    },

    /// The chain carries state the terminal operation cannot send, or a
    /// value DynamoDB would reject.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What the operation could not carry.
        message: String,
    },

    /// A write condition was not met; the item is unchanged.
    #[error("conditional check failed: {}", .source.message)]
    ConditionalCheckFailed {
        /// The backend error reporting the failed check.
        source: DynamoDBError,
    },

    /// `get` found no item for the key.
    #[error("item not found in table {table}")]
    NotFound {
        /// The table that was read.
        table: String,
    },

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(#[source] DynamoDBError),
}

impl ChainError {
    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_key_condition(message: impl Into<String>) -> Self {
        Self::InvalidKeyCondition {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a [`ChainError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a [`ChainError::ConditionalCheckFailed`].
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed { .. })
    }

    /// The backend error code, if the error came from the table service.
    #[must_use]
    pub fn backend_code(&self) -> Option<DynamoDBErrorCode> {
        match self {
            Self::ConditionalCheckFailed { source } | Self::Backend(source) => Some(source.code),
            _ => None,
        }
    }
}

impl From<DynamoDBError> for ChainError {
    fn from(err: DynamoDBError) -> Self {
        if err.is_conditional_check_failed() {
            Self::ConditionalCheckFailed { source: err }
        } else {
            Self::Backend(err)
        }
    }
}

/// Result alias for chain operations.
pub type Result<T, E = ChainError> = std::result::Result<T, E>;
