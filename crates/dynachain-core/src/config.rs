//! Chain configuration.

use std::env;

use dynachain_model::types::ReturnConsumedCapacity;

/// Defaults applied to every chain created from a table, plus the
/// connection settings the AWS adapter reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Default table name for `Table::from_config`.
    pub table_name: Option<String>,
    /// AWS region.
    pub default_region: String,
    /// Endpoint override, e.g. a local emulator.
    pub endpoint_url: Option<String>,
    /// Default `ConsistentRead` for new chains.
    pub consistent_read: bool,
    /// Default `ReturnConsumedCapacity` for new chains.
    pub return_consumed_capacity: ReturnConsumedCapacity,
}

impl ChainConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            table_name: env_string("DYNACHAIN_TABLE_NAME"),
            default_region: env::var("DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_owned()),
            endpoint_url: env_string("DYNAMODB_ENDPOINT_URL"),
            consistent_read: env_bool("DYNACHAIN_CONSISTENT_READ", false),
            return_consumed_capacity: env::var("DYNACHAIN_RETURN_CONSUMED_CAPACITY")
                .ok()
                .and_then(|v| ReturnConsumedCapacity::from_name(&v))
                .unwrap_or_default(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            table_name: None,
            default_region: "us-east-1".to_owned(),
            endpoint_url: None,
            consistent_read: false,
            return_consumed_capacity: ReturnConsumedCapacity::None,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}
