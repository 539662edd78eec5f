//! [`TableService`] over the AWS SDK DynamoDB client.

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use dynachain_core::{ChainConfig, TableService};
use dynachain_model::input::{DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput};
use dynachain_model::output::{
    DeleteItemOutput, GetItemOutput, PutItemOutput, QueryOutput, ScanOutput,
};
use dynachain_model::{DynamoDBError, DynamoDBErrorCode};
use tracing::{debug, warn};

use crate::convert::{
    from_sdk_capacity, from_sdk_item, from_sdk_key, non_empty, to_sdk_item,
    to_sdk_return_consumed_capacity, to_sdk_select,
};

/// Sends request documents to DynamoDB through the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsTableService {
    client: Client,
}

impl AwsTableService {
    /// Wrap an already configured client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS provider chain, with the region
    /// and endpoint override taken from `config`.
    pub async fn from_config(config: &ChainConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.default_region.clone()))
            .load()
            .await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        debug!(
            region = %config.default_region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("default"),
            "created DynamoDB client"
        );
        Self::new(Client::from_conf(builder.build()))
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl TableService for AwsTableService {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        let output = self
            .client
            .get_item()
            .table_name(input.table_name)
            .set_key(Some(to_sdk_item(input.key)))
            .set_consistent_read(input.consistent_read)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(non_empty(input.expression_attribute_names))
            .set_return_consumed_capacity(
                input.return_consumed_capacity.map(to_sdk_return_consumed_capacity),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(GetItemOutput {
            item: output.item.map(from_sdk_item).transpose()?,
            consumed_capacity: from_sdk_capacity(output.consumed_capacity),
        })
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        let output = self
            .client
            .put_item()
            .table_name(input.table_name)
            .set_item(Some(to_sdk_item(input.item)))
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(non_empty(input.expression_attribute_names))
            .set_expression_attribute_values(non_empty(to_sdk_item(
                input.expression_attribute_values,
            )))
            .set_return_consumed_capacity(
                input.return_consumed_capacity.map(to_sdk_return_consumed_capacity),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(PutItemOutput {
            consumed_capacity: from_sdk_capacity(output.consumed_capacity),
        })
    }

    async fn delete_item(
        &self,
        input: DeleteItemInput,
    ) -> Result<DeleteItemOutput, DynamoDBError> {
        let output = self
            .client
            .delete_item()
            .table_name(input.table_name)
            .set_key(Some(to_sdk_item(input.key)))
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(non_empty(input.expression_attribute_names))
            .set_expression_attribute_values(non_empty(to_sdk_item(
                input.expression_attribute_values,
            )))
            .set_return_consumed_capacity(
                input.return_consumed_capacity.map(to_sdk_return_consumed_capacity),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(DeleteItemOutput {
            consumed_capacity: from_sdk_capacity(output.consumed_capacity),
        })
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        let output = self
            .client
            .query()
            .table_name(input.table_name)
            .set_index_name(input.index_name)
            .set_key_condition_expression(input.key_condition_expression)
            .set_filter_expression(input.filter_expression)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(non_empty(input.expression_attribute_names))
            .set_expression_attribute_values(non_empty(to_sdk_item(
                input.expression_attribute_values,
            )))
            .set_scan_index_forward(input.scan_index_forward)
            .set_limit(input.limit)
            .set_exclusive_start_key(non_empty(to_sdk_item(input.exclusive_start_key)))
            .set_select(input.select.map(to_sdk_select))
            .set_consistent_read(input.consistent_read)
            .set_return_consumed_capacity(
                input.return_consumed_capacity.map(to_sdk_return_consumed_capacity),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(QueryOutput {
            items: output
                .items
                .unwrap_or_default()
                .into_iter()
                .map(from_sdk_item)
                .collect::<Result<_, _>>()?,
            count: output.count,
            scanned_count: output.scanned_count,
            last_evaluated_key: from_sdk_key(output.last_evaluated_key)?,
            consumed_capacity: from_sdk_capacity(output.consumed_capacity),
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        let output = self
            .client
            .scan()
            .table_name(input.table_name)
            .set_index_name(input.index_name)
            .set_filter_expression(input.filter_expression)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(non_empty(input.expression_attribute_names))
            .set_expression_attribute_values(non_empty(to_sdk_item(
                input.expression_attribute_values,
            )))
            .set_limit(input.limit)
            .set_exclusive_start_key(non_empty(to_sdk_item(input.exclusive_start_key)))
            .set_select(input.select.map(to_sdk_select))
            .set_consistent_read(input.consistent_read)
            .set_return_consumed_capacity(
                input.return_consumed_capacity.map(to_sdk_return_consumed_capacity),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(ScanOutput {
            items: output
                .items
                .unwrap_or_default()
                .into_iter()
                .map(from_sdk_item)
                .collect::<Result<_, _>>()?,
            count: output.count,
            scanned_count: output.scanned_count,
            last_evaluated_key: from_sdk_key(output.last_evaluated_key)?,
            consumed_capacity: from_sdk_capacity(output.consumed_capacity),
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn sdk_error<E>(err: SdkError<E, HttpResponse>) -> DynamoDBError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err
        .raw_response()
        .and_then(|r| http::StatusCode::from_u16(r.status().as_u16()).ok());
    let mapped = match err.code() {
        Some(code) => service_error(code, err.message().unwrap_or(code)),
        None => DynamoDBError::transport(DisplayErrorContext(&err).to_string()),
    };
    if mapped.code == DynamoDBErrorCode::Unknown {
        warn!(error = %mapped.message, "DynamoDB request failed");
    }
    match status {
        Some(status) => mapped.with_status(status),
        None => mapped,
    }
}

fn service_error(code: &str, message: &str) -> DynamoDBError {
    DynamoDBError::with_message(DynamoDBErrorCode::from_code(code), message)
}
