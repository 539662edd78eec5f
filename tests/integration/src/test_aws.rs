//! Chains against a running DynamoDB-compatible endpoint.

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use aws_sdk_dynamodb::types::{
        AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
    };
    use dynachain_aws::AwsTableService;
    use dynachain_core::Table;
    use dynachain_core::condition::{Attr, Key};

    use crate::{dynamodb_client, forum_threads, subjects, test_table_name};

    /// Helper: create the forum table and seed it through a chain.
    async fn create_forum_table(prefix: &str) -> anyhow::Result<Table<AwsTableService>> {
        let client = dynamodb_client();
        let name = test_table_name(prefix);
        client
            .create_table()
            .table_name(&name)
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name("ForumName")
                    .key_type(KeyType::Hash)
                    .build()
                    .unwrap(),
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name("Subject")
                    .key_type(KeyType::Range)
                    .build()
                    .unwrap(),
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name("ForumName")
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .unwrap(),
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name("Subject")
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .unwrap(),
            )
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .with_context(|| format!("failed to create table {name}"))?;

        tracing::info!(table = %name, "created forum table");

        let table = Table::new(AwsTableService::new(client), name);
        for item in forum_threads() {
            table.chain().put(item).await?;
        }
        Ok(table)
    }

    async fn drop_table(table: &Table<AwsTableService>) {
        let _ = table
            .service()
            .client()
            .delete_table()
            .table_name(table.name())
            .send()
            .await;
    }

    #[tokio::test]
    #[ignore = "requires running DynamoDB endpoint"]
    async fn test_should_query_s3_threads_against_endpoint() -> anyhow::Result<()> {
        let table = create_forum_table("query").await?;
        let items = table
            .chain()
            .partition_key(Key::new("ForumName").eq("Amazon S3"))
            .sort_key(Key::new("Subject").gte("S3 Thread 2"))
            .filter(Attr::new("LastPostedBy").eq("User A"))
            .or()
            .filter(Attr::new("Views").eq(1))
            .limit(2)
            .desc()
            .query_all()
            .await?;
        assert_eq!(subjects(&items), vec!["S3 Thread 2"]);
        drop_table(&table).await;
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running DynamoDB endpoint"]
    async fn test_should_count_and_page_against_endpoint() -> anyhow::Result<()> {
        let table = create_forum_table("count").await?;
        assert_eq!(table.chain().count_all().await?, 4);

        let items = table.chain().limit(1).scan_all().await?;
        assert_eq!(items.len(), 4);
        drop_table(&table).await;
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running DynamoDB endpoint"]
    async fn test_should_map_conditional_failure_from_endpoint() -> anyhow::Result<()> {
        let table = create_forum_table("cond").await?;
        let err = table
            .chain()
            .key("ForumName", "Amazon S3")
            .key("Subject", "S3 Thread 1")
            .condition(Attr::new("Views").gt(100))
            .delete()
            .await
            .unwrap_err();
        assert!(err.is_conditional_check_failed());
        drop_table(&table).await;
        Ok(())
    }
}
