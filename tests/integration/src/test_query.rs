//! Query chains against the seeded forum table.

#[cfg(test)]
mod tests {
    use dynachain_core::ChainError;
    use dynachain_core::condition::{Attr, Key};
    use dynachain_model::DynamoDBErrorCode;

    use crate::{forum_table, subjects};

    #[tokio::test]
    async fn test_should_query_s3_threads_with_or_filter_descending() {
        let table = forum_table();
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
            .await
            .unwrap();
        assert_eq!(subjects(&items), vec!["S3 Thread 2"]);
    }

    #[tokio::test]
    async fn test_should_query_partition_in_sort_order() {
        let table = forum_table();
        let mut chain = table
            .chain()
            .partition_key(Key::new("ForumName").eq("Amazon DynamoDB"));
        let items = chain.query().await.unwrap();
        assert_eq!(
            subjects(&items),
            vec!["DynamoDB Thread 1", "DynamoDB Thread 2"]
        );
        assert!(!chain.has_more());

        let reversed = table
            .chain()
            .partition_key(Key::new("ForumName").eq("Amazon DynamoDB"))
            .desc()
            .query()
            .await
            .unwrap();
        assert_eq!(
            subjects(&reversed),
            vec!["DynamoDB Thread 2", "DynamoDB Thread 1"]
        );
    }

    #[tokio::test]
    async fn test_should_apply_and_filter_without_or() {
        let table = forum_table();
        let items = table
            .chain()
            .partition_key(Key::new("ForumName").eq("Amazon S3"))
            .filter(Attr::new("LastPostedBy").eq("User A"))
            .filter(Attr::new("Views").gt(0))
            .run_all()
            .await
            .unwrap();
        assert_eq!(subjects(&items), vec!["S3 Thread 2"]);
    }

    #[tokio::test]
    async fn test_should_query_with_begins_with_and_between() {
        let table = forum_table();
        let items = table
            .chain()
            .partition_key(Key::new("ForumName").eq("Amazon S3"))
            .sort_key(Key::new("Subject").begins_with("S3 Thread"))
            .query_all()
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let items = table
            .chain()
            .partition_key(Key::new("ForumName").eq("Amazon DynamoDB"))
            .sort_key(Key::new("Subject").between("DynamoDB Thread 2", "DynamoDB Thread 9"))
            .query_all()
            .await
            .unwrap();
        assert_eq!(subjects(&items), vec!["DynamoDB Thread 2"]);
    }

    #[tokio::test]
    async fn test_should_query_secondary_index() {
        let table = forum_table();
        let items = table
            .chain()
            .index("ByAuthor")
            .partition_key(Key::new("LastPostedBy").eq("User A"))
            .query_all()
            .await
            .unwrap();
        assert_eq!(
            subjects(&items),
            vec!["DynamoDB Thread 1", "S3 Thread 1", "S3 Thread 2"]
        );
    }

    #[tokio::test]
    async fn test_should_count_query_matches() {
        let table = forum_table();
        let count = table
            .chain()
            .partition_key(Key::new("ForumName").eq("Amazon S3"))
            .projection("Subject")
            .count_all()
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_should_surface_backend_validation_errors() {
        let table = forum_table();
        let err = table
            .chain()
            .partition_key(Key::new("Subject").eq("S3 Thread 1"))
            .query()
            .await
            .unwrap_err();
        let ChainError::Backend(source) = err else {
            panic!("expected a backend error, got {err:?}");
        };
        assert_eq!(source.code, DynamoDBErrorCode::ValidationException);

        let err = table
            .chain()
            .index("Missing")
            .partition_key(Key::new("ForumName").eq("Amazon S3"))
            .query()
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Backend(_)));
    }
}
