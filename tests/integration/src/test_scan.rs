//! Scan and count chains against the seeded forum table.

#[cfg(test)]
mod tests {
    use dynachain_core::ChainError;
    use dynachain_core::condition::{Attr, Key};
    use dynachain_model::AttributeValue;

    use crate::{forum_table, subjects};

    #[tokio::test]
    async fn test_should_count_every_thread() {
        let table = forum_table();
        assert_eq!(table.chain().count().await.unwrap(), 4);
        assert_eq!(table.chain().count_all().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_should_scan_with_projection_list() {
        let table = forum_table();
        let items = table
            .chain()
            .projection(vec!["Subject", "Views"])
            .scan_all()
            .await
            .unwrap();
        assert_eq!(items.len(), 4);
        for item in &items {
            let mut names: Vec<&str> = item.keys().map(String::as_str).collect();
            names.sort_unstable();
            assert_eq!(names, vec!["Subject", "Views"]);
        }
    }

    #[tokio::test]
    async fn test_should_scan_with_comma_separated_projection() {
        let table = forum_table();
        let items = table
            .chain()
            .projection("ForumName, Subject, Message")
            .scan_all()
            .await
            .unwrap();
        assert_eq!(items.len(), 4);
        for item in &items {
            let mut names: Vec<&str> = item.keys().map(String::as_str).collect();
            names.sort_unstable();
            assert_eq!(names, vec!["ForumName", "Message", "Subject"]);
        }
    }

    #[tokio::test]
    async fn test_should_accept_comma_separated_projection_value() {
        let table = forum_table();
        let items = table
            .chain()
            .projection_value(&serde_json::json!("ForumName, Subject"))
            .unwrap()
            .filter(Attr::new("LastPostedBy").eq("User B"))
            .scan_all()
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].len(), 2);
        assert_eq!(
            items[0].get("ForumName"),
            Some(&AttributeValue::from("Amazon DynamoDB"))
        );
    }

    #[tokio::test]
    async fn test_should_scan_with_function_filters() {
        let table = forum_table();
        let items = table
            .chain()
            .filter(Attr::new("Subject").begins_with("S3"))
            .or()
            .filter(Attr::new("Views").between(2, 5))
            .scan_all()
            .await
            .unwrap();
        assert_eq!(
            subjects(&items),
            vec!["DynamoDB Thread 2", "S3 Thread 1", "S3 Thread 2"]
        );

        let items = table
            .chain()
            .filter(Attr::new("LastPostedBy").is_in(["User B", "User C"]))
            .run_all()
            .await
            .unwrap();
        assert_eq!(subjects(&items), vec!["DynamoDB Thread 2"]);
    }

    #[tokio::test]
    async fn test_should_count_filtered_scan() {
        let table = forum_table();
        let count = table
            .chain()
            .filter(Attr::new("Views").eq(0))
            .count_all()
            .await
            .unwrap();
        assert_eq!(count, 2);

        let items = table
            .chain()
            .filter(Attr::new("Views").eq(0))
            .limit(1)
            .scan_all()
            .await
            .unwrap();
        assert_eq!(items.len(), count);
    }

    #[tokio::test]
    async fn test_should_refuse_scan_carrying_key_condition() {
        let table = forum_table();
        let mut chain = table
            .chain()
            .partition_key(Key::new("ForumName").eq("Amazon S3"));
        let err = chain.scan().await.unwrap_err();
        assert!(matches!(err, ChainError::InvalidRequest { .. }), "{err:?}");
        assert!(!chain.has_more());

        // the same chain routed by its key condition reads one partition
        let items = chain.run_all().await.unwrap();
        assert_eq!(subjects(&items), vec!["S3 Thread 1", "S3 Thread 2"]);
    }
}
