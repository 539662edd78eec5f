//! Put, get and delete through the chain, with write conditions.

#[cfg(test)]
mod tests {
    use dynachain_core::Combinator;
    use dynachain_core::condition::Attr;
    use dynachain_model::{AttributeValue, Item};

    use crate::{THREAD_TABLE, forum_table, thread};

    #[tokio::test]
    async fn test_should_get_item_by_key() {
        let table = forum_table();
        let item = table
            .chain()
            .key("ForumName", "Amazon S3")
            .key("Subject", "S3 Thread 2")
            .get()
            .await
            .unwrap();
        assert_eq!(item, thread("Amazon S3", "S3 Thread 2", "User A", 1));

        let projected = table
            .chain()
            .key("ForumName", "Amazon S3")
            .key("Subject", "S3 Thread 2")
            .projection("Views")
            .get()
            .await
            .unwrap();
        assert_eq!(
            projected,
            Item::from([("Views".to_owned(), AttributeValue::from(1))])
        );
    }

    #[tokio::test]
    async fn test_should_report_missing_item() {
        let table = forum_table();
        let mut chain = table
            .chain()
            .key("ForumName", "Amazon S3")
            .key("Subject", "S3 Thread 9");
        assert!(chain.get_optional().await.unwrap().is_none());
        assert!(chain.get().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_should_put_item_with_key_overriding_attributes() {
        let table = forum_table();
        table
            .chain()
            .key("ForumName", "Amazon S3")
            .key("Subject", "S3 Thread 3")
            .put(thread("ignored", "ignored", "User C", 7))
            .await
            .unwrap();

        let stored = table
            .chain()
            .key("ForumName", "Amazon S3")
            .key("Subject", "S3 Thread 3")
            .get()
            .await
            .unwrap();
        assert_eq!(stored, thread("Amazon S3", "S3 Thread 3", "User C", 7));
        assert_eq!(table.service().item_count(THREAD_TABLE).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_should_reject_put_when_condition_fails() {
        let table = forum_table();
        let err = table
            .chain()
            .key("ForumName", "Amazon S3")
            .key("Subject", "S3 Thread 1")
            .condition(Attr::new("ForumName").not_exists())
            .put(thread("Amazon S3", "S3 Thread 1", "User Z", 99))
            .await
            .unwrap_err();
        assert!(err.is_conditional_check_failed());

        let unchanged = table
            .chain()
            .key("ForumName", "Amazon S3")
            .key("Subject", "S3 Thread 1")
            .get()
            .await
            .unwrap();
        assert_eq!(unchanged["LastPostedBy"], AttributeValue::from("User A"));
    }

    #[tokio::test]
    async fn test_should_delete_when_either_condition_holds() {
        let table = forum_table();
        table
            .chain()
            .key("ForumName", "Amazon DynamoDB")
            .key("Subject", "DynamoDB Thread 2")
            .condition(Attr::new("Views").gt(100))
            .condition_with(Combinator::Or, Attr::new("LastPostedBy").eq("User B"))
            .delete()
            .await
            .unwrap();
        assert_eq!(table.service().item_count(THREAD_TABLE).unwrap(), 3);

        let err = table
            .chain()
            .key("ForumName", "Amazon DynamoDB")
            .key("Subject", "DynamoDB Thread 1")
            .condition(Attr::new("Views").gt(100))
            .and()
            .condition(Attr::new("LastPostedBy").eq("User A"))
            .delete()
            .await
            .unwrap_err();
        assert!(err.is_conditional_check_failed());
        assert_eq!(table.service().item_count(THREAD_TABLE).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_should_delete_missing_item_silently() {
        let table = forum_table();
        table
            .chain()
            .key("ForumName", "Amazon S3")
            .key("Subject", "S3 Thread 9")
            .delete()
            .await
            .unwrap();
        assert_eq!(table.service().item_count(THREAD_TABLE).unwrap(), 4);
    }
}
