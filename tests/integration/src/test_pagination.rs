//! Paging through results with `LastEvaluatedKey`.

#[cfg(test)]
mod tests {
    use dynachain_core::condition::{Attr, Key};
    use futures::TryStreamExt;

    use crate::{forum_table, subjects};

    #[tokio::test]
    async fn test_should_advance_cursor_one_page_at_a_time() {
        let table = forum_table();
        let mut chain = table.chain().limit(3);

        let first = chain.scan().await.unwrap();
        assert_eq!(first.len(), 3);
        assert!(chain.has_more());

        let second = chain.scan().await.unwrap();
        assert_eq!(subjects(&second), vec!["S3 Thread 2"]);
        assert!(!chain.has_more());
    }

    #[tokio::test]
    async fn test_should_collect_all_pages() {
        let table = forum_table();
        let items = table.chain().limit(1).scan_all().await.unwrap();
        assert_eq!(
            subjects(&items),
            vec![
                "DynamoDB Thread 1",
                "DynamoDB Thread 2",
                "S3 Thread 1",
                "S3 Thread 2"
            ]
        );
    }

    #[tokio::test]
    async fn test_should_continue_all_from_current_cursor() {
        let table = forum_table();
        let mut chain = table.chain().limit(2);
        let first = chain.scan().await.unwrap();
        assert_eq!(first.len(), 2);

        let rest = chain.scan_all().await.unwrap();
        assert_eq!(subjects(&rest), vec!["S3 Thread 1", "S3 Thread 2"]);
    }

    #[tokio::test]
    async fn test_should_stream_pages_with_filtered_counts() {
        let table = forum_table();
        let mut chain = table
            .chain()
            .filter(Attr::new("LastPostedBy").eq("User A"))
            .limit(2);
        let pages: Vec<_> = chain.pages().unwrap().try_collect().await.unwrap();
        // the limit bounds items read per page, before the filter
        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages.iter().map(|p| p.scanned_count).collect::<Vec<_>>(),
            vec![2, 2, 0]
        );
        assert_eq!(pages.iter().map(|p| p.count).sum::<usize>(), 3);
    }

    #[tokio::test]
    async fn test_should_page_query_and_count() {
        let table = forum_table();
        let mut chain = table
            .chain()
            .partition_key(Key::new("ForumName").eq("Amazon DynamoDB"))
            .limit(1);
        assert_eq!(chain.count_all().await.unwrap(), 2);

        chain.clear();
        assert!(!chain.has_more());
    }

    #[tokio::test]
    async fn test_should_restart_after_clear() {
        let table = forum_table();
        let mut chain = table.chain().limit(3);
        chain.scan().await.unwrap();
        assert!(chain.has_more());

        chain.clear();
        let items = chain.scan_all().await.unwrap();
        assert_eq!(items.len(), 4);
    }
}
