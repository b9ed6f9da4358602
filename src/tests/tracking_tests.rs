#[cfg(test)]
mod tests {
    use crate::{
        db::{connection, transaction, user},
        models::TransactionRecord,
        tests::{create_test_user, link_count, sample_record, test_config, test_pool},
        tracking::TransactionTracker,
    };
    use sqlx::SqlitePool;
    use std::sync::Arc;
    use std::time::Duration;

    async fn stored_records(pool: &SqlitePool, ns: &[u64]) -> Vec<TransactionRecord> {
        let mut records = Vec::new();
        for n in ns {
            let record = sample_record(*n);
            transaction::insert(pool, &record).await.unwrap();
            records.push(record);
        }
        records
    }

    fn tracker(pool: &SqlitePool) -> TransactionTracker {
        TransactionTracker::new(pool.clone(), Duration::from_secs(60))
    }

    fn hashes(records: &[TransactionRecord]) -> Vec<String> {
        records.iter().map(|r| r.hash.clone()).collect()
    }

    /// On-disk WAL database with the production pool settings, so writers
    /// actually contend for the lock.
    async fn file_backed_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = test_config();
        config.database_url = format!("sqlite://{}", dir.path().join("tracking.db").display());
        config.db_max_connections = 8;
        let pool = connection::establish_connection(&config)
            .await
            .expect("failed to open database");
        (dir, pool)
    }

    #[tokio::test]
    async fn test_overlapping_batches_are_merged_without_duplicates() {
        let pool = test_pool().await;
        let user_id = create_test_user(&pool, "alice").await;
        let records = stored_records(&pool, &[1, 2, 3]).await;
        let tracker = tracker(&pool);

        tracker.track(user_id, &records[0..2]).await.unwrap();
        tracker.track(user_id, &records[1..3]).await.unwrap();

        let history = tracker.get_for_user(user_id).await.unwrap();
        assert_eq!(history, records);
    }

    #[tokio::test]
    async fn test_duplicates_within_one_batch_are_stored_once() {
        let pool = test_pool().await;
        let user_id = create_test_user(&pool, "bob").await;
        let records = stored_records(&pool, &[4]).await;
        let tracker = tracker(&pool);

        let batch = vec![records[0].clone(), records[0].clone()];
        tracker.track(user_id, &batch).await.unwrap();

        assert_eq!(link_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_user_is_a_no_op() {
        let pool = test_pool().await;
        let records = stored_records(&pool, &[5]).await;
        let tracker = tracker(&pool);

        tracker.track(4242, &records).await.unwrap();

        assert_eq!(link_count(&pool).await, 0);
        assert!(tracker.get_for_user(4242).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_leaves_history_unchanged() {
        let pool = test_pool().await;
        let user_id = create_test_user(&pool, "carol").await;
        let records = stored_records(&pool, &[6]).await;
        let tracker = tracker(&pool);

        tracker.track(user_id, &records).await.unwrap();
        tracker.track(user_id, &[]).await.unwrap();

        assert_eq!(tracker.get_for_user(user_id).await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_concurrent_tracks_keep_the_union() {
        let pool = test_pool().await;
        let user_id = create_test_user(&pool, "dave").await;
        let records = stored_records(&pool, &(10..20).collect::<Vec<_>>()).await;
        let tracker = Arc::new(tracker(&pool));

        let mut handles = Vec::new();
        for chunk in records.chunks(3) {
            let tracker = tracker.clone();
            let chunk = chunk.to_vec();
            handles.push(tokio::spawn(async move { tracker.track(user_id, &chunk).await }));
        }
        // Overlaps every other batch.
        let everything = {
            let tracker = tracker.clone();
            let all = records.clone();
            tokio::spawn(async move { tracker.track(user_id, &all).await })
        };

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        everything.await.unwrap().unwrap();

        let mut tracked = hashes(&tracker.get_for_user(user_id).await.unwrap());
        let mut expected = hashes(&records);
        tracked.sort();
        expected.sort();
        assert_eq!(tracked, expected);
        assert_eq!(link_count(&pool).await, records.len() as i64);
    }

    #[tokio::test]
    async fn test_histories_are_per_user() {
        let pool = test_pool().await;
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;
        let records = stored_records(&pool, &[30, 31]).await;
        let tracker = tracker(&pool);

        tracker.track(alice, &records[0..1]).await.unwrap();
        tracker.track(bob, &records[1..2]).await.unwrap();

        assert_eq!(hashes(&tracker.get_for_user(alice).await.unwrap()), hashes(&records[0..1]));
        assert_eq!(hashes(&tracker.get_for_user(bob).await.unwrap()), hashes(&records[1..2]));
    }

    #[tokio::test]
    async fn test_deleting_user_removes_their_links_only() {
        let pool = test_pool().await;
        let alice = create_test_user(&pool, "alice").await;
        let records = stored_records(&pool, &[40, 41]).await;
        let tracker = tracker(&pool);
        tracker.track(alice, &records).await.unwrap();

        assert!(user::delete_user(&pool, alice).await.unwrap());

        assert_eq!(link_count(&pool).await, 0);
        assert_eq!(transaction::get_all(&pool).await.unwrap().len(), 2);
        assert!(tracker.get_for_user(alice).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_tracks_for_different_users_all_land() {
        let (_dir, pool) = file_backed_pool().await;
        let tracker = Arc::new(tracker(&pool));

        let mut users = Vec::new();
        for i in 0..16 {
            users.push(create_test_user(&pool, &format!("user{}", i)).await);
        }
        let records = stored_records(&pool, &(100..180).collect::<Vec<_>>()).await;

        for round in records.chunks(users.len()) {
            let mut handles = Vec::new();
            for (user_id, record) in users.iter().copied().zip(round.iter().cloned()) {
                let tracker = tracker.clone();
                handles.push(tokio::spawn(async move { tracker.track(user_id, &[record]).await }));
            }
            for handle in handles {
                handle.await.unwrap().expect("track failed under contention");
            }
        }

        for (i, user_id) in users.iter().enumerate() {
            let expected: Vec<String> = records.iter().skip(i).step_by(users.len()).map(|r| r.hash.clone()).collect();
            assert_eq!(hashes(&tracker.get_for_user(*user_id).await.unwrap()), expected);
        }
        assert_eq!(link_count(&pool).await, records.len() as i64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_tracks_for_one_user_keep_the_union_on_disk() {
        let (_dir, pool) = file_backed_pool().await;
        let user_id = create_test_user(&pool, "erin").await;
        let records = stored_records(&pool, &(200..230).collect::<Vec<_>>()).await;
        let tracker = Arc::new(tracker(&pool));

        // Overlapping windows of five.
        let mut handles = Vec::new();
        for start in (0..records.len()).step_by(3) {
            let window = records[start..(start + 5).min(records.len())].to_vec();
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move { tracker.track(user_id, &window).await }));
        }
        for handle in handles {
            handle.await.unwrap().expect("track failed under contention");
        }

        let mut tracked = hashes(&tracker.get_for_user(user_id).await.unwrap());
        let mut expected = hashes(&records);
        tracked.sort();
        expected.sort();
        assert_eq!(tracked, expected);
    }

    #[tokio::test]
    async fn test_batch_order_is_kept() {
        let pool = test_pool().await;
        let user_id = create_test_user(&pool, "frank").await;
        let records = stored_records(&pool, &[53, 51, 52]).await;
        let tracker = tracker(&pool);

        tracker.track(user_id, &records).await.unwrap();

        assert_eq!(tracker.get_for_user(user_id).await.unwrap(), records);
    }
}
