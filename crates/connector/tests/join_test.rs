//! Per-key joins through the single-partition executor.
//!
//! # Test Strategy
//!
//! 1. **Semantics**: inner and left outer results for known rows
//! 2. **Request economy**: in-flight sharing, caching, concurrency bound
//! 3. **Failures**: retries, timeouts, rejected requests, cancellation
//! 4. **Dataset execution**: partition layout kept, failures attributed

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{read_val, snapshot, IntWriter, MemoryStore, TextKeyWriter};
use connector::{
    ClusterMetadata, ConnectorConfig, Error, JoinMode, JoinSpec, PartitionedDataset,
    RetryPolicy, RowReader, SinglePartitionJoinExecutor,
};
use tokio_util::sync::CancellationToken;

fn config() -> ConnectorConfig {
    ConnectorConfig {
        retry: RetryPolicy::immediate(3),
        ..ConnectorConfig::default()
    }
}

fn executor(
    store: &Arc<MemoryStore>,
    config: &ConnectorConfig,
) -> Arc<SinglePartitionJoinExecutor<i32, String>> {
    let metadata = ClusterMetadata::from_snapshot(snapshot(1)).unwrap();
    let reader: Arc<dyn RowReader<String>> = Arc::new(read_val);
    Arc::new(
        SinglePartitionJoinExecutor::new(
            &metadata,
            &JoinSpec::new("ks", "t").select(["val"]),
            IntWriter::new(),
            reader,
            store.clone(),
            config,
        )
        .unwrap(),
    )
}

// ============================================================================
// Semantics
// ============================================================================

#[tokio::test]
async fn test_inner_and_left_outer() {
    let store = MemoryStore::with_rows(&[(1, "x"), (2, "y")]);
    let executor = executor(&store, &config());
    let cancel = CancellationToken::new();

    let inner = executor
        .execute_partition(vec![1, 3], JoinMode::Inner, &cancel)
        .await
        .unwrap();
    assert_eq!(inner, vec![(1, Some("x".to_string()))]);

    let left = executor
        .execute_partition(vec![1, 3], JoinMode::LeftOuter, &cancel)
        .await
        .unwrap();
    assert_eq!(left, vec![(1, Some("x".to_string())), (3, None)]);
}

#[tokio::test]
async fn test_every_matching_row_is_emitted() {
    let store = MemoryStore::with_rows(&[(1, "x"), (1, "x2"), (2, "y")]);
    let executor = executor(&store, &config());
    let joined = executor
        .execute_partition(vec![2, 1], JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        joined,
        vec![
            (2, Some("y".to_string())),
            (1, Some("x".to_string())),
            (1, Some("x2".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_empty_partition_sends_nothing() {
    let store = MemoryStore::with_rows(&[(1, "x")]);
    let executor = executor(&store, &config());
    let joined = executor
        .execute_partition(Vec::new(), JoinMode::LeftOuter, &CancellationToken::new())
        .await
        .unwrap();
    assert!(joined.is_empty());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_writer_without_join_column_is_rejected() {
    let metadata = ClusterMetadata::from_snapshot(snapshot(1)).unwrap();
    let store = MemoryStore::with_rows(&[]);
    let reader: Arc<dyn RowReader<String>> = Arc::new(read_val);
    let result = SinglePartitionJoinExecutor::<i32, String>::new(
        &metadata,
        &JoinSpec::new("ks", "t").on(["val"]),
        IntWriter::new(),
        reader,
        store,
        &config(),
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[tokio::test]
async fn test_mistyped_key_fails_before_any_request() {
    let metadata = ClusterMetadata::from_snapshot(snapshot(1)).unwrap();
    let store = MemoryStore::with_rows(&[(1, "x")]);
    let reader: Arc<dyn RowReader<String>> = Arc::new(read_val);
    let executor = SinglePartitionJoinExecutor::<i32, String>::new(
        &metadata,
        &JoinSpec::new("ks", "t"),
        TextKeyWriter::new(),
        reader,
        store.clone(),
        &config(),
    )
    .unwrap();

    let err = executor
        .execute_partition(vec![1], JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }));
    assert_eq!(store.calls(), 0);
}

// ============================================================================
// Request economy
// ============================================================================

#[tokio::test]
async fn test_duplicate_keys_share_one_request() {
    let store = MemoryStore::with_rows(&[(1, "x"), (2, "y")]);
    let config = ConnectorConfig {
        fetch_cache_capacity: 0,
        ..config()
    };
    let executor = executor(&store, &config);

    let joined = executor
        .execute_partition(vec![1, 1, 2, 1, 2], JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(joined.len(), 5);
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_cache_answers_repeated_keys() {
    let records = vec![1, 2, 1, 2, 1];

    let cached_store = MemoryStore::with_rows(&[(1, "x"), (2, "y")]);
    let cached = ConnectorConfig {
        max_concurrent_requests: 1,
        fetch_cache_capacity: 16,
        ..config()
    };
    executor(&cached_store, &cached)
        .execute_partition(records.clone(), JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(cached_store.calls(), 2);

    let uncached_store = MemoryStore::with_rows(&[(1, "x"), (2, "y")]);
    let uncached = ConnectorConfig {
        fetch_cache_capacity: 0,
        ..cached
    };
    executor(&uncached_store, &uncached)
        .execute_partition(records, JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(uncached_store.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_requests_are_bounded() {
    let rows: Vec<(i32, &str)> = (0..40).map(|pk| (pk, "v")).collect();
    let store = MemoryStore::with_rows(&rows);
    store.set_delay(Duration::from_millis(10));
    let config = ConnectorConfig {
        max_concurrent_requests: 4,
        ..config()
    };

    let joined = executor(&store, &config)
        .execute_partition((0..40).collect(), JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(joined.len(), 40);
    assert_eq!(store.calls(), 40);
    assert!(store.max_in_flight() <= 4, "saw {}", store.max_in_flight());
    assert!(store.max_in_flight() > 1);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let store = MemoryStore::with_rows(&[(1, "x")]);
    store.fail_next(2);
    let joined = executor(&store, &config())
        .execute_partition(vec![1], JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(joined, vec![(1, Some("x".to_string()))]);
    assert_eq!(store.calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_are_store_unavailable() {
    let store = MemoryStore::with_rows(&[(1, "x")]);
    store.fail_next(10);
    let err = executor(&store, &config())
        .execute_partition(vec![1], JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        Error::StoreUnavailable {
            keyspace,
            table,
            key,
            attempts,
            ..
        } => {
            assert_eq!((keyspace.as_str(), table.as_str()), ("ks", "t"));
            assert_eq!(key, "1");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected StoreUnavailable, got {other}"),
    }
    assert_eq!(store.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_each_attempt_times_out() {
    let store = MemoryStore::with_rows(&[(1, "x")]);
    store.hang();
    let config = ConnectorConfig {
        request_timeout: Duration::from_millis(50),
        retry: RetryPolicy::immediate(2),
        ..config()
    };
    let err = executor(&store, &config)
        .execute_partition(vec![1], JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        Error::StoreUnavailable { attempts, reason, .. } => {
            assert_eq!(attempts, 2);
            assert!(reason.contains("timed out"), "{reason}");
        }
        other => panic!("expected StoreUnavailable, got {other}"),
    }
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_rejected_request_is_not_retried() {
    let store = MemoryStore::with_rows(&[(1, "x")]);
    store.reject(1);
    let err = executor(&store, &config())
        .execute_partition(vec![1], JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert_eq!(store.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_drops_in_flight_requests() {
    let store = MemoryStore::with_rows(&[(1, "x")]);
    store.hang();
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
    }

    let err = executor(&store, &config())
        .execute_partition(vec![1, 2, 3], JoinMode::Inner, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(store.calls(), 3);
}

// ============================================================================
// Dataset execution
// ============================================================================

#[tokio::test]
async fn test_execute_keeps_partition_layout() {
    let store = MemoryStore::with_rows(&[(1, "x"), (2, "y")]);
    let executor = executor(&store, &config());
    let dataset = PartitionedDataset::from_partitions(vec![vec![1, 3], vec![], vec![2]]);

    let left = executor
        .left_outer_join(dataset.clone(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(left.num_partitions(), 3);
    assert_eq!(
        left.partitions()[0].records,
        vec![(1, Some("x".to_string())), (3, None)]
    );
    assert!(left.partitions()[1].records.is_empty());
    assert_eq!(left.partitions()[2].records, vec![(2, Some("y".to_string()))]);

    let inner = executor
        .inner_join(dataset, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        inner.into_records(),
        vec![(1, "x".to_string()), (2, "y".to_string())]
    );
}

#[tokio::test]
async fn test_failing_partition_is_reported() {
    let store = MemoryStore::with_rows(&[(1, "x"), (2, "y")]);
    store.reject(2);
    let executor = executor(&store, &config());
    let dataset = PartitionedDataset::from_partitions(vec![vec![1], vec![2]]);

    let err = executor
        .execute(dataset, JoinMode::Inner, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        Error::PartitionFailed { partition, source } => {
            assert_eq!(partition, 1);
            assert!(matches!(*source, Error::Configuration(_)));
        }
        other => panic!("expected PartitionFailed, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_job_reports_cancelled() {
    let store = MemoryStore::with_rows(&[(1, "x")]);
    store.hang();
    let executor = executor(&store, &config());
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
    }

    let dataset = PartitionedDataset::from_partitions(vec![vec![1], vec![2]]);
    let err = executor
        .execute(dataset, JoinMode::LeftOuter, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}
