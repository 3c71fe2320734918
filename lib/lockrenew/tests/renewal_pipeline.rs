// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs of the renewal pipeline against in-memory storage.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use rstest::rstest;

use lockrenew::storage::MemoryStorage;
use lockrenew::{Driver, RenewalError, RenewalPolicy, RetentionMode, StorageError};

const DAY: u64 = 24 * 3600;

fn policy() -> RenewalPolicy {
    RenewalPolicy::new(Duration::from_secs(30 * DAY), Duration::from_secs(90 * DAY))
}

fn driver(storage: &Arc<MemoryStorage>) -> Driver {
    Driver::new(storage.clone(), "vault", policy())
}

#[tokio::test]
async fn test_mixed_bucket_renews_only_due_objects() {
    let now = Utc::now();
    let not_due = now + TimeDelta::days(100);
    let storage = Arc::new(
        MemoryStorage::new()
            .with_object("a", now - TimeDelta::hours(1))
            .with_object("b", not_due)
            .with_object("c", now + TimeDelta::days(1)),
    );

    let before = Utc::now();
    let summary = driver(&storage).run().await.unwrap();
    let after = Utc::now();

    assert_eq!(summary.dispatched, 3);
    assert_eq!(summary.renewed, 2);
    assert_eq!(summary.skipped, 1);

    let writes = storage.writes();
    let written: HashSet<_> = writes.iter().map(|w| w.key.as_str()).collect();
    assert_eq!(written, HashSet::from(["a", "c"]));

    for write in &writes {
        assert_eq!(write.mode, RetentionMode::Compliance);
        assert!(write.retain_until >= before + TimeDelta::days(90));
        assert!(write.retain_until <= after + TimeDelta::days(90));
    }
    assert_eq!(storage.retention("b").unwrap().retain_until, not_due);
}

#[tokio::test]
async fn test_every_page_is_processed() {
    let soon = Utc::now() + TimeDelta::days(2);
    let storage = MemoryStorage::new().with_page_size(2);
    for key in ["k1", "k2", "k3", "k4", "k5"] {
        storage.insert(key, soon);
    }
    let storage = Arc::new(storage);

    let summary = driver(&storage).run().await.unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.dispatched, 5);
    assert_eq!(storage.retrieval_count(), 5);
    assert_eq!(storage.write_count(), 5);
}

#[rstest]
#[case::none_due(TimeDelta::days(60), 0)]
#[case::all_due(TimeDelta::days(10), 40)]
#[case::all_expired(TimeDelta::days(-10), 40)]
#[tokio::test]
async fn test_uniform_bucket(#[case] offset: TimeDelta, #[case] expected_writes: usize) {
    let retain_until = Utc::now() + offset;
    let storage = MemoryStorage::new().with_page_size(7);
    for i in 0..40 {
        storage.insert(format!("obj-{i:02}"), retain_until);
    }
    let storage = Arc::new(storage);

    let summary = driver(&storage).run().await.unwrap();

    assert_eq!(summary.dispatched, 40);
    assert_eq!(summary.renewed, expected_writes);
    let distinct: HashSet<_> = storage.writes().into_iter().map(|w| w.key).collect();
    assert_eq!(distinct.len(), expected_writes);
}

#[tokio::test]
async fn test_retrieval_failure_fails_the_run() {
    let soon = Utc::now() + TimeDelta::days(1);
    let storage = Arc::new(
        MemoryStorage::new()
            .with_object("good", soon)
            .with_object("broken", soon)
            .fail_retrieval("broken"),
    );

    let err = driver(&storage).run().await.unwrap_err();

    assert!(matches!(err, RenewalError::Retrieval { .. }));
    assert_eq!(err.key(), Some("broken"));
}

#[tokio::test]
async fn test_object_without_lock_fails_the_run() {
    let storage = Arc::new(MemoryStorage::new().with_unlocked_object("plain"));

    let err = driver(&storage).run().await.unwrap_err();

    assert!(matches!(
        err,
        RenewalError::Retrieval {
            source: StorageError::NoRetention { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_update_failure_fails_the_run() {
    let storage = Arc::new(
        MemoryStorage::new()
            .with_object("locked", Utc::now())
            .fail_update("locked"),
    );

    let err = driver(&storage).run().await.unwrap_err();

    assert!(matches!(err, RenewalError::Update { .. }));
    assert!(err.to_string().contains("locked"));
}

#[tokio::test]
async fn test_failure_does_not_cancel_in_flight_siblings() {
    let soon = Utc::now() + TimeDelta::days(1);
    let storage = Arc::new(
        MemoryStorage::new()
            .with_latency(Duration::from_millis(50))
            .with_object("a", soon)
            .with_object("b", soon)
            .fail_update("a"),
    );

    let err = driver(&storage).run().await.unwrap_err();
    assert_eq!(err.key(), Some("a"));

    // The run returned without cancelling `b`; its write still lands.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let writes = storage.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].key, "b");
}

#[tokio::test]
async fn test_abort_grace_cancels_in_flight_siblings() {
    let soon = Utc::now() + TimeDelta::days(1);
    let storage = Arc::new(
        MemoryStorage::new()
            .with_latency(Duration::from_millis(50))
            .with_object("a", soon)
            .with_object("b", soon)
            .fail_retrieval("a"),
    );

    let err = driver(&storage)
        .with_abort_grace(Some(Duration::from_secs(1)))
        .run()
        .await
        .unwrap_err();
    assert_eq!(err.key(), Some("a"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(storage.write_count(), 0);
    assert_eq!(storage.retention("b").unwrap().retain_until, soon);
}

#[tokio::test]
async fn test_listing_failure_midway_fails_the_run() {
    let far = Utc::now() + TimeDelta::days(365);
    let storage = MemoryStorage::new().with_page_size(3).fail_listing_at_page(2);
    for i in 0..12 {
        storage.insert(format!("obj-{i:02}"), far);
    }
    let storage = Arc::new(storage);

    let err = driver(&storage).run().await.unwrap_err();

    assert!(matches!(err, RenewalError::List { ref bucket, .. } if bucket == "vault"));
    // Only keys from pages before the failure were ever looked at.
    assert!(storage.retrieval_count() <= 6);
}

#[tokio::test]
async fn test_bounded_concurrency_completes_all_objects() {
    let soon = Utc::now() + TimeDelta::days(1);
    let storage = MemoryStorage::new()
        .with_page_size(10)
        .with_latency(Duration::from_millis(5));
    for i in 0..60 {
        storage.insert(format!("obj-{i:02}"), soon);
    }
    let storage = Arc::new(storage);

    let summary = driver(&storage)
        .with_max_concurrency(Some(4))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.renewed, 60);
    assert!(storage.peak_in_flight() <= 4);
}

#[tokio::test]
async fn test_unbounded_run_overlaps_requests() {
    let soon = Utc::now() + TimeDelta::days(1);
    let storage = MemoryStorage::new().with_latency(Duration::from_millis(20));
    for i in 0..25 {
        storage.insert(format!("obj-{i:02}"), soon);
    }
    let storage = Arc::new(storage);

    let summary = driver(&storage).run().await.unwrap();

    assert_eq!(summary.renewed, 25);
    assert!(storage.peak_in_flight() > 1);
}

#[tokio::test]
async fn test_governance_mode_is_written() {
    let storage = Arc::new(MemoryStorage::new().with_object("a", Utc::now()));

    Driver::new(
        storage.clone(),
        "vault",
        policy().with_mode(RetentionMode::Governance),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(storage.writes()[0].mode, RetentionMode::Governance);
}
