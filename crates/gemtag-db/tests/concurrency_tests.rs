//! Concurrency tests for the serial allocator.
//!
//! These run many reservations at once against a file-backed pool (several
//! real SQLite connections) and check that no serial is issued twice.
//! Run with: cargo test -p gemtag-db --test concurrency_tests

use std::collections::BTreeSet;
use std::time::Duration;

use tempfile::TempDir;

use gemtag_db::{AllocatorConfig, Database, DbConfig, RetrySettings, SerialAllocator};

const KEY: &str = "MG-RNG-25";

async fn create_test_db() -> (Database, SerialAllocator, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = DbConfig::new(dir.path().join("gemtag.db"))
        .max_connections(8)
        .busy_timeout(Duration::from_secs(10));
    let db = Database::new(config).await.unwrap();

    let allocator = db.allocator(AllocatorConfig {
        retry: RetrySettings {
            max_retries: 20,
            initial_backoff_ms: 5,
            max_backoff_ms: 200,
        },
        ..AllocatorConfig::default()
    });

    (db, allocator, dir)
}

async fn reserve_concurrently(allocator: &SerialAllocator, key: &str, tasks: usize) -> Vec<u32> {
    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let allocator = allocator.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                allocator
                    .reserve_serials(&key, 1)
                    .await
                    .expect("reservation should succeed")
            })
        })
        .collect();

    let mut serials = Vec::with_capacity(tasks);
    for handle in handles {
        serials.extend(handle.await.unwrap().serials);
    }
    serials
}

// =============================================================================
// Parallel Reservation Tests
// =============================================================================

/// N concurrent single reservations on a fresh key yield exactly 1..=N.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_reservations_from_cold_start() {
    let (db, allocator, _dir) = create_test_db().await;
    let num_tasks = 32;

    let mut serials = reserve_concurrently(&allocator, KEY, num_tasks).await;
    serials.sort_unstable();

    assert_eq!(serials, (1..=num_tasks as u32).collect::<Vec<_>>());

    let counter = db.counters().get(KEY).await.unwrap().unwrap();
    assert_eq!(counter.value, num_tasks as u32);
}

/// Concurrent reservations never share a reused gap.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_reservations_share_no_gaps() {
    let (db, allocator, _dir) = create_test_db().await;

    // Serials 1..=20 saved, then every fourth deleted: gaps {4, 8, 12, 16, 20}.
    let r = allocator.reserve_serials(KEY, 20).await.unwrap();
    let items = allocator
        .commit_batch(&r, r.new_items("WH1").unwrap())
        .await
        .unwrap();
    for item in items.iter().filter(|i| i.serial % 4 == 0) {
        db.items().delete(&item.id).await.unwrap();
    }

    let num_tasks = 12;
    let serials = reserve_concurrently(&allocator, KEY, num_tasks).await;

    let unique: BTreeSet<u32> = serials.iter().copied().collect();
    assert_eq!(unique.len(), num_tasks, "Found duplicate serials");

    // All five gaps are used, the remaining seven extend the counter.
    for gap in [4, 8, 12, 16, 20] {
        assert!(unique.contains(&gap), "gap {gap} was not reused");
    }
    assert_eq!(unique.iter().next_back().copied(), Some(27));

    let counter = db.counters().get(KEY).await.unwrap().unwrap();
    assert_eq!(counter.value, 27);
}

/// Parallel reservations on different keys don't interfere.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_reservations_on_different_keys() {
    let (_db, allocator, _dir) = create_test_db().await;
    let keys = ["MG-RNG-25", "MG-BNG-25", "MG-NKL-25", "MG-RNG-24"];
    let per_key = 10;

    let handles: Vec<_> = keys
        .iter()
        .map(|key| {
            let allocator = allocator.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                let mut serials = reserve_concurrently(&allocator, &key, per_key).await;
                serials.sort_unstable();
                serials
            })
        })
        .collect();

    for handle in handles {
        let serials = handle.await.unwrap();
        assert_eq!(serials, (1..=per_key as u32).collect::<Vec<_>>());
    }
}

/// Concurrent reserve-then-commit flows save every item without collisions.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_batches_commit_cleanly() {
    let (db, allocator, _dir) = create_test_db().await;
    let num_tasks = 8;
    let batch = 5;

    let handles: Vec<_> = (0..num_tasks)
        .map(|_| {
            let allocator = allocator.clone();
            tokio::spawn(async move {
                let r = allocator.reserve_serials(KEY, batch).await.unwrap();
                allocator
                    .commit_batch(&r, r.new_items("WH1").unwrap())
                    .await
                    .unwrap()
                    .len()
            })
        })
        .collect();

    let mut saved = 0;
    for handle in handles {
        saved += handle.await.unwrap();
    }

    assert_eq!(saved, num_tasks * batch as usize);
    assert_eq!(
        db.items().count(Some(("RNG", 2025))).await.unwrap() as usize,
        saved
    );
    assert_eq!(db.holds().count_live(KEY).await.unwrap(), 0);
}
