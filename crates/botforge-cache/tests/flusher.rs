//! Tests for the flush schedule and the flusher worker.
//!
//! Uses paused Tokio time so a 60 s interval passes instantly.

use std::sync::Arc;
use std::time::Duration;

use botforge_cache::{DocumentCache, DocumentPath, DocumentStore, FlushConfig, FlushSchedule, spawn_flusher};
use botforge_worker::{Supervisor, WorkerOutcome};
use serde_json::json;

// =========================================================================
// Helpers
// =========================================================================

fn no_jitter(interval_secs: u64) -> FlushConfig {
    FlushConfig {
        interval_secs,
        initial_jitter_ms: 0,
    }
}

async fn wait_until_clean(cache: &DocumentCache, path: &DocumentPath) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while cache.is_dirty(path).await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("document was never flushed");
}

// =========================================================================
// FlushSchedule
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_sweep_fires_after_interval() {
    let start = tokio::time::Instant::now();
    let mut schedule = FlushSchedule::new(no_jitter(60));

    let sweep = schedule.wait_for_sweep().await;

    assert_eq!(sweep, 1);
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    assert_eq!(schedule.sweep_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweeps_are_spaced_by_interval() {
    let start = tokio::time::Instant::now();
    let mut schedule = FlushSchedule::new(no_jitter(10));

    for expected in 1..=3 {
        assert_eq!(schedule.wait_for_sweep().await, expected);
    }
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_initial_jitter_only_delays() {
    let start = tokio::time::Instant::now();
    let mut schedule = FlushSchedule::new(FlushConfig {
        interval_secs: 10,
        initial_jitter_ms: 500,
    });

    schedule.wait_for_sweep().await;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_millis(10_500));
}

// =========================================================================
// Flusher worker
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_flusher_writes_dirty_documents_each_interval() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(DocumentCache::new(DocumentStore::new(dir.path())));
    let p: DocumentPath = "eco/balances".parse().unwrap();
    cache.load(&p, false).await.unwrap();
    cache.write(&p, json!({"Steve": 1})).await.unwrap();

    let supervisor = Supervisor::new();
    let flusher = spawn_flusher(Arc::clone(&cache), &supervisor, no_jitter(60));
    assert_eq!(flusher.label(), "cache-flusher");

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(cache.is_dirty(&p).await);

    wait_until_clean(&cache, &p).await;
    assert_eq!(cache.store().read(&p).await.unwrap(), Some(json!({"Steve": 1})));

    cache.write(&p, json!({"Steve": 2})).await.unwrap();
    wait_until_clean(&cache, &p).await;
    assert_eq!(cache.store().read(&p).await.unwrap(), Some(json!({"Steve": 2})));

    flusher.cancel();
    assert_eq!(flusher.wait().await, WorkerOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_flusher_stops_without_flushing() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(DocumentCache::new(DocumentStore::new(dir.path())));
    let p: DocumentPath = "eco/balances".parse().unwrap();
    cache.load(&p, false).await.unwrap();
    cache.write(&p, json!(1)).await.unwrap();

    let supervisor = Supervisor::new();
    let flusher = spawn_flusher(Arc::clone(&cache), &supervisor, no_jitter(60));
    flusher.cancel();

    assert_eq!(flusher.wait().await, WorkerOutcome::Completed);
    assert!(cache.is_dirty(&p).await);
    assert!(supervisor.is_empty());
}
