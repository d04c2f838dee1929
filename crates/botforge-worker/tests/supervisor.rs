//! Integration tests for the worker supervisor.
//!
//! Time-dependent tests use `start_paused` so sleeps resolve instantly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use botforge_worker::{BoxError, Supervisor, WorkerFailure, WorkerOptions, WorkerOutcome};
use tokio::sync::oneshot;

// =========================================================================
// Helpers
// =========================================================================

#[derive(Debug, thiserror::Error)]
#[error("lookup failed")]
struct LookupFailed(#[source] std::io::Error);

fn failing() -> Result<(), BoxError> {
    Err(Box::new(LookupFailed(std::io::Error::other("no such player"))))
}

// =========================================================================
// Outcomes
// =========================================================================

#[tokio::test]
async fn test_spawn_ok_procedure_completes() {
    let sup = Supervisor::new();
    let handle = sup.spawn("ok", |_ctx| async { Ok(()) });

    assert_eq!(handle.label(), "ok");
    assert_eq!(handle.wait().await, WorkerOutcome::Completed);
    assert!(handle.is_finished());
    assert_eq!(handle.outcome(), Some(WorkerOutcome::Completed));
}

#[tokio::test]
async fn test_spawn_error_reports_full_chain_to_callback() {
    let sup = Supervisor::new();
    let seen = Arc::new(std::sync::Mutex::new(Vec::<WorkerFailure>::new()));
    let sink = Arc::clone(&seen);

    let handle = sup.spawn_with(
        WorkerOptions::new("lookup").on_failure(move |f| sink.lock().unwrap().push(f.clone())),
        |_ctx| async { failing() },
    );

    let outcome = handle.wait().await;
    let expected = WorkerFailure::Error {
        label: "lookup".into(),
        message: "lookup failed: no such player".into(),
    };
    assert_eq!(outcome, WorkerOutcome::Failed(expected.clone()));
    assert_eq!(*seen.lock().unwrap(), vec![expected]);
}

#[tokio::test]
async fn test_spawn_panic_is_caught_and_reported() {
    let sup = Supervisor::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let handle = sup.spawn_with(
        WorkerOptions::new("explodes").on_failure(move |f| {
            assert!(matches!(f, WorkerFailure::Panicked { .. }));
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        |_ctx| async { panic!("kaboom") },
    );

    match handle.wait().await {
        WorkerOutcome::Failed(WorkerFailure::Panicked { label, message }) => {
            assert_eq!(label, "explodes");
            assert_eq!(message, "kaboom");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_worker_does_not_affect_sibling() {
    let sup = Supervisor::new();
    let (tx, rx) = oneshot::channel::<u32>();

    let sibling = sup.spawn("sibling", move |_ctx| async move {
        let value = rx.await?;
        assert_eq!(value, 7);
        Ok::<(), BoxError>(())
    });
    let bad = sup.spawn("bad", |_ctx| async { panic!("bad worker") });
    let erring = sup.spawn("erring", |_ctx| async { failing() });

    assert!(bad.wait().await.is_failure());
    assert!(erring.wait().await.is_failure());
    assert!(!sibling.is_finished());

    tx.send(7).unwrap();
    assert_eq!(sibling.wait().await, WorkerOutcome::Completed);
}

#[tokio::test]
async fn test_failure_callback_panic_still_records_outcome() {
    let sup = Supervisor::new();
    let handle = sup.spawn_with(
        WorkerOptions::new("noisy").on_failure(|_| panic!("callback broke")),
        |_ctx| async { failing() },
    );

    assert!(handle.wait().await.is_failure());
    assert!(sup.is_empty());
}

// =========================================================================
// Cancellation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_cooperative_worker_stops_cleanly() {
    let sup = Supervisor::new();
    let loops = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loops);

    let handle = sup.spawn("poller", move |ctx| async move {
        while !ctx.is_cancelled() {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    });

    tokio::time::sleep(Duration::from_millis(55)).await;
    handle.cancel();

    assert_eq!(handle.wait().await, WorkerOutcome::Completed);
    assert!(loops.load(Ordering::SeqCst) >= 5);
}

#[tokio::test(start_paused = true)]
async fn test_request_termination_on_suspended_worker_terminates() {
    let sup = Supervisor::new();
    let reached_end = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&reached_end);

    let handle = sup.spawn("sleeper", move |_ctx| async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        flag.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    tokio::task::yield_now().await;
    handle.request_termination();

    assert_eq!(handle.wait().await, WorkerOutcome::Terminated);
    assert_eq!(reached_end.load(Ordering::SeqCst), 0);
    assert!(sup.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_supervisor_request_termination_by_id() {
    let sup = Supervisor::new();
    let handle = sup.spawn("sleeper", |_ctx| async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    });

    assert!(sup.request_termination(handle.id()));
    assert_eq!(handle.wait().await, WorkerOutcome::Terminated);
    assert!(!sup.request_termination(handle.id()));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all_reaches_every_worker() {
    let sup = Supervisor::new();
    let handles: Vec<_> = (0..3)
        .map(|i| {
            sup.spawn(format!("w{i}"), |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
        })
        .collect();

    tokio::task::yield_now().await;
    assert_eq!(sup.len(), 3);

    sup.cancel_all();
    for handle in &handles {
        assert_eq!(handle.wait().await, WorkerOutcome::Completed);
    }
    assert!(sup.is_empty());
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_active_lists_running_workers_until_they_finish() {
    let sup = Supervisor::new();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = sup.spawn("session[Steve]", move |_ctx| async move {
        rx.await?;
        Ok::<(), BoxError>(())
    });

    let active = sup.active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].0, handle.id());
    assert_eq!(active[0].1, "session[Steve]");

    tx.send(()).unwrap();
    handle.wait().await;
    assert!(sup.active().is_empty());
}

#[tokio::test]
async fn test_dropped_handle_leaves_worker_running() {
    let sup = Supervisor::new();
    let (tx, rx) = oneshot::channel::<()>();
    let (done_tx, done_rx) = oneshot::channel::<()>();

    drop(sup.spawn("detached", move |_ctx| async move {
        rx.await?;
        let _ = done_tx.send(());
        Ok::<(), BoxError>(())
    }));

    assert_eq!(sup.len(), 1);
    tx.send(()).unwrap();
    done_rx.await.unwrap();
}

#[tokio::test]
async fn test_clones_share_registry() {
    let sup = Supervisor::new();
    let other = sup.clone();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = other.spawn("shared", move |_ctx| async move {
        rx.await?;
        Ok::<(), BoxError>(())
    });
    assert_eq!(sup.len(), 1);

    tx.send(()).unwrap();
    handle.wait().await;
    assert!(sup.is_empty());
}

// =========================================================================
// Blocking workers
// =========================================================================

#[tokio::test]
async fn test_spawn_blocking_error_is_isolated() {
    let sup = Supervisor::new();
    let handle = sup.spawn_blocking("stdin", |_ctx| failing());

    match handle.wait().await {
        WorkerOutcome::Failed(WorkerFailure::Error { label, .. }) => assert_eq!(label, "stdin"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_spawn_blocking_sees_cooperative_cancel() {
    let sup = Supervisor::new();
    let handle = sup.spawn_blocking("spinner", |ctx| {
        while !ctx.is_cancelled() {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    });

    handle.cancel();
    assert_eq!(handle.wait().await, WorkerOutcome::Completed);
}
