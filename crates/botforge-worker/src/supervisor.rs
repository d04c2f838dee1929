//! The supervisor: spawns workers, isolates their failures, tracks who is alive.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::error::panic_message;
use crate::{BoxError, WorkerContext, WorkerFailure, WorkerHandle, WorkerId, WorkerOutcome, error_chain};

/// Invoked with the failure detail when a worker errors or panics.
pub type FailureCallback = Arc<dyn Fn(&WorkerFailure) + Send + Sync>;

/// Spawn options beyond the label.
#[derive(Clone)]
pub struct WorkerOptions {
    label: String,
    on_failure: Option<FailureCallback>,
}

impl WorkerOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            on_failure: None,
        }
    }

    /// Sets a callback run (on the supervising task) when the worker fails.
    pub fn on_failure(mut self, callback: impl Fn(&WorkerFailure) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for WorkerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerOptions")
            .field("label", &self.label)
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Registry entry for a live worker.
struct WorkerEntry {
    label: Arc<str>,
    token: CancellationToken,
    abort: AbortHandle,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    workers: Mutex<HashMap<WorkerId, WorkerEntry>>,
}

/// Spawns and tracks supervised workers.
///
/// Cloning is cheap and every clone shares the same registry, so the
/// supervisor can be handed to plugins, the cache flusher, and the
/// packet dispatcher alike.
#[derive(Clone, Default)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns an async worker with the given label.
    pub fn spawn<F, Fut>(&self, label: impl Into<String>, procedure: F) -> WorkerHandle
    where
        F: FnOnce(WorkerContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.spawn_with(WorkerOptions::new(label), procedure)
    }

    /// Spawns an async worker with full options.
    pub fn spawn_with<F, Fut>(&self, options: WorkerOptions, procedure: F) -> WorkerHandle
    where
        F: FnOnce(WorkerContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let (id, label, token) = self.allocate(&options.label);
        let ctx = WorkerContext::new(id, Arc::clone(&label), token.clone());
        let task = tokio::spawn(async move { procedure(ctx).await });
        self.supervise(id, label, token, options.on_failure, task)
    }

    /// Spawns a synchronous worker on the blocking pool.
    ///
    /// Failure isolation and cooperative cancellation work as for
    /// [`spawn`](Self::spawn). Forced termination does not: once the
    /// closure is running it cannot be interrupted.
    pub fn spawn_blocking<F>(&self, label: impl Into<String>, procedure: F) -> WorkerHandle
    where
        F: FnOnce(WorkerContext) -> Result<(), BoxError> + Send + 'static,
    {
        let label: String = label.into();
        let (id, label, token) = self.allocate(&label);
        let ctx = WorkerContext::new(id, Arc::clone(&label), token.clone());
        let task = tokio::task::spawn_blocking(move || procedure(ctx));
        self.supervise(id, label, token, None, task)
    }

    /// Forcibly terminates a live worker by id. Returns `false` if no such
    /// worker is alive. Same caveats as [`WorkerHandle::request_termination`].
    pub fn request_termination(&self, id: WorkerId) -> bool {
        let workers = self.workers();
        match workers.get(&id) {
            Some(entry) => {
                tracing::warn!(worker = %id, label = %entry.label, "forced termination requested");
                entry.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Signals cooperative cancellation to every live worker.
    pub fn cancel_all(&self) {
        let workers = self.workers();
        tracing::debug!(count = workers.len(), "cancelling all workers");
        for entry in workers.values() {
            entry.token.cancel();
        }
    }

    /// Live workers as `(id, label)`, oldest first.
    pub fn active(&self) -> Vec<(WorkerId, String)> {
        let mut out: Vec<_> = self
            .workers()
            .iter()
            .map(|(id, entry)| (*id, entry.label.to_string()))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// Number of live workers.
    pub fn len(&self) -> usize {
        self.workers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- internals ----------------------------------------------------------

    fn allocate(&self, label: &str) -> (WorkerId, Arc<str>, CancellationToken) {
        let id = WorkerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        (id, Arc::from(label), CancellationToken::new())
    }

    /// The registry lock is never held across an await or while user code
    /// runs, so a poisoned lock only means a panic inside this module; the
    /// map itself is still consistent.
    fn workers(&self) -> MutexGuard<'_, HashMap<WorkerId, WorkerEntry>> {
        self.inner
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers the task and spawns the task that awaits it.
    ///
    /// Registration happens before the supervising task exists, so the
    /// removal always follows the insert even when the worker finishes
    /// immediately.
    fn supervise(
        &self,
        id: WorkerId,
        label: Arc<str>,
        token: CancellationToken,
        on_failure: Option<FailureCallback>,
        task: JoinHandle<Result<(), BoxError>>,
    ) -> WorkerHandle {
        let abort = task.abort_handle();
        self.workers().insert(
            id,
            WorkerEntry {
                label: Arc::clone(&label),
                token: token.clone(),
                abort: abort.clone(),
            },
        );
        tracing::debug!(worker = %id, %label, "worker spawned");

        let (outcome_tx, outcome_rx) = watch::channel(None);
        let supervisor = self.clone();
        let watched_label = Arc::clone(&label);
        tokio::spawn(async move {
            let outcome = classify(id, &watched_label, task.await);
            if let (WorkerOutcome::Failed(failure), Some(callback)) = (&outcome, &on_failure) {
                run_callback(id, callback, failure);
            }
            supervisor.workers().remove(&id);
            let _ = outcome_tx.send(Some(outcome));
        });

        WorkerHandle::new(id, label, token, abort, outcome_rx)
    }
}

/// Turns the task's join result into an outcome, logging anything abnormal.
fn classify(
    id: WorkerId,
    label: &str,
    result: Result<Result<(), BoxError>, JoinError>,
) -> WorkerOutcome {
    match result {
        Ok(Ok(())) => {
            tracing::debug!(worker = %id, label, "worker completed");
            WorkerOutcome::Completed
        }
        Ok(Err(err)) => {
            let message = error_chain(err.as_ref());
            tracing::error!(worker = %id, label, error = %message, "worker failed");
            WorkerOutcome::Failed(WorkerFailure::Error {
                label: label.to_string(),
                message,
            })
        }
        Err(join_err) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic().as_ref());
            tracing::error!(worker = %id, label, panic = %message, "worker panicked");
            WorkerOutcome::Failed(WorkerFailure::Panicked {
                label: label.to_string(),
                message,
            })
        }
        Err(_) => {
            tracing::info!(worker = %id, label, "worker terminated");
            WorkerOutcome::Terminated
        }
    }
}

fn run_callback(id: WorkerId, callback: &FailureCallback, failure: &WorkerFailure) {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(failure)));
    if let Err(payload) = result {
        tracing::error!(
            worker = %id,
            label = failure.label(),
            panic = %panic_message(payload.as_ref()),
            "failure callback panicked"
        );
    }
}
