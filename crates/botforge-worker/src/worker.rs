//! Worker identity, context, handle, and outcome.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::WorkerFailure;

/// Unique identifier of a worker within one [`Supervisor`](crate::Supervisor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub(crate) u64);

impl WorkerId {
    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The procedure returned `Ok(())`.
    Completed,
    /// The procedure returned an error or panicked.
    Failed(WorkerFailure),
    /// The worker was forcibly terminated before finishing.
    Terminated,
}

impl WorkerOutcome {
    /// Whether the worker ended by error or panic.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "Completed"),
            Self::Failed(_) => write!(f, "Failed"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Handed to every worker procedure.
///
/// Long-running procedures should check [`is_cancelled`](Self::is_cancelled)
/// between units of work, or race [`cancelled`](Self::cancelled) in a
/// `tokio::select!`, and return promptly once it fires.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    id: WorkerId,
    label: Arc<str>,
    token: CancellationToken,
}

impl WorkerContext {
    pub(crate) fn new(id: WorkerId, label: Arc<str>, token: CancellationToken) -> Self {
        Self { id, label, token }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether cooperative cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cooperative cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// A clone of the underlying token, for handing to nested tasks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a spawned worker.
///
/// Cheap to clone. Dropping every handle leaves the worker running.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    label: Arc<str>,
    token: CancellationToken,
    abort: AbortHandle,
    outcome: watch::Receiver<Option<WorkerOutcome>>,
}

impl WorkerHandle {
    pub(crate) fn new(
        id: WorkerId,
        label: Arc<str>,
        token: CancellationToken,
        abort: AbortHandle,
        outcome: watch::Receiver<Option<WorkerOutcome>>,
    ) -> Self {
        Self {
            id,
            label,
            token,
            abort,
            outcome,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Signals cooperative cancellation. The worker decides when to stop.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Forcibly terminates the worker. Best-effort only.
    ///
    /// The request is observed the next time the worker suspends at an
    /// `.await`. A worker stuck in a loop that never yields, or one started
    /// with [`Supervisor::spawn_blocking`](crate::Supervisor::spawn_blocking)
    /// that is already running, never observes it. When it does take
    /// effect, the worker's remaining code does not run and its in-flight
    /// state is dropped where it stands.
    pub fn request_termination(&self) {
        if !self.is_finished() {
            tracing::warn!(worker = %self.id, label = %self.label, "forced termination requested");
        }
        self.abort.abort();
    }

    /// Whether the worker has ended and its outcome is recorded.
    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// The outcome, if the worker has ended.
    pub fn outcome(&self) -> Option<WorkerOutcome> {
        self.outcome.borrow().clone()
    }

    /// Waits for the worker to end and returns its outcome.
    ///
    /// If the runtime drops the supervising task before an outcome is
    /// recorded (runtime shutdown), this reports [`WorkerOutcome::Terminated`].
    pub async fn wait(&self) -> WorkerOutcome {
        let mut rx = self.outcome.clone();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(WorkerOutcome::Terminated)
    }
}
