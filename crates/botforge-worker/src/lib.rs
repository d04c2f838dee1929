//! Concurrency supervisor for botforge.
//!
//! Every long-running or event-triggered piece of work in the host runs as
//! a labeled **worker** spawned through a [`Supervisor`]:
//!
//! - Errors returned by a worker and panics raised inside it are caught at
//!   the worker boundary, logged with the worker's label, and handed to an
//!   optional failure callback. They never reach the spawner or any other
//!   worker.
//! - Every worker gets a [`WorkerContext`] carrying a cancellation token.
//!   Long-running workers are expected to poll it; this is the primary way
//!   to stop them.
//! - [`WorkerHandle::request_termination`] is the last resort for workers
//!   that don't cooperate. It is best-effort; see its docs.
//!
//! Workers are detached: dropping a [`WorkerHandle`] does not stop the
//! worker, and the runtime is free to shut down while workers are running.
//!
//! ```text
//! Session registry / cache flusher / dispatcher (above)  ← spawn workers
//!     ↕
//! Worker layer (this crate)  ← isolates failures, tracks live workers
//!     ↕
//! Tokio runtime (below)
//! ```

mod error;
mod supervisor;
mod worker;

pub use error::{BoxError, WorkerFailure, error_chain, panic_message};
pub use supervisor::{FailureCallback, Supervisor, WorkerOptions};
pub use worker::{WorkerContext, WorkerHandle, WorkerId, WorkerOutcome};
