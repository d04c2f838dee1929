//! Periodic write-back of dirty documents.
//!
//! [`FlushSchedule`] decides *when* to sweep; [`spawn_flusher`] runs the
//! sweep loop as a supervised worker:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = ctx.cancelled() => break,
//!         _ = schedule.wait_for_sweep() => {
//!             let report = cache.flush_dirty().await;
//!             schedule.record_sweep(report, elapsed);
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use botforge_worker::{Supervisor, WorkerHandle};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

use crate::{DocumentCache, FlushReport};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Flush cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Random delay (0–max ms) added to the first sweep only.
    pub initial_jitter_ms: u64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            initial_jitter_ms: 1_000,
        }
    }
}

impl FlushConfig {
    pub const MIN_INTERVAL_SECS: u64 = 1;

    pub fn with_interval(interval_secs: u64) -> Self {
        Self {
            interval_secs,
            ..Default::default()
        }
    }

    /// Raises a zero interval to [`Self::MIN_INTERVAL_SECS`].
    pub fn validated(mut self) -> Self {
        if self.interval_secs < Self::MIN_INTERVAL_SECS {
            warn!(
                interval_secs = self.interval_secs,
                min = Self::MIN_INTERVAL_SECS,
                "flush interval below minimum, clamping"
            );
            self.interval_secs = Self::MIN_INTERVAL_SECS;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Totals over the flusher's lifetime, logged when it stops.
#[derive(Debug, Clone, Default)]
pub struct FlushMetrics {
    pub total_sweeps: u64,
    pub total_written: u64,
    pub total_failed: u64,
    pub last_sweep_time: Duration,
    pub max_sweep_time: Duration,
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Fixed-interval sweep scheduler.
///
/// Missed deadlines are not caught up: after a late sweep the next one is
/// scheduled a full interval from now.
pub struct FlushSchedule {
    interval: Duration,
    sweeps: u64,
    next_sweep: TokioInstant,
    metrics: FlushMetrics,
}

impl FlushSchedule {
    pub fn new(config: FlushConfig) -> Self {
        let config = config.validated();
        let interval = config.interval();
        let jitter = if config.initial_jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..config.initial_jitter_ms))
        } else {
            Duration::ZERO
        };
        debug!(interval_secs = config.interval_secs, ?jitter, "flush schedule created");

        Self {
            interval,
            sweeps: 0,
            next_sweep: TokioInstant::now() + interval + jitter,
            metrics: FlushMetrics::default(),
        }
    }

    /// Waits until the next sweep is due and returns its number, starting
    /// at 1.
    pub async fn wait_for_sweep(&mut self) -> u64 {
        time::sleep_until(self.next_sweep).await;

        let now = TokioInstant::now();
        let late_by = now.saturating_duration_since(self.next_sweep);
        if late_by > self.interval {
            warn!(
                sweep = self.sweeps + 1,
                late_ms = late_by.as_millis() as u64,
                "flush sweep overdue, skipping missed sweeps"
            );
        }
        self.sweeps += 1;
        self.next_sweep = now + self.interval;
        trace!(sweep = self.sweeps, "flush sweep due");
        self.sweeps
    }

    /// Records the result of the sweep that just ran.
    pub fn record_sweep(&mut self, report: FlushReport, elapsed: Duration) {
        self.metrics.total_sweeps += 1;
        self.metrics.total_written += report.written as u64;
        self.metrics.total_failed += report.failed as u64;
        self.metrics.last_sweep_time = elapsed;
        if elapsed > self.metrics.max_sweep_time {
            self.metrics.max_sweep_time = elapsed;
        }
        if report.written > 0 || report.failed > 0 {
            debug!(
                sweep = self.sweeps,
                written = report.written,
                failed = report.failed,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "flush sweep finished"
            );
        }
    }

    pub fn sweep_count(&self) -> u64 {
        self.sweeps
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn metrics(&self) -> &FlushMetrics {
        &self.metrics
    }
}

// ---------------------------------------------------------------------------
// Flusher worker
// ---------------------------------------------------------------------------

/// Spawns the periodic flusher as a worker labeled `cache-flusher`.
///
/// It stops when the worker is cancelled. It does not flush on the way
/// out; call [`DocumentCache::flush_all`] for that.
pub fn spawn_flusher(cache: Arc<DocumentCache>, supervisor: &Supervisor, config: FlushConfig) -> WorkerHandle {
    supervisor.spawn("cache-flusher", move |ctx| async move {
        let mut schedule = FlushSchedule::new(config);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = schedule.wait_for_sweep() => {
                    let started = Instant::now();
                    let report = cache.flush_dirty().await;
                    schedule.record_sweep(report, started.elapsed());
                }
            }
        }
        let m = schedule.metrics();
        debug!(
            sweeps = m.total_sweeps,
            written = m.total_written,
            failed = m.total_failed,
            max_sweep_ms = m.max_sweep_time.as_secs_f64() * 1000.0,
            "cache flusher stopped"
        );
        Ok(())
    })
}
