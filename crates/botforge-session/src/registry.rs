//! The session registry: one live session per entity.
//!
//! # Lifecycle
//!
//! ```text
//! try_start(entity) ──→ [registered] ──→ worker runs ──→ [unregistered]
//!        │                                   │
//!        │ already registered                └─ Ok, Err, panic, or forced
//!        ▼                                      termination all unregister
//!   on_conflict(entity)
//! ```
//!
//! Registration is owned by a [`SessionGuard`] that lives inside the
//! worker's future. Whatever way the future goes away, the guard is
//! dropped with it and the entity becomes free again.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use botforge_worker::{BoxError, Supervisor, WorkerContext, WorkerHandle, WorkerOptions};

use crate::SessionError;

type ActiveSet = Arc<Mutex<HashSet<String>>>;

fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    // Only inserts and removes run under this lock; a poisoned set is
    // still a valid set.
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps an entity registered until dropped.
#[derive(Debug)]
pub struct SessionGuard {
    entity: String,
    active: ActiveSet,
}

impl SessionGuard {
    pub fn entity(&self) -> &str {
        &self.entity
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.entity);
        tracing::debug!(entity = %self.entity, "session ended");
    }
}

/// Tracks which entities currently have an interactive session.
///
/// Cheap to clone; clones share the same set.
#[derive(Clone)]
pub struct SessionRegistry {
    supervisor: Supervisor,
    active: ActiveSet,
}

impl SessionRegistry {
    /// Creates an empty registry that spawns sessions on `supervisor`.
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            supervisor,
            active: Arc::default(),
        }
    }

    /// Registers `entity` without spawning anything.
    ///
    /// For callers that run the session inline: hold the guard for as long
    /// as the conversation lasts.
    ///
    /// # Errors
    /// [`SessionError::AlreadyActive`] if the entity is already registered.
    pub fn enter(&self, entity: &str) -> Result<SessionGuard, SessionError> {
        let mut active = lock(&self.active);
        if !active.insert(entity.to_string()) {
            return Err(SessionError::AlreadyActive(entity.to_string()));
        }
        drop(active);
        tracing::debug!(%entity, "session started");
        Ok(SessionGuard {
            entity: entity.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    /// Starts a session worker for `entity`.
    ///
    /// The worker is labeled `session[<entity>]`. Errors and panics inside
    /// `procedure` are caught by the supervisor, logged with the entity
    /// attached, and unregister the entity like a normal return does.
    ///
    /// # Errors
    /// [`SessionError::AlreadyActive`] if the entity is already registered.
    /// Nothing is spawned in that case.
    pub fn start<F, Fut>(&self, entity: &str, procedure: F) -> Result<WorkerHandle, SessionError>
    where
        F: FnOnce(WorkerContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let guard = self.enter(entity)?;
        let failed_entity = entity.to_string();
        let options = WorkerOptions::new(format!("session[{entity}]")).on_failure(move |failure| {
            tracing::warn!(entity = %failed_entity, error = %failure, "session aborted by failure");
        });

        Ok(self.supervisor.spawn_with(options, move |ctx| async move {
            let _guard = guard;
            procedure(ctx).await
        }))
    }

    /// Starts a session for `entity`, or calls `on_conflict` if one is live.
    ///
    /// `on_conflict` runs synchronously on the caller before this returns,
    /// and receives the entity identifier.
    pub fn try_start<F, Fut, C>(&self, entity: &str, procedure: F, on_conflict: C) -> Option<WorkerHandle>
    where
        F: FnOnce(WorkerContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
        C: FnOnce(&str),
    {
        match self.start(entity, procedure) {
            Ok(handle) => Some(handle),
            Err(SessionError::AlreadyActive(_)) => {
                tracing::debug!(%entity, "session already active");
                on_conflict(entity);
                None
            }
        }
    }

    /// Whether `entity` has a live session.
    pub fn is_active(&self, entity: &str) -> bool {
        lock(&self.active).contains(entity)
    }

    /// Entities with a live session, sorted.
    pub fn active(&self) -> Vec<String> {
        let mut out: Vec<_> = lock(&self.active).iter().cloned().collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
