//! The in-memory document table with dirty tracking.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{CacheError, DocumentPath, DocumentStore};

#[derive(Debug)]
struct CacheEntry {
    document: Value,
    dirty: bool,
    /// Bumped on every write. A flush only clears `dirty` if the revision
    /// it wrote is still the current one.
    revision: u64,
}

/// A dirty document captured at the start of a flush sweep.
#[derive(Debug)]
pub(crate) struct DirtySnapshot {
    path: DocumentPath,
    revision: u64,
    document: Value,
}

/// What one flush sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Documents written and marked clean.
    pub written: usize,
    /// Documents whose write failed. They stay dirty for the next sweep.
    pub failed: usize,
}

/// Write-back cache of JSON documents.
///
/// Share it behind an `Arc`. All methods take `&self`.
///
/// Every write-back (sweeps, `flush_all`, `unload`) holds `write_back`
/// for its whole duration, so an older snapshot can never land on disk
/// after a newer one. Lock order is `write_back`, then `entries`.
#[derive(Debug)]
pub struct DocumentCache {
    store: DocumentStore,
    entries: Mutex<HashMap<DocumentPath, CacheEntry>>,
    write_back: Mutex<()>,
}

impl DocumentCache {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
            write_back: Mutex::new(()),
        }
    }

    /// The backing store, for direct uncached access.
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Loads a document into the cache. Does nothing if already loaded.
    ///
    /// If the backing file is missing and `required` is set, fails with
    /// [`CacheError::NotFound`]. Otherwise the entry starts out as `null`
    /// and clean, and the namespace directory is created so the first
    /// flush can write the file.
    ///
    /// The table lock is held across the disk read, so a concurrent load of
    /// the same path waits and then takes the already-loaded fast path.
    pub async fn load(&self, path: &DocumentPath, required: bool) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(path) {
            return Ok(());
        }

        let document = match self.store.read(path).await? {
            Some(document) => document,
            None if required => return Err(CacheError::NotFound(path.clone())),
            None => {
                self.store.ensure_namespace(path).await?;
                Value::Null
            }
        };

        entries.insert(
            path.clone(),
            CacheEntry {
                document,
                dirty: false,
                revision: 0,
            },
        );
        tracing::debug!(document = %path, "document loaded");
        Ok(())
    }

    /// Returns an independent copy of the cached document.
    pub async fn read(&self, path: &DocumentPath) -> Result<Value, CacheError> {
        let entries = self.entries.lock().await;
        entries
            .get(path)
            .map(|entry| entry.document.clone())
            .ok_or_else(|| CacheError::NotLoaded(path.clone()))
    }

    /// Replaces the cached document and marks it dirty. No disk I/O.
    pub async fn write(&self, path: &DocumentPath, document: Value) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(path)
            .ok_or_else(|| CacheError::NotLoaded(path.clone()))?;
        entry.document = document;
        entry.dirty = true;
        entry.revision += 1;
        Ok(())
    }

    /// [`read`](Self::read) deserialized into `T`.
    pub async fn read_as<T: DeserializeOwned>(&self, path: &DocumentPath) -> Result<T, CacheError> {
        let document = self.read(path).await?;
        serde_json::from_value(document).map_err(|source| CacheError::Format {
            path: self.store.file_path(path),
            source,
        })
    }

    /// [`write`](Self::write) from any serializable value.
    pub async fn write_as<T: Serialize>(&self, path: &DocumentPath, value: &T) -> Result<(), CacheError> {
        let document = serde_json::to_value(value).map_err(|source| CacheError::Format {
            path: self.store.file_path(path),
            source,
        })?;
        self.write(path, document).await
    }

    /// Forgets a pending write-back. Returns whether one was pending.
    ///
    /// The in-memory document is left as it is; only the dirty flag is
    /// cleared, so the change is never written unless written again.
    pub async fn discard_pending_change(&self, path: &DocumentPath) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(path)
            .ok_or_else(|| CacheError::NotLoaded(path.clone()))?;
        Ok(std::mem::replace(&mut entry.dirty, false))
    }

    /// Flushes the document if dirty and removes it from the cache.
    ///
    /// Returns `false` if it wasn't loaded. If the flush fails the entry
    /// stays loaded and dirty and the error is returned. Waits for a sweep
    /// in progress to finish first.
    pub async fn unload(&self, path: &DocumentPath) -> Result<bool, CacheError> {
        let _write_back = self.write_back.lock().await;
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(path) else {
            return Ok(false);
        };
        if entry.dirty {
            self.store.write(path, &entry.document).await?;
            entry.dirty = false;
        }
        entries.remove(path);
        tracing::debug!(document = %path, "document unloaded");
        Ok(true)
    }

    pub async fn is_loaded(&self, path: &DocumentPath) -> bool {
        self.entries.lock().await.contains_key(path)
    }

    /// Whether the document has a write not yet flushed. `false` if not loaded.
    pub async fn is_dirty(&self, path: &DocumentPath) -> bool {
        self.entries
            .lock()
            .await
            .get(path)
            .is_some_and(|entry| entry.dirty)
    }

    /// Every loaded path, sorted.
    pub async fn loaded_paths(&self) -> Vec<DocumentPath> {
        let mut paths: Vec<_> = self.entries.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Writes every document that is dirty right now and marks it clean.
    ///
    /// Documents are snapshotted under the table lock, written with the
    /// lock released, then reconciled under the lock again. A document
    /// written to after the snapshot keeps its dirty flag and goes out on
    /// the next sweep. A failed write is logged and also stays dirty.
    /// Sweeps and unloads never overlap.
    pub async fn flush_dirty(&self) -> FlushReport {
        let _write_back = self.write_back.lock().await;
        let snapshot = self.snapshot_dirty().await;
        if snapshot.is_empty() {
            return FlushReport::default();
        }

        let mut flushed = Vec::with_capacity(snapshot.len());
        let mut failed = 0;
        for item in snapshot {
            match self.store.write(&item.path, &item.document).await {
                Ok(()) => flushed.push((item.path, item.revision)),
                Err(err) => {
                    failed += 1;
                    tracing::error!(document = %item.path, error = %err, "flush failed, will retry");
                }
            }
        }

        let written = self.reconcile(&flushed).await;
        FlushReport { written, failed }
    }

    /// Final flush before shutdown.
    pub async fn flush_all(&self) -> FlushReport {
        let report = self.flush_dirty().await;
        tracing::info!(written = report.written, failed = report.failed, "cache flushed for shutdown");
        report
    }

    pub(crate) async fn snapshot_dirty(&self) -> Vec<DirtySnapshot> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(path, entry)| DirtySnapshot {
                path: path.clone(),
                revision: entry.revision,
                document: entry.document.clone(),
            })
            .collect()
    }

    /// Clears the dirty flag of each flushed `(path, revision)` whose
    /// revision is still current. Returns how many were cleared.
    pub(crate) async fn reconcile(&self, flushed: &[(DocumentPath, u64)]) -> usize {
        let mut entries = self.entries.lock().await;
        let mut cleared = 0;
        for (path, revision) in flushed {
            if let Some(entry) = entries.get_mut(path) {
                if entry.revision == *revision {
                    entry.dirty = false;
                    cleared += 1;
                } else {
                    tracing::debug!(document = %path, "written during flush, stays dirty");
                }
            }
        }
        cleared
    }
}
