//! Write-back document cache for botforge.
//!
//! Plugins keep small JSON documents (per-player stats, settings, tallies)
//! on disk. Reading and rewriting the file on every change is slow and
//! racy, so documents are **loaded** into a [`DocumentCache`] once, read
//! and written in memory, and written back to disk later:
//!
//! - periodically, by a flusher worker ([`spawn_flusher`]) every
//!   [`FlushConfig::interval_secs`] (60 s by default);
//! - on [`DocumentCache::unload`], if the document has unsaved changes;
//! - on [`DocumentCache::flush_all`] at shutdown.
//!
//! Documents live at `<root>/<namespace>/<key>.json` ([`DocumentPath`],
//! [`DocumentStore`]).
//!
//! ```text
//! Plugins (above)  ← load / read / write / unload
//!     ↕
//! Cache layer (this crate)  ← in-memory table, dirty tracking, flusher
//!     ↕
//! Filesystem (below)  ← pretty-printed JSON, atomic replace
//! ```

mod cache;
mod error;
mod flush;
mod path;
mod store;

pub use cache::{DocumentCache, FlushReport};
pub use error::CacheError;
pub use flush::{FlushConfig, FlushMetrics, FlushSchedule, spawn_flusher};
pub use path::DocumentPath;
pub use store::DocumentStore;
