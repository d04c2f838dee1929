//! # botforge
//!
//! A plugin host for game-server bots.
//!
//! A launcher (see [`botforge_transport`]) owns the game connection and
//! hands the host decoded packets. The host keeps track of who is online,
//! turns packets into player events, and dispatches them to plugins. Plugins
//! get a [`PluginContext`] with everything they share:
//!
//! - a [`Supervisor`] for background workers that can fail without taking
//!   anything else down,
//! - a [`SessionRegistry`] that keeps one interactive session per player,
//! - a [`DocumentCache`] of JSON documents written back to disk periodically,
//! - [`GameControl`] for commands and messages, and the [`ConsoleMenu`].
//!
//! ```text
//! Launcher ──packets──▶ Dispatcher ──events──▶ PluginGroup ──▶ Plugin hooks
//!                          │                                       │
//!                          ▼                                       ▼
//!                       Presence                     Supervisor / Sessions / Cache
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use botforge::prelude::*;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Plugin for Greeter {
//!     fn name(&self) -> &str {
//!         "greeter"
//!     }
//!
//!     async fn on_player_join(&self, ctx: &PluginContext, name: &str) -> PluginResult {
//!         ctx.game().say_to(name, "Welcome!").await?;
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), BotforgeError> {
//! let (launcher, _driver) = MemoryLauncher::new();
//! let host = BotHost::builder(Arc::new(launcher)).plugin(Greeter).build();
//! host.run().await
//! # }
//! ```

pub mod config;
pub mod console;
mod context;
mod dispatcher;
mod error;
mod events;
pub mod game;
mod host;
pub mod logging;
mod plugin;
mod presence;

pub use config::{ConfigError, HostConfig};
pub use console::{ConsoleHandler, ConsoleMenu, ConsoleOutcome};
pub use context::PluginContext;
pub use dispatcher::{Dispatcher, classify_text};
pub use error::BotforgeError;
pub use events::GameEvent;
pub use game::GameControl;
pub use host::{BotHost, BotHostBuilder};
pub use plugin::{ErrorReporter, Plugin, PluginError, PluginGroup, PluginResult};
pub use presence::{Presence, PresencePhase, UNKNOWN_PLAYER};

pub use botforge_cache::{CacheError, DocumentCache, DocumentPath, DocumentStore, FlushConfig};
pub use botforge_session::{SessionError, SessionRegistry};
pub use botforge_worker::{BoxError, Supervisor, WorkerContext, WorkerHandle, WorkerOutcome};

/// Convenient re-exports for plugin authors and host binaries.
pub mod prelude {
    pub use async_trait::async_trait;

    pub use crate::{
        BotHost, BotforgeError, BoxError, CacheError, DocumentPath, GameControl, GameEvent, HostConfig, Plugin,
        PluginContext, PluginError, PluginResult, SessionError, Supervisor, WorkerContext,
    };

    pub use botforge_transport::{Launcher, LauncherEvent};
    #[cfg(feature = "memory")]
    pub use botforge_transport::{MemoryDriver, MemoryLauncher};
}

pub use botforge_protocol as protocol;
pub use botforge_transport as transport;
