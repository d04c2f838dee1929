//! The plugin interface and the group that dispatches to it.
//!
//! Every hook has a no-op default, so a plugin implements only what it
//! needs. The [`PluginGroup`] calls hooks one plugin at a time, in
//! registration order, and isolates each call: an error *or* a panic in
//! one plugin is reported and the remaining plugins still run.
//!
//! ```rust,ignore
//! use botforge::prelude::*;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Plugin for Greeter {
//!     fn name(&self) -> &str { "greeter" }
//!
//!     async fn on_player_join(&self, ctx: &PluginContext, name: &str) -> PluginResult {
//!         ctx.game().say_to(name, "Welcome!").await?;
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use botforge_worker::{BoxError, error_chain, panic_message};
use futures::FutureExt;
use serde_json::Value;

use crate::context::PluginContext;
use crate::events::GameEvent;

/// What every hook returns. Any error type converts through `?`.
pub type PluginResult = Result<(), BoxError>;

/// A failed hook call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("plugin {plugin} failed in {hook}: {message}")]
    Failed {
        plugin: String,
        hook: &'static str,
        message: String,
    },

    #[error("plugin {plugin} panicked in {hook}: {message}")]
    Panicked {
        plugin: String,
        hook: &'static str,
        message: String,
    },
}

impl PluginError {
    pub fn plugin(&self) -> &str {
        match self {
            Self::Failed { plugin, .. } | Self::Panicked { plugin, .. } => plugin,
        }
    }

    pub fn hook(&self) -> &'static str {
        match self {
            Self::Failed { hook, .. } | Self::Panicked { hook, .. } => hook,
        }
    }
}

/// Receives every plugin failure, after it has been logged.
pub type ErrorReporter = Arc<dyn Fn(&PluginError) + Send + Sync>;

/// A bot plugin.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.1.0"
    }

    /// Packet ids to receive through [`on_packet`](Self::on_packet).
    fn listen_packets(&self) -> Vec<i32> {
        Vec::new()
    }

    /// Before the connection exists. Register console commands here.
    async fn on_def(&self, _ctx: &PluginContext) -> PluginResult {
        Ok(())
    }

    /// Once the roster and the bot identity are known.
    async fn on_init(&self, _ctx: &PluginContext) -> PluginResult {
        Ok(())
    }

    async fn on_player_prejoin(&self, _ctx: &PluginContext, _name: &str) -> PluginResult {
        Ok(())
    }

    async fn on_player_join(&self, _ctx: &PluginContext, _name: &str) -> PluginResult {
        Ok(())
    }

    async fn on_player_leave(&self, _ctx: &PluginContext, _name: &str) -> PluginResult {
        Ok(())
    }

    async fn on_player_chat(&self, _ctx: &PluginContext, _name: &str, _message: &str) -> PluginResult {
        Ok(())
    }

    async fn on_player_death(
        &self,
        _ctx: &PluginContext,
        _name: &str,
        _killer: Option<&str>,
        _message: &str,
    ) -> PluginResult {
        Ok(())
    }

    /// A packet with an id from [`listen_packets`](Self::listen_packets).
    async fn on_packet(&self, _ctx: &PluginContext, _id: i32, _body: &Value) -> PluginResult {
        Ok(())
    }
}

/// The loaded plugins.
pub struct PluginGroup {
    plugins: Vec<Arc<dyn Plugin>>,
    reporter: Option<ErrorReporter>,
}

impl PluginGroup {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            plugins,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Union of every plugin's packet subscriptions.
    pub fn listened_packets(&self) -> BTreeSet<i32> {
        self.plugins.iter().flat_map(|p| p.listen_packets()).collect()
    }

    pub async fn run_def(&self, ctx: &PluginContext) -> Vec<PluginError> {
        let mut failures = Vec::new();
        for plugin in &self.plugins {
            self.call(plugin.as_ref(), "on_def", plugin.on_def(ctx), &mut failures)
                .await;
        }
        failures
    }

    pub async fn run_init(&self, ctx: &PluginContext) -> Vec<PluginError> {
        let mut failures = Vec::new();
        for plugin in &self.plugins {
            self.call(plugin.as_ref(), "on_init", plugin.on_init(ctx), &mut failures)
                .await;
        }
        failures
    }

    /// Delivers an event to every plugin. Returns the failures, which have
    /// already been logged and reported.
    pub async fn dispatch(&self, ctx: &PluginContext, event: &GameEvent) -> Vec<PluginError> {
        let mut failures = Vec::new();
        for plugin in &self.plugins {
            let p = plugin.as_ref();
            match event {
                GameEvent::PlayerPrejoin { name } => {
                    self.call(p, "on_player_prejoin", p.on_player_prejoin(ctx, name), &mut failures)
                        .await
                }
                GameEvent::PlayerJoin { name } => {
                    self.call(p, "on_player_join", p.on_player_join(ctx, name), &mut failures)
                        .await
                }
                GameEvent::PlayerLeave { name } => {
                    self.call(p, "on_player_leave", p.on_player_leave(ctx, name), &mut failures)
                        .await
                }
                GameEvent::PlayerChat { name, message } => {
                    self.call(
                        p,
                        "on_player_chat",
                        p.on_player_chat(ctx, name, message),
                        &mut failures,
                    )
                    .await
                }
                GameEvent::PlayerDeath { name, killer, message } => {
                    self.call(
                        p,
                        "on_player_death",
                        p.on_player_death(ctx, name, killer.as_deref(), message),
                        &mut failures,
                    )
                    .await
                }
            }
        }
        failures
    }

    /// Delivers a raw packet to the plugins subscribed to its id.
    pub async fn dispatch_packet(&self, ctx: &PluginContext, id: i32, body: &Value) -> Vec<PluginError> {
        let mut failures = Vec::new();
        for plugin in self.plugins.iter().filter(|p| p.listen_packets().contains(&id)) {
            let p = plugin.as_ref();
            self.call(p, "on_packet", p.on_packet(ctx, id, body), &mut failures)
                .await;
        }
        failures
    }

    async fn call<F>(&self, plugin: &dyn Plugin, hook: &'static str, fut: F, failures: &mut Vec<PluginError>)
    where
        F: Future<Output = PluginResult>,
    {
        let error = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => PluginError::Failed {
                plugin: plugin.name().to_string(),
                hook,
                message: error_chain(e.as_ref()),
            },
            Err(payload) => PluginError::Panicked {
                plugin: plugin.name().to_string(),
                hook,
                message: panic_message(payload.as_ref()),
            },
        };

        tracing::error!(plugin = %error.plugin(), hook, error = %error, "plugin hook failed");
        if let Some(reporter) = &self.reporter {
            report(reporter, &error);
        }
        failures.push(error);
    }
}

/// Runs the reporter so that a panic in it can't cut dispatch short.
fn report(reporter: &ErrorReporter, error: &PluginError) {
    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| reporter(error))) {
        tracing::error!(
            plugin = %error.plugin(),
            panic = %panic_message(payload.as_ref()),
            "plugin error reporter panicked"
        );
    }
}

impl std::fmt::Debug for PluginGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginGroup")
            .field("plugins", &self.names())
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Listener {
        name: &'static str,
        ids: Vec<i32>,
    }

    #[async_trait]
    impl Plugin for Listener {
        fn name(&self) -> &str {
            self.name
        }

        fn listen_packets(&self) -> Vec<i32> {
            self.ids.clone()
        }
    }

    fn group() -> PluginGroup {
        PluginGroup::new(vec![
            Arc::new(Listener { name: "a", ids: vec![12, 9] }),
            Arc::new(Listener { name: "b", ids: vec![9, 40] }),
        ])
    }

    // =========================================================================
    // PluginError
    // =========================================================================

    #[test]
    fn test_plugin_error_display_names_plugin_and_hook() {
        let failed = PluginError::Failed {
            plugin: "shop".into(),
            hook: "on_init",
            message: "no stock".into(),
        };
        assert_eq!(failed.to_string(), "plugin shop failed in on_init: no stock");
        assert_eq!(failed.plugin(), "shop");
        assert_eq!(failed.hook(), "on_init");

        let panicked = PluginError::Panicked {
            plugin: "shop".into(),
            hook: "on_player_join",
            message: "boom".into(),
        };
        assert_eq!(panicked.to_string(), "plugin shop panicked in on_player_join: boom");
    }

    // =========================================================================
    // PluginGroup
    // =========================================================================

    #[test]
    fn test_listened_packets_is_sorted_union() {
        let ids: Vec<i32> = group().listened_packets().into_iter().collect();
        assert_eq!(ids, vec![9, 12, 40]);
    }

    #[test]
    fn test_names_keep_registration_order() {
        let group = group();
        assert_eq!(group.names(), vec!["a", "b"]);
        assert_eq!(group.len(), 2);
        assert!(!group.is_empty());
        assert!(PluginGroup::new(Vec::new()).is_empty());
    }

    #[test]
    fn test_default_version() {
        assert_eq!(Listener { name: "a", ids: Vec::new() }.version(), "0.1.0");
    }

    #[test]
    fn test_debug_lists_names_and_reporter_flag() {
        let group = group().with_reporter(Arc::new(|_: &PluginError| {}));
        let text = format!("{group:?}");
        assert!(text.contains("[\"a\", \"b\"]"));
        assert!(text.contains("reporter: true"));
    }
}
