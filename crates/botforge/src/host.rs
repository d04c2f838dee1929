//! `BotHost` builder and main loop.
//!
//! This is the entry point for running a bot. It ties the layers together:
//! launcher → dispatcher → plugins, with the supervisor, session registry,
//! document cache and console shared through one [`PluginContext`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use botforge_cache::{DocumentCache, DocumentStore, spawn_flusher};
use botforge_protocol::ids;
use botforge_transport::{Launcher, LauncherEvent, TransportError};
use botforge_worker::{BoxError, Supervisor, WorkerContext, WorkerHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::BotforgeError;
use crate::config::HostConfig;
use crate::console::ConsoleMenu;
use crate::context::PluginContext;
use crate::dispatcher::Dispatcher;
use crate::plugin::{ErrorReporter, Plugin, PluginError, PluginGroup};
use crate::presence::{Presence, PresencePhase};

/// Prefix of every welcome line.
const WELCOME_PREFIX: &str = "§l§7[§f!§7] §r§f";

/// Builder for configuring a [`BotHost`].
///
/// # Example
///
/// ```rust,ignore
/// use botforge::prelude::*;
///
/// let host = BotHost::builder(launcher)
///     .config(HostConfig::load_or_create(path).await?)
///     .plugin(Greeter)
///     .build();
/// host.run().await
/// ```
pub struct BotHostBuilder {
    launcher: Arc<dyn Launcher>,
    config: HostConfig,
    plugins: Vec<Arc<dyn Plugin>>,
    reporter: Option<ErrorReporter>,
}

impl BotHostBuilder {
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn plugin_arc(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Called for every plugin failure, in addition to the error log.
    pub fn error_reporter(mut self, reporter: impl Fn(&PluginError) + Send + Sync + 'static) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// Overrides `config.console.enabled`.
    pub fn console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn build(self) -> BotHost {
        let supervisor = Supervisor::new();
        let presence = Arc::new(Presence::new(!self.launcher.reports_identity()));
        let cache = Arc::new(DocumentCache::new(DocumentStore::new(&self.config.data_dir)));
        let shutdown = CancellationToken::new();
        let console = Arc::new(ConsoleMenu::new(shutdown.clone()));

        let ctx = PluginContext::new(Arc::clone(&self.launcher), presence, cache, supervisor, console);

        let mut group = PluginGroup::new(self.plugins);
        if let Some(reporter) = self.reporter {
            group = group.with_reporter(reporter);
        }
        let plugins = Arc::new(group);
        let dispatcher = Arc::new(Dispatcher::new(ctx.clone(), Arc::clone(&plugins)));

        BotHost {
            shared: Arc::new(Shared {
                config: self.config,
                launcher: self.launcher,
                plugins,
                ctx,
            }),
            dispatcher,
            shutdown,
        }
    }
}

/// State the inject worker needs after `run` has moved on.
struct Shared {
    config: HostConfig,
    launcher: Arc<dyn Launcher>,
    plugins: Arc<PluginGroup>,
    ctx: PluginContext,
}

/// A configured bot host.
///
/// Call [`run()`](Self::run) to drive it until the launcher closes, the
/// console types `exit`, or the process receives Ctrl-C.
pub struct BotHost {
    shared: Arc<Shared>,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

impl BotHost {
    pub fn builder(launcher: Arc<dyn Launcher>) -> BotHostBuilder {
        BotHostBuilder {
            launcher,
            config: HostConfig::default(),
            plugins: Vec::new(),
            reporter: None,
        }
    }

    pub fn context(&self) -> &PluginContext {
        &self.shared.ctx
    }

    /// Cancelling this token stops [`run`](Self::run) gracefully.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(self) -> Result<(), BotforgeError> {
        let shared = &self.shared;
        tokio::fs::create_dir_all(&shared.config.data_dir).await?;

        let mut listened: BTreeSet<i32> = ids::HOST_REQUIRED.into_iter().collect();
        listened.extend(shared.plugins.listened_packets());
        let listened: Vec<i32> = listened.into_iter().collect();
        shared.launcher.listen_packets(&listened).await?;

        shared.plugins.run_def(&shared.ctx).await;
        let flusher = spawn_flusher(
            Arc::clone(shared.ctx.cache()),
            shared.ctx.supervisor(),
            shared.config.cache.clone().validated(),
        );

        info!(plugins = ?shared.plugins.names(), packets = ?listened, "host running");
        let result = self.event_loop().await;
        self.shut_down(&flusher).await;
        result
    }

    async fn event_loop(&self) -> Result<(), BotforgeError> {
        let mut injected = false;
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested");
                    return Ok(());
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    return Ok(());
                }
                event = self.shared.launcher.recv() => event?,
            };

            match event {
                None => {
                    info!("launcher closed the session");
                    return Ok(());
                }
                Some(LauncherEvent::Launched) if injected => {
                    warn!("duplicate launch signal ignored");
                }
                Some(LauncherEvent::Launched) => {
                    injected = true;
                    self.spawn_inject();
                }
                Some(LauncherEvent::Packet { id, body }) => {
                    self.dispatcher.handle_packet(id, body);
                }
            }
        }
    }

    fn spawn_inject(&self) -> WorkerHandle {
        let shared = Arc::clone(&self.shared);
        self.shared
            .ctx
            .supervisor()
            .spawn("inject", move |ctx| async move { inject(&shared, &ctx).await })
    }

    /// Stops the flusher and waits for any sweep it is running before the
    /// final flush.
    async fn shut_down(&self, flusher: &WorkerHandle) {
        let shared = &self.shared;
        let presence = shared.ctx.presence();

        if !presence.online_players().is_empty() {
            if let Some(bot) = presence.bot_name() {
                let kick = format!("/kick {bot} {}", shared.config.shutdown.kick_message);
                if let Err(e) = shared.launcher.send_command_ws(&kick, false).await {
                    warn!(error = %e, "failed to kick bot on shutdown");
                }
            }
        }

        self.shutdown.cancel();
        flusher.cancel();
        flusher.wait().await;
        shared.ctx.supervisor().cancel_all();
        shared.ctx.cache().flush_all().await;
        info!("host stopped");
    }
}

// ---------------------------------------------------------------------------
// Inject
// ---------------------------------------------------------------------------

/// Runs once per connection after the launcher reports `Launched`.
async fn inject(shared: &Shared, worker: &WorkerContext) -> Result<(), BoxError> {
    let ctx = &shared.ctx;
    let presence = ctx.presence();
    presence.advance(PresencePhase::AwaitingRoster);

    let roster = match shared.launcher.players_and_uuids().await {
        Some(map) => {
            let mut players: Vec<(String, Option<String>)> = map.into_iter().map(|(n, u)| (n, Some(u))).collect();
            players.sort();
            players
        }
        None => {
            let Some(names) = query_roster(shared, worker).await? else {
                info!("inject cancelled while fetching roster");
                return Ok(());
            };
            names.into_iter().map(|n| (n, None)).collect()
        }
    };
    let first = roster.first().map(|(name, _)| name.clone());
    presence.seed_roster(roster);

    match shared.launcher.bot_name().await {
        Some(name) => presence.set_bot_name(name),
        None => match first {
            Some(name) => {
                presence.resolve_bot_name(&name);
            }
            None if presence.bot_name().is_none() => warn!("bot identity unknown: empty roster"),
            None => {}
        },
    }
    presence.advance(PresencePhase::Ready);
    info!(
        online = ?presence.online_players(),
        bot = ?presence.bot_name(),
        "initialisation complete"
    );

    if shared.config.console.enabled {
        ctx.console().start(ctx.supervisor());
    }
    shared.plugins.run_init(ctx).await;

    if shared.config.welcome.enabled {
        welcome(shared, worker).await?;
    }
    Ok(())
}

/// Asks the game who is online, retrying until it answers. `None` if the
/// worker was cancelled first.
async fn query_roster(shared: &Shared, worker: &WorkerContext) -> Result<Option<Vec<String>>, TransportError> {
    let cfg = &shared.config.presence;
    let retry = Duration::from_millis(cfg.roster_retry_delay_ms);
    let mut attempt: u32 = 0;

    loop {
        if worker.is_cancelled() {
            return Ok(None);
        }
        attempt += 1;
        match shared.launcher.send_command_ws(&cfg.roster_query, true).await {
            Ok(Some(output)) => match output.first_parameter() {
                Some(list) => {
                    let names = list
                        .split(", ")
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                        .collect();
                    return Ok(Some(names));
                }
                None => warn!(attempt, "roster query returned no players, retrying"),
            },
            Ok(None) => warn!(attempt, "roster query returned nothing, retrying"),
            Err(e) if e.is_transient() => warn!(attempt, error = %e, "roster query failed, retrying"),
            Err(e) => return Err(e),
        }

        tokio::select! {
            _ = worker.cancelled() => return Ok(None),
            _ = tokio::time::sleep(retry) => {}
        }
    }
}

async fn welcome(shared: &Shared, worker: &WorkerContext) -> Result<(), TransportError> {
    let cfg = &shared.config.welcome;
    tokio::select! {
        _ = worker.cancelled() => return Ok(()),
        _ = tokio::time::sleep(Duration::from_millis(cfg.delay_ms)) => {}
    }

    let game = shared.ctx.game();
    let clock = chrono::Local::now().format("§a%H§f : §a%M").to_string();
    game.say_to("@a", &format!("{WELCOME_PREFIX}{}", cfg.banner)).await?;
    game.say_to("@a", &format!("{WELCOME_PREFIX}Local time {clock}")).await?;
    game.say_to("@a", &format!("{WELCOME_PREFIX}{}", cfg.hint)).await?;
    game.send_command(&cfg.tag_command).await
}
