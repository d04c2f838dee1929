//! What plugins get handed on every hook.

use std::sync::Arc;

use botforge_cache::DocumentCache;
use botforge_session::SessionRegistry;
use botforge_transport::Launcher;
use botforge_worker::Supervisor;

use crate::console::ConsoleMenu;
use crate::game::GameControl;
use crate::presence::Presence;

/// Shared host facilities. Cloning is cheap; every clone sees the same
/// workers, sessions, cache and presence.
#[derive(Clone)]
pub struct PluginContext {
    supervisor: Supervisor,
    sessions: SessionRegistry,
    cache: Arc<DocumentCache>,
    game: GameControl,
    presence: Arc<Presence>,
    console: Arc<ConsoleMenu>,
}

impl PluginContext {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        presence: Arc<Presence>,
        cache: Arc<DocumentCache>,
        supervisor: Supervisor,
        console: Arc<ConsoleMenu>,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(supervisor.clone()),
            game: GameControl::new(launcher, Arc::clone(&presence)),
            supervisor,
            cache,
            presence,
            console,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    pub fn game(&self) -> &GameControl {
        &self.game
    }

    pub fn presence(&self) -> &Arc<Presence> {
        &self.presence
    }

    pub fn console(&self) -> &Arc<ConsoleMenu> {
        &self.console
    }
}
