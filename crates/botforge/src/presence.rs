//! Who is online, and who the bot is.
//!
//! [`Presence`] owns two tables, each behind its own lock:
//!
//! - the **roster**: online names in arrival order plus a name → uuid map;
//! - the **identity**: the bot's own name and the connection phase.
//!
//! When both are needed the identity lock is taken first.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use botforge_protocol::PlayerListPacket;
use tracing::{info, warn};

use crate::events::GameEvent;

/// Roster name the server uses for players it can't name. Departures under
/// this name never shrink the online list.
pub const UNKNOWN_PLAYER: &str = "???";

/// Connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresencePhase {
    /// Connected, but the launcher hasn't signalled readiness.
    Uninitialized,
    /// Readiness signalled; fetching the roster and the bot identity.
    AwaitingRoster,
    /// Roster and identity resolved. Terminal for the connection.
    Ready,
}

impl PresencePhase {
    /// Returns `Some(next)` for a valid forward step, `None` from `Ready`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::AwaitingRoster),
            Self::AwaitingRoster => Some(Self::Ready),
            Self::Ready => None,
        }
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for PresencePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::AwaitingRoster => write!(f, "AwaitingRoster"),
            Self::Ready => write!(f, "Ready"),
        }
    }
}

#[derive(Default)]
struct Roster {
    online: Vec<String>,
    uuids: HashMap<String, String>,
}

impl Roster {
    fn add_online(&mut self, name: &str) {
        if !self.online.iter().any(|n| n == name) {
            self.online.push(name.to_string());
        }
    }

    fn name_for_uuid(&self, uuid: &str) -> Option<String> {
        self.uuids
            .iter()
            .find(|(_, u)| u.as_str() == uuid)
            .map(|(name, _)| name.clone())
    }
}

struct Identity {
    bot_name: Option<String>,
    /// Whether the first roster delta may name the bot.
    claim_from_roster: bool,
    first_delta_seen: bool,
    phase: PresencePhase,
}

/// Player and bot presence for one connection.
pub struct Presence {
    identity: Mutex<Identity>,
    roster: Mutex<Roster>,
}

impl Presence {
    /// `claim_identity_from_roster` should be `true` when the launcher can't
    /// tell the bot its own name: the bot is then taken to be the first
    /// arrival in the first roster delta.
    pub fn new(claim_identity_from_roster: bool) -> Self {
        Self {
            identity: Mutex::new(Identity {
                bot_name: None,
                claim_from_roster: claim_identity_from_roster,
                first_delta_seen: false,
                phase: PresencePhase::Uninitialized,
            }),
            roster: Mutex::new(Roster::default()),
        }
    }

    fn identity(&self) -> MutexGuard<'_, Identity> {
        self.identity.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn roster(&self) -> MutexGuard<'_, Roster> {
        self.roster.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn phase(&self) -> PresencePhase {
        self.identity().phase
    }

    /// Moves to `target` if it is the next phase. Returns whether it moved.
    pub fn advance(&self, target: PresencePhase) -> bool {
        let mut identity = self.identity();
        if identity.phase.can_transition_to(target) {
            info!(from = %identity.phase, to = %target, "presence phase changed");
            identity.phase = target;
            true
        } else {
            warn!(from = %identity.phase, to = %target, "invalid presence phase transition");
            false
        }
    }

    pub fn bot_name(&self) -> Option<String> {
        self.identity().bot_name.clone()
    }

    /// Sets the bot's name unconditionally.
    pub fn set_bot_name(&self, name: impl Into<String>) {
        let name = name.into();
        info!(bot = %name, "bot identity set");
        self.identity().bot_name = Some(name);
    }

    /// Sets the bot's name only if it is still unknown. Returns whether it
    /// was set.
    pub fn resolve_bot_name(&self, name: &str) -> bool {
        let mut identity = self.identity();
        if identity.bot_name.is_some() {
            return false;
        }
        info!(bot = %name, "bot identity resolved");
        identity.bot_name = Some(name.to_string());
        true
    }

    /// Online names, in the order they arrived.
    pub fn online_players(&self) -> Vec<String> {
        self.roster().online.clone()
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.roster().online.iter().any(|n| n == name)
    }

    pub fn uuid_of(&self, name: &str) -> Option<String> {
        self.roster().uuids.get(name).cloned()
    }

    /// Seeds the roster from a snapshot taken at readiness. Emits no events.
    ///
    /// Names already known keep their place; uuids are recorded when given.
    pub fn seed_roster<I>(&self, players: I)
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        let mut roster = self.roster();
        for (name, uuid) in players {
            roster.add_online(&name);
            if let Some(uuid) = uuid {
                roster.uuids.insert(name, uuid);
            }
        }
    }

    /// Applies a roster delta and returns the events it produced.
    ///
    /// Arrivals are recorded and announced as [`GameEvent::PlayerJoin`],
    /// except the one that names the bot (see [`Presence::new`]). Departures
    /// are matched back to a name by uuid; an unknown uuid is logged and
    /// skipped.
    pub fn apply_roster(&self, packet: &PlayerListPacket) -> Vec<GameEvent> {
        let mut identity = self.identity();
        let mut claim_open = identity.claim_from_roster && !identity.first_delta_seen && identity.bot_name.is_none();
        identity.first_delta_seen = true;

        let mut roster = self.roster();
        let mut events = Vec::new();

        for entry in &packet.entries {
            if entry.is_arrival() {
                let name = entry.username.as_str();
                roster.uuids.insert(name.to_string(), entry.uuid.clone());
                roster.add_online(name);

                if claim_open {
                    claim_open = false;
                    info!(bot = %name, uuid = %entry.uuid, "bot identity taken from roster");
                    identity.bot_name = Some(name.to_string());
                    continue;
                }

                info!(player = %name, uuid = %entry.uuid, "player joined");
                events.push(GameEvent::PlayerJoin { name: name.to_string() });
            } else {
                let Some(name) = roster.name_for_uuid(&entry.uuid) else {
                    warn!(uuid = %entry.uuid, "departure for unknown player, skipping");
                    continue;
                };
                if name != UNKNOWN_PLAYER {
                    roster.online.retain(|n| *n != name);
                    roster.uuids.remove(&name);
                }
                info!(player = %name, "player left");
                events.push(GameEvent::PlayerLeave { name });
            }
        }

        events
    }
}
