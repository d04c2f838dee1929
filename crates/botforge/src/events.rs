//! Lifecycle events derived from inbound packets.

use std::fmt;

/// A player lifecycle event, as delivered to plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// The server announced a join; the player may not be in the roster yet.
    PlayerPrejoin { name: String },
    /// The player appeared in the roster.
    PlayerJoin { name: String },
    PlayerLeave { name: String },
    PlayerChat { name: String, message: String },
    /// `killer` is set when the death message names a second party.
    /// `message` is the system message as received.
    PlayerDeath {
        name: String,
        killer: Option<String>,
        message: String,
    },
}

impl GameEvent {
    /// Short, stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerPrejoin { .. } => "player-prejoin",
            Self::PlayerJoin { .. } => "player-join",
            Self::PlayerLeave { .. } => "player-leave",
            Self::PlayerChat { .. } => "player-chat",
            Self::PlayerDeath { .. } => "player-death",
        }
    }

    /// The player the event is about.
    pub fn player(&self) -> &str {
        match self {
            Self::PlayerPrejoin { name }
            | Self::PlayerJoin { name }
            | Self::PlayerLeave { name }
            | Self::PlayerChat { name, .. }
            | Self::PlayerDeath { name, .. } => name,
        }
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.player())
    }
}
