//! Launcher abstraction for botforge.
//!
//! A **launcher** owns the actual game connection: it speaks the wire
//! protocol, delivers decoded packets as JSON, and executes commands on
//! the bot's behalf. The host only ever talks to it through the
//! [`Launcher`] trait.
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryLauncher`], an in-process launcher driven
//!   through a [`MemoryDriver`]. Used by tests and the demo host.

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{CommandKind, MemoryDriver, MemoryLauncher, ScriptedReply, SentCommand};

use std::collections::HashMap;

use async_trait::async_trait;
use botforge_protocol::CommandOutput;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Something the launcher reports to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LauncherEvent {
    /// The bot has entered the game and commands can be sent.
    Launched,
    /// A subscribed packet arrived.
    Packet { id: i32, body: Value },
}

/// The host's view of a game connection.
///
/// Implementations must be shareable across tasks: the host receives on
/// one task while packet workers send commands from others.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Next event. `Ok(None)` when the session has ended.
    async fn recv(&self) -> Result<Option<LauncherEvent>, TransportError>;

    /// Sends a command without waiting for anything.
    async fn send_command(&self, command: &str) -> Result<(), TransportError>;

    /// Sends a command as the bot player. With `wait_for_response`, waits for
    /// its output and returns it, or fails with [`TransportError::Timeout`].
    async fn send_command_ws(
        &self,
        command: &str,
        wait_for_response: bool,
    ) -> Result<Option<CommandOutput>, TransportError>;

    /// Sends a command that produces no output (`tellraw`, `title`).
    async fn send_command_wo(&self, command: &str) -> Result<(), TransportError>;

    /// Subscribes to packet ids. May be called more than once.
    async fn listen_packets(&self, ids: &[i32]) -> Result<(), TransportError>;

    /// Online players and their unique ids, if the launcher tracks them.
    async fn players_and_uuids(&self) -> Option<HashMap<String, String>> {
        None
    }

    /// The bot's own player name, if the launcher knows it.
    async fn bot_name(&self) -> Option<String> {
        None
    }

    /// Whether [`bot_name`](Self::bot_name) is authoritative. When `false`,
    /// the host learns the bot's identity from the first roster delta.
    fn reports_identity(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_launcher_event_json_format() {
        let ev: LauncherEvent = serde_json::from_value(json!({"event": "launched"})).unwrap();
        assert_eq!(ev, LauncherEvent::Launched);

        let ev: LauncherEvent =
            serde_json::from_value(json!({"event": "packet", "id": 9, "body": {"TextType": 1}})).unwrap();
        assert_eq!(
            ev,
            LauncherEvent::Packet {
                id: 9,
                body: json!({"TextType": 1})
            }
        );
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(TransportError::Timeout("/testfor @a".into()).is_transient());
        assert!(!TransportError::ConnectionClosed("eof".into()).is_transient());
    }
}
