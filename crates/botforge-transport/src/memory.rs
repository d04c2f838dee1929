//! In-process launcher.
//!
//! [`MemoryLauncher::new`] returns the launcher (handed to the host) and a
//! [`MemoryDriver`] (kept by whoever plays the game side). The driver
//! pushes events, scripts command replies, and inspects what the host sent.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use botforge_protocol::CommandOutput;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use crate::{Launcher, LauncherEvent, TransportError};

/// Which send method a command went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Plain,
    Ws,
    Wo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    pub kind: CommandKind,
    pub text: String,
}

/// The next reply to a `send_command_ws(.., true)`.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Output(CommandOutput),
    Timeout,
}

#[derive(Default)]
struct State {
    sent: Vec<SentCommand>,
    replies: VecDeque<ScriptedReply>,
    roster: Option<HashMap<String, String>>,
    bot_name: Option<String>,
    listened: BTreeSet<i32>,
}

type Shared = Arc<Mutex<State>>;

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A [`Launcher`] backed by a channel and a scripted command table.
pub struct MemoryLauncher {
    events: AsyncMutex<mpsc::UnboundedReceiver<LauncherEvent>>,
    state: Shared,
    reports_identity: bool,
}

impl MemoryLauncher {
    /// A launcher that leaves identity discovery to the host.
    pub fn new() -> (Self, MemoryDriver) {
        Self::build(false)
    }

    /// A launcher whose [`Launcher::bot_name`] is authoritative.
    pub fn reporting_identity() -> (Self, MemoryDriver) {
        Self::build(true)
    }

    fn build(reports_identity: bool) -> (Self, MemoryDriver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Shared::default();
        let launcher = Self {
            events: AsyncMutex::new(rx),
            state: Arc::clone(&state),
            reports_identity,
        };
        (launcher, MemoryDriver { events: tx, state })
    }

    fn record(&self, kind: CommandKind, text: &str) {
        tracing::trace!(?kind, command = text, "command sent");
        lock(&self.state).sent.push(SentCommand {
            kind,
            text: text.to_string(),
        });
    }
}

#[async_trait]
impl Launcher for MemoryLauncher {
    async fn recv(&self) -> Result<Option<LauncherEvent>, TransportError> {
        Ok(self.events.lock().await.recv().await)
    }

    async fn send_command(&self, command: &str) -> Result<(), TransportError> {
        self.record(CommandKind::Plain, command);
        Ok(())
    }

    async fn send_command_ws(
        &self,
        command: &str,
        wait_for_response: bool,
    ) -> Result<Option<CommandOutput>, TransportError> {
        self.record(CommandKind::Ws, command);
        if !wait_for_response {
            return Ok(None);
        }
        match lock(&self.state).replies.pop_front() {
            Some(ScriptedReply::Output(out)) => Ok(Some(out)),
            Some(ScriptedReply::Timeout) | None => Err(TransportError::Timeout(command.to_string())),
        }
    }

    async fn send_command_wo(&self, command: &str) -> Result<(), TransportError> {
        self.record(CommandKind::Wo, command);
        Ok(())
    }

    async fn listen_packets(&self, ids: &[i32]) -> Result<(), TransportError> {
        lock(&self.state).listened.extend(ids.iter().copied());
        Ok(())
    }

    async fn players_and_uuids(&self) -> Option<HashMap<String, String>> {
        lock(&self.state).roster.clone()
    }

    async fn bot_name(&self) -> Option<String> {
        lock(&self.state).bot_name.clone()
    }

    fn reports_identity(&self) -> bool {
        self.reports_identity
    }
}

/// The game side of a [`MemoryLauncher`].
///
/// Dropping the driver (or calling [`close`](Self::close)) ends the
/// session: the launcher's `recv` returns `Ok(None)` once queued events
/// are drained.
pub struct MemoryDriver {
    events: mpsc::UnboundedSender<LauncherEvent>,
    state: Shared,
}

impl MemoryDriver {
    /// Queues an event. Returns `false` if the launcher is gone.
    pub fn push(&self, event: LauncherEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn launched(&self) -> bool {
        self.push(LauncherEvent::Launched)
    }

    pub fn packet(&self, id: i32, body: Value) -> bool {
        self.push(LauncherEvent::Packet { id, body })
    }

    /// Ends the session.
    pub fn close(self) {}

    pub fn set_roster(&self, roster: HashMap<String, String>) {
        lock(&self.state).roster = Some(roster);
    }

    pub fn set_bot_name(&self, name: impl Into<String>) {
        lock(&self.state).bot_name = Some(name.into());
    }

    /// Queues the reply for the next command sent with a reply requested.
    /// With nothing queued, such commands time out.
    pub fn queue_reply(&self, reply: ScriptedReply) {
        lock(&self.state).replies.push_back(reply);
    }

    /// Every command sent so far, oldest first.
    pub fn sent(&self) -> Vec<SentCommand> {
        lock(&self.state).sent.clone()
    }

    /// Just the command texts.
    pub fn sent_texts(&self) -> Vec<String> {
        lock(&self.state).sent.iter().map(|c| c.text.clone()).collect()
    }

    /// Packet ids subscribed so far, ascending.
    pub fn listened(&self) -> Vec<i32> {
        lock(&self.state).listened.iter().copied().collect()
    }
}
