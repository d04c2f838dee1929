//! Operator console.
//!
//! A table of trigger words. A line runs the command whose trigger is its
//! first word, or failing that, the command with the longest trigger the
//! line starts with (so `.tp Steve` and `.tpSteve` both reach `.tp`).
//! `help` (or `?`) and `exit` are always available.

use std::sync::{Arc, Mutex, MutexGuard};

use botforge_worker::{BoxError, Supervisor, WorkerHandle, error_chain};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const HELP_TRIGGERS: [&str; 2] = ["?", "help"];
const EXIT_TRIGGERS: [&str; 1] = ["exit"];

/// Runs a console command with its whitespace-split arguments.
pub type ConsoleHandler = Arc<dyn Fn(&[&str]) -> Result<(), BoxError> + Send + Sync>;

struct ConsoleCommand {
    triggers: Vec<String>,
    arg_hint: Option<String>,
    usage: String,
    handler: ConsoleHandler,
}

/// What [`ConsoleMenu::handle_line`] did with a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleOutcome {
    Empty,
    Help,
    Exit,
    Handled,
    /// A handler ran and returned an error. Already logged.
    Failed,
    Unknown,
}

pub struct ConsoleMenu {
    commands: Mutex<Vec<ConsoleCommand>>,
    shutdown: CancellationToken,
}

impl ConsoleMenu {
    /// `shutdown` is cancelled when the operator types `exit`.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    fn commands(&self) -> MutexGuard<'_, Vec<ConsoleCommand>> {
        self.commands.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a command. Returns `false`, and adds nothing, if any trigger is
    /// already taken.
    pub fn register<F>(&self, triggers: &[&str], arg_hint: Option<&str>, usage: &str, handler: F) -> bool
    where
        F: Fn(&[&str]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let mut commands = self.commands();
        let taken = triggers.iter().copied().find(|t| {
            HELP_TRIGGERS.contains(t)
                || EXIT_TRIGGERS.contains(t)
                || commands.iter().any(|c| c.triggers.iter().any(|existing| existing == *t))
        });
        if let Some(trigger) = taken {
            warn!(%trigger, %usage, "console trigger already registered, command not added");
            return false;
        }

        commands.push(ConsoleCommand {
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            arg_hint: arg_hint.map(str::to_string),
            usage: usage.to_string(),
            handler: Arc::new(handler),
        });
        true
    }

    /// One line per command, built-ins first.
    pub fn help_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("{} -> list console commands", HELP_TRIGGERS.join(" / ")),
            format!("{} -> shut the host down", EXIT_TRIGGERS.join(" / ")),
        ];
        for cmd in self.commands().iter() {
            let triggers = cmd.triggers.join(" / ");
            lines.push(match &cmd.arg_hint {
                Some(hint) => format!("{triggers} {hint} -> {}", cmd.usage),
                None => format!("{triggers} -> {}", cmd.usage),
            });
        }
        lines
    }

    pub fn handle_line(&self, line: &str) -> ConsoleOutcome {
        let line = line.trim();
        let Some(first) = line.split_whitespace().next() else {
            return ConsoleOutcome::Empty;
        };

        if HELP_TRIGGERS.contains(&first) {
            for help in self.help_lines() {
                info!("{help}");
            }
            return ConsoleOutcome::Help;
        }
        if EXIT_TRIGGERS.contains(&first) {
            info!("exit requested from console");
            self.shutdown.cancel();
            return ConsoleOutcome::Exit;
        }

        let Some((handler, trigger, args)) = self.resolve(line, first) else {
            warn!(%line, "unknown console command, type help for a list");
            return ConsoleOutcome::Unknown;
        };
        let args: Vec<&str> = args.split_whitespace().collect();
        match handler(&args) {
            Ok(()) => ConsoleOutcome::Handled,
            Err(e) => {
                error!(%trigger, error = %error_chain(e.as_ref()), "console command failed");
                ConsoleOutcome::Failed
            }
        }
    }

    /// Finds the handler for a line: exact first word, then longest prefix.
    /// Returns it with its trigger and the unparsed argument text.
    fn resolve<'l>(&self, line: &'l str, first: &str) -> Option<(ConsoleHandler, String, &'l str)> {
        let commands = self.commands();

        for cmd in commands.iter() {
            if cmd.triggers.iter().any(|t| t == first) {
                let rest = &line[first.len()..];
                return Some((Arc::clone(&cmd.handler), first.to_string(), rest));
            }
        }

        commands
            .iter()
            .flat_map(|cmd| cmd.triggers.iter().map(move |t| (cmd, t)))
            .filter(|(_, t)| line.starts_with(t.as_str()))
            .max_by_key(|(_, t)| t.len())
            .map(|(cmd, t)| (Arc::clone(&cmd.handler), t.clone(), &line[t.len()..]))
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Reads commands from stdin on a worker labeled `console`.
    pub fn start(self: &Arc<Self>, supervisor: &Supervisor) -> WorkerHandle {
        self.start_with_reader(tokio::io::stdin(), supervisor)
    }

    /// Reads commands from `reader` until it ends, `exit` is typed, or the
    /// worker is cancelled.
    pub fn start_with_reader<R>(self: &Arc<Self>, reader: R, supervisor: &Supervisor) -> WorkerHandle
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let menu = Arc::clone(self);
        supervisor.spawn("console", move |ctx| async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                let line = tokio::select! {
                    _ = ctx.cancelled() => break,
                    line = lines.next_line() => line?,
                };
                let Some(line) = line else { break };
                if menu.handle_line(&line) == ConsoleOutcome::Exit {
                    break;
                }
            }
            Ok::<(), BoxError>(())
        })
    }
}
