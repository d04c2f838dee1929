//! A bot driven from stdin.
//!
//! Each stdin line is one launcher event as JSON, for example:
//!
//! ```text
//! {"event":"launched"}
//! {"event":"packet","id":63,"body":{"Entries":[{"UUID":"u-1","Username":"Steve","Skin":{"SkinData":"x"}}]}}
//! {"event":"packet","id":9,"body":{"TextType":1,"SourceName":"Steve","Message":"!echo hello"}}
//! {"event":"packet","id":9,"body":{"TextType":1,"SourceName":"Steve","Message":"!quiz"}}
//! {"event":"packet","id":9,"body":{"TextType":1,"SourceName":"Steve","Message":"42"}}
//! ```
//!
//! When stdin ends the host shuts down and every command the bot sent is
//! printed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use botforge::prelude::*;
use botforge::{SessionError, logging};
use botforge_protocol::{Codec, JsonCodec};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "echo-bot", about = "botforge demo driven by JSON events on stdin")]
struct Args {
    /// Host config file. Created with defaults if missing.
    #[arg(short, long, env = "BOTFORGE_CONFIG", default_value = "botforge.toml")]
    config: PathBuf,

    /// The bot's player name.
    #[arg(long, default_value = "EchoBot")]
    bot_name: String,

    /// Players online when the bot joins, comma separated.
    #[arg(long, value_delimiter = ',')]
    players: Vec<String>,
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct PlayerStats {
    visits: u64,
    messages: u64,
}

type PendingAnswers = Arc<Mutex<HashMap<String, oneshot::Sender<String>>>>;

/// Greets players, echoes `!echo` lines, and runs a one-question quiz as
/// an interactive session.
#[derive(Default)]
struct EchoPlugin {
    answers: PendingAnswers,
    /// Packets run on separate workers; this keeps each stats
    /// read-modify-write whole.
    stats: tokio::sync::Mutex<()>,
}

impl EchoPlugin {
    const QUIZ_TIMEOUT: Duration = Duration::from_secs(30);

    async fn update_stats(&self, ctx: &PluginContext, name: &str, f: impl FnOnce(&mut PlayerStats)) -> PluginResult {
        let path = DocumentPath::new("players", name)?;
        let _stats = self.stats.lock().await;
        let cache = ctx.cache();
        if !cache.is_loaded(&path).await {
            cache.load(&path, false).await?;
        }
        let mut stats = cache.read_as::<Option<PlayerStats>>(&path).await?.unwrap_or_default();
        f(&mut stats);
        cache.write_as(&path, &stats).await?;
        Ok(())
    }

    async fn start_quiz(&self, ctx: &PluginContext, name: &str) -> PluginResult {
        let game = ctx.game().clone();
        let answers = Arc::clone(&self.answers);
        let player = name.to_string();

        let started = ctx.sessions().start(name, move |worker| async move {
            let (tx, rx) = oneshot::channel();
            answers.lock().unwrap_or_else(|p| p.into_inner()).insert(player.clone(), tx);
            game.say_to(&player, "Quiz: what is 6 x 7?").await?;

            let reply = tokio::select! {
                _ = worker.cancelled() => None,
                _ = tokio::time::sleep(Self::QUIZ_TIMEOUT) => None,
                answer = rx => answer.ok(),
            };
            answers.lock().unwrap_or_else(|p| p.into_inner()).remove(&player);

            match reply.as_deref().map(str::trim) {
                Some("42") => game.title(&player, "Correct!").await?,
                Some(_) => game.title(&player, "Not quite").await?,
                None => game.say_to(&player, "Quiz timed out").await?,
            }
            Ok::<(), BoxError>(())
        });

        match started {
            Ok(_) => Ok(()),
            Err(SessionError::AlreadyActive(_)) => {
                ctx.game().say_to(name, "Finish your current quiz first").await?;
                Ok(())
            }
        }
    }

    /// Hands a chat line to a waiting quiz. Returns whether it was consumed.
    fn take_answer(&self, name: &str, message: &str) -> bool {
        let sender = self.answers.lock().unwrap_or_else(|p| p.into_inner()).remove(name);
        match sender {
            Some(tx) => tx.send(message.to_string()).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Plugin for EchoPlugin {
    fn name(&self) -> &str {
        "echo"
    }

    async fn on_def(&self, ctx: &PluginContext) -> PluginResult {
        let sessions = ctx.sessions().clone();
        ctx.console().register(&["sessions"], None, "list players in a quiz", move |_| {
            tracing::info!(active = ?sessions.active(), "quiz sessions");
            Ok(())
        });
        Ok(())
    }

    async fn on_init(&self, ctx: &PluginContext) -> PluginResult {
        tracing::info!(online = ?ctx.game().online_players(), "echo plugin ready");
        Ok(())
    }

    async fn on_player_join(&self, ctx: &PluginContext, name: &str) -> PluginResult {
        let mut visits = 0;
        self.update_stats(ctx, name, |s| {
            s.visits += 1;
            visits = s.visits;
        })
        .await?;
        ctx.game()
            .say_to(name, &format!("Welcome, {name}! Visit number {visits}."))
            .await?;
        Ok(())
    }

    async fn on_player_leave(&self, ctx: &PluginContext, name: &str) -> PluginResult {
        let path = DocumentPath::new("players", name)?;
        ctx.cache().unload(&path).await?;
        Ok(())
    }

    async fn on_player_chat(&self, ctx: &PluginContext, name: &str, message: &str) -> PluginResult {
        if ctx.game().bot_name().as_deref() == Some(name) {
            return Ok(());
        }
        if self.take_answer(name, message) {
            return Ok(());
        }

        self.update_stats(ctx, name, |s| s.messages += 1).await?;
        if let Some(text) = message.strip_prefix("!echo ") {
            ctx.game().say_to(name, text).await?;
        } else if message.trim() == "!quiz" {
            self.start_quiz(ctx, name).await?;
        }
        Ok(())
    }

    async fn on_player_death(
        &self,
        ctx: &PluginContext,
        name: &str,
        killer: Option<&str>,
        _message: &str,
    ) -> PluginResult {
        let text = match killer {
            Some(killer) => format!("{name} was defeated by {killer}"),
            None => format!("{name} had an accident"),
        };
        ctx.game().actionbar("@a", &text).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), BotforgeError> {
    let args = Args::parse();
    let config = HostConfig::load_or_create(&args.config).await?;
    logging::init(&config.logging)?;

    let (launcher, driver) = MemoryLauncher::reporting_identity();
    driver.set_bot_name(&args.bot_name);
    let mut roster: HashMap<String, String> = HashMap::new();
    roster.insert(args.bot_name.clone(), "bot".to_string());
    for (i, player) in args.players.iter().enumerate() {
        roster.insert(player.clone(), format!("roster-{i}"));
    }
    driver.set_roster(roster);

    let host = BotHost::builder(Arc::new(launcher))
        .config(config)
        .console(false)
        .plugin(EchoPlugin::default())
        .build();

    let feeder = async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match JsonCodec.decode::<LauncherEvent>(line.as_bytes()) {
                Ok(event) => {
                    driver.push(event);
                }
                Err(e) => tracing::warn!(error = %e, "skipping malformed event line"),
            }
        }
        let sent = driver.sent();
        driver.close();
        sent
    };

    let (result, sent) = tokio::join!(host.run(), feeder);
    for command in sent {
        println!("{:?} {}", command.kind, command.text);
    }
    result
}
