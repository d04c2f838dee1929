//! Commands and messages sent on the bot's behalf.

use std::sync::Arc;

use botforge_protocol::CommandOutput;
use botforge_transport::{Launcher, TransportError};
use serde_json::json;

use crate::presence::Presence;

/// Builds a `tellraw` command showing `text` to `target`.
///
/// The text is JSON-escaped, so quotes and backslashes arrive intact.
pub fn tellraw_command(target: &str, text: &str) -> String {
    let payload = json!({ "rawtext": [{ "text": text }] });
    format!("tellraw {target} {payload}")
}

/// Where a `title` command draws its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSlot {
    Title,
    Subtitle,
    Actionbar,
}

impl TitleSlot {
    fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Subtitle => "subtitle",
            Self::Actionbar => "actionbar",
        }
    }
}

pub fn title_command(target: &str, slot: TitleSlot, text: &str) -> String {
    format!("title {target} {} {text}", slot.as_str())
}

/// The game as seen by plugins: the launcher plus the presence tables.
#[derive(Clone)]
pub struct GameControl {
    launcher: Arc<dyn Launcher>,
    presence: Arc<Presence>,
}

impl GameControl {
    pub fn new(launcher: Arc<dyn Launcher>, presence: Arc<Presence>) -> Self {
        Self { launcher, presence }
    }

    pub async fn send_command(&self, command: &str) -> Result<(), TransportError> {
        self.launcher.send_command(command).await
    }

    /// See [`Launcher::send_command_ws`].
    pub async fn send_command_ws(
        &self,
        command: &str,
        wait_for_response: bool,
    ) -> Result<Option<CommandOutput>, TransportError> {
        self.launcher.send_command_ws(command, wait_for_response).await
    }

    pub async fn send_command_wo(&self, command: &str) -> Result<(), TransportError> {
        self.launcher.send_command_wo(command).await
    }

    /// Shows a chat line to `target` (a name or a selector such as `@a`).
    pub async fn say_to(&self, target: &str, text: &str) -> Result<(), TransportError> {
        self.send_command_wo(&tellraw_command(target, text)).await
    }

    pub async fn title(&self, target: &str, text: &str) -> Result<(), TransportError> {
        self.send_command_wo(&title_command(target, TitleSlot::Title, text)).await
    }

    pub async fn subtitle(&self, target: &str, text: &str) -> Result<(), TransportError> {
        self.send_command_wo(&title_command(target, TitleSlot::Subtitle, text)).await
    }

    pub async fn actionbar(&self, target: &str, text: &str) -> Result<(), TransportError> {
        self.send_command_wo(&title_command(target, TitleSlot::Actionbar, text)).await
    }

    pub fn online_players(&self) -> Vec<String> {
        self.presence.online_players()
    }

    pub fn bot_name(&self) -> Option<String> {
        self.presence.bot_name()
    }

    pub fn launcher(&self) -> &Arc<dyn Launcher> {
        &self.launcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botforge_transport::{CommandKind, MemoryLauncher};

    #[test]
    fn test_tellraw_command_escapes_text() {
        assert_eq!(
            tellraw_command("@a", r#"say "hi" \o/"#),
            r#"tellraw @a {"rawtext":[{"text":"say \"hi\" \\o/"}]}"#
        );
    }

    #[test]
    fn test_title_command_slots() {
        assert_eq!(title_command("Steve", TitleSlot::Title, "Hi"), "title Steve title Hi");
        assert_eq!(title_command("@a", TitleSlot::Subtitle, "x"), "title @a subtitle x");
        assert_eq!(title_command("@a", TitleSlot::Actionbar, "y"), "title @a actionbar y");
    }

    #[tokio::test]
    async fn test_say_to_and_titles_use_no_output_commands() {
        let (launcher, driver) = MemoryLauncher::new();
        let game = GameControl::new(Arc::new(launcher), Arc::new(Presence::new(false)));

        game.say_to("Steve", "hello").await.unwrap();
        game.actionbar("Steve", "ready").await.unwrap();

        let sent = driver.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|c| c.kind == CommandKind::Wo));
        assert_eq!(sent[0].text, tellraw_command("Steve", "hello"));
        assert_eq!(sent[1].text, "title Steve actionbar ready");
    }

    #[tokio::test]
    async fn test_presence_views_reflect_roster() {
        let (launcher, _driver) = MemoryLauncher::new();
        let presence = Arc::new(Presence::new(false));
        let game = GameControl::new(Arc::new(launcher), Arc::clone(&presence));

        presence.seed_roster(vec![("Bot".to_string(), None)]);
        presence.set_bot_name("Bot");
        assert_eq!(game.online_players(), vec!["Bot".to_string()]);
        assert_eq!(game.bot_name().as_deref(), Some("Bot"));
    }
}
