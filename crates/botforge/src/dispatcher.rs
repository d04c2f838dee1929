//! Inbound packets → presence updates → plugin events.
//!
//! Each packet is handled on its own worker, so a slow plugin delays only
//! the packet that triggered it. Events from one packet are delivered in
//! order; events from different packets may interleave.

use std::sync::Arc;

use botforge_protocol::{InboundPacket, TextMessage, flatten_rawtext};
use botforge_worker::{BoxError, WorkerHandle};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::PluginContext;
use crate::events::GameEvent;
use crate::plugin::PluginGroup;

const KEY_PLAYER_JOINED: &str = "multiplayer.player.joined";
const KEY_PLAYER_LEFT: &str = "multiplayer.player.left";
const KEY_DEATH_PREFIX: &str = "death.";

pub struct Dispatcher {
    ctx: PluginContext,
    plugins: Arc<PluginGroup>,
}

impl Dispatcher {
    pub fn new(ctx: PluginContext, plugins: Arc<PluginGroup>) -> Self {
        Self { ctx, plugins }
    }

    /// Processes a packet on a worker labeled `packet:<id>`.
    pub fn handle_packet(self: &Arc<Self>, id: i32, body: Value) -> WorkerHandle {
        let dispatcher = Arc::clone(self);
        self.ctx.supervisor().spawn(format!("packet:{id}"), move |_ctx| async move {
            dispatcher.process(id, &body).await;
            Ok::<(), BoxError>(())
        })
    }

    /// Decodes, classifies and dispatches one packet in the current task.
    /// Returns the events that were delivered.
    pub async fn process(&self, id: i32, body: &Value) -> Vec<GameEvent> {
        let events = match InboundPacket::decode(id, body) {
            Ok(packet) => self.classify(&packet),
            Err(e) => {
                warn!(packet = id, error = %e, "dropping malformed packet");
                Vec::new()
            }
        };

        for event in &events {
            debug!(event = %event, "dispatching");
            self.plugins.dispatch(&self.ctx, event).await;
        }
        self.plugins.dispatch_packet(&self.ctx, id, body).await;
        events
    }

    fn classify(&self, packet: &InboundPacket) -> Vec<GameEvent> {
        match packet {
            InboundPacket::PlayerList(delta) => self.ctx.presence().apply_roster(delta),
            InboundPacket::Text(text) => classify_text(text).into_iter().collect(),
            InboundPacket::Other { .. } => Vec::new(),
        }
    }
}

/// The event a text message stands for, if any.
pub fn classify_text(text: &TextMessage) -> Option<GameEvent> {
    match text {
        TextMessage::Chat { source, message } | TextMessage::Whisper { source, message } => {
            info!(player = %source, %message, "chat");
            Some(GameEvent::PlayerChat {
                name: source.clone(),
                message: message.clone(),
            })
        }
        TextMessage::Announcement { source, .. } => {
            let body = text.body();
            info!(player = %source, message = %body, "announcement");
            Some(GameEvent::PlayerChat {
                name: source.clone(),
                message: body.to_string(),
            })
        }
        TextMessage::System { key, message, params } => classify_system(key, message, params),
        TextMessage::ObjectJson { message } => {
            if let Some(flat) = flatten_rawtext(message) {
                info!(message = %flat, "raw text");
            }
            None
        }
        TextMessage::Other { .. } => None,
    }
}

fn classify_system(key: &str, message: &str, params: &[String]) -> Option<GameEvent> {
    let subject = params.first();
    if key == KEY_PLAYER_JOINED {
        let Some(name) = subject else {
            warn!(%key, "join message without a player");
            return None;
        };
        return Some(GameEvent::PlayerPrejoin { name: name.clone() });
    }
    if key == KEY_PLAYER_LEFT {
        if let Some(name) = subject {
            debug!(player = %name, "leave announced");
        }
        return None;
    }
    if key.starts_with(KEY_DEATH_PREFIX) {
        let Some(name) = subject else {
            warn!(%key, "death message without a player");
            return None;
        };
        let killer = params.get(1).cloned();
        info!(player = %name, killer = ?killer, %key, "player died");
        return Some(GameEvent::PlayerDeath {
            name: name.clone(),
            killer,
            message: message.to_string(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(key: &str, params: &[&str]) -> TextMessage {
        TextMessage::System {
            key: key.to_string(),
            message: format!("§e%{key}"),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_classify_text_joined_is_prejoin() {
        assert_eq!(
            classify_text(&system(KEY_PLAYER_JOINED, &["Alex"])),
            Some(GameEvent::PlayerPrejoin { name: "Alex".into() })
        );
    }

    #[test]
    fn test_classify_text_left_has_no_event() {
        assert_eq!(classify_text(&system(KEY_PLAYER_LEFT, &["Alex"])), None);
    }

    #[test]
    fn test_classify_text_death_with_killer() {
        assert_eq!(
            classify_text(&system("death.attack.mob", &["Steve", "Zombie"])),
            Some(GameEvent::PlayerDeath {
                name: "Steve".into(),
                killer: Some("Zombie".into()),
                message: "§e%death.attack.mob".into(),
            })
        );
    }

    #[test]
    fn test_classify_text_death_without_killer() {
        match classify_text(&system("death.fell.accident.generic", &["Steve"])) {
            Some(GameEvent::PlayerDeath { killer, .. }) => assert!(killer.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_text_death_without_params_is_dropped() {
        assert_eq!(classify_text(&system("death.attack.mob", &[])), None);
    }

    #[test]
    fn test_classify_text_announcement_strips_sender() {
        let msg = TextMessage::Announcement {
            source: "Steve".into(),
            message: "[Steve] hello".into(),
        };
        assert_eq!(
            classify_text(&msg),
            Some(GameEvent::PlayerChat {
                name: "Steve".into(),
                message: "hello".into(),
            })
        );
    }

    #[test]
    fn test_classify_text_whisper_is_chat() {
        let msg = TextMessage::Whisper {
            source: "Alex".into(),
            message: "psst".into(),
        };
        assert!(matches!(classify_text(&msg), Some(GameEvent::PlayerChat { .. })));
    }

    #[test]
    fn test_classify_text_raw_json_has_no_event() {
        let msg = TextMessage::ObjectJson {
            message: r#"{"rawtext":[{"text":"hi"}]}"#.into(),
        };
        assert_eq!(classify_text(&msg), None);
        let broken = TextMessage::ObjectJson { message: "{".into() };
        assert_eq!(classify_text(&broken), None);
    }
}
