//! The decode step: `(id, json)` → a closed set of typed packets.

use serde_json::Value;

use crate::{PlayerListPacket, ProtocolError, TextPacket, ids};

/// An inbound packet after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPacket {
    PlayerList(PlayerListPacket),
    Text(TextMessage),
    /// Anything the host doesn't model. Plugins may still subscribe to it.
    Other { id: i32, body: Value },
}

impl InboundPacket {
    /// Decodes a packet body by id.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedPacket`] if a modeled packet's body doesn't
    /// fit its record. Unmodeled ids never fail.
    pub fn decode(id: i32, body: &Value) -> Result<Self, ProtocolError> {
        let malformed = |source| ProtocolError::MalformedPacket { id, source };
        match id {
            ids::PLAYER_LIST => serde_json::from_value::<PlayerListPacket>(body.clone())
                .map(Self::PlayerList)
                .map_err(malformed),
            ids::TEXT => serde_json::from_value::<TextPacket>(body.clone())
                .map(|pkt| Self::Text(TextMessage::from(pkt)))
                .map_err(malformed),
            _ => Ok(Self::Other {
                id,
                body: body.clone(),
            }),
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Self::PlayerList(_) => ids::PLAYER_LIST,
            Self::Text(_) => ids::TEXT,
            Self::Other { id, .. } => *id,
        }
    }
}

// ---------------------------------------------------------------------------
// Text messages
// ---------------------------------------------------------------------------

/// A text packet, classified by its `TextType`.
#[derive(Debug, Clone, PartialEq)]
pub enum TextMessage {
    /// Type 1: ordinary chat.
    Chat { source: String, message: String },
    /// Type 2: a translated system line (joins, leaves, deaths, ...).
    System {
        /// The translation key with colour codes and `%` removed.
        key: String,
        /// The message exactly as received.
        message: String,
        params: Vec<String>,
    },
    /// Type 7: whisper.
    Whisper { source: String, message: String },
    /// Type 8: `/say` announcement. `message` still carries the `[source]` prefix.
    Announcement { source: String, message: String },
    /// Type 9: raw JSON text (`tellraw`).
    ObjectJson { message: String },
    Other { text_type: i32, message: String },
}

impl From<TextPacket> for TextMessage {
    fn from(pkt: TextPacket) -> Self {
        let TextPacket {
            text_type,
            source_name: source,
            message,
            parameters: params,
        } = pkt;
        match text_type {
            1 => Self::Chat { source, message },
            2 => Self::System {
                key: translation_key(&message).to_string(),
                message,
                params,
            },
            7 => Self::Whisper { source, message },
            8 => Self::Announcement { source, message },
            9 => Self::ObjectJson { message },
            _ => Self::Other { text_type, message },
        }
    }
}

impl TextMessage {
    /// For announcements, the text after the sender's `[name]` tag.
    /// Other variants return their message unchanged.
    pub fn body(&self) -> &str {
        match self {
            Self::Announcement { source, message } => {
                let tag = format!("[{source}]");
                message
                    .strip_prefix(tag.as_str())
                    .map(str::trim_start)
                    .unwrap_or(message.as_str())
            }
            Self::Chat { message, .. }
            | Self::System { message, .. }
            | Self::Whisper { message, .. }
            | Self::ObjectJson { message }
            | Self::Other { message, .. } => message,
        }
    }
}

/// Strips leading `§x` formatting codes and a `%` from a system message.
///
/// `"§e%multiplayer.player.joined"` → `"multiplayer.player.joined"`.
pub fn translation_key(message: &str) -> &str {
    let mut rest = message;
    while let Some(after) = rest.strip_prefix('§') {
        let mut chars = after.chars();
        chars.next();
        rest = chars.as_str();
    }
    rest.strip_prefix('%').unwrap_or(rest)
}

/// Joins the `text` parts of a `{"rawtext": [...]}` payload.
///
/// `None` if the payload isn't JSON or has no `rawtext` array. Parts
/// without a string `text` (translations, selectors) are skipped.
pub fn flatten_rawtext(message: &str) -> Option<String> {
    let value: Value = serde_json::from_str(message).ok()?;
    let parts = value.get("rawtext")?.as_array()?;
    Some(
        parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(text_type: i32, source: &str, message: &str, params: &[&str]) -> Value {
        json!({
            "TextType": text_type,
            "SourceName": source,
            "Message": message,
            "Parameters": params,
        })
    }

    #[test]
    fn test_decode_player_list() {
        let body = json!({"Entries": [{"UUID": "u", "Username": "Steve", "Skin": {"SkinData": "x"}}]});
        match InboundPacket::decode(ids::PLAYER_LIST, &body).unwrap() {
            InboundPacket::PlayerList(pkt) => assert_eq!(pkt.entries[0].username, "Steve"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_id_passes_through() {
        let body = json!({"anything": 1});
        let pkt = InboundPacket::decode(1234, &body).unwrap();
        assert_eq!(pkt, InboundPacket::Other { id: 1234, body });
        assert_eq!(pkt.id(), 1234);
    }

    #[test]
    fn test_decode_malformed_text_is_error() {
        let err = InboundPacket::decode(ids::TEXT, &json!({"TextType": "two"})).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedPacket { id: 9, .. }));
    }

    #[test]
    fn test_text_types_map_to_variants() {
        let decode = |v: Value| match InboundPacket::decode(ids::TEXT, &v).unwrap() {
            InboundPacket::Text(t) => t,
            other => panic!("unexpected {other:?}"),
        };

        assert!(matches!(decode(text(1, "Steve", "hi", &[])), TextMessage::Chat { .. }));
        assert!(matches!(decode(text(7, "Steve", "psst", &[])), TextMessage::Whisper { .. }));
        assert!(matches!(decode(text(8, "Steve", "[Steve] hi", &[])), TextMessage::Announcement { .. }));
        assert!(matches!(decode(text(9, "", "{}", &[])), TextMessage::ObjectJson { .. }));
        assert!(matches!(
            decode(text(4, "", "tip", &[])),
            TextMessage::Other { text_type: 4, .. }
        ));

        match decode(text(2, "", "§e%multiplayer.player.joined", &["Alex"])) {
            TextMessage::System { key, message, params } => {
                assert_eq!(key, "multiplayer.player.joined");
                assert_eq!(message, "§e%multiplayer.player.joined");
                assert_eq!(params, vec!["Alex".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_translation_key_strips_codes_and_percent() {
        assert_eq!(translation_key("§e%multiplayer.player.left"), "multiplayer.player.left");
        assert_eq!(translation_key("§l§c%death.attack.mob"), "death.attack.mob");
        assert_eq!(translation_key("death.fell.accident.generic"), "death.fell.accident.generic");
        assert_eq!(translation_key("§"), "");
    }

    #[test]
    fn test_announcement_body_strips_sender_tag() {
        let msg = TextMessage::Announcement {
            source: "Steve".into(),
            message: "[Steve] hello world".into(),
        };
        assert_eq!(msg.body(), "hello world");

        let untagged = TextMessage::Announcement {
            source: "Steve".into(),
            message: "no tag here".into(),
        };
        assert_eq!(untagged.body(), "no tag here");
    }

    #[test]
    fn test_chat_body_unchanged() {
        let msg = TextMessage::Chat {
            source: "Steve".into(),
            message: "[Steve] literal".into(),
        };
        assert_eq!(msg.body(), "[Steve] literal");
    }

    #[test]
    fn test_flatten_rawtext() {
        assert_eq!(
            flatten_rawtext(r#"{"rawtext":[{"text":"Hello "},{"translate":"x"},{"text":"world"}]}"#),
            Some("Hello world".to_string())
        );
        assert_eq!(flatten_rawtext("not json"), None);
        assert_eq!(flatten_rawtext(r#"{"other":1}"#), None);
    }
}
