//! Packet body records.
//!
//! Field names follow the launcher's JSON (PascalCase). Fields the host
//! never reads are left out and ignored on decode; fields that are absent
//! in some packet variants default instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Packet ids the host cares about.
pub mod ids {
    pub const TEXT: i32 = 9;
    pub const PLAYER_LIST: i32 = 63;
    pub const COMMAND_OUTPUT: i32 = 79;

    /// Subscribed for every connection, regardless of plugins.
    pub const HOST_REQUIRED: [i32; 3] = [TEXT, COMMAND_OUTPUT, PLAYER_LIST];
}

// ---------------------------------------------------------------------------
// Player list (63)
// ---------------------------------------------------------------------------

/// A roster delta: some players arrived, some left.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerListPacket {
    #[serde(default)]
    pub entries: Vec<PlayerListEntry>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerListEntry {
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub skin: SkinData,
}

impl PlayerListEntry {
    /// Arrivals carry a skin; departures carry an empty one.
    pub fn is_arrival(&self) -> bool {
        self.skin.is_present()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SkinData {
    #[serde(default)]
    pub skin_data: Value,
}

impl SkinData {
    /// Whether the payload is non-empty.
    pub fn is_present(&self) -> bool {
        match &self.skin_data {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Text (9)
// ---------------------------------------------------------------------------

/// A chat line, system message, announcement, or raw JSON text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TextPacket {
    pub text_type: i32,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

// ---------------------------------------------------------------------------
// Command output (79)
// ---------------------------------------------------------------------------

/// Response to a command sent with a reply requested.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandOutput {
    #[serde(default)]
    pub output_messages: Vec<OutputMessage>,
    #[serde(default)]
    pub success_count: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputMessage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl CommandOutput {
    /// `OutputMessages[0].Parameters[0]`, where most commands put their payload.
    pub fn first_parameter(&self) -> Option<&str> {
        self.output_messages
            .first()
            .and_then(|m| m.parameters.first())
            .map(String::as_str)
    }
}
