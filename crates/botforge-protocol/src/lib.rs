//! Game packet protocol for botforge.
//!
//! The launcher hands the host every packet as a numeric id plus a JSON
//! body. This crate turns that pair into typed values before any business
//! logic sees it:
//!
//! - **Packet records** ([`PlayerListPacket`], [`TextPacket`],
//!   [`CommandOutput`]): serde mirrors of the JSON bodies.
//! - **Decode step** ([`InboundPacket::decode`]): a closed set of variants
//!   the dispatcher matches on. Packets it doesn't model pass through as
//!   [`InboundPacket::Other`].
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ↔ values, used where
//!   packets or events cross a byte boundary (files, pipes).
//!
//! ```text
//! Launcher (JSON bodies) → Protocol (InboundPacket) → Dispatcher (events)
//! ```

mod codec;
mod error;
mod inbound;
mod packet;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use inbound::{InboundPacket, TextMessage, flatten_rawtext, translation_key};
pub use packet::{
    CommandOutput, OutputMessage, PlayerListEntry, PlayerListPacket, SkinData, TextPacket, ids,
};
