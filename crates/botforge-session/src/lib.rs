//! Session exclusivity for botforge.
//!
//! An **interactive session** is a worker that converses with one entity
//! (usually a player) over several messages: a menu, a prompt, a
//! multi-step form. Two of those running for the same player at once would
//! fight over the player's replies, so the [`SessionRegistry`] guarantees
//! at most one live session per entity identifier.
//!
//! ```text
//! Plugins (above)  ← start sessions for players
//!     ↕
//! Session layer (this crate)  ← who is in a session right now
//!     ↕
//! Worker layer (below)  ← runs each session as a supervised worker
//! ```

mod error;
mod registry;

pub use error::SessionError;
pub use registry::{SessionGuard, SessionRegistry};
