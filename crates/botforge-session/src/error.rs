//! Error types for the session layer.

/// Errors from starting or entering a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The entity already has a live session. Nothing was started.
    #[error("entity {0} already has an active session")]
    AlreadyActive(String),
}
