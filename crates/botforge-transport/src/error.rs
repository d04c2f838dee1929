/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A command expecting a reply got none in time. Callers may retry.
    #[error("command timed out: {0}")]
    Timeout(String),

    /// The game session is gone.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The launcher refused or failed to send.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Reading or writing the launcher's pipe failed.
    #[error("launcher i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
