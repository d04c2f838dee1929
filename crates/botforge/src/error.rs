//! Unified error type for the botforge host.

use botforge_cache::CacheError;
use botforge_protocol::ProtocolError;
use botforge_session::SessionError;
use botforge_transport::TransportError;

use crate::config::ConfigError;
use crate::plugin::PluginError;

/// Top-level error that wraps all crate-specific errors.
///
/// Each variant carries `#[from]`, so `?` converts sub-crate errors
/// automatically inside the host and inside plugin code that returns it.
#[derive(Debug, thiserror::Error)]
pub enum BotforgeError {
    /// The launcher failed (closed, timed out, send failed).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A packet body didn't decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session was already live for the entity.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A document cache operation failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A plugin hook failed or panicked.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// The host config couldn't be read or written.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A global tracing subscriber was already installed.
    #[error("logging init failed: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    /// Host-level filesystem work (the data directory).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use botforge_cache::DocumentPath;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let botforge_err: BotforgeError = err.into();
        assert!(matches!(botforge_err, BotforgeError::Transport(_)));
        assert!(botforge_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AlreadyActive("Steve".into());
        let botforge_err: BotforgeError = err.into();
        assert!(matches!(botforge_err, BotforgeError::Session(_)));
        assert!(botforge_err.to_string().contains("Steve"));
    }

    #[test]
    fn test_from_cache_error() {
        let path = DocumentPath::new("scores", "Steve").unwrap();
        let botforge_err: BotforgeError = CacheError::NotLoaded(path).into();
        assert!(matches!(botforge_err, BotforgeError::Cache(_)));
        assert!(botforge_err.to_string().contains("scores/Steve"));
    }

    #[test]
    fn test_from_plugin_error() {
        let err = PluginError::Panicked {
            plugin: "greeter".into(),
            hook: "on_init",
            message: "boom".into(),
        };
        let botforge_err: BotforgeError = err.into();
        assert!(matches!(botforge_err, BotforgeError::Plugin(_)));
        assert!(botforge_err.to_string().contains("greeter"));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let botforge_err: BotforgeError = err.into();
        assert!(matches!(botforge_err, BotforgeError::Io(_)));
    }
}
