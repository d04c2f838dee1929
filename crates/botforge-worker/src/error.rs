//! Failure types for supervised workers.

use std::error::Error;
use std::fmt::Write as _;

/// Error type returned by worker procedures.
///
/// Boxed so workers can bubble up whatever their collaborators return
/// with `?`.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Why a worker ended abnormally.
///
/// Carries the worker's label so a failure can be attributed without
/// the handle at hand. Cloneable so it can be fanned out to the log,
/// the failure callback, and anyone awaiting the outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerFailure {
    /// The procedure returned `Err`. `message` holds the full source chain.
    #[error("worker '{label}' failed: {message}")]
    Error { label: String, message: String },

    /// The procedure panicked.
    #[error("worker '{label}' panicked: {message}")]
    Panicked { label: String, message: String },
}

impl WorkerFailure {
    /// Label of the worker that failed.
    pub fn label(&self) -> &str {
        match self {
            Self::Error { label, .. } | Self::Panicked { label, .. } => label,
        }
    }

    /// The error chain or panic message.
    pub fn message(&self) -> &str {
        match self {
            Self::Error { message, .. } | Self::Panicked { message, .. } => message,
        }
    }
}

/// Renders an error and all of its sources as `outer: inner: root`.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, ": {cause}");
        source = cause.source();
    }
    out
}

/// Extracts a printable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
