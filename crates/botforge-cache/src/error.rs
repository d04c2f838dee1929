//! Error types for the cache layer.

use std::path::PathBuf;

use crate::DocumentPath;

/// Errors from the document cache and store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A required document has no backing file.
    #[error("document {0} does not exist")]
    NotFound(DocumentPath),

    /// The document was never loaded, or has been unloaded.
    #[error("document {0} is not loaded")]
    NotLoaded(DocumentPath),

    /// A namespace or key that can't be mapped safely onto a file name.
    #[error("invalid document path: {0}")]
    InvalidPath(String),

    /// Reading, writing, or renaming the backing file failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file holds malformed JSON, or a typed read didn't match.
    #[error("malformed document {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
