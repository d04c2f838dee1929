//! Logical document paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::CacheError;

/// Identifies one cached document: a namespace (normally the owning
/// plugin's name) and a key within it.
///
/// Both parts must be usable as a single file-name component, so neither
/// may be empty, contain a path separator, or start with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    namespace: String,
    key: String,
}

impl DocumentPath {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Result<Self, CacheError> {
        let namespace = namespace.into();
        let key = key.into();
        validate_component(&namespace)?;
        validate_component(&key)?;
        Ok(Self { namespace, key })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `<root>/<namespace>/<key>.json`
    pub fn file_path(&self, root: &Path) -> PathBuf {
        root.join(&self.namespace).join(format!("{}.json", self.key))
    }

    /// `<root>/<namespace>`
    pub fn namespace_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.namespace)
    }
}

fn validate_component(part: &str) -> Result<(), CacheError> {
    if part.is_empty() {
        return Err(CacheError::InvalidPath("empty path component".into()));
    }
    if part.starts_with('.') || part.contains(['/', '\\', '\0']) {
        return Err(CacheError::InvalidPath(format!("{part:?} is not a valid path component")));
    }
    Ok(())
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.key)
    }
}

/// Parses `namespace/key`.
impl FromStr for DocumentPath {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, key) = s
            .split_once('/')
            .ok_or_else(|| CacheError::InvalidPath(format!("{s:?} is not of the form namespace/key")))?;
        Self::new(namespace, key)
    }
}
