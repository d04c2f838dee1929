//! File-backed document store.
//!
//! Every write goes to its own sibling temp file, which is synced to disk
//! and then renamed over the target. A crash mid-write leaves either the
//! old document or the new one on disk, never a truncated mix, and two
//! writers of the same document never share a temp file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::io::AsyncWriteExt;

use crate::{CacheError, DocumentPath};

/// Reads and writes JSON documents under a root directory.
#[derive(Debug)]
pub struct DocumentStore {
    root: PathBuf,
    writes: AtomicU64,
    temp_seq: AtomicU64,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writes: AtomicU64::new(0),
            temp_seq: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `path` lives on disk.
    pub fn file_path(&self, path: &DocumentPath) -> PathBuf {
        path.file_path(&self.root)
    }

    /// Number of documents written since the store was created.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Reads a document. `Ok(None)` if the file doesn't exist.
    pub async fn read(&self, path: &DocumentPath) -> Result<Option<Value>, CacheError> {
        let file = self.file_path(path);
        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::io(file, err)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Format { path: file, source })
    }

    /// Writes a document, creating its namespace directory if needed.
    pub async fn write(&self, path: &DocumentPath, document: &Value) -> Result<(), CacheError> {
        self.ensure_namespace(path).await?;
        let file = self.file_path(path);
        let bytes = render(document).map_err(|source| CacheError::Format {
            path: file.clone(),
            source,
        })?;

        let tmp = self.temp_path(&file);
        if let Err(err) = write_synced(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::io(&tmp, err));
        }
        if let Err(err) = tokio::fs::rename(&tmp, &file).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::io(&file, err));
        }

        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(document = %path, "document written");
        Ok(())
    }

    /// Reads a document, writing `default` first if the file is missing.
    pub async fn read_or_init(&self, path: &DocumentPath, default: Value) -> Result<Value, CacheError> {
        match self.read(path).await? {
            Some(document) => Ok(document),
            None => {
                self.write(path, &default).await?;
                Ok(default)
            }
        }
    }

    /// `<file>.<pid>.<seq>.tmp`, unique per write.
    fn temp_path(&self, file: &Path) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let mut tmp = file.as_os_str().to_owned();
        tmp.push(format!(".{}.{seq}.tmp", std::process::id()));
        PathBuf::from(tmp)
    }

    /// Creates `<root>/<namespace>` if it doesn't exist.
    pub async fn ensure_namespace(&self, path: &DocumentPath) -> Result<(), CacheError> {
        let dir = path.namespace_dir(&self.root);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| CacheError::io(dir, err))
    }
}

async fn write_synced(tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut out = tokio::fs::File::create(tmp).await?;
    out.write_all(bytes).await?;
    out.sync_all().await
}

/// Four-space indented JSON; non-ASCII text is written as-is.
fn render(document: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    document.serialize(&mut ser)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> DocumentPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_render_uses_four_space_indent_and_keeps_unicode() {
        let out = String::from_utf8(render(&json!({"名字": "史蒂夫"})).unwrap()).unwrap();
        assert_eq!(out, "{\n    \"名字\": \"史蒂夫\"\n}");
    }

    #[tokio::test]
    async fn test_read_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        assert!(store.read(&path("ns/missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let p = path("ns/doc");

        store.write(&p, &json!({"a": 1})).await.unwrap();

        assert_eq!(store.read(&p).await.unwrap(), Some(json!({"a": 1})));
        assert!(dir.path().join("ns/doc.json").is_file());
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_temp_path_is_unique_per_write() {
        let store = DocumentStore::new("/data");
        let file = Path::new("/data/ns/doc.json");
        let a = store.temp_path(file);
        let b = store.temp_path(file);
        assert_ne!(a, b);
        assert_eq!(a.parent(), file.parent());
        assert!(a.to_string_lossy().ends_with(".tmp"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_of_one_document_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(DocumentStore::new(dir.path()));
        let p = path("ns/doc");

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                let p = p.clone();
                tokio::spawn(async move { store.write(&p, &json!(i)).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        assert_eq!(store.writes(), 16);
        assert!(store.read(&p).await.unwrap().is_some());
        let leftovers = std::fs::read_dir(dir.path().join("ns")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_read_malformed_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ns")).unwrap();
        std::fs::write(dir.path().join("ns/bad.json"), "{not json").unwrap();
        let store = DocumentStore::new(dir.path());

        let err = store.read(&path("ns/bad")).await.unwrap_err();
        assert!(matches!(err, CacheError::Format { .. }));
    }

    #[tokio::test]
    async fn test_read_or_init_writes_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let p = path("greeter/settings");

        let first = store.read_or_init(&p, json!({"greeting": "hi"})).await.unwrap();
        let second = store.read_or_init(&p, json!({"greeting": "ignored"})).await.unwrap();

        assert_eq!(first, json!({"greeting": "hi"}));
        assert_eq!(second, json!({"greeting": "hi"}));
        assert_eq!(store.writes(), 1);
    }
}
