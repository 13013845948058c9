//! Durable blob storage collaborator.
//!
//! Index snapshots and metadata records persist through the [`BlobStore`]
//! trait, namespaced by conversation scope. [`FsBlobStore`] keeps one
//! directory per scope under a configured root; [`MemoryBlobStore`] backs
//! tests and ephemeral deployments.
//!
//! Absence of a blob is not an error — `read` returns `None` and callers
//! treat the scope as empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Key-value blob storage namespaced by conversation scope.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, scope: &str, key: &str) -> Result<Option<Vec<u8>>>;
    async fn write(&self, scope: &str, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Filesystem-backed blob store: `<root>/<scope dir>/<key>`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scope_path(&self, scope: &str) -> PathBuf {
        self.root.join(safe_scope_dir(scope))
    }
}

/// Map an opaque scope id to a safe directory name. Well-formed ids pass
/// through unchanged; anything else (path separators, overlong ids,
/// unicode) becomes a SHA-256 digest so hostile ids cannot escape the
/// store root.
fn safe_scope_dir(scope: &str) -> String {
    let well_formed = !scope.is_empty()
        && scope.len() <= 64
        && scope
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if well_formed {
        return scope.to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    format!("scope-{:x}", hasher.finalize())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn read(&self, scope: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.scope_path(scope).join(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("read {}: {}", path.display(), e))),
        }
    }

    async fn write(&self, scope: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.scope_path(scope);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Storage(format!("mkdir {}: {}", dir.display(), e)))?;
        let path = dir.join(key);
        // Write-then-rename so a crash mid-write never leaves a torn
        // snapshot behind.
        let tmp = dir.join(format!("{key}.tmp"));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| Error::Storage(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Storage(format!("rename {}: {}", path.display(), e)))?;
        Ok(())
    }
}

impl FsBlobStore {
    /// Root directory the store writes under.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// In-memory blob store for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, scope: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| Error::Storage("blob store lock poisoned".to_string()))?;
        Ok(blobs.get(&(scope.to_string(), key.to_string())).cloned())
    }

    async fn write(&self, scope: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| Error::Storage("blob store lock poisoned".to_string()))?;
        blobs.insert((scope.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_scope_passes_well_formed_ids() {
        assert_eq!(safe_scope_dir("thread-42_A"), "thread-42_A");
    }

    #[test]
    fn safe_scope_hashes_hostile_ids() {
        let dir = safe_scope_dir("../../etc/passwd");
        assert!(dir.starts_with("scope-"));
        assert!(!dir.contains('/'));
        assert_eq!(dir, safe_scope_dir("../../etc/passwd"), "deterministic");

        let long = "x".repeat(100);
        assert!(safe_scope_dir(&long).starts_with("scope-"));
        assert!(safe_scope_dir("").starts_with("scope-"));
    }

    #[tokio::test]
    async fn memory_store_roundtrip_and_absent() {
        let store = MemoryBlobStore::new();
        assert_eq!(store.read("s1", "index.json").await.unwrap(), None);
        store.write("s1", "index.json", b"payload").await.unwrap();
        assert_eq!(
            store.read("s1", "index.json").await.unwrap().as_deref(),
            Some(&b"payload"[..])
        );
        // Scope isolation
        assert_eq!(store.read("s2", "index.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fs_store_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(tmp.path());
        assert_eq!(store.read("scope", "meta.json").await.unwrap(), None);
        store.write("scope", "meta.json", b"{}").await.unwrap();
        assert_eq!(
            store.read("scope", "meta.json").await.unwrap().as_deref(),
            Some(&b"{}"[..])
        );
    }

    #[tokio::test]
    async fn fs_store_contains_hostile_scope() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(tmp.path());
        store.write("../escape", "k", b"v").await.unwrap();
        assert_eq!(
            store.read("../escape", "k").await.unwrap().as_deref(),
            Some(&b"v"[..])
        );
        // Nothing escaped the store root.
        assert!(!tmp.path().parent().unwrap().join("escape").exists());
    }
}
