//! Sharded directory cache store.
//!
//! Layout: `<root>/<ab>/<cd>/<domain>`, one small text file per domain
//! holding the resolved URL (empty for "not found"). Entry age is the
//! file's modification time.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{CacheEntry, CacheStore, EntryKey};
use crate::{Error, ResolvedUrl};

/// Filesystem-backed [`CacheStore`].
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`. Directories are created lazily on
    /// the first write into each shard.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute path of the entry for `key`.
    pub fn entry_path(&self, key: &EntryKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

#[async_trait]
impl CacheStore for FsStore {
    async fn get(&self, key: &EntryKey) -> Result<Option<CacheEntry>, Error> {
        let path = self.entry_path(key);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io("stat", path, e)),
        };
        let written_at = metadata
            .modified()
            .map_err(|e| Error::io("read modification time of", &path, e))?;

        // The entry can vanish between stat and read when a refresh races us.
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io("read", path, e)),
        };
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::CorruptEntry(format!("{} is not valid UTF-8", path.display())))?;

        Ok(Some(CacheEntry { url: ResolvedUrl::from_stored(&text), written_at }))
    }

    async fn put(&self, key: &EntryKey, url: &ResolvedUrl) -> Result<(), Error> {
        let path = self.entry_path(key);
        let contents = url.as_str().to_string();

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, contents.as_bytes()))
            .await
            .map_err(|e| Error::io("write", path, std::io::Error::other(e)))?
    }

    async fn remove(&self, key: &EntryKey) -> Result<(), Error> {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io("remove", path, e)),
        }
    }

    fn backend(&self) -> &'static str {
        "fs"
    }
}

/// Write `contents` to a temporary file beside `path`, then rename it over
/// `path`. Readers see either the old file or the complete new one.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::io("resolve parent of", path, std::io::Error::from(ErrorKind::InvalidInput)))?;

    std::fs::create_dir_all(dir).map_err(|e| Error::io("create shard directory", dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io("create temporary file in", dir, e))?;
    tmp.write_all(contents).map_err(|e| Error::io("write", path, e))?;
    tmp.persist(path).map_err(|e| Error::io("persist", path, e.error))?;

    Ok(())
}
