//! Directory-backed store, one JSON file per key
//!
//! Keys are mapped to file names by keeping `[A-Za-z0-9_-]` and escaping every
//! other byte as `~` followed by two hex digits, so distinct keys never share
//! a file. Writes go to a uniquely named temporary sibling first and are
//! renamed into place.
//!
//! Key locks combine an in-process mutex with a `<name>.json.lock` file
//! created exclusively, so separate processes over one directory also
//! serialize. A lock file older than [`STALE_LOCK_AGE`] is taken to belong to
//! a crashed holder and is removed.

use crate::lock::LockTable;
use crate::{KeyLock, ProgressStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use ulid::Ulid;

/// Longest file name most filesystems accept
const MAX_FILE_NAME: usize = 255;

/// Default wait for a lock file held by someone else
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Lock files older than this are broken
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// JSON file store rooted at a directory
///
/// Clones share one in-process lock table.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
    locks: Arc<LockTable>,
    lock_timeout: Duration,
}

/// Exclusively created lock file, removed on drop
#[derive(Debug)]
pub(crate) struct LockFile {
    path: PathBuf,
}

impl LockFile {
    async fn acquire(path: PathBuf, key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let started = Instant::now();
        loop {
            let created = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match created {
                Ok(mut file) => {
                    let pid = std::process::id().to_string();
                    file.write_all(pid.as_bytes())
                        .await
                        .map_err(|e| StoreError::io(&path, e))?;
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path).await {
                        tracing::warn!(key, path = %path.display(), "breaking stale lock file");
                        match tokio::fs::remove_file(&path).await {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(StoreError::io(&path, e)),
                        }
                    }
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(StoreError::LockTimeout {
                            key: key.to_string(),
                            waited,
                        });
                    }
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

async fn is_stale(path: &Path) -> bool {
    let Ok(metadata) = tokio::fs::metadata(path).await else {
        return false;
    };
    metadata
        .modified()
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

impl JsonFileStore {
    /// Open (and create if needed) a store directory
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the directory cannot be created
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        Ok(Self {
            root,
            locks: Arc::new(LockTable::default()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Replace the wait for lock files held elsewhere
    #[inline]
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Store directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `key`
    ///
    /// # Errors
    /// Returns `StoreError::InvalidKey` for empty keys or keys whose encoded
    /// name is too long.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                name.push('~');
                name.push_str(&hex::encode([byte]));
            }
        }
        name.push_str(".json");
        if name.len() > MAX_FILE_NAME {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ProgressStore for JsonFileStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let value = serde_json::from_slice(&bytes)?;
        Ok(Some(value))
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("json.{}.tmp", Ulid::new()));
        let bytes = serde_json::to_vec_pretty(&value)?;

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        tracing::debug!(key, path = %path.display(), bytes = bytes.len(), "document written");
        Ok(())
    }

    async fn lock(&self, key: &str) -> Result<KeyLock, StoreError> {
        let path = self.path_for(key)?.with_extension("json.lock");
        let local = self.locks.acquire(key).await;
        let file = LockFile::acquire(path, key, self.lock_timeout).await?;
        Ok(KeyLock::with_file(local, file))
    }
}
