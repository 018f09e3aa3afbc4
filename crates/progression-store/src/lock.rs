//! Per-key exclusive locks
//!
//! A read-modify-write cycle on one key runs under a [`KeyLock`] taken from
//! the store, so every caller sharing the store (not only callers sharing one
//! service) is serialized on that key.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive hold on one store key, released on drop
#[derive(Debug)]
pub struct KeyLock {
    _local: OwnedMutexGuard<()>,
    _file: Option<crate::file::LockFile>,
}

impl KeyLock {
    pub(crate) fn local(guard: OwnedMutexGuard<()>) -> Self {
        Self {
            _local: guard,
            _file: None,
        }
    }

    pub(crate) fn with_file(guard: OwnedMutexGuard<()>, file: crate::file::LockFile) -> Self {
        Self {
            _local: guard,
            _file: Some(file),
        }
    }
}

/// One async mutex per key seen
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockTable {
    pub(crate) async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(key.to_string()).or_default().clone();
        mutex.lock_owned().await
    }
}
