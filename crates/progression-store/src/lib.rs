//! Progression Store - durable key-value persistence
//!
//! The progression service persists one JSON document per user through the
//! [`ProgressStore`] contract:
//! - `read(key)` returns the document, or `None` when the key was never written
//! - `write(key, value)` replaces the document
//! - `lock(key)` takes the exclusive per-key lock that read-modify-write
//!   cycles run under
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`]: concurrent in-process map, for tests and single-node use
//! - [`JsonFileStore`]: one file per key under a directory

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod file;
mod lock;
mod memory;

pub use error::StoreError;
pub use file::{JsonFileStore, DEFAULT_LOCK_TIMEOUT, STALE_LOCK_AGE};
pub use lock::KeyLock;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Durable key-value store holding JSON documents
#[async_trait]
pub trait ProgressStore: Send + Sync + std::fmt::Debug {
    /// Read the document stored under `key`
    ///
    /// # Errors
    /// Returns `StoreError` when the backend fails or the stored bytes are not
    /// valid JSON.
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the document stored under `key`
    ///
    /// # Errors
    /// Returns `StoreError` when the backend rejects the write.
    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Take the exclusive lock on `key`
    ///
    /// Every holder of this store (and, for durable backends, every process
    /// sharing its storage) waits for the returned guard to drop.
    ///
    /// # Errors
    /// Returns `StoreError::LockTimeout` when the key stays locked too long,
    /// or a backend error.
    async fn lock(&self, key: &str) -> Result<KeyLock, StoreError>;
}

#[async_trait]
impl<S: ProgressStore + ?Sized> ProgressStore for Arc<S> {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).write(key, value).await
    }

    async fn lock(&self, key: &str) -> Result<KeyLock, StoreError> {
        (**self).lock(key).await
    }
}
