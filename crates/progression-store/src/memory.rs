//! In-process store backed by `DashMap`

use crate::lock::LockTable;
use crate::{KeyLock, ProgressStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// Concurrent in-memory store
///
/// Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Value>,
    locks: LockTable,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            locks: LockTable::default(),
        }
    }

    /// Number of stored keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the document under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Insert a raw document, bypassing the async contract
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Sorted list of stored keys
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get(key))
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn lock(&self, key: &str) -> Result<KeyLock, StoreError> {
        Ok(KeyLock::local(self.locks.acquire(key).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn absent_key_reads_none() {
        let store = MemoryStore::new();
        assert!(store.read("gamification:nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_replaces_document() {
        let store = MemoryStore::new();
        store.write("k", json!({"totalXP": 10})).await.unwrap();
        store.write("k", json!({"totalXP": 20})).await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), Some(json!({"totalXP": 20})));
        assert_eq!(store.len(), 1);
        assert_eq!(store.keys(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn lock_is_shared_by_all_holders() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let other = std::sync::Arc::clone(&store);
        let held = store.lock("k").await.unwrap();

        let waiting =
            tokio::time::timeout(std::time::Duration::from_millis(20), other.lock("k")).await;
        assert!(waiting.is_err());

        drop(held);
        assert!(other.lock("k").await.is_ok());
    }
}
