//! Testing utilities for the progression workspace
//!
//! Shared fixtures, a fault-injecting store, and fixed timestamps.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use progression_core::{ProgressStats, ProgressionState, UserId};
use progression_store::{KeyLock, MemoryStore, ProgressStore, StoreError};
use serde_json::Value;

/// Fixed instant used by deterministic tests
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// State with the given XP total and zeroed counters
pub fn state_with_xp(total_xp: u64) -> ProgressionState {
    ProgressionState::from_parts(total_xp, ProgressStats::default())
}

pub fn stats_with_lessons(lessons_completed: u64) -> ProgressStats {
    ProgressStats {
        lessons_completed,
        ..ProgressStats::default()
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_reads: bool,
    fail_writes: bool,
    reads: usize,
    writes: usize,
}

/// `MemoryStore` wrapper that can be told to fail reads or writes
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Mutex<Faults>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults.lock().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.faults.lock().fail_writes = fail;
    }

    /// Successful and failed reads so far
    pub fn read_count(&self) -> usize {
        self.faults.lock().reads
    }

    /// Successful and failed writes so far
    pub fn write_count(&self) -> usize {
        self.faults.lock().writes
    }

    /// Underlying memory store
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl ProgressStore for FaultyStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let fail = {
            let mut faults = self.faults.lock();
            faults.reads += 1;
            faults.fail_reads
        };
        if fail {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let fail = {
            let mut faults = self.faults.lock();
            faults.writes += 1;
            faults.fail_writes
        };
        if fail {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        self.inner.write(key, value).await
    }

    async fn lock(&self, key: &str) -> Result<KeyLock, StoreError> {
        self.inner.lock(key).await
    }
}
