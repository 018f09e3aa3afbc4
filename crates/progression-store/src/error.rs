//! Store error types

use std::path::PathBuf;
use std::time::Duration;

/// Persistence failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored or outgoing document is not valid JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key cannot be stored by this backend
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// Another holder kept the key locked for too long
    #[error("timed out after {waited:?} waiting for lock on {key:?}")]
    LockTimeout { key: String, waited: Duration },

    /// Backend temporarily unavailable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if a retry may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::LockTimeout { .. } | Self::Unavailable(_)
        )
    }
}
