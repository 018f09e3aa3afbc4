//! Error types for the progression service
//!
//! Failure classes that reach callers:
//! - Rejections: the request violated an engine invariant; nothing changed
//! - Read and lock failures: the stored record could not be loaded or locked
//!   before a mutation; nothing was computed or written
//! - Write failures: the result was computed but could not be persisted; the
//!   computed result travels with the error so the caller can retry or show it

use progression_core::{Achievement, ProgressionError, ProgressionState, UserId};
use progression_store::StoreError;

/// Progression service error type
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Request rejected at the API boundary, state unchanged
    #[error("request rejected: {0}")]
    Rejected(#[from] ProgressionError),

    /// Stored record could not be read before a mutation, state unchanged
    #[error("failed to read progression for {user_id}: {source}")]
    ReadFailed {
        user_id: UserId,
        #[source]
        source: StoreError,
    },

    /// Exclusive access to the record was not obtained, state unchanged
    #[error("failed to lock progression for {user_id}: {source}")]
    LockFailed {
        user_id: UserId,
        #[source]
        source: StoreError,
    },

    /// Computed result could not be persisted
    #[error("failed to persist progression for {user_id}: {source}")]
    WriteFailed {
        user_id: UserId,
        /// State that would have been written
        state: Box<ProgressionState>,
        /// Achievements the operation emitted
        achievements: Vec<Achievement>,
        leveled_up: bool,
        #[source]
        source: StoreError,
    },
}

impl ServiceError {
    /// Check if the request itself was invalid
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Check if retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rejected(_) => false,
            Self::ReadFailed { source, .. }
            | Self::LockFailed { source, .. }
            | Self::WriteFailed { source, .. } => source.is_retryable(),
        }
    }

    /// State computed before a failed write
    #[must_use]
    pub fn unsaved_state(&self) -> Option<&ProgressionState> {
        match self {
            Self::WriteFailed { state, .. } => Some(state),
            Self::Rejected(_) | Self::ReadFailed { .. } | Self::LockFailed { .. } => None,
        }
    }
}
