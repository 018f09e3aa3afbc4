//! Error types for the progression engine
//!
//! Everything here is an invariant violation rejected at the API boundary:
//! - Negative or oversized XP awards
//! - Unknown or negative stat counters
//! - Malformed identifiers
//! - Invalid badge catalogs and configuration

/// Progression engine error type
#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    /// XP award below zero
    #[error("negative xp award: {0}")]
    NegativeXp(i64),

    /// XP award above the configured per-event cap
    #[error("xp award {requested} exceeds per-event limit {limit}")]
    XpLimitExceeded { requested: u64, limit: u64 },

    /// Malformed XP event
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Stat name not tracked by the engine
    #[error("unknown stat: {0}")]
    UnknownStat(String),

    /// Negative value supplied for a counter
    #[error("negative value {value} for stat {stat}")]
    NegativeValue { stat: String, value: i64 },

    /// Malformed user identifier
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    /// Two catalog entries share an id
    #[error("duplicate badge id: {0}")]
    DuplicateBadge(String),

    /// Catalog entry is malformed
    #[error("invalid badge {id:?}: {reason}")]
    InvalidBadge { id: String, reason: String },

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl ProgressionError {
    /// Whether the error was caused by caller input rather than setup
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::DuplicateBadge(_) | Self::InvalidBadge { .. } | Self::Config(_)
        )
    }
}

/// Result alias for progression operations
pub type Result<T> = std::result::Result<T, ProgressionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_rejections() {
        assert!(ProgressionError::NegativeXp(-1).is_rejection());
        assert!(ProgressionError::UnknownStat("karma".into()).is_rejection());
        assert!(!ProgressionError::DuplicateBadge("first_lesson".into()).is_rejection());
    }

    #[test]
    fn messages_name_the_offending_value() {
        let err = ProgressionError::NegativeValue {
            stat: "lessonsCompleted".into(),
            value: -3,
        };
        assert_eq!(err.to_string(), "negative value -3 for stat lessonsCompleted");
    }
}
