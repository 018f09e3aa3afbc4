//! Progression Core - XP, levels, badges and achievements
//!
//! Pure, synchronous rules for a learner's progression record:
//! - [`calculate_level`]: the non-linear leveling curve
//! - [`evaluate_badges`]: threshold-based badge unlocks in catalog order
//! - [`Engine::award_xp`]: XP award with cascading badge rewards and
//!   achievement emission
//! - [`Engine::update_stats`]: shallow counter merge
//!
//! No I/O happens here; persistence lives in `progression-store` and the
//! serialized per-user service in `progression-service`.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use progression_core::{Engine, ProgressionState, StatField, StatsPatch, XpEvent};
//!
//! let engine = Engine::default();
//! let state = engine.update_stats(
//!     &ProgressionState::new(),
//!     &StatsPatch::new().with(StatField::LessonsCompleted, 1),
//! );
//! let outcome = engine.award_xp(&state, &XpEvent::new("first_lesson", 20).unwrap(), Utc::now());
//!
//! assert_eq!(outcome.state.total_xp(), 70);
//! assert!(!outcome.leveled_up);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod badge;
pub mod config;
pub mod engine;
pub mod error;
pub mod level;
pub mod types;

// Re-exports for convenience
pub use badge::{
    badge_progress, evaluate_badges, progress_percent, BadgeCatalog, BadgeDefinition,
    BadgeProgress, Rarity, Requirement, StatKind,
};
pub use config::{ProgressionConfig, RarityRewards};
pub use engine::{Activity, AwardOutcome, Engine, StatEffect};
pub use error::{ProgressionError, Result};
pub use level::{calculate_level, level_threshold, xp_required_for};
pub use types::{
    Achievement, BadgeId, ProgressStats, ProgressionState, StatField, StatsPatch, UserId,
    UserLevel, XpEvent, XpRecord,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with progression state
    pub use crate::{
        calculate_level, Activity, AwardOutcome, BadgeCatalog, Engine, ProgressionConfig,
        ProgressionError, ProgressionState, StatEffect, StatField, StatsPatch, UserId, XpEvent,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
