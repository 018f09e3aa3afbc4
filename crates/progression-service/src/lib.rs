//! Progression Service - serialized per-user progression over a key-value store
//!
//! The service:
//! - Loads a user's record for queries, falling back to the zeroed state when
//!   it is absent, unreadable or malformed
//! - Applies engine operations (`award_xp`, `update_stats`, `record_activity`)
//!   under the store's per-key lock, refusing to mutate when the stored record
//!   cannot be read
//! - Writes the full record back, reporting write failures together with the
//!   computed result
//!
//! # Example
//!
//! ```rust,ignore
//! use progression_service::ProgressionService;
//! use progression_store::MemoryStore;
//! use progression_core::{UserId, XpEvent};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ProgressionService::new(Arc::new(MemoryStore::new()));
//! let user = UserId::new("learner-1")?;
//!
//! let outcome = service.award_xp(&user, &XpEvent::new("lesson_complete", 20)?).await?;
//! println!("level {}", outcome.level.level);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod service;

pub use error::ServiceError;
pub use service::{Clock, ProgressionService};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
