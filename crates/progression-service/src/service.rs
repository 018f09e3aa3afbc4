//! Progression service
//!
//! Wraps the pure [`Engine`] in a read-compute-write cycle against an
//! injected [`ProgressStore`]. Mutations run under the store's lock for the
//! user's key, so every service sharing the store is serialized on that user;
//! different users proceed in parallel.
//!
//! Queries fall back to the zeroed state when the record cannot be read.
//! Mutations only fall back for absent or malformed records; a failing
//! backend aborts them before anything is written.

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use progression_core::{
    Activity, Achievement, AwardOutcome, BadgeProgress, Engine, ProgressionConfig,
    ProgressionError, ProgressionState, StatsPatch, UserId, UserLevel, XpEvent,
};
use progression_store::{KeyLock, ProgressStore, StoreError};
use std::sync::Arc;

/// Source of emission timestamps
pub type Clock = fn() -> DateTime<Utc>;

/// Per-user progression service
#[derive(Debug)]
pub struct ProgressionService {
    store: Arc<dyn ProgressStore>,
    engine: Engine,
    config: ProgressionConfig,
    clock: Clock,
}

impl ProgressionService {
    /// Service with default configuration and the built-in badge catalog
    #[must_use]
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self {
            store,
            engine: Engine::default(),
            config: ProgressionConfig::default(),
            clock: Utc::now,
        }
    }

    /// Service with explicit configuration
    ///
    /// # Errors
    /// Returns catalog validation errors for custom badge lists
    pub fn with_config(
        store: Arc<dyn ProgressStore>,
        config: ProgressionConfig,
    ) -> Result<Self, ProgressionError> {
        Ok(Self {
            store,
            engine: Engine::from_config(&config)?,
            config,
            clock: Utc::now,
        })
    }

    /// Replace the timestamp source
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    /// Current state; zeroed when absent or unreadable
    pub async fn get_state(&self, user_id: &UserId) -> ProgressionState {
        self.load(user_id).await
    }

    /// Current level view
    pub async fn get_level(&self, user_id: &UserId) -> UserLevel {
        self.load(user_id).await.level()
    }

    /// Progress on every catalog badge
    pub async fn get_badge_progress(&self, user_id: &UserId) -> Vec<BadgeProgress> {
        let state = self.load(user_id).await;
        self.engine.badge_progress(&state)
    }

    /// Award XP, unlock badges and emit achievements
    ///
    /// # Errors
    /// - `ServiceError::Rejected` if the event exceeds the per-event XP cap
    /// - `ServiceError::LockFailed` or `ServiceError::ReadFailed` if the stored
    ///   record could not be locked or read
    /// - `ServiceError::WriteFailed` if the result could not be persisted
    pub async fn award_xp(
        &self,
        user_id: &UserId,
        event: &XpEvent,
    ) -> Result<AwardOutcome, ServiceError> {
        self.check_xp_limit(event)?;

        let _lock = self.lock(user_id).await?;
        let state = self.load_for_update(user_id).await?;
        let outcome = self.engine.award_xp(&state, event, (self.clock)());
        tracing::debug!(
            user_id = %user_id,
            kind = event.kind(),
            xp = event.xp_gained(),
            total_xp = outcome.state.total_xp(),
            "xp awarded"
        );
        self.commit(user_id, outcome).await
    }

    /// Merge counters without evaluating badges or levels
    ///
    /// # Errors
    /// - `ServiceError::LockFailed` or `ServiceError::ReadFailed` if the stored
    ///   record could not be locked or read
    /// - `ServiceError::WriteFailed` if the result could not be persisted
    pub async fn update_stats(
        &self,
        user_id: &UserId,
        patch: &StatsPatch,
    ) -> Result<ProgressionState, ServiceError> {
        let _lock = self.lock(user_id).await?;
        let state = self.load_for_update(user_id).await?;
        let next = self.engine.update_stats(&state, patch);
        tracing::debug!(user_id = %user_id, ?patch, "stats updated");

        match self.persist(user_id, &next).await {
            Ok(()) => Ok(next),
            Err(source) => Err(self.write_failed(user_id, next, Vec::new(), false, source)),
        }
    }

    /// Apply a stat change and its XP event as one serialized step
    ///
    /// # Errors
    /// - `ServiceError::Rejected` if the event exceeds the per-event XP cap
    /// - `ServiceError::LockFailed` or `ServiceError::ReadFailed` if the stored
    ///   record could not be locked or read
    /// - `ServiceError::WriteFailed` if the result could not be persisted
    pub async fn record_activity(
        &self,
        user_id: &UserId,
        activity: &Activity,
    ) -> Result<AwardOutcome, ServiceError> {
        self.check_xp_limit(&activity.event)?;

        let _lock = self.lock(user_id).await?;
        let state = self.load_for_update(user_id).await?;
        let outcome = self.engine.record_activity(&state, activity, (self.clock)());
        tracing::debug!(
            user_id = %user_id,
            effect = ?activity.effect,
            kind = activity.event.kind(),
            "activity recorded"
        );
        self.commit(user_id, outcome).await
    }

    /// Administrative reset to the zeroed state
    ///
    /// # Errors
    /// - `ServiceError::LockFailed` if the record could not be locked
    /// - `ServiceError::WriteFailed` if the reset could not be persisted
    pub async fn reset(&self, user_id: &UserId) -> Result<ProgressionState, ServiceError> {
        let _lock = self.lock(user_id).await?;

        let state = ProgressionState::new();
        tracing::info!(user_id = %user_id, "progression reset");
        match self.persist(user_id, &state).await {
            Ok(()) => Ok(state),
            Err(source) => Err(self.write_failed(user_id, state, Vec::new(), false, source)),
        }
    }

    fn check_xp_limit(&self, event: &XpEvent) -> Result<(), ServiceError> {
        let limit = self.config.max_xp_per_event;
        if event.xp_gained() > limit {
            return Err(ProgressionError::XpLimitExceeded {
                requested: event.xp_gained(),
                limit,
            }
            .into());
        }
        Ok(())
    }

    fn key(&self, user_id: &UserId) -> String {
        self.config.store_key(user_id.as_str())
    }

    async fn lock(&self, user_id: &UserId) -> Result<KeyLock, ServiceError> {
        self.store.lock(&self.key(user_id)).await.map_err(|source| {
            tracing::warn!(user_id = %user_id, error = %source, "progression lock failed");
            ServiceError::LockFailed {
                user_id: user_id.clone(),
                source,
            }
        })
    }

    /// Stored state; absent and malformed records read as zeroed, backend
    /// failures are returned
    async fn fetch(&self, user_id: &UserId) -> Result<ProgressionState, StoreError> {
        let document = match self.store.read(&self.key(user_id)).await {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(ProgressionState::new()),
            Err(StoreError::Serialization(e)) => {
                tracing::warn!(user_id = %user_id, error = %e, "unparseable progression record, using defaults");
                return Ok(ProgressionState::new());
            }
            Err(e) => return Err(e),
        };
        match serde_json::from_value(document) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "malformed progression record, using defaults");
                Ok(ProgressionState::new())
            }
        }
    }

    async fn load(&self, user_id: &UserId) -> ProgressionState {
        self.fetch(user_id).await.unwrap_or_else(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "progression read failed, using defaults");
            ProgressionState::new()
        })
    }

    async fn load_for_update(&self, user_id: &UserId) -> Result<ProgressionState, ServiceError> {
        self.fetch(user_id).await.map_err(|source| {
            tracing::warn!(user_id = %user_id, error = %source, "progression read failed, mutation aborted");
            ServiceError::ReadFailed {
                user_id: user_id.clone(),
                source,
            }
        })
    }

    async fn persist(&self, user_id: &UserId, state: &ProgressionState) -> Result<(), StoreError> {
        let document = serde_json::to_value(state)?;
        self.store.write(&self.key(user_id), document).await
    }

    async fn commit(
        &self,
        user_id: &UserId,
        outcome: AwardOutcome,
    ) -> Result<AwardOutcome, ServiceError> {
        if let Err(source) = self.persist(user_id, &outcome.state).await {
            let AwardOutcome {
                state,
                achievements,
                leveled_up,
                ..
            } = outcome;
            return Err(self.write_failed(user_id, state, achievements, leveled_up, source));
        }

        for badge in outcome.unlocked_badges() {
            tracing::info!(user_id = %user_id, badge, "badge unlocked");
        }
        if outcome.leveled_up {
            tracing::info!(user_id = %user_id, level = outcome.level.level, "level up");
        }
        Ok(outcome)
    }

    fn write_failed(
        &self,
        user_id: &UserId,
        state: ProgressionState,
        achievements: Vec<Achievement>,
        leveled_up: bool,
        source: StoreError,
    ) -> ServiceError {
        tracing::warn!(user_id = %user_id, error = %source, "progression write failed");
        ServiceError::WriteFailed {
            user_id: user_id.clone(),
            state: Box::new(state),
            achievements,
            leveled_up,
            source,
        }
    }
}
