//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty document is valid.
//!
//! ```toml
//! store_key_prefix = "gamification"
//! max_xp_per_event = 100000
//!
//! [rewards]
//! common = 50
//! legendary = 500
//! ```

use crate::badge::{BadgeCatalog, BadgeDefinition, Rarity};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// XP granted when a badge of each rarity unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RarityRewards {
    pub common: u64,
    pub rare: u64,
    pub epic: u64,
    pub legendary: u64,
    pub unknown: u64,
}

impl RarityRewards {
    /// Reward for a rarity
    #[inline]
    #[must_use]
    pub fn reward_for(&self, rarity: Rarity) -> u64 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
            Rarity::Unknown => self.unknown,
        }
    }
}

impl Default for RarityRewards {
    fn default() -> Self {
        Self {
            common: 50,
            rare: 100,
            epic: 200,
            legendary: 500,
            unknown: 25,
        }
    }
}

/// Progression engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Prefix of the per-user store key (`<prefix>:<user_id>`)
    pub store_key_prefix: String,
    /// Largest XP award accepted in one event
    pub max_xp_per_event: u64,
    /// Badge rewards by rarity
    pub rewards: RarityRewards,
    /// Replacement badge catalog; the built-in one is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badges: Option<Vec<BadgeDefinition>>,
}

impl ProgressionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns `ProgressionError::Config` on malformed TOML or wrong types
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// With store key prefix
    #[inline]
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.store_key_prefix = prefix.into();
        self
    }

    /// With per-event XP cap
    #[inline]
    #[must_use]
    pub fn with_max_xp_per_event(mut self, max: u64) -> Self {
        self.max_xp_per_event = max;
        self
    }

    /// With badge rewards
    #[inline]
    #[must_use]
    pub fn with_rewards(mut self, rewards: RarityRewards) -> Self {
        self.rewards = rewards;
        self
    }

    /// With a custom badge catalog
    #[inline]
    #[must_use]
    pub fn with_badges(mut self, badges: Vec<BadgeDefinition>) -> Self {
        self.badges = Some(badges);
        self
    }

    /// Build the badge catalog this configuration describes
    ///
    /// # Errors
    /// Returns catalog validation errors for custom badge lists
    pub fn catalog(&self) -> Result<BadgeCatalog> {
        match &self.badges {
            Some(badges) => BadgeCatalog::new(badges.clone()),
            None => Ok(BadgeCatalog::builtin().clone()),
        }
    }

    /// Store key for a user
    #[inline]
    #[must_use]
    pub fn store_key(&self, user_id: &str) -> String {
        format!("{}:{user_id}", self.store_key_prefix)
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            store_key_prefix: "gamification".to_string(),
            max_xp_per_event: 100_000,
            rewards: RarityRewards::default(),
            badges: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::StatKind;
    use crate::error::ProgressionError;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ProgressionConfig::from_toml_str("").unwrap();
        assert_eq!(config, ProgressionConfig::default());
        assert_eq!(config.rewards.reward_for(Rarity::Legendary), 500);
        assert_eq!(config.rewards.reward_for(Rarity::Unknown), 25);
    }

    #[test]
    fn partial_rewards_override() {
        let config = ProgressionConfig::from_toml_str(
            r#"
            store_key_prefix = "tutor"
            [rewards]
            common = 75
            "#,
        )
        .unwrap();
        assert_eq!(config.rewards.common, 75);
        assert_eq!(config.rewards.rare, 100);
        assert_eq!(config.store_key("u1"), "tutor:u1");
    }

    #[test]
    fn custom_catalog_from_toml() {
        let config = ProgressionConfig::from_toml_str(
            r#"
            [[badges]]
            id = "night_owl"
            name = "Night Owl"
            description = "Finish a lesson"
            icon = "🦉"
            rarity = "mythic"
            requirement = { kind = "lessons_completed", threshold = 1 }
            "#,
        )
        .unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        let badge = catalog.get("night_owl").unwrap();
        assert_eq!(badge.rarity, Rarity::Unknown);
        assert_eq!(badge.requirement.kind, StatKind::LessonsCompleted);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        assert!(matches!(
            ProgressionConfig::from_toml_str("max_xp_per_event = \"lots\""),
            Err(ProgressionError::Config(_))
        ));
    }
}
