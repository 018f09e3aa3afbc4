//! Core types for the progression engine
//!
//! Defines the per-user progression record and the values that flow through it:
//! - User identifiers and XP events
//! - Tracked statistics and partial updates to them
//! - Achievements and the derived level view

use crate::badge::BadgeDefinition;
use crate::error::{ProgressionError, Result};
use crate::level::calculate_level;
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use ulid::Ulid;

/// Badge identifier as stored in the catalog and in user state
pub type BadgeId = String;

/// Opaque user identifier
///
/// Non-empty, at most 128 bytes, no whitespace or control characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Maximum accepted length in bytes
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap an identifier
    ///
    /// # Errors
    /// Returns `ProgressionError::InvalidUserId` for empty, oversized or
    /// whitespace-bearing ids.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty()
            || id.len() > Self::MAX_LEN
            || id.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ProgressionError::InvalidUserId(id));
        }
        Ok(Self(id))
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = ProgressionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = ProgressionError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// A request to award experience points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpEvent {
    kind: String,
    xp_gained: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl XpEvent {
    /// Create a validated event
    ///
    /// # Errors
    /// - `ProgressionError::NegativeXp` if `xp_gained < 0`
    /// - `ProgressionError::InvalidEvent` if `kind` is blank
    pub fn new(kind: impl Into<String>, xp_gained: i64) -> Result<Self> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(ProgressionError::InvalidEvent("event kind is empty".into()));
        }
        let xp_gained = u64::try_from(xp_gained).map_err(|_| ProgressionError::NegativeXp(xp_gained))?;
        Ok(Self {
            kind,
            xp_gained,
            detail: None,
        })
    }

    /// Attach a free-form detail (lesson title, quiz id, ...)
    #[inline]
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Event kind, e.g. `lesson_complete`
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// XP carried by this event
    #[inline]
    #[must_use]
    pub fn xp_gained(&self) -> u64 {
        self.xp_gained
    }

    /// Optional detail
    #[inline]
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// Raw XP event as recorded in a user's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpRecord {
    pub kind: String,
    pub xp_gained: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl XpRecord {
    pub(crate) fn from_event(event: &XpEvent, now: DateTime<Utc>) -> Self {
        Self {
            kind: event.kind.clone(),
            xp_gained: event.xp_gained,
            detail: event.detail.clone(),
            timestamp: now,
        }
    }
}

/// Named counters tracked per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatField {
    LessonsCompleted,
    QuizzesPassed,
    PerfectScores,
    CurrentStreak,
    LongestStreak,
    SubjectsCompleted,
}

impl StatField {
    /// All counters in storage order
    pub const ALL: [StatField; 6] = [
        StatField::LessonsCompleted,
        StatField::QuizzesPassed,
        StatField::PerfectScores,
        StatField::CurrentStreak,
        StatField::LongestStreak,
        StatField::SubjectsCompleted,
    ];

    /// Wire name (camelCase, as persisted)
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StatField::LessonsCompleted => "lessonsCompleted",
            StatField::QuizzesPassed => "quizzesPassed",
            StatField::PerfectScores => "perfectScores",
            StatField::CurrentStreak => "currentStreak",
            StatField::LongestStreak => "longestStreak",
            StatField::SubjectsCompleted => "subjectsCompleted",
        }
    }
}

impl fmt::Display for StatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatField {
    type Err = ProgressionError;

    /// Accepts both the camelCase wire name and snake_case
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lessonsCompleted" | "lessons_completed" => Ok(StatField::LessonsCompleted),
            "quizzesPassed" | "quizzes_passed" => Ok(StatField::QuizzesPassed),
            "perfectScores" | "perfect_scores" => Ok(StatField::PerfectScores),
            "currentStreak" | "current_streak" => Ok(StatField::CurrentStreak),
            "longestStreak" | "longest_streak" => Ok(StatField::LongestStreak),
            "subjectsCompleted" | "subjects_completed" => Ok(StatField::SubjectsCompleted),
            other => Err(ProgressionError::UnknownStat(other.to_string())),
        }
    }
}

/// Accumulated statistics for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressStats {
    pub lessons_completed: u64,
    pub quizzes_passed: u64,
    pub perfect_scores: u64,
    pub current_streak: u64,
    pub longest_streak: u64,
    pub subjects_completed: u64,
}

impl ProgressStats {
    /// Read a counter
    #[must_use]
    pub fn get(&self, field: StatField) -> u64 {
        match field {
            StatField::LessonsCompleted => self.lessons_completed,
            StatField::QuizzesPassed => self.quizzes_passed,
            StatField::PerfectScores => self.perfect_scores,
            StatField::CurrentStreak => self.current_streak,
            StatField::LongestStreak => self.longest_streak,
            StatField::SubjectsCompleted => self.subjects_completed,
        }
    }

    pub(crate) fn slot(&mut self, field: StatField) -> &mut u64 {
        match field {
            StatField::LessonsCompleted => &mut self.lessons_completed,
            StatField::QuizzesPassed => &mut self.quizzes_passed,
            StatField::PerfectScores => &mut self.perfect_scores,
            StatField::CurrentStreak => &mut self.current_streak,
            StatField::LongestStreak => &mut self.longest_streak,
            StatField::SubjectsCompleted => &mut self.subjects_completed,
        }
    }
}

/// Partial stats update; absent counters are left untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lessons_completed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quizzes_passed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perfect_scores: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_streak: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longest_streak: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects_completed: Option<u64>,
}

impl StatsPatch {
    /// Create empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a counter by field
    #[must_use]
    pub fn with(mut self, field: StatField, value: u64) -> Self {
        *self.slot(field) = Some(value);
        self
    }

    /// Set a counter by its wire name
    ///
    /// # Errors
    /// - `ProgressionError::UnknownStat` for names the engine does not track
    /// - `ProgressionError::NegativeValue` for values below zero
    pub fn set(mut self, name: &str, value: i64) -> Result<Self> {
        let field: StatField = name.parse()?;
        let value = u64::try_from(value).map_err(|_| ProgressionError::NegativeValue {
            stat: name.to_string(),
            value,
        })?;
        *self.slot(field) = Some(value);
        Ok(self)
    }

    /// Value carried for a field, if any
    #[must_use]
    pub fn get(&self, field: StatField) -> Option<u64> {
        match field {
            StatField::LessonsCompleted => self.lessons_completed,
            StatField::QuizzesPassed => self.quizzes_passed,
            StatField::PerfectScores => self.perfect_scores,
            StatField::CurrentStreak => self.current_streak,
            StatField::LongestStreak => self.longest_streak,
            StatField::SubjectsCompleted => self.subjects_completed,
        }
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        StatField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Shallow-merge into `stats`
    pub fn apply_to(&self, stats: &mut ProgressStats) {
        for field in StatField::ALL {
            if let Some(value) = self.get(field) {
                *stats.slot(field) = value;
            }
        }
    }

    fn slot(&mut self, field: StatField) -> &mut Option<u64> {
        match field {
            StatField::LessonsCompleted => &mut self.lessons_completed,
            StatField::QuizzesPassed => &mut self.quizzes_passed,
            StatField::PerfectScores => &mut self.perfect_scores,
            StatField::CurrentStreak => &mut self.current_streak,
            StatField::LongestStreak => &mut self.longest_streak,
            StatField::SubjectsCompleted => &mut self.subjects_completed,
        }
    }
}

/// Emitted record of a badge unlock or level-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_id: Option<BadgeId>,
    #[serde(rename = "xpGained")]
    pub xp_gained: u64,
    pub timestamp: DateTime<Utc>,
}

impl Achievement {
    /// Achievement for a newly unlocked badge
    #[must_use]
    pub fn for_badge(badge: &BadgeDefinition, reward: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}-{}", badge.id, emission_suffix(now)),
            title: format!("{} {}", badge.icon, badge.name),
            message: badge.description.clone(),
            badge_id: Some(badge.id.clone()),
            xp_gained: reward,
            timestamp: now,
        }
    }

    /// Zero-XP achievement for reaching `level`
    #[must_use]
    pub fn level_up(level: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("level-{level}-{}", emission_suffix(now)),
            title: "Level Up!".to_string(),
            message: format!("Congratulations! You've reached level {level}!"),
            badge_id: None,
            xp_gained: 0,
            timestamp: now,
        }
    }

    /// Whether this records a level-up
    #[inline]
    #[must_use]
    pub fn is_level_up(&self) -> bool {
        self.badge_id.is_none()
    }
}

/// ULID seeded from the emission time; random bits keep same-instant ids apart.
fn emission_suffix(now: DateTime<Utc>) -> Ulid {
    Ulid::from_datetime(SystemTime::from(now))
}

/// Per-user progression record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressionState {
    #[serde(rename = "totalXP")]
    pub(crate) total_xp: u64,
    pub(crate) earned_badges: IndexSet<BadgeId>,
    pub(crate) achievements: Vec<Achievement>,
    pub(crate) stats: ProgressStats,
    pub(crate) xp_history: Vec<XpRecord>,
}

impl ProgressionState {
    /// Zeroed state for a user seen for the first time
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a state from an imported XP total and counters
    ///
    /// Used when migrating records kept outside the engine; no badges or
    /// achievements are carried over.
    #[must_use]
    pub fn from_parts(total_xp: u64, stats: ProgressStats) -> Self {
        Self {
            total_xp,
            stats,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn total_xp(&self) -> u64 {
        self.total_xp
    }

    /// Earned badge ids in unlock order
    #[inline]
    #[must_use]
    pub fn earned_badges(&self) -> &IndexSet<BadgeId> {
        &self.earned_badges
    }

    #[inline]
    #[must_use]
    pub fn has_badge(&self, id: &str) -> bool {
        self.earned_badges.contains(id)
    }

    /// Achievement log, oldest first
    #[inline]
    #[must_use]
    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> &ProgressStats {
        &self.stats
    }

    /// Raw XP events, oldest first
    #[inline]
    #[must_use]
    pub fn xp_history(&self) -> &[XpRecord] {
        &self.xp_history
    }

    /// Derived level view
    #[inline]
    #[must_use]
    pub fn level(&self) -> UserLevel {
        calculate_level(self.total_xp)
    }
}

/// Level view derived from a total XP value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLevel {
    pub level: u64,
    #[serde(rename = "currentXP")]
    pub current_xp: u64,
    #[serde(rename = "xpToNextLevel")]
    pub xp_to_next_level: u64,
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    /// Cumulative XP at which `level` was reached
    pub level_threshold: u64,
}

impl UserLevel {
    /// XP span of the current level
    #[inline]
    #[must_use]
    pub fn level_span(&self) -> u64 {
        self.current_xp + self.xp_to_next_level
    }

    /// Fraction of the current level completed, in `[0, 1)`
    #[must_use]
    pub fn progress_fraction(&self) -> f64 {
        let span = self.level_span();
        if span == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.current_xp as f64 / span as f64;
        fraction
    }
}
