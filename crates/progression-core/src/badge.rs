//! Badge catalog and unlock evaluation
//!
//! Provides [`BadgeCatalog`], the read-only, ordered list of badge
//! definitions, and the evaluation helpers built on it:
//! - [`evaluate_badges`]: which un-earned badges the current stats satisfy
//! - [`badge_progress`]: per-badge completion for presentation layers
//!
//! Catalog order is significant: it decides notification order when several
//! badges unlock in the same pass.

use crate::error::{ProgressionError, Result};
use crate::types::{BadgeId, ProgressStats, ProgressionState};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Badge rarity, drives the XP reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
    /// Any rarity string this build does not recognise
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
            Rarity::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Statistic a badge requirement is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    LessonsCompleted,
    QuizzesPassed,
    StreakDays,
    XpEarned,
    PerfectScores,
    SubjectsCompleted,
}

impl StatKind {
    /// Current value of this statistic
    #[must_use]
    pub fn read(self, stats: &ProgressStats, total_xp: u64) -> u64 {
        match self {
            StatKind::LessonsCompleted => stats.lessons_completed,
            StatKind::QuizzesPassed => stats.quizzes_passed,
            StatKind::StreakDays => stats.current_streak,
            StatKind::XpEarned => total_xp,
            StatKind::PerfectScores => stats.perfect_scores,
            StatKind::SubjectsCompleted => stats.subjects_completed,
        }
    }
}

/// Single-stat unlock threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: StatKind,
    pub threshold: u64,
}

impl Requirement {
    #[inline]
    #[must_use]
    pub const fn new(kind: StatKind, threshold: u64) -> Self {
        Self { kind, threshold }
    }

    /// Whether the requirement holds for the given stats
    #[inline]
    #[must_use]
    pub fn is_met(&self, stats: &ProgressStats, total_xp: u64) -> bool {
        self.kind.read(stats, total_xp) >= self.threshold
    }
}

/// Static badge definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeDefinition {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub rarity: Rarity,
    pub requirement: Requirement,
}

impl BadgeDefinition {
    /// Create a definition
    #[must_use]
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        icon: &str,
        rarity: Rarity,
        requirement: Requirement,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            rarity,
            requirement,
        }
    }
}

/// Ordered, read-only badge catalog with unique ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BadgeCatalog {
    badges: Vec<BadgeDefinition>,
}

static BUILTIN: Lazy<BadgeCatalog> = Lazy::new(|| BadgeCatalog {
    badges: builtin_badges(),
});

impl BadgeCatalog {
    /// Validate and freeze a catalog
    ///
    /// # Errors
    /// - `ProgressionError::DuplicateBadge` if two entries share an id
    /// - `ProgressionError::InvalidBadge` for a blank id or name
    pub fn new(badges: Vec<BadgeDefinition>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(badges.len());
        for badge in &badges {
            if badge.id.trim().is_empty() {
                return Err(ProgressionError::InvalidBadge {
                    id: badge.id.clone(),
                    reason: "id is empty".into(),
                });
            }
            if badge.name.trim().is_empty() {
                return Err(ProgressionError::InvalidBadge {
                    id: badge.id.clone(),
                    reason: "name is empty".into(),
                });
            }
            if !seen.insert(badge.id.as_str()) {
                return Err(ProgressionError::DuplicateBadge(badge.id.clone()));
            }
        }
        Ok(Self { badges })
    }

    /// The built-in learning catalog
    #[must_use]
    pub fn builtin() -> &'static BadgeCatalog {
        &BUILTIN
    }

    /// Look up a badge by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BadgeDefinition> {
        self.badges.iter().find(|b| b.id == id)
    }

    /// Iterate in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &BadgeDefinition> {
        self.badges.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.badges.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }
}

impl Default for BadgeCatalog {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

fn builtin_badges() -> Vec<BadgeDefinition> {
    use Rarity::{Common, Epic, Legendary, Rare};
    use StatKind::{
        LessonsCompleted, PerfectScores, QuizzesPassed, StreakDays, SubjectsCompleted, XpEarned,
    };

    vec![
        BadgeDefinition::new("first_lesson", "First Steps", "Complete your first lesson", "🎯", Common, Requirement::new(LessonsCompleted, 1)),
        BadgeDefinition::new("lesson_explorer", "Explorer", "Complete 10 lessons", "🧭", Rare, Requirement::new(LessonsCompleted, 10)),
        BadgeDefinition::new("lesson_scholar", "Scholar", "Complete 50 lessons", "📚", Epic, Requirement::new(LessonsCompleted, 50)),
        BadgeDefinition::new("first_quiz", "Quiz Taker", "Pass your first quiz", "✅", Common, Requirement::new(QuizzesPassed, 1)),
        BadgeDefinition::new("quiz_master", "Quiz Master", "Pass 25 quizzes", "🏆", Rare, Requirement::new(QuizzesPassed, 25)),
        BadgeDefinition::new("perfectionist", "Perfectionist", "Score 100% on a quiz", "💯", Common, Requirement::new(PerfectScores, 1)),
        BadgeDefinition::new("flawless", "Flawless", "Score 100% on 10 quizzes", "💎", Epic, Requirement::new(PerfectScores, 10)),
        BadgeDefinition::new("streak_3", "On a Roll", "Learn 3 days in a row", "🔥", Common, Requirement::new(StreakDays, 3)),
        BadgeDefinition::new("streak_7", "Week Warrior", "Learn 7 days in a row", "⚡", Rare, Requirement::new(StreakDays, 7)),
        BadgeDefinition::new("streak_30", "Unstoppable", "Learn 30 days in a row", "🌟", Legendary, Requirement::new(StreakDays, 30)),
        BadgeDefinition::new("xp_500", "Rising Star", "Earn 500 XP", "⭐", Common, Requirement::new(XpEarned, 500)),
        BadgeDefinition::new("xp_2000", "High Achiever", "Earn 2,000 XP", "🚀", Rare, Requirement::new(XpEarned, 2_000)),
        BadgeDefinition::new("xp_10000", "Legend", "Earn 10,000 XP", "👑", Legendary, Requirement::new(XpEarned, 10_000)),
        BadgeDefinition::new("subject_master", "Subject Master", "Complete every lesson in a subject", "🎓", Rare, Requirement::new(SubjectsCompleted, 1)),
        BadgeDefinition::new("polymath", "Polymath", "Complete 5 subjects", "🧠", Legendary, Requirement::new(SubjectsCompleted, 5)),
    ]
}

/// Badges newly satisfied by `stats`/`total_xp`, in catalog order
///
/// Already-earned ids are skipped, so a second call with the same inputs and
/// the returned ids added to `earned` yields nothing.
#[must_use]
pub fn evaluate_badges<'a>(
    catalog: &'a BadgeCatalog,
    stats: &ProgressStats,
    total_xp: u64,
    earned: &IndexSet<BadgeId>,
) -> Vec<&'a BadgeDefinition> {
    catalog
        .iter()
        .filter(|badge| !earned.contains(&badge.id))
        .filter(|badge| badge.requirement.is_met(stats, total_xp))
        .collect()
}

/// Percentage of `threshold` reached, clamped to `[0, 100]`
#[must_use]
pub fn progress_percent(current: u64, threshold: u64) -> f64 {
    if threshold == 0 || current >= threshold {
        return 100.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let pct = 100.0 * current as f64 / threshold as f64;
    pct.clamp(0.0, 100.0)
}

/// Completion of a single badge for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeProgress {
    pub badge: BadgeDefinition,
    pub earned: bool,
    pub current: u64,
    pub threshold: u64,
    pub progress_percent: f64,
}

/// Progress on every catalog badge, in catalog order
#[must_use]
pub fn badge_progress(catalog: &BadgeCatalog, state: &ProgressionState) -> Vec<BadgeProgress> {
    catalog
        .iter()
        .map(|badge| {
            let earned = state.has_badge(&badge.id);
            let current = badge.requirement.kind.read(state.stats(), state.total_xp());
            let threshold = badge.requirement.threshold;
            BadgeProgress {
                badge: badge.clone(),
                earned,
                current,
                threshold,
                progress_percent: if earned {
                    100.0
                } else {
                    progress_percent(current, threshold)
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(badges: &[&BadgeDefinition]) -> Vec<String> {
        badges.iter().map(|b| b.id.clone()).collect()
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = BadgeCatalog::builtin();
        assert!(!catalog.is_empty());
        assert!(BadgeCatalog::new(catalog.iter().cloned().collect()).is_ok());
        assert_eq!(catalog.get("first_lesson").map(|b| b.rarity), Some(Rarity::Common));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let badge = BadgeDefinition::new(
            "dup",
            "Dup",
            "",
            "x",
            Rarity::Common,
            Requirement::new(StatKind::LessonsCompleted, 1),
        );
        assert!(matches!(
            BadgeCatalog::new(vec![badge.clone(), badge]),
            Err(ProgressionError::DuplicateBadge(id)) if id == "dup"
        ));
    }

    #[test]
    fn unknown_rarity_deserializes() {
        let rarity: Rarity = serde_json::from_str("\"mythic\"").unwrap();
        assert_eq!(rarity, Rarity::Unknown);
    }

    #[test]
    fn simultaneous_unlocks_keep_catalog_order() {
        let stats = ProgressStats {
            perfect_scores: 1,
            quizzes_passed: 1,
            lessons_completed: 1,
            ..ProgressStats::default()
        };
        let unlocked = evaluate_badges(BadgeCatalog::builtin(), &stats, 0, &IndexSet::new());
        assert_eq!(ids(&unlocked), ["first_lesson", "first_quiz", "perfectionist"]);
    }

    #[test]
    fn xp_badges_read_total_xp() {
        let unlocked = evaluate_badges(
            BadgeCatalog::builtin(),
            &ProgressStats::default(),
            2_500,
            &IndexSet::new(),
        );
        assert_eq!(ids(&unlocked), ["xp_500", "xp_2000"]);
    }

    #[test]
    fn streak_badges_read_current_streak() {
        let stats = ProgressStats {
            current_streak: 2,
            longest_streak: 40,
            ..ProgressStats::default()
        };
        assert!(evaluate_badges(BadgeCatalog::builtin(), &stats, 0, &IndexSet::new()).is_empty());
    }

    #[test]
    fn progress_for_earned_badge_is_full() {
        let mut state = ProgressionState::new();
        state.earned_badges.insert("lesson_explorer".to_string());
        let progress = badge_progress(BadgeCatalog::builtin(), &state);
        let explorer = progress.iter().find(|p| p.badge.id == "lesson_explorer").unwrap();
        assert!(explorer.earned);
        assert!((explorer.progress_percent - 100.0).abs() < f64::EPSILON);

        let scholar = progress.iter().find(|p| p.badge.id == "lesson_scholar").unwrap();
        assert!(scholar.progress_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn partial_progress() {
        assert!((progress_percent(5, 10) - 50.0).abs() < f64::EPSILON);
        assert!((progress_percent(0, 0) - 100.0).abs() < f64::EPSILON);
    }

    fn arb_stats() -> impl Strategy<Value = ProgressStats> {
        (0u64..200, 0u64..200, 0u64..50, 0u64..60, 0u64..60, 0u64..10).prop_map(
            |(l, q, p, c, lo, s)| ProgressStats {
                lessons_completed: l,
                quizzes_passed: q,
                perfect_scores: p,
                current_streak: c,
                longest_streak: lo,
                subjects_completed: s,
            },
        )
    }

    proptest! {
        #[test]
        fn prop_progress_is_bounded(current in any::<u64>(), threshold in any::<u64>()) {
            let pct = progress_percent(current, threshold);
            prop_assert!((0.0..=100.0).contains(&pct));
        }

        #[test]
        fn prop_evaluation_is_idempotent(stats in arb_stats(), xp in 0u64..20_000) {
            let catalog = BadgeCatalog::builtin();
            let mut earned = IndexSet::new();
            let first = evaluate_badges(catalog, &stats, xp, &earned);
            earned.extend(first.iter().map(|b| b.id.clone()));
            prop_assert!(evaluate_badges(catalog, &stats, xp, &earned).is_empty());
        }
    }
}
