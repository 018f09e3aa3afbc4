//! XP award and achievement emission
//!
//! [`Engine`] applies events to a [`ProgressionState`] and returns the next
//! state together with whatever achievements the change produced. The input
//! state is never mutated, so a caller sees either the whole outcome or none
//! of it.
//!
//! # Award pass
//! 1. Record the level before the award
//! 2. Add the event XP and append the event to the XP history
//! 3. Recompute the level; `leveled_up` compares it with step 1
//! 4. Evaluate badges once against the updated stats and XP; every unlock is
//!    marked earned, logged as an achievement and its rarity reward is added
//!    to the total (rewards do not trigger another evaluation)
//! 5. Log a zero-XP level-up achievement if step 3 crossed a boundary

use crate::badge::{badge_progress, evaluate_badges, BadgeCatalog, BadgeProgress};
use crate::config::{ProgressionConfig, RarityRewards};
use crate::error::Result;
use crate::level::calculate_level;
use crate::types::{
    Achievement, ProgressionState, StatField, StatsPatch, UserLevel, XpEvent, XpRecord,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of one award pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardOutcome {
    /// Next state, to be persisted by the caller
    pub state: ProgressionState,
    /// Emitted achievements: badges in catalog order, then the level-up
    pub achievements: Vec<Achievement>,
    pub leveled_up: bool,
    /// Level view of `state`
    pub level: UserLevel,
}

impl AwardOutcome {
    /// Badge ids unlocked by this pass
    pub fn unlocked_badges(&self) -> impl Iterator<Item = &str> {
        self.achievements
            .iter()
            .filter_map(|a| a.badge_id.as_deref())
    }
}

/// Counter change that accompanies an activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatEffect {
    /// No counter change
    None,
    /// One more lesson
    LessonCompleted,
    /// One more passed quiz, and one more perfect score if `perfect`
    QuizPassed { perfect: bool },
    /// One more completed subject
    SubjectCompleted,
    /// Streak is now `current` days; longest streak follows it upward
    StreakDay { current: u64 },
    /// Arbitrary shallow merge
    Patch(StatsPatch),
}

impl StatEffect {
    fn apply(&self, state: &mut ProgressionState) {
        let stats = &mut state.stats;
        match self {
            StatEffect::None => {}
            StatEffect::LessonCompleted => bump(stats.slot(StatField::LessonsCompleted)),
            StatEffect::QuizPassed { perfect } => {
                bump(stats.slot(StatField::QuizzesPassed));
                if *perfect {
                    bump(stats.slot(StatField::PerfectScores));
                }
            }
            StatEffect::SubjectCompleted => bump(stats.slot(StatField::SubjectsCompleted)),
            StatEffect::StreakDay { current } => {
                stats.current_streak = *current;
                stats.longest_streak = stats.longest_streak.max(*current);
            }
            StatEffect::Patch(patch) => patch.apply_to(stats),
        }
    }
}

fn bump(counter: &mut u64) {
    *counter = counter.saturating_add(1);
}

/// An XP event with the stat change it implies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub effect: StatEffect,
    pub event: XpEvent,
}

impl Activity {
    #[inline]
    #[must_use]
    pub fn new(effect: StatEffect, event: XpEvent) -> Self {
        Self { effect, event }
    }
}

/// Progression rules bound to a badge catalog and reward table
#[derive(Debug, Clone)]
pub struct Engine {
    catalog: BadgeCatalog,
    rewards: RarityRewards,
}

impl Engine {
    /// Engine over an explicit catalog and reward table
    #[inline]
    #[must_use]
    pub fn new(catalog: BadgeCatalog, rewards: RarityRewards) -> Self {
        Self { catalog, rewards }
    }

    /// Engine described by a configuration
    ///
    /// # Errors
    /// Returns catalog validation errors for custom badge lists
    pub fn from_config(config: &ProgressionConfig) -> Result<Self> {
        Ok(Self::new(config.catalog()?, config.rewards))
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &BadgeCatalog {
        &self.catalog
    }

    #[inline]
    #[must_use]
    pub fn rewards(&self) -> &RarityRewards {
        &self.rewards
    }

    /// Apply an XP event
    #[must_use]
    pub fn award_xp(
        &self,
        state: &ProgressionState,
        event: &XpEvent,
        now: DateTime<Utc>,
    ) -> AwardOutcome {
        let mut next = state.clone();
        let before = calculate_level(next.total_xp);

        next.total_xp = next.total_xp.saturating_add(event.xp_gained());
        next.xp_history.push(XpRecord::from_event(event, now));

        let after = calculate_level(next.total_xp);
        let leveled_up = after.level > before.level;

        let unlocked = evaluate_badges(
            &self.catalog,
            &next.stats,
            next.total_xp,
            &next.earned_badges,
        );

        let mut achievements = Vec::with_capacity(unlocked.len() + usize::from(leveled_up));
        for badge in unlocked {
            let reward = self.rewards.reward_for(badge.rarity);
            let achievement = Achievement::for_badge(badge, reward, now);
            next.earned_badges.insert(badge.id.clone());
            next.total_xp = next.total_xp.saturating_add(reward);
            next.achievements.push(achievement.clone());
            achievements.push(achievement);
        }

        if leveled_up {
            let achievement = Achievement::level_up(after.level, now);
            next.achievements.push(achievement.clone());
            achievements.push(achievement);
        }

        AwardOutcome {
            level: calculate_level(next.total_xp),
            state: next,
            achievements,
            leveled_up,
        }
    }

    /// Shallow-merge counters without evaluating badges or levels
    #[must_use]
    pub fn update_stats(&self, state: &ProgressionState, patch: &StatsPatch) -> ProgressionState {
        let mut next = state.clone();
        patch.apply_to(&mut next.stats);
        next
    }

    /// Apply a stat effect and its XP event in one pass
    #[must_use]
    pub fn record_activity(
        &self,
        state: &ProgressionState,
        activity: &Activity,
        now: DateTime<Utc>,
    ) -> AwardOutcome {
        let mut staged = state.clone();
        activity.effect.apply(&mut staged);
        self.award_xp(&staged, &activity.event, now)
    }

    /// Progress on every catalog badge
    #[must_use]
    pub fn badge_progress(&self, state: &ProgressionState) -> Vec<BadgeProgress> {
        badge_progress(&self.catalog, state)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(BadgeCatalog::builtin().clone(), RarityRewards::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::{BadgeDefinition, Rarity, Requirement, StatKind};
    use crate::types::ProgressStats;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn event(kind: &str, xp: i64) -> XpEvent {
        XpEvent::new(kind, xp).unwrap()
    }

    fn lessons(n: u64) -> StatsPatch {
        StatsPatch::new().with(StatField::LessonsCompleted, n)
    }

    #[test]
    fn first_lesson_scenario() {
        let engine = Engine::default();
        let state = engine.update_stats(&ProgressionState::new(), &lessons(1));
        let outcome = engine.award_xp(&state, &event("first_lesson", 20), now());

        assert!(!outcome.leveled_up);
        assert_eq!(outcome.achievements.len(), 1);
        assert_eq!(outcome.achievements[0].badge_id.as_deref(), Some("first_lesson"));
        assert_eq!(outcome.achievements[0].xp_gained, 50);
        assert_eq!(outcome.state.total_xp(), 70);
        assert!(outcome.state.has_badge("first_lesson"));
    }

    #[test]
    fn crossing_first_threshold_levels_up() {
        let engine = Engine::default();
        let state = ProgressionState::from_parts(90, ProgressStats::default());
        let outcome = engine.award_xp(&state, &event("quiz", 15), now());

        assert!(outcome.leveled_up);
        assert_eq!(outcome.state.total_xp(), 105);
        assert_eq!(outcome.achievements.len(), 1);
        let level_up = &outcome.achievements[0];
        assert!(level_up.is_level_up());
        assert_eq!(level_up.xp_gained, 0);
        assert_eq!(outcome.level.level, 2);
    }

    #[test]
    fn three_badges_then_level_up_in_order() {
        let engine = Engine::default();
        let patch = StatsPatch::new()
            .with(StatField::LessonsCompleted, 1)
            .with(StatField::QuizzesPassed, 1)
            .with(StatField::PerfectScores, 1);
        let state = engine.update_stats(&ProgressionState::new(), &patch);
        let outcome = engine.award_xp(&state, &event("quiz_perfect", 100), now());

        let badges: Vec<_> = outcome.unlocked_badges().collect();
        assert_eq!(badges, ["first_lesson", "first_quiz", "perfectionist"]);
        assert_eq!(outcome.achievements.len(), 4);
        assert!(outcome.achievements[3].is_level_up());
        assert_eq!(outcome.state.total_xp(), 100 + 3 * 50);
        assert_eq!(outcome.state.achievements(), outcome.achievements.as_slice());
    }

    #[test]
    fn common_badge_reward_cascades_into_total() {
        let engine = Engine::default();
        let state = engine.update_stats(&ProgressionState::from_parts(200, ProgressStats::default()), &lessons(1));
        let outcome = engine.award_xp(&state, &event("lesson_complete", 30), now());
        assert!(!outcome.leveled_up);
        assert_eq!(outcome.state.total_xp(), 200 + 30 + 50);
    }

    #[test]
    fn multiple_xp_badges_unlock_in_one_call() {
        let engine = Engine::default();
        let outcome = engine.award_xp(&ProgressionState::new(), &event("import", 2_000), now());
        let badges: Vec<_> = outcome.unlocked_badges().collect();
        assert_eq!(badges, ["xp_500", "xp_2000"]);
        assert!(outcome.leveled_up);
        assert_eq!(outcome.state.total_xp(), 2_000 + 50 + 100);
        // one level-up record even though several levels were crossed
        assert_eq!(outcome.achievements.iter().filter(|a| a.is_level_up()).count(), 1);
        assert!(outcome.achievements[2].message.contains("level 5"));
    }

    #[test]
    fn reward_does_not_retrigger_evaluation() {
        let catalog = BadgeCatalog::new(vec![
            BadgeDefinition::new("one", "One", "", "1", Rarity::Legendary, Requirement::new(StatKind::LessonsCompleted, 1)),
            BadgeDefinition::new("rich", "Rich", "", "$", Rarity::Common, Requirement::new(StatKind::XpEarned, 400)),
        ])
        .unwrap();
        let engine = Engine::new(catalog, RarityRewards::default());
        let state = engine.update_stats(&ProgressionState::new(), &lessons(1));
        let first = engine.award_xp(&state, &event("lesson", 10), now());
        assert_eq!(first.state.total_xp(), 510);
        assert!(!first.state.has_badge("rich"));

        let second = engine.award_xp(&first.state, &event("review", 0), now());
        assert!(second.state.has_badge("rich"));
        assert!(!second.leveled_up);
    }

    #[test]
    fn zero_xp_event_still_evaluates() {
        let engine = Engine::default();
        let state = engine.update_stats(&ProgressionState::new(), &lessons(1));
        let outcome = engine.award_xp(&state, &event("review", 0), now());
        assert_eq!(outcome.state.total_xp(), 50);
        assert_eq!(outcome.state.xp_history().len(), 1);
        assert_eq!(outcome.state.xp_history()[0].xp_gained, 0);
    }

    #[test]
    fn input_state_is_untouched() {
        let engine = Engine::default();
        let state = engine.update_stats(&ProgressionState::new(), &lessons(3));
        let snapshot = state.clone();
        let _ = engine.award_xp(&state, &event("lesson", 40), now());
        assert_eq!(state, snapshot);
    }

    #[test]
    fn update_stats_does_not_evaluate() {
        let engine = Engine::default();
        let state = engine.update_stats(&ProgressionState::new(), &lessons(10));
        assert!(state.earned_badges().is_empty());
        assert_eq!(state.total_xp(), 0);
    }

    #[test]
    fn record_activity_updates_stats_and_awards() {
        let engine = Engine::default();
        let activity = Activity::new(
            StatEffect::QuizPassed { perfect: true },
            event("quiz_complete", 25),
        );
        let outcome = engine.record_activity(&ProgressionState::new(), &activity, now());
        assert_eq!(outcome.state.stats().quizzes_passed, 1);
        assert_eq!(outcome.state.stats().perfect_scores, 1);
        let badges: Vec<_> = outcome.unlocked_badges().collect();
        assert_eq!(badges, ["first_quiz", "perfectionist"]);
        assert_eq!(outcome.state.total_xp(), 125);
    }

    #[test]
    fn streak_day_raises_longest() {
        let engine = Engine::default();
        let mut state = ProgressionState::new();
        for day in 1..=3 {
            let activity = Activity::new(StatEffect::StreakDay { current: day }, event("daily", 5));
            state = engine.record_activity(&state, &activity, now()).state;
        }
        assert_eq!(state.stats().current_streak, 3);
        assert_eq!(state.stats().longest_streak, 3);
        assert!(state.has_badge("streak_3"));

        let reset = Activity::new(StatEffect::StreakDay { current: 1 }, event("daily", 5));
        let state = engine.record_activity(&state, &reset, now()).state;
        assert_eq!(state.stats().current_streak, 1);
        assert_eq!(state.stats().longest_streak, 3);
    }

    #[test]
    fn unknown_rarity_rewards_fallback() {
        let catalog = BadgeCatalog::new(vec![BadgeDefinition::new(
            "odd",
            "Odd",
            "",
            "?",
            Rarity::Unknown,
            Requirement::new(StatKind::LessonsCompleted, 1),
        )])
        .unwrap();
        let engine = Engine::new(catalog, RarityRewards::default());
        let state = engine.update_stats(&ProgressionState::new(), &lessons(1));
        let outcome = engine.award_xp(&state, &event("lesson", 0), now());
        assert_eq!(outcome.state.total_xp(), 25);
    }

    fn arb_effect() -> impl Strategy<Value = StatEffect> {
        prop_oneof![
            Just(StatEffect::None),
            Just(StatEffect::LessonCompleted),
            any::<bool>().prop_map(|perfect| StatEffect::QuizPassed { perfect }),
            Just(StatEffect::SubjectCompleted),
            (0u64..40).prop_map(|current| StatEffect::StreakDay { current }),
        ]
    }

    proptest! {
        #[test]
        fn prop_earned_badges_never_shrink(
            steps in prop::collection::vec((arb_effect(), 0i64..600), 1..40)
        ) {
            let engine = Engine::default();
            let mut state = ProgressionState::new();
            for (effect, xp) in steps {
                let before_badges = state.earned_badges().clone();
                let before_xp = state.total_xp();
                let before_log = state.achievements().len();
                let activity = Activity::new(effect, XpEvent::new("step", xp).unwrap());
                state = engine.record_activity(&state, &activity, now()).state;
                prop_assert!(before_badges.iter().all(|b| state.has_badge(b)));
                prop_assert!(state.total_xp() >= before_xp);
                prop_assert!(state.achievements().len() >= before_log);
            }
        }
    }
}
