//! Level calculator
//!
//! Level `n` needs `n * 200 - 100` XP on top of the cumulative total of level
//! `n - 1`, so a user enters level `n` at `100 * (n - 1)^2` total XP
//! (0, 100, 400, 900, 1600, ...).

use crate::types::UserLevel;

/// XP needed to clear level 1
pub const BASE_XP_REQUIRED: u64 = 100;

/// XP needed to clear `level` (i.e. to go from `level` to `level + 1`)
#[inline]
#[must_use]
pub fn xp_required_for(level: u64) -> u64 {
    level.max(1).saturating_mul(200).saturating_sub(100)
}

/// Cumulative XP at which `level` is reached
#[inline]
#[must_use]
pub fn level_threshold(level: u64) -> u64 {
    let n = level.max(1) - 1;
    n.saturating_mul(n).saturating_mul(BASE_XP_REQUIRED)
}

/// Largest `r` with `r * r <= n`
fn isqrt(n: u64) -> u64 {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut root = (n as f64).sqrt() as u64;
    while root.checked_mul(root).map_or(true, |sq| sq > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).is_some_and(|sq| sq <= n) {
        root += 1;
    }
    root
}

/// Derive the level view for a total XP value
///
/// The user is at level `n` where `100 * (n - 1)^2 <= total_xp`, found in
/// constant time.
#[must_use]
pub fn calculate_level(total_xp: u64) -> UserLevel {
    let level = isqrt(total_xp / BASE_XP_REQUIRED) + 1;
    let threshold = level_threshold(level);
    let current_xp = total_xp - threshold;
    UserLevel {
        level,
        current_xp,
        xp_to_next_level: xp_required_for(level).saturating_sub(current_xp),
        total_xp,
        level_threshold: threshold,
    }
}
