//! Relationship engine: pure intimacy arithmetic.
//!
//! A relationship has an integer level in `[1, 10]` and a score in
//! `[0, 100]` measuring progress within that level. Each exchange adds a
//! bump to the score; crossing either end of the score range moves the
//! level by one, clamping at the floor and ceiling.

use companion_types::config::IntimacySettings;
use companion_types::relationship::{
    LEVEL_DOWN_SCORE, MAX_LEVEL, MAX_SCORE, MIN_LEVEL, MIN_SCORE, RelationshipState,
};

/// Apply `bump` to `state` at turn `current_turn`.
///
/// At most one level transition happens per call, however large the bump.
/// Out-of-range input is clamped first and a non-finite bump counts as zero,
/// so the result always satisfies the level and score bounds.
///
/// Pure: `updated_at` is carried over unchanged. Callers that persist the
/// result stamp it themselves.
pub fn apply(state: &RelationshipState, bump: f64, current_turn: u32) -> RelationshipState {
    let mut level = state.intimacy_level.clamp(MIN_LEVEL, MAX_LEVEL);
    let start = if state.intimacy_score.is_finite() {
        state.intimacy_score.clamp(MIN_SCORE, MAX_SCORE)
    } else {
        MIN_SCORE
    };
    let bump = if bump.is_finite() { bump } else { 0.0 };

    let mut score = start + bump;
    if score >= MAX_SCORE {
        if level < MAX_LEVEL {
            level += 1;
            score = MIN_SCORE;
        } else {
            score = MAX_SCORE;
        }
    } else if score < MIN_SCORE {
        if level > MIN_LEVEL {
            level -= 1;
            score = LEVEL_DOWN_SCORE;
        } else {
            score = MIN_SCORE;
        }
    }

    RelationshipState {
        character_id: state.character_id.clone(),
        intimacy_level: level,
        intimacy_score: score,
        relationship_narrative: state.relationship_narrative.clone(),
        last_updated_turn: current_turn,
        updated_at: state.updated_at,
    }
}

/// Like [`apply`], but for a record that may not exist yet.
///
/// Returns `None` when there is nothing to update; the caller decides
/// whether that matters. Nothing is created here.
pub fn apply_existing(
    state: Option<&RelationshipState>,
    bump: f64,
    current_turn: u32,
) -> Option<RelationshipState> {
    state.map(|s| apply(s, bump, current_turn))
}

/// How much a single user message moves the score.
#[derive(Debug, Clone, PartialEq)]
pub struct BumpPolicy {
    pub base_bump: f64,
    pub engaged_bump: f64,
    /// Messages strictly longer than this many characters earn `engaged_bump`.
    pub length_threshold: usize,
}

impl BumpPolicy {
    pub fn bump_for(&self, user_text: &str) -> f64 {
        if user_text.chars().count() > self.length_threshold {
            self.engaged_bump
        } else {
            self.base_bump
        }
    }
}

impl Default for BumpPolicy {
    fn default() -> Self {
        Self::from(&IntimacySettings::default())
    }
}

impl From<&IntimacySettings> for BumpPolicy {
    fn from(settings: &IntimacySettings) -> Self {
        Self {
            base_bump: settings.base_bump,
            engaged_bump: settings.engaged_bump,
            length_threshold: settings.length_threshold,
        }
    }
}
