//! Relationship state between the user and a character.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::character::CharacterId;

/// Lowest intimacy level.
pub const MIN_LEVEL: u8 = 1;
/// Highest intimacy level.
pub const MAX_LEVEL: u8 = 10;
/// Score range within a level is `[MIN_SCORE, MAX_SCORE]`.
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;
/// Score assigned after dropping a level.
pub const LEVEL_DOWN_SCORE: f64 = 99.0;

/// Level used when no relationship record exists yet.
pub const DEFAULT_LEVEL: u8 = 7;
/// Score a freshly seeded relationship starts with.
pub const SEED_SCORE: f64 = 50.0;

/// Intimacy tracking for one character. Exactly one record per character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipState {
    pub character_id: CharacterId,
    /// Integer in `[1, 10]`.
    pub intimacy_level: u8,
    /// Progress within the current level, in `[0, 100]`.
    pub intimacy_score: f64,
    /// Free-form summary of the bond. Carried through updates untouched.
    pub relationship_narrative: Option<String>,
    pub last_updated_turn: u32,
    pub updated_at: DateTime<Utc>,
}

impl RelationshipState {
    /// Seed record created on first session use: level 7, score 50.
    pub fn seed(character_id: &CharacterId) -> Self {
        Self {
            character_id: character_id.clone(),
            intimacy_level: DEFAULT_LEVEL,
            intimacy_score: SEED_SCORE,
            relationship_narrative: None,
            last_updated_turn: 0,
            updated_at: Utc::now(),
        }
    }
}
