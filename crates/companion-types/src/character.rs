//! Character profile types.
//!
//! A character is the persona the companion speaks as. Profiles are created
//! once (by the CLI or the default bootstrap) and are read-only while a reply
//! is being generated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// Prefix for generated character identifiers.
pub const CHARACTER_ID_PREFIX: &str = "chr_";

/// Prefix for session identifiers derived from a character id.
pub const SESSION_ID_PREFIX: &str = "sess_";

/// Identifier of a character, e.g. `chr_3f9a1c0e7b2d`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id: `chr_` followed by 12 lowercase hex characters.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("{CHARACTER_ID_PREFIX}{}", &hex[..12]))
    }

    /// The single session id used for this character.
    ///
    /// There is exactly one session per character, so the id is derived
    /// rather than stored.
    pub fn session_id(&self) -> String {
        format!("{SESSION_ID_PREFIX}{}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CharacterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity and static personality attributes of a character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub id: CharacterId,
    pub name: String,
    /// Omitted from the persona when `None`.
    pub age: Option<u32>,
    pub gender: String,
    /// Free text such as "lover" or "friend"; informational only.
    pub relationship_type: Option<String>,
    pub mbti: Option<String>,
    #[serde(default)]
    pub personality_tags: Vec<String>,
    pub catchphrase: Option<String>,
    pub speech_style: Option<String>,
    pub backstory: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CharacterProfile {
    /// Create a profile with only the required fields set.
    pub fn new(name: impl Into<String>, gender: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CharacterId::generate(),
            name: name.into(),
            age: None,
            gender: gender.into(),
            relationship_type: None,
            mbti: None,
            personality_tags: Vec::new(),
            catchphrase: None,
            speech_style: None,
            backstory: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn session_id(&self) -> String {
        self.id.session_id()
    }
}

/// Typed seed for offline backstory generation.
///
/// Every field is optional; missing fields fall back to neutral wording when
/// the template is rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackstorySeed {
    pub name: Option<String>,
    pub occupation: Option<String>,
    pub city: Option<String>,
    pub age: Option<u32>,
    #[serde(default)]
    pub personality_tags: Vec<String>,
    pub catchphrase: Option<String>,
}

impl BackstorySeed {
    /// Seed a backstory from an existing profile. Occupation and city are
    /// not part of the profile and must be filled in by the caller.
    pub fn from_profile(profile: &CharacterProfile) -> Self {
        Self {
            name: Some(profile.name.clone()),
            occupation: None,
            city: None,
            age: profile.age,
            personality_tags: profile.personality_tags.clone(),
            catchphrase: profile.catchphrase.clone(),
        }
    }
}
