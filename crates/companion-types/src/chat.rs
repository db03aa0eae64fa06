//! Chat message and session state types.
//!
//! Messages form an append-only log per character. Each character has a
//! single session whose `turn_index` counts completed exchanges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::character::CharacterId;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// A single message in a character's conversation log.
///
/// Messages are ordered by `timestamp`; rows are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: String,
    pub character_id: CharacterId,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(character_id: &CharacterId, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id: character_id.session_id(),
            character_id: character_id.clone(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(character_id: &CharacterId, content: impl Into<String>) -> Self {
        Self::new(character_id, MessageRole::User, content)
    }

    pub fn assistant(character_id: &CharacterId, content: impl Into<String>) -> Self {
        Self::new(character_id, MessageRole::Assistant, content)
    }
}

/// Phase of a single exchange (one user turn and its streamed reply).
///
/// ```text
/// Idle -> Sending -> Streaming -> Finalizing -> Idle
///            \           \
///             +-----------+--> Failed -> Idle
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangePhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Finalizing,
    Failed,
}

impl ExchangePhase {
    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: ExchangePhase) -> bool {
        use ExchangePhase::*;
        matches!(
            (self, next),
            (Idle, Sending)
                | (Sending, Streaming)
                | (Sending, Failed)
                | (Streaming, Finalizing)
                | (Streaming, Failed)
                | (Finalizing, Idle)
                | (Finalizing, Failed)
                | (Failed, Idle)
        )
    }

    /// True while an exchange is in flight.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ExchangePhase::Sending | ExchangePhase::Streaming | ExchangePhase::Finalizing
        )
    }
}

impl fmt::Display for ExchangePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangePhase::Idle => write!(f, "idle"),
            ExchangePhase::Sending => write!(f, "sending"),
            ExchangePhase::Streaming => write!(f, "streaming"),
            ExchangePhase::Finalizing => write!(f, "finalizing"),
            ExchangePhase::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExchangePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(ExchangePhase::Idle),
            "sending" => Ok(ExchangePhase::Sending),
            "streaming" => Ok(ExchangePhase::Streaming),
            "finalizing" => Ok(ExchangePhase::Finalizing),
            "failed" => Ok(ExchangePhase::Failed),
            other => Err(format!("invalid exchange phase: '{other}'")),
        }
    }
}

/// Conversation-level state for a character's single session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub character_id: CharacterId,
    /// Phase at rest. Persisted as `idle` between exchanges.
    pub state: ExchangePhase,
    /// Number of completed exchanges. Never decreases.
    pub turn_index: u32,
    /// Error code of the most recent failed exchange, cleared on success.
    pub last_error_code: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// A brand-new idle session at turn 0.
    pub fn new(character_id: &CharacterId) -> Self {
        let now = Utc::now();
        Self {
            session_id: character_id.session_id(),
            character_id: character_id.clone(),
            state: ExchangePhase::Idle,
            turn_index: 0,
            last_error_code: None,
            started_at: now,
            updated_at: now,
        }
    }
}
