//! Event types flowing out of a reply exchange.
//!
//! `UiEvent` is what the presentation loop consumes, one per tick.
//! `PipelineDiagnostic` is broadcast for conditions the user never sees but
//! that tests and logs care about.

use serde::{Deserialize, Serialize};

use crate::character::CharacterId;
use crate::error::ExchangeError;

/// One unit of output for the presentation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A piece of the reply, in production order.
    TokenChunk(String),

    /// The exchange ended without an error. Always the last event of a run.
    StreamDone(StreamEnd),

    /// The exchange failed. Always the last event of a run.
    StreamError(ExchangeError),
}

impl UiEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UiEvent::TokenChunk(_))
    }
}

/// How a non-failing exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The reply was streamed and committed.
    Completed,
    /// The caller cancelled; nothing was committed.
    Cancelled,
}

/// A best-effort write that the pipeline is allowed to lose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryWrite {
    UserMessage,
    RelationshipState,
    SessionBootstrap,
    RelationshipSeed,
    ErrorBookkeeping,
}

impl std::fmt::Display for SecondaryWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecondaryWrite::UserMessage => "user_message",
            SecondaryWrite::RelationshipState => "relationship_state",
            SecondaryWrite::SessionBootstrap => "session_bootstrap",
            SecondaryWrite::RelationshipSeed => "relationship_seed",
            SecondaryWrite::ErrorBookkeeping => "error_bookkeeping",
        };
        f.write_str(s)
    }
}

/// Swallowed conditions reported by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineDiagnostic {
    /// A secondary write failed and the exchange carried on.
    SecondaryWriteFailed {
        character_id: CharacterId,
        write: SecondaryWrite,
        error: String,
    },

    /// No relationship record existed, so the default level was used and no
    /// bump was applied.
    RelationshipAbsent { character_id: CharacterId },

    /// Reading the relationship record or the history window failed; the
    /// exchange continued with defaults.
    ReadFailed {
        character_id: CharacterId,
        what: String,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(!UiEvent::TokenChunk("a".into()).is_terminal());
        assert!(UiEvent::StreamDone(StreamEnd::Completed).is_terminal());
        assert!(UiEvent::StreamError(ExchangeError::Transport("x".into())).is_terminal());
    }

    #[test]
    fn test_diagnostic_serde_tag() {
        let diag = PipelineDiagnostic::SecondaryWriteFailed {
            character_id: CharacterId::new("chr_aaaaaaaaaaaa"),
            write: SecondaryWrite::UserMessage,
            error: "disk full".to_string(),
        };
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"type\":\"secondary_write_failed\""));
        assert!(json.contains("\"write\":\"user_message\""));
    }
}
