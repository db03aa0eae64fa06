//! HistoryStore trait definition.
//!
//! An append-only message log plus the two keyed state records
//! (session and relationship) the reply pipeline reads and writes.

use companion_types::character::CharacterId;
use companion_types::chat::{ChatMessage, SessionState};
use companion_types::error::RepositoryError;
use companion_types::relationship::RelationshipState;

/// Repository trait for messages, session state, and relationship state.
///
/// Lookups return `Ok(None)` for keys that do not exist yet; only genuine
/// storage failures are errors. Saves are upserts (last write wins).
///
/// Implementations live in companion-infra (e.g., `SqliteHistoryStore`).
pub trait HistoryStore: Send + Sync {
    /// Append a message to the log.
    fn append_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The newest `limit` messages for a character, oldest first.
    fn recent_messages(
        &self,
        character_id: &CharacterId,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    fn get_session_state(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<SessionState>, RepositoryError>> + Send;

    fn save_session_state(
        &self,
        state: &SessionState,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_relationship_state(
        &self,
        character_id: &CharacterId,
    ) -> impl std::future::Future<Output = Result<Option<RelationshipState>, RepositoryError>> + Send;

    fn save_relationship_state(
        &self,
        state: &RelationshipState,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
