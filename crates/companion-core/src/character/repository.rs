//! CharacterRepository trait definition.
//!
//! Follows the same RPITIT pattern as HistoryStore.

use companion_types::character::{CharacterId, CharacterProfile};
use companion_types::error::RepositoryError;

/// Repository trait for character profiles.
///
/// Implementations live in companion-infra (e.g., `SqliteCharacterRepository`).
pub trait CharacterRepository: Send + Sync {
    /// Insert a new profile. Fails with `RepositoryError::Conflict` if the id exists.
    fn create(
        &self,
        profile: &CharacterProfile,
    ) -> impl std::future::Future<Output = Result<CharacterProfile, RepositoryError>> + Send;

    fn get(
        &self,
        id: &CharacterId,
    ) -> impl std::future::Future<Output = Result<Option<CharacterProfile>, RepositoryError>> + Send;

    /// All profiles, oldest first.
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<CharacterProfile>, RepositoryError>> + Send;
}
