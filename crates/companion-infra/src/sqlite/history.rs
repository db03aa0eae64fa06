//! SQLite implementation of `HistoryStore`.
//!
//! Messages are append-only rows keyed by a v7 UUID. Session and
//! relationship records are one row per key, written with upserts.

use companion_core::history::store::HistoryStore;
use companion_types::character::CharacterId;
use companion_types::chat::{ChatMessage, ExchangePhase, MessageRole, SessionState};
use companion_types::error::RepositoryError;
use companion_types::relationship::RelationshipState;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `HistoryStore`.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: DatabasePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Number of stored messages for a character.
    pub async fn count_messages(&self, character_id: &CharacterId) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM chat_messages WHERE character_id = ?")
            .bind(character_id.as_str())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(n.max(0) as u64)
    }
}

struct MessageRow {
    id: String,
    session_id: String,
    character_id: String,
    role: String,
    content: String,
    timestamp: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            character_id: row.try_get("character_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let role: MessageRole = self.role.parse().map_err(RepositoryError::Query)?;

        Ok(ChatMessage {
            id,
            session_id: self.session_id,
            character_id: CharacterId::new(self.character_id),
            role,
            content: self.content,
            timestamp: parse_datetime(&self.timestamp)?,
        })
    }
}

struct SessionRow {
    session_id: String,
    character_id: String,
    state: String,
    turn_index: i64,
    last_error_code: Option<String>,
    started_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            character_id: row.try_get("character_id")?,
            state: row.try_get("state")?,
            turn_index: row.try_get("turn_index")?,
            last_error_code: row.try_get("last_error_code")?,
            started_at: row.try_get("started_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_state(self) -> Result<SessionState, RepositoryError> {
        let state: ExchangePhase = self.state.parse().map_err(RepositoryError::Query)?;
        let turn_index = u32::try_from(self.turn_index)
            .map_err(|_| RepositoryError::Query(format!("invalid turn_index: {}", self.turn_index)))?;

        Ok(SessionState {
            session_id: self.session_id,
            character_id: CharacterId::new(self.character_id),
            state,
            turn_index,
            last_error_code: self.last_error_code,
            started_at: parse_datetime(&self.started_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct RelationshipRow {
    character_id: String,
    intimacy_level: i64,
    intimacy_score: f64,
    relationship_narrative: Option<String>,
    last_updated_turn: i64,
    updated_at: String,
}

impl RelationshipRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            character_id: row.try_get("character_id")?,
            intimacy_level: row.try_get("intimacy_level")?,
            intimacy_score: row.try_get("intimacy_score")?,
            relationship_narrative: row.try_get("relationship_narrative")?,
            last_updated_turn: row.try_get("last_updated_turn")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_state(self) -> Result<RelationshipState, RepositoryError> {
        let intimacy_level = u8::try_from(self.intimacy_level).map_err(|_| {
            RepositoryError::Query(format!("invalid intimacy_level: {}", self.intimacy_level))
        })?;

        Ok(RelationshipState {
            character_id: CharacterId::new(self.character_id),
            intimacy_level,
            intimacy_score: self.intimacy_score,
            relationship_narrative: self.relationship_narrative,
            last_updated_turn: self.last_updated_turn.max(0) as u32,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chat_messages (id, session_id, character_id, role, content, timestamp)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(&message.session_id)
        .bind(message.character_id.as_str())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.timestamp))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                RepositoryError::Conflict(format!("message {} already exists", message.id))
            }
            other => RepositoryError::Query(other.to_string()),
        })?;

        Ok(())
    }

    async fn recent_messages(
        &self,
        character_id: &CharacterId,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"SELECT id, session_id, character_id, role, content, timestamp
               FROM chat_messages
               WHERE character_id = ?
               ORDER BY timestamp DESC, rowid DESC
               LIMIT ?"#,
        )
        .bind(character_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = rows
            .iter()
            .map(|row| {
                MessageRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_message()
            })
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn get_session_state(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionState>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT session_id, character_id, state, turn_index, last_error_code,
                      started_at, updated_at
               FROM session_states WHERE session_id = ?"#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let row =
                    SessionRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(row.into_state()?))
            }
            None => Ok(None),
        }
    }

    async fn save_session_state(&self, state: &SessionState) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO session_states
                   (session_id, character_id, state, turn_index, last_error_code,
                    started_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(session_id) DO UPDATE SET
                   state = excluded.state,
                   turn_index = excluded.turn_index,
                   last_error_code = excluded.last_error_code,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&state.session_id)
        .bind(state.character_id.as_str())
        .bind(state.state.to_string())
        .bind(i64::from(state.turn_index))
        .bind(&state.last_error_code)
        .bind(format_datetime(&state.started_at))
        .bind(format_datetime(&state.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_relationship_state(
        &self,
        character_id: &CharacterId,
    ) -> Result<Option<RelationshipState>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT character_id, intimacy_level, intimacy_score, relationship_narrative,
                      last_updated_turn, updated_at
               FROM relationship_states WHERE character_id = ?"#,
        )
        .bind(character_id.as_str())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let row = RelationshipRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(row.into_state()?))
            }
            None => Ok(None),
        }
    }

    async fn save_relationship_state(
        &self,
        state: &RelationshipState,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO relationship_states
                   (character_id, intimacy_level, intimacy_score, relationship_narrative,
                    last_updated_turn, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(character_id) DO UPDATE SET
                   intimacy_level = excluded.intimacy_level,
                   intimacy_score = excluded.intimacy_score,
                   relationship_narrative = excluded.relationship_narrative,
                   last_updated_turn = excluded.last_updated_turn,
                   updated_at = excluded.updated_at"#,
        )
        .bind(state.character_id.as_str())
        .bind(i64::from(state.intimacy_level))
        .bind(state.intimacy_score)
        .bind(&state.relationship_narrative)
        .bind(i64::from(state.last_updated_turn))
        .bind(format_datetime(&state.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}
