//! SQLite implementation of `CharacterRepository`.

use chrono::Utc;
use companion_core::character::repository::CharacterRepository;
use companion_types::character::{CharacterId, CharacterProfile};
use companion_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `CharacterRepository`.
#[derive(Clone)]
pub struct SqliteCharacterRepository {
    pool: DatabasePool,
}

impl SqliteCharacterRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Replace a character's backstory. Returns `NotFound` for unknown ids.
    pub async fn set_backstory(
        &self,
        id: &CharacterId,
        backstory: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE characters SET backstory = ?, updated_at = ? WHERE id = ?")
            .bind(backstory)
            .bind(format_datetime(&Utc::now()))
            .bind(id.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

struct CharacterRow {
    id: String,
    name: String,
    age: Option<i64>,
    gender: String,
    relationship_type: Option<String>,
    mbti: Option<String>,
    personality_tags: String,
    catchphrase: Option<String>,
    speech_style: Option<String>,
    backstory: Option<String>,
    created_at: String,
    updated_at: String,
}

impl CharacterRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            age: row.try_get("age")?,
            gender: row.try_get("gender")?,
            relationship_type: row.try_get("relationship_type")?,
            mbti: row.try_get("mbti")?,
            personality_tags: row.try_get("personality_tags")?,
            catchphrase: row.try_get("catchphrase")?,
            speech_style: row.try_get("speech_style")?,
            backstory: row.try_get("backstory")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_profile(self) -> Result<CharacterProfile, RepositoryError> {
        let personality_tags: Vec<String> = serde_json::from_str(&self.personality_tags)
            .map_err(|e| RepositoryError::Query(format!("invalid personality_tags: {e}")))?;
        let age = self
            .age
            .map(|a| u32::try_from(a).map_err(|_| RepositoryError::Query(format!("invalid age: {a}"))))
            .transpose()?;

        Ok(CharacterProfile {
            id: CharacterId::new(self.id),
            name: self.name,
            age,
            gender: self.gender,
            relationship_type: self.relationship_type,
            mbti: self.mbti,
            personality_tags,
            catchphrase: self.catchphrase,
            speech_style: self.speech_style,
            backstory: self.backstory,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, age, gender, relationship_type, mbti, \
     personality_tags, catchphrase, speech_style, backstory, created_at, updated_at \
     FROM characters";

impl CharacterRepository for SqliteCharacterRepository {
    async fn create(&self, profile: &CharacterProfile) -> Result<CharacterProfile, RepositoryError> {
        let tags = serde_json::to_string(&profile.personality_tags)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO characters
                   (id, name, age, gender, relationship_type, mbti, personality_tags,
                    catchphrase, speech_style, backstory, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(profile.id.as_str())
        .bind(&profile.name)
        .bind(profile.age.map(i64::from))
        .bind(&profile.gender)
        .bind(&profile.relationship_type)
        .bind(&profile.mbti)
        .bind(tags)
        .bind(&profile.catchphrase)
        .bind(&profile.speech_style)
        .bind(&profile.backstory)
        .bind(format_datetime(&profile.created_at))
        .bind(format_datetime(&profile.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                RepositoryError::Conflict(format!("character {} already exists", profile.id))
            }
            other => RepositoryError::Query(other.to_string()),
        })?;

        tracing::info!(character_id = %profile.id, name = %profile.name, "character created");
        Ok(profile.clone())
    }

    async fn get(&self, id: &CharacterId) -> Result<Option<CharacterProfile>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let row =
                    CharacterRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(row.into_profile()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<CharacterProfile>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at ASC, rowid ASC"))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                CharacterRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_profile()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_pool;

    fn sample_profile() -> CharacterProfile {
        let mut profile = CharacterProfile::new("苏晚晴", "女性");
        profile.age = Some(24);
        profile.mbti = Some("INFJ".to_string());
        profile.personality_tags = vec!["温柔体贴".to_string(), "知性".to_string()];
        profile.catchphrase = Some("我在呢。".to_string());
        profile
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = SqliteCharacterRepository::new(test_pool().await);
        let profile = sample_profile();

        repo.create(&profile).await.unwrap();
        let loaded = repo.get(&profile.id).await.unwrap().unwrap();

        assert_eq!(loaded.name, "苏晚晴");
        assert_eq!(loaded.age, Some(24));
        assert_eq!(loaded.personality_tags, vec!["温柔体贴", "知性"]);
        assert_eq!(loaded.catchphrase.as_deref(), Some("我在呢。"));
        assert!(loaded.speech_style.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = SqliteCharacterRepository::new(test_pool().await);
        let missing = CharacterId::new("chr_000000000000");
        assert!(repo.get(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let repo = SqliteCharacterRepository::new(test_pool().await);
        let profile = sample_profile();
        repo.create(&profile).await.unwrap();

        let err = repo.create(&profile).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let repo = SqliteCharacterRepository::new(test_pool().await);
        let first = sample_profile();
        let mut second = CharacterProfile::new("林夏", "女性");
        second.created_at = first.created_at + chrono::Duration::seconds(1);

        repo.create(&second).await.unwrap();
        repo.create(&first).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["苏晚晴", "林夏"]);
    }

    #[tokio::test]
    async fn test_set_backstory() {
        let repo = SqliteCharacterRepository::new(test_pool().await);
        let profile = sample_profile();
        repo.create(&profile).await.unwrap();

        repo.set_backstory(&profile.id, "她在雨天遇见了你。").await.unwrap();
        let loaded = repo.get(&profile.id).await.unwrap().unwrap();
        assert_eq!(loaded.backstory.as_deref(), Some("她在雨天遇见了你。"));

        let missing = CharacterId::new("chr_000000000000");
        let err = repo.set_backstory(&missing, "x").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
