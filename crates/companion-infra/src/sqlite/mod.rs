//! SQLite storage adapters.

pub mod character;
pub mod history;
pub mod pool;

use chrono::{DateTime, SecondsFormat, Utc};

use companion_types::error::RepositoryError;

/// Fixed-width RFC 3339 in UTC, so lexical order in SQLite is chronological order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime '{s}': {e}")))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> pool::DatabasePool {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    // Leak the tempdir so the file outlives the pool.
    std::mem::forget(dir);
    pool::DatabasePool::new(&url).await.unwrap()
}
