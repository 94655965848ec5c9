//! Read-only access to the host application's local note database.

use std::env;
use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Row};
use tracing::debug;

use scribe::{AutomationError, NoteRecord, NoteStore};

/// Opens the host's sqlite note database fresh on every read, strictly
/// read-only. The host owns this file; holding a pool open against it would
/// contend with the running application.
pub struct SqliteNoteStore {
    path: PathBuf,
}

impl SqliteNoteStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Where the host application keeps its note database on this platform.
    pub fn default_path() -> PathBuf {
        let home = env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);
        if cfg!(target_os = "macos") {
            home.join("Library")
                .join("Application Support")
                .join("Claude")
                .join("claudeSQLite.db")
        } else {
            home.join(".config").join("Claude").join("claudeSQLite.db")
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn read_recent_notes(&self, limit: usize) -> Result<Vec<NoteRecord>, AutomationError> {
        if !self.path.is_file() {
            return Err(AutomationError::SourceUnavailable(format!(
                "note database not found at {}",
                self.path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .read_only(true);
        let mut conn = options.connect().await.map_err(|e| {
            AutomationError::SourceUnavailable(format!(
                "could not open note database {}: {e}",
                self.path.display()
            ))
        })?;

        let rows = sqlx::query(
            "SELECT title, content, created_at FROM notes ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&mut conn)
        .await
        .map_err(|e| {
            AutomationError::SourceUnavailable(format!("note query failed: {e}"))
        })?;

        let notes = rows
            .into_iter()
            .map(|row| NoteRecord {
                title: row.try_get::<String, _>("title").unwrap_or_default(),
                content: row.try_get::<String, _>("content").unwrap_or_default(),
                // created_at is TEXT in current host builds but was INTEGER
                // (unix millis) in older ones.
                created_at: row
                    .try_get::<String, _>("created_at")
                    .or_else(|_| row.try_get::<i64, _>("created_at").map(|v| v.to_string()))
                    .unwrap_or_default(),
            })
            .collect::<Vec<_>>();
        debug!(count = notes.len(), "read recent notes");
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(path: &PathBuf, rows: &[(&str, &str, &str)]) {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let mut conn = options.connect().await.expect("create test db");
        sqlx::query("CREATE TABLE notes (title TEXT, content TEXT, created_at TEXT)")
            .execute(&mut conn)
            .await
            .expect("create table");
        for (title, content, created_at) in rows {
            sqlx::query("INSERT INTO notes (title, content, created_at) VALUES (?, ?, ?)")
                .bind(title)
                .bind(content)
                .bind(created_at)
                .execute(&mut conn)
                .await
                .expect("insert note");
        }
    }

    #[tokio::test]
    async fn reads_notes_newest_first_with_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.db");
        seed(
            &path,
            &[
                ("oldest", "a", "2026-08-01T00:00:00Z"),
                ("newest", "b", "2026-08-29T00:00:00Z"),
                ("middle", "c", "2026-08-15T00:00:00Z"),
            ],
        )
        .await;

        let store = SqliteNoteStore::new(path);
        let notes = store.read_recent_notes(2).await.expect("reads");
        let titles: Vec<&str> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["newest", "middle"]);
    }

    #[tokio::test]
    async fn missing_database_is_source_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteNoteStore::new(dir.path().join("nope.db"));
        match store.read_recent_notes(5).await {
            Err(AutomationError::SourceUnavailable(_)) => {}
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }
}
