//! SQLite-backed article store.
//!
//! Owns the single `articles` table and every status transition on it.
//! Each operation borrows a connection from the pool for exactly one
//! statement, so the connection goes back to the pool on every exit path.
//!
//! # Lifecycle
//!
//! ```text
//! insert_if_absent ──► new ──promote_to_rewritten──► rewritten
//! ```
//!
//! `rewritten` is terminal. Promotion is a single compare-and-set `UPDATE`,
//! so a crash before it commits leaves the row `new` with its original body,
//! and two writers racing on the same row cannot both promote it.

use crate::error::StorageError;
#[cfg(test)]
use crate::models::Article;
use crate::models::{ArticleStatus, PendingArticle, PublishedArticle, StatusCounts};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, instrument, warn};

const CREATE_ARTICLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT UNIQUE,
    link TEXT,
    body TEXT,
    status TEXT DEFAULT 'new'
)
"#;

const CREATE_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_articles_status_id ON articles (status, id)";

const INSERT_SQL: &str = "INSERT INTO articles (title, link, body) VALUES (?1, ?2, ?3)
     ON CONFLICT (title) DO NOTHING";

const SELECT_BY_STATUS_SQL: &str = "SELECT id, title, body FROM articles
     WHERE status = ?1
     ORDER BY id DESC
     LIMIT ?2";

const PROMOTE_SQL: &str = "UPDATE articles
     SET body = ?1, status = 'rewritten'
     WHERE id = ?2 AND status = 'new'";

#[cfg(test)]
type ArticleRow = (i64, String, String, String, String);

/// Handle to the article table. Cheap to clone; clones share one pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) a database file and ensure the schema exists.
    #[instrument(level = "info")]
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        info!(path, "Article store ready");
        Ok(store)
    }

    /// Open a private in-memory database.
    ///
    /// Every connection to `:memory:` gets its own database, so the pool is
    /// pinned to one connection that is never recycled.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = "sqlite::memory:".parse::<SqliteConnectOptions>()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create the schema if it does not exist. Safe to call repeatedly.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_ARTICLES_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_STATUS_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a `new` row unless `title` is already stored.
    ///
    /// Returns `true` when a row was inserted. A duplicate title is an
    /// expected outcome and returns `false`.
    #[instrument(level = "debug", skip_all)]
    pub async fn insert_if_absent(
        &self,
        title: &str,
        link: &str,
        body: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(INSERT_SQL)
            .bind(title)
            .bind(link)
            .bind(body)
            .execute(&self.pool)
            .await?;

        let inserted = result.rows_affected() == 1;
        debug!(inserted, %title, "insert_if_absent");
        Ok(inserted)
    }

    /// Up to `limit` rows still `new`, most recently inserted first.
    pub async fn select_pending(&self, limit: u32) -> Result<Vec<PendingArticle>, StorageError> {
        let rows = sqlx::query_as::<_, PendingArticle>(SELECT_BY_STATUS_SQL)
            .bind(ArticleStatus::New.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Replace the body of a `new` row and mark it `rewritten`, atomically.
    ///
    /// Returns `false` without writing when `new_body` is blank, or when the
    /// row is missing or already `rewritten`.
    #[instrument(level = "debug", skip(self, new_body))]
    pub async fn promote_to_rewritten(
        &self,
        id: i64,
        new_body: &str,
    ) -> Result<bool, StorageError> {
        if new_body.trim().is_empty() {
            warn!(id, "Refusing to promote article with empty body");
            return Ok(false);
        }

        let result = sqlx::query(PROMOTE_SQL)
            .bind(new_body)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Up to `limit` rewritten rows, most recent first.
    pub async fn select_published(
        &self,
        limit: u32,
    ) -> Result<Vec<PublishedArticle>, StorageError> {
        let rows = sqlx::query_as::<_, PublishedArticle>(SELECT_BY_STATUS_SQL)
            .bind(ArticleStatus::Rewritten.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Look up a single row by id.
    #[cfg(test)]
    pub async fn fetch(&self, id: i64) -> Result<Option<Article>, StorageError> {
        let row = sqlx::query_as::<_, ArticleRow>(
            "SELECT id, title, link, body, status FROM articles WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, title, link, body, status)) = row else {
            return Ok(None);
        };
        let status = status
            .parse::<ArticleStatus>()
            .map_err(StorageError::CorruptStatus)?;

        Ok(Some(Article {
            id,
            title,
            link,
            body,
            status,
        }))
    }

    /// Number of rows in each status.
    pub async fn count_by_status(&self) -> Result<StatusCounts, StorageError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM articles GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match status
                .parse::<ArticleStatus>()
                .map_err(StorageError::CorruptStatus)?
            {
                ArticleStatus::New => counts.new = count,
                ArticleStatus::Rewritten => counts.rewritten = count,
            }
        }
        Ok(counts)
    }

    /// Title and first 100 characters of body for the oldest `limit` rows.
    pub async fn preview(&self, limit: u32) -> Result<Vec<(String, String)>, StorageError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT title, SUBSTR(body, 1, 100) FROM articles ORDER BY id LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Close the pool. Subsequent operations fail with a [`StorageError`].
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
