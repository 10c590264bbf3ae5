pub mod entities;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use self::entities::{Bookmark, CacheRow, NewBookmark};

pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        let pool = SqlitePoolOptions::new()
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(db_path)
                    .foreign_keys(true)
                    .journal_mode(SqliteJournalMode::Delete)
                    .create_if_missing(true),
            )
            .await
            .with_context(|| anyhow!("could not open a SQLite database `{}`", db_path.display()))?;
        info!("Using an SQLite database `{}`", db_path.display());

        Self::migrate(pool).await
    }

    /// Opens a private database that lives as long as the returned value.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        // a single connection that never expires, otherwise the database would vanish with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(
                <SqliteConnectOptions as std::str::FromStr>::from_str("sqlite::memory:")
                    .context("could not build in-memory SQLite options")?,
            )
            .await
            .context("could not open an in-memory SQLite database")?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!()
            .run(&pool)
            .await
            .with_context(|| anyhow!("could not prepare a database schema"))?;

        Ok(Self { pool })
    }

    pub async fn begin(&self) -> Result<Tx> {
        self.pool
            .begin()
            .await
            .context("could not begin a new DB transaction")
            .map(Tx)
    }
}

pub struct Tx(Transaction<'static, Sqlite>);

impl Tx {
    pub async fn commit(self) -> Result<()> {
        self.0
            .commit()
            .await
            .context("could not commit a DB transaction")
    }

    #[instrument(level = "TRACE", skip(self))]
    pub async fn get_cache_entry(
        &mut self,
        key: &str,
    ) -> Result<Option<(Value, OffsetDateTime)>> {
        let row: Option<CacheRow> = sqlx::query_as(
            "SELECT payload, stored_at
            FROM news_cache
            WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(self.0.as_mut())
        .await
        .context("could not retrieve a cache entry")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload = serde_json::from_str(&row.payload)
            .with_context(|| anyhow!("the cached payload for `{key}` is not valid JSON"))?;

        Ok(Some((payload, row.stored_at)))
    }

    #[instrument(level = "TRACE", skip(self, payload))]
    pub async fn put_cache_entry(
        &mut self,
        key: &str,
        payload: &Value,
        stored_at: OffsetDateTime,
    ) -> Result<()> {
        sqlx::query(
            "INSERT
            INTO news_cache (key, payload, stored_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET
              payload = excluded.payload,
              stored_at = excluded.stored_at",
        )
        .bind(key)
        .bind(payload.to_string())
        .bind(stored_at)
        .execute(self.0.as_mut())
        .await
        .context("could not store a cache entry")?;

        Ok(())
    }

    #[instrument(level = "TRACE", skip(self))]
    pub async fn get_bookmarks(&mut self, user_id: &str) -> Result<Vec<Bookmark>> {
        sqlx::query_as(
            "SELECT id, title, summary, image_url, source_url, published_at, created_at
            FROM bookmarks
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.0.as_mut())
        .await
        .context("could not retrieve bookmarks")
    }

    /// Returns `None` if the user has already bookmarked the same URL.
    #[instrument(level = "TRACE", skip(self, bookmark), fields(source_url = %bookmark.source_url))]
    pub async fn insert_bookmark(
        &mut self,
        user_id: &str,
        bookmark: NewBookmark,
        created_at: OffsetDateTime,
    ) -> Result<Option<Bookmark>> {

        let inserted: Option<Bookmark> = sqlx::query_as(
            "INSERT
            INTO bookmarks (
              user_id,
              title,
              summary,
              image_url,
              source_url,
              published_at,
              created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (user_id, source_url) DO NOTHING
            RETURNING id, title, summary, image_url, source_url, published_at, created_at",
        )
        .bind(user_id)
        .bind(bookmark.title)
        .bind(bookmark.summary)
        .bind(bookmark.image_url)
        .bind(bookmark.source_url)
        .bind(bookmark.published_at)
        .bind(created_at)
        .fetch_optional(self.0.as_mut())
        .await
        .context("could not insert a bookmark")?;

        if let Some(bookmark) = &inserted {
            debug!(id = bookmark.id, "Stored a bookmark");
        }

        Ok(inserted)
    }

    #[instrument(level = "TRACE", skip(self))]
    pub async fn delete_bookmark(&mut self, user_id: &str, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE
            FROM bookmarks
            WHERE id = ?1 AND user_id = ?2",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.0.as_mut())
        .await
        .context("could not delete a bookmark")?;

        Ok(result.rows_affected() > 0)
    }
}
