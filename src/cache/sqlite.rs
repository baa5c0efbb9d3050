//! SQLite-backed cache store.
//!
//! Entries live in a single `cache_entries` table. Expiry is stored as unix
//! epoch seconds so the file survives process restarts.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, instrument};

use super::{CacheError, CacheStore};
use crate::model::epoch_seconds_now;

/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connections wait this long before returning `SQLITE_BUSY`.
const BUSY_TIMEOUT_MS: u32 = 5000;

fn expiry_for(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| epoch_seconds_now().saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)))
}

/// Cache store persisted in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Opens (creating if needed) a cache database at `db_path`.
    ///
    /// Enables WAL mode and runs pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Database`] if the connection fails, or
    /// [`CacheError::Migration`] if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn open(db_path: &Path) -> Result<Self, CacheError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("cache database ready");

        Ok(Self { pool })
    }

    /// Creates a throwaway in-memory cache database.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the connection or migrations fail.
    #[instrument]
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Deletes expired rows and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query(
            "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(epoch_seconds_now())
        .execute(&self.pool)
        .await?;
        debug!(removed = result.rows_affected(), "purged expired cache rows");
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT value FROM cache_entries \
             WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(epoch_seconds_now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expiry_for(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, CacheError> {
        let existing: Option<(String, Option<i64>)> =
            sqlx::query_as("SELECT value, expires_at FROM cache_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        if let Some((value, expires_at)) = &existing {
            let expired = expires_at.is_some_and(|at| at <= epoch_seconds_now());
            if !expired && value.parse::<i64>().is_err() {
                return Err(CacheError::NotACounter {
                    key: key.to_string(),
                });
            }
        }

        let (value,): (String,) = sqlx::query_as(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, '1', NULL) \
             ON CONFLICT(key) DO UPDATE SET \
                value = CASE \
                    WHEN expires_at IS NOT NULL AND expires_at <= ? THEN '1' \
                    ELSE CAST(CAST(value AS INTEGER) + 1 AS TEXT) \
                END, \
                expires_at = NULL \
             RETURNING value",
        )
        .bind(key)
        .bind(epoch_seconds_now())
        .fetch_one(&self.pool)
        .await?;

        value.parse::<i64>().map_err(|_| CacheError::NotACounter {
            key: key.to_string(),
        })
    }

    async fn clear(&self) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
