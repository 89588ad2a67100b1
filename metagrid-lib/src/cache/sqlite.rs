//! SQLite-backed persistent cache provider.

use std::path::Path;

use async_sqlite::Client;
use async_sqlite::ClientBuilder;
use async_sqlite::JournalMode;
use async_sqlite::rusqlite;
use async_sqlite::rusqlite::OptionalExtension;
use async_trait::async_trait;
use chrono::TimeZone;
use chrono::Utc;

use super::CacheProvider;
use super::CachedValue;

/// Cache entries in a SQLite file, so offline data survives restarts.
///
/// # Example
///
/// ```ignore
/// use metagrid_lib::cache::SqliteCache;
///
/// let cache = SqliteCache::open("offline.db").await?;
/// ```
pub struct SqliteCache {
    client: Client,
}

impl SqliteCache {
    /// Opens (or creates) the cache database at `path` in WAL mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, async_sqlite::Error> {
        let client = ClientBuilder::new()
            .path(path)
            .journal_mode(JournalMode::Wal)
            .open()
            .await?;
        Self::init_schema(&client).await?;
        Ok(Self { client })
    }

    /// Opens a throwaway in-memory database.
    pub async fn open_in_memory() -> Result<Self, async_sqlite::Error> {
        let client = ClientBuilder::new().path(":memory:").open().await?;
        Self::init_schema(&client).await?;
        Ok(Self { client })
    }

    async fn init_schema(client: &Client) -> Result<(), async_sqlite::Error> {
        client
            .conn(|conn| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS offline_cache (
                        key TEXT PRIMARY KEY,
                        data BLOB NOT NULL,
                        created_at INTEGER NOT NULL,
                        expires_at INTEGER NOT NULL
                    )",
                    [],
                )?;
                conn.execute(
                    "CREATE INDEX IF NOT EXISTS idx_offline_cache_expires_at ON offline_cache(expires_at)",
                    [],
                )?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl CacheProvider for SqliteCache {
    async fn get(&self, key: &str) -> Option<CachedValue> {
        let key = key.to_string();
        let now = Utc::now().timestamp();

        let result = self
            .client
            .conn(move |conn| {
                conn.query_row(
                    "SELECT data, created_at, expires_at FROM offline_cache WHERE key = ? AND expires_at > ?",
                    rusqlite::params![key, now],
                    |row| {
                        let data: Vec<u8> = row.get(0)?;
                        let created_at: i64 = row.get(1)?;
                        let expires_at: i64 = row.get(2)?;
                        Ok((data, created_at, expires_at))
                    },
                )
                .optional()
            })
            .await;

        match result {
            Ok(Some((data, created_at, expires_at))) => {
                let created_at = Utc.timestamp_opt(created_at, 0).single()?;
                let expires_at = Utc.timestamp_opt(expires_at, 0).single()?;
                Some(CachedValue::new(data, created_at, expires_at))
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("offline cache read failed: {}", e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: CachedValue) {
        let key = key.to_string();
        let data = value.data;
        let created_at = value.created_at.timestamp();
        let expires_at = value.expires_at.timestamp();

        let result = self
            .client
            .conn(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO offline_cache (key, data, created_at, expires_at) VALUES (?, ?, ?, ?)",
                    rusqlite::params![key, data, created_at, expires_at],
                )
            })
            .await;
        if let Err(e) = result {
            log::warn!("offline cache write failed: {}", e);
        }
    }

    async fn remove(&self, key: &str) {
        let key = key.to_string();
        let _ = self
            .client
            .conn(move |conn| conn.execute("DELETE FROM offline_cache WHERE key = ?", [key]))
            .await;
    }

    async fn clear(&self) {
        let _ = self
            .client
            .conn(|conn| conn.execute("DELETE FROM offline_cache", []))
            .await;
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let now = Utc::now().timestamp();
        self.client
            .conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT key FROM offline_cache WHERE key LIKE ? ESCAPE '\\' AND expires_at > ? ORDER BY key",
                )?;
                let rows = stmt.query_map(rusqlite::params![pattern, now], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()
            })
            .await
            .unwrap_or_default()
    }

    async fn gc(&self) -> usize {
        let now = Utc::now().timestamp();
        self.client
            .conn(move |conn| conn.execute("DELETE FROM offline_cache WHERE expires_at <= ?", [now]))
            .await
            .unwrap_or(0)
    }
}
