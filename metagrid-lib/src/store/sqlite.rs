//! SQLite store backend with in-memory read cache.

use std::path::Path;

use async_sqlite::Client;
use async_sqlite::rusqlite;
use async_trait::async_trait;
use dashmap::DashMap;

use super::KeyValueBackend;
use crate::error::StoreError;

/// SQLite-backed store; reads are served from a DashMap once seen.
pub struct SqliteBackend {
    client: Client,
    cache: DashMap<String, Vec<u8>>,
}

impl SqliteBackend {
    /// Opens (or creates) the store database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let client = async_sqlite::ClientBuilder::new().path(path).open().await?;
        Self::with_client(client).await
    }

    /// Opens a throwaway in-memory database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let client = async_sqlite::ClientBuilder::new().path(":memory:").open().await?;
        Self::with_client(client).await
    }

    async fn with_client(client: Client) -> Result<Self, StoreError> {
        client
            .conn(|conn| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS local_store (
                        key TEXT PRIMARY KEY,
                        value BLOB NOT NULL
                    )",
                    [],
                )
            })
            .await?;

        Ok(Self {
            client,
            cache: DashMap::new(),
        })
    }
}

#[async_trait]
impl KeyValueBackend for SqliteBackend {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.cache.get(key) {
            return Ok(Some(value.clone()));
        }

        let key_owned = key.to_string();
        let result = self
            .client
            .conn(move |conn| {
                let mut stmt = conn.prepare("SELECT value FROM local_store WHERE key = ?")?;
                let mut rows = stmt.query([&key_owned])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row.get::<_, Vec<u8>>(0)?)),
                    None => Ok(None),
                }
            })
            .await?;

        if let Some(ref value) = result {
            self.cache.insert(key.to_string(), value.clone());
        }
        Ok(result)
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let key_owned = key.to_string();
        let value_clone = value.clone();

        self.client
            .conn(move |conn| {
                conn.execute(
                    "INSERT INTO local_store (key, value) VALUES (?, ?)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    rusqlite::params![&key_owned, &value_clone],
                )
            })
            .await?;

        self.cache.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let key_owned = key.to_string();
        self.client
            .conn(move |conn| conn.execute("DELETE FROM local_store WHERE key = ?", [&key_owned]))
            .await?;
        self.cache.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        self.client
            .conn(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT key FROM local_store WHERE key LIKE ? ESCAPE '\\' ORDER BY key")?;
                let rows = stmt.query_map([&pattern], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()
            })
            .await
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_escapes_underscore() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        backend.set_bytes("default_site", b"1".to_vec()).await.unwrap();
        backend.set_bytes("defaultXsite", b"2".to_vec()).await.unwrap();
        backend.set_bytes("context_value_year", b"3".to_vec()).await.unwrap();

        assert_eq!(
            backend.keys_with_prefix("default_").await.unwrap(),
            vec!["default_site".to_string()]
        );
        assert_eq!(backend.get_bytes("context_value_year").await.unwrap(), Some(b"3".to_vec()));
        backend.delete("context_value_year").await.unwrap();
        assert_eq!(backend.get_bytes("context_value_year").await.unwrap(), None);
    }
}
