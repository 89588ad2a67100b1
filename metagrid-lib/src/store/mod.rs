//! Durable key-value store for remembered values.
//!
//! Holds the last value saved per column (`default_<column>`), remembered
//! context values (`context_value_<name>`), and cached responses of
//! non-table GET requests keyed by request path.

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Raw byte storage behind a [`LocalStore`].
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Typed store over a [`KeyValueBackend`], values encoded as JSON.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl LocalStore {
    /// Creates a store over `backend`.
    pub fn new(backend: impl KeyValueBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// A store that forgets everything on exit.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Key of the remembered value for a column.
    pub fn default_key(column: &str) -> String {
        format!("default_{}", column)
    }

    /// Key of a remembered context value.
    pub fn context_key(name: &str) -> String {
        format!("context_value_{}", name)
    }

    /// Reads and decodes the value under `key`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.backend.get_bytes(key).await? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(StoreError::Deserialization)?,
            )),
            None => Ok(None),
        }
    }

    /// Like [`LocalStore::get`], returning `default` when absent.
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StoreError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Encodes and writes `value` under `key`.
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(StoreError::Serialization)?;
        self.backend.set_bytes(key, bytes).await
    }

    /// Removes `key`.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.backend.delete(key).await
    }

    /// Keys starting with `prefix`.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.backend.keys_with_prefix(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_typed_round_trip() {
        let store = LocalStore::in_memory();
        let key = LocalStore::default_key("site_id");
        assert_eq!(key, "default_site_id");

        store.set(&key, &json!(42)).await.unwrap();
        assert_eq!(store.get::<Value>(&key).await.unwrap(), Some(json!(42)));
        assert_eq!(store.get_or::<i64>("missing", 7).await.unwrap(), 7);

        store.delete(&key).await.unwrap();
        assert_eq!(store.get::<Value>(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undecodable_value_is_an_error() {
        let store = LocalStore::in_memory();
        store.set("k", &"text").await.unwrap();
        assert!(matches!(store.get::<i64>("k").await, Err(StoreError::Deserialization(_))));
    }
}
