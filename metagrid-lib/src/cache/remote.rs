//! Offline mirror of table-sourced datasets

use std::sync::Arc;

use super::CacheConfig;
use super::CacheProvider;
use super::CachedValue;
use crate::error::Error;
use crate::model::Dataset;
use crate::response::CacheStatus;
use crate::response::Response;

/// Datasets keyed by `(dataset, table)`.
///
/// Entries are JSON-encoded [`Dataset`]s, so both compact and plain
/// payloads come back in the encoding they were written with.
#[derive(Clone)]
pub struct RemoteCache {
    provider: Arc<dyn CacheProvider>,
    config: CacheConfig,
}

impl RemoteCache {
    /// Wraps `provider` with the given settings.
    pub fn new(provider: impl CacheProvider + 'static, config: CacheConfig) -> Self {
        Self {
            provider: Arc::new(provider),
            config,
        }
    }

    /// Like [`RemoteCache::new`] for a provider that is already shared.
    pub fn from_arc(provider: Arc<dyn CacheProvider>, config: CacheConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether tables are mirrored at all.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn key(dataset: &str, table: &str) -> String {
        format!("{}/{}", dataset, table)
    }

    /// Reads a cached table, `None` when absent, expired or undecodable.
    pub async fn read(&self, dataset: &str, table: &str) -> Option<Response<Dataset>> {
        let key = Self::key(dataset, table);
        let cached = self.provider.get(&key).await?;
        match serde_json::from_slice::<Dataset>(&cached.data) {
            Ok(payload) => {
                log::debug!("offline cache hit for {}", key);
                Some(Response::cache_hit(payload, cached.created_at, cached.expires_at))
            }
            Err(e) => {
                log::warn!("dropping undecodable cache entry {}: {}", key, e);
                self.provider.remove(&key).await;
                None
            }
        }
    }

    /// Writes a table payload, replacing any previous copy.
    pub async fn write(&self, dataset: &str, table: &str, payload: &Dataset) -> Result<CacheStatus, Error> {
        let key = Self::key(dataset, table);
        let data = serde_json::to_vec(payload).map_err(|e| Error::Cache(e.to_string()))?;
        let value = CachedValue::with_ttl(data, self.config.table_ttl);
        let status = CacheStatus::Stored {
            cached_at: value.created_at,
            expires_at: value.expires_at,
        };
        self.provider.set(&key, value).await;
        log::debug!("mirrored {} rows to {}", payload.len(), key);
        Ok(status)
    }

    /// Forgets one mirrored table.
    pub async fn remove(&self, dataset: &str, table: &str) {
        self.provider.remove(&Self::key(dataset, table)).await;
    }

    /// Tables cached under `dataset`.
    pub async fn tables(&self, dataset: &str) -> Vec<String> {
        let prefix = format!("{}/", dataset);
        self.provider
            .keys_with_prefix(&prefix)
            .await
            .into_iter()
            .map(|key| key[prefix.len()..].to_string())
            .collect()
    }

    /// Forgets every mirrored table in every dataset.
    pub async fn clear(&self) {
        self.provider.clear().await;
    }

    /// Drops expired tables from the underlying storage.
    pub async fn purge_expired(&self) -> usize {
        let removed = self.provider.gc().await;
        if removed > 0 {
            log::debug!("purged {} expired offline tables", removed);
        }
        removed
    }
}
