//! Offline dataset cache
//!
//! A `CacheProvider` stores serialized payloads with TTL metadata under
//! string keys. [`RemoteCache`] layers the `(dataset, table)` addressing used
//! for offline reads of table-sourced data on top of any provider.

mod config;
mod memory;
mod remote;
mod sqlite;

pub use config::*;
pub use memory::*;
pub use remote::*;
pub use sqlite::*;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

/// A cached value with metadata about when it was cached and when it expires.
#[derive(Debug, Clone)]
pub struct CachedValue {
    /// The cached payload, serialized as JSON bytes.
    pub data: Vec<u8>,
    /// When this value was cached.
    pub created_at: DateTime<Utc>,
    /// When this value expires and should no longer be returned.
    pub expires_at: DateTime<Utc>,
}

impl CachedValue {
    /// Wraps a payload with explicit timestamps.
    pub fn new(data: Vec<u8>, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            data,
            created_at,
            expires_at,
        }
    }

    /// Creates a new cached value with a TTL from now.
    pub fn with_ttl(data: Vec<u8>, ttl: std::time::Duration) -> Self {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        Self {
            data,
            created_at: now,
            expires_at,
        }
    }

    /// Returns `true` if this cached value has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Storage behind the offline cache.
///
/// Implementations must never return expired values from `get()`.
///
/// # Example
///
/// ```ignore
/// use metagrid_lib::cache::{CacheProvider, InMemoryCache, CachedValue};
/// use std::time::Duration;
///
/// let cache = InMemoryCache::new();
/// cache.set("main/person", CachedValue::with_ttl(b"[]".to_vec(), Duration::from_secs(60))).await;
/// assert_eq!(cache.keys_with_prefix("main/").await, vec!["main/person".to_string()]);
/// ```
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Returns `None` if the key doesn't exist or the value has expired.
    async fn get(&self, key: &str) -> Option<CachedValue>;

    async fn set(&self, key: &str, value: CachedValue);

    async fn remove(&self, key: &str);

    async fn clear(&self);

    /// Live keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;

    /// Removes all expired entries, returning how many were removed.
    async fn gc(&self) -> usize;
}
