//! Fetch results tagged with where the data came from

use chrono::DateTime;
use chrono::Utc;

/// A fetched value plus its cache status.
///
/// Table fetches return this so callers can tell an offline copy from
/// fresh data, e.g. to show a "showing data from <date>" banner.
///
/// # Example
///
/// ```ignore
/// let response = api.fetch_table(&source, &params, true).await?;
///
/// if response.is_cached() {
///     println!("offline copy from {:?}", response.cached_at());
/// }
/// let dataset = response.into_inner();
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    data: T,
    pub cache: CacheStatus,
}

impl<T> Response<T> {
    /// Fresh data that was not mirrored to the cache.
    pub fn new(data: T) -> Self {
        Self {
            data,
            cache: CacheStatus::None,
        }
    }

    /// Fresh data that was also written to the cache.
    pub fn stored(data: T, cached_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            data,
            cache: CacheStatus::Stored {
                cached_at,
                expires_at,
            },
        }
    }

    /// Data read from the cache instead of the network.
    pub fn cache_hit(data: T, cached_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            data,
            cache: CacheStatus::Hit {
                cached_at,
                expires_at,
            },
        }
    }

    /// Wraps data with an explicit cache status.
    pub fn with_status(data: T, cache: CacheStatus) -> Self {
        Self { data, cache }
    }

    /// Returns `true` if this response came from the cache.
    pub fn is_cached(&self) -> bool {
        self.cache.is_hit()
    }

    /// When the data was cached, if applicable.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        match &self.cache {
            CacheStatus::None => None,
            CacheStatus::Stored { cached_at, .. } | CacheStatus::Hit { cached_at, .. } => Some(*cached_at),
        }
    }

    /// The wrapped data.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Unwraps the data, discarding the cache status.
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Transforms the data, keeping the cache status.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Response<U> {
        Response {
            data: f(self.data),
            cache: self.cache,
        }
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Network data, cache not involved.
    None,
    /// Network data, mirrored to the cache.
    Stored {
        cached_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    /// Served from the cache while offline.
    Hit {
        cached_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

impl CacheStatus {
    /// Served from the offline mirror.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    /// Fetched from the network and mirrored.
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }

    /// Never touched the offline mirror.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}
