//! Cache configuration

use std::time::Duration;

/// Offline cache settings.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use metagrid_lib::cache::CacheConfig;
///
/// let config = CacheConfig::default()
///     .with_dataset("field-app")
///     .with_table_ttl(Duration::from_secs(7 * 24 * 3600));
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Master switch for offline caching.
    ///
    /// Default: enabled
    pub enabled: bool,

    /// Dataset name that groups cached tables.
    ///
    /// Default: `metagrid`
    pub dataset: String,

    /// How long a mirrored table stays readable offline.
    ///
    /// Default: 30 days
    pub table_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dataset: "metagrid".to_string(),
            table_ttl: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

impl CacheConfig {
    /// Same as `CacheConfig::default()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns the offline mirror on or off.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the dataset name tables are filed under.
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = dataset.into();
        self
    }

    /// Sets how long a mirrored table stays readable.
    pub fn with_table_ttl(mut self, ttl: Duration) -> Self {
        self.table_ttl = ttl;
        self
    }

    /// A config with caching switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
