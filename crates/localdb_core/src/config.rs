//! Database configuration.

use std::time::Duration;

/// Configuration for opening a [`crate::LocalDb`].
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a cached single record stays valid.
    pub record_cache_ttl: Duration,

    /// Maximum number of cached single records.
    pub record_cache_capacity: usize,

    /// How long a cached aggregate read stays valid.
    pub aggregate_cache_ttl: Duration,

    /// Maximum number of cached aggregate reads.
    pub aggregate_cache_capacity: usize,

    /// Whether the read-through cache is used at all.
    pub cache_enabled: bool,

    /// Whether a store missing from the backend is created on first use.
    ///
    /// When false, referencing such a store fails with `StoreUnavailable`.
    pub create_missing_stores: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            record_cache_ttl: Duration::from_secs(10),
            record_cache_capacity: 1024,
            aggregate_cache_ttl: Duration::from_secs(5),
            aggregate_cache_capacity: 10,
            cache_enabled: true,
            create_missing_stores: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the single-record cache TTL.
    #[must_use]
    pub const fn record_cache_ttl(mut self, ttl: Duration) -> Self {
        self.record_cache_ttl = ttl;
        self
    }

    /// Sets the single-record cache capacity.
    #[must_use]
    pub const fn record_cache_capacity(mut self, capacity: usize) -> Self {
        self.record_cache_capacity = capacity;
        self
    }

    /// Sets the aggregate cache TTL.
    #[must_use]
    pub const fn aggregate_cache_ttl(mut self, ttl: Duration) -> Self {
        self.aggregate_cache_ttl = ttl;
        self
    }

    /// Sets the aggregate cache capacity.
    #[must_use]
    pub const fn aggregate_cache_capacity(mut self, capacity: usize) -> Self {
        self.aggregate_cache_capacity = capacity;
        self
    }

    /// Enables or disables the read-through cache.
    #[must_use]
    pub const fn cache_enabled(mut self, value: bool) -> Self {
        self.cache_enabled = value;
        self
    }

    /// Sets whether missing stores are created on first use.
    #[must_use]
    pub const fn create_missing_stores(mut self, value: bool) -> Self {
        self.create_missing_stores = value;
        self
    }
}
