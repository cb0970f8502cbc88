//! Read-through cache for hot stores.
//!
//! Two independent caches sit in front of the backend:
//!
//! - a per-record cache keyed by `(store, id)`, only for hot stores
//! - an aggregate cache keyed by [`AggregateKey`]
//!
//! Both are bounded LRU maps whose entries expire after a fixed TTL. Any
//! mutating call on a hot store clears both caches entirely.
//!
//! Fills are guarded by a generation counter: a caller takes the generation
//! before reading the backend and hands it back when filling. If an
//! invalidation happened in between, the fill is dropped, so a slow read can
//! never put a pre-write value back into the cache.

use crate::config::Config;
use crate::registry::{AggregateKey, StoreName};
use crate::stats::DbStats;
use localdb_storage::Record;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CachedValue<T> {
    value: T,
    stored_at: Instant,
}

impl<T> CachedValue<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() > ttl
    }
}

type RecordKey = (StoreName, String);

/// Process-wide read-through cache owned by one database instance.
pub struct DbCache {
    records: Mutex<LruCache<RecordKey, CachedValue<Record>>>,
    aggregates: Mutex<LruCache<AggregateKey, CachedValue<Vec<Record>>>>,
    record_ttl: Duration,
    aggregate_ttl: Duration,
    enabled: bool,
    generation: AtomicU64,
    stats: Arc<DbStats>,
}

impl DbCache {
    /// Creates a cache sized and timed from `config`.
    pub fn new(config: &Config, stats: Arc<DbStats>) -> Self {
        Self {
            records: Mutex::new(LruCache::new(capacity(config.record_cache_capacity))),
            aggregates: Mutex::new(LruCache::new(capacity(config.aggregate_cache_capacity))),
            record_ttl: config.record_cache_ttl,
            aggregate_ttl: config.aggregate_cache_ttl,
            enabled: config.cache_enabled,
            generation: AtomicU64::new(0),
            stats,
        }
    }

    /// Returns whether the cache is in use.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the current generation, to be passed back when filling.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Looks up a single record.
    ///
    /// Returns an owned copy; expired entries are evicted and count as a miss.
    pub fn get_record(&self, store: StoreName, id: &str) -> Option<Record> {
        if !self.enabled || !store.is_hot() {
            return None;
        }
        let key = (store, id.to_string());
        let mut records = self.records.lock();
        let lookup = records
            .get(&key)
            .map(|entry| (entry.is_expired(self.record_ttl), entry.value.clone()));
        let hit = match lookup {
            Some((false, record)) => Some(record),
            Some((true, _)) => {
                records.pop(&key);
                None
            }
            None => None,
        };
        drop(records);
        self.record_lookup(hit.is_some());
        hit
    }

    /// Stores a record read at `generation`.
    ///
    /// Dropped if the store is not hot or the cache was invalidated since.
    pub fn put_record(&self, store: StoreName, record: &Record, generation: u64) {
        if !self.enabled || !store.is_hot() {
            return;
        }
        let mut records = self.records.lock();
        if self.generation() != generation {
            return;
        }
        records.put(
            (store, record.id().to_string()),
            CachedValue::new(record.clone()),
        );
    }

    /// Looks up an aggregate read.
    ///
    /// Empty results are never served from the cache.
    pub fn get_aggregate(&self, key: AggregateKey) -> Option<Vec<Record>> {
        if !self.enabled {
            return None;
        }
        let mut aggregates = self.aggregates.lock();
        let lookup = aggregates
            .get(&key)
            .map(|entry| (entry.is_expired(self.aggregate_ttl), entry.value.clone()));
        let hit = match lookup {
            Some((false, records)) if !records.is_empty() => Some(records),
            Some((true, _)) => {
                aggregates.pop(&key);
                None
            }
            _ => None,
        };
        drop(aggregates);
        self.record_lookup(hit.is_some());
        hit
    }

    /// Stores an aggregate read at `generation`.
    pub fn put_aggregate(&self, key: AggregateKey, records: &[Record], generation: u64) {
        if !self.enabled {
            return;
        }
        let mut aggregates = self.aggregates.lock();
        if self.generation() != generation {
            return;
        }
        aggregates.put(key, CachedValue::new(records.to_vec()));
    }

    /// Invalidates everything cached for `store`.
    ///
    /// Invalidation is coarse: a write to any hot store clears both caches.
    /// Writes to other stores leave the cache untouched.
    pub fn invalidate(&self, store: StoreName) {
        if store.is_hot() {
            self.clear();
        }
    }

    /// Clears both caches and starts a new generation.
    pub fn clear(&self) {
        let mut records = self.records.lock();
        let mut aggregates = self.aggregates.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        records.clear();
        aggregates.clear();
        self.stats.record_cache_invalidation();
    }

    /// Returns the number of live single-record entries.
    #[must_use]
    pub fn record_entries(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns the number of live aggregate entries.
    #[must_use]
    pub fn aggregate_entries(&self) -> usize {
        self.aggregates.lock().len()
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            self.stats.record_cache_hit();
        } else {
            self.stats.record_cache_miss();
        }
    }
}

impl std::fmt::Debug for DbCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbCache")
            .field("enabled", &self.enabled)
            .field("generation", &self.generation())
            .field("records", &self.record_entries())
            .field("aggregates", &self.aggregate_entries())
            .finish()
    }
}

fn capacity(requested: usize) -> NonZeroUsize {
    NonZeroUsize::new(requested).unwrap_or(NonZeroUsize::MIN)
}
