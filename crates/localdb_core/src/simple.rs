//! Lightweight key-value store.
//!
//! Next to the record stores lives a small key-value store: each entity
//! (`appStatus`, `browserTabs`, ...) keeps one JSON document under its name.
//! All entities share a single backend store, [`SIMPLE_DB_STORE`], where an
//! entity is one record whose id is the entity name and whose `data` field
//! holds the document.
//!
//! Entities flagged with [`SimpleDb::enable_cache`] keep their last read or
//! written value in memory. Every backend access for a cached entity happens
//! under the cache lock, so a read can never observe a value older than the
//! last completed write.

use crate::error::{CoreError, CoreResult};
use crate::stats::{DbStats, StatsSnapshot};
use localdb_storage::{InMemoryBackend, Record, StorageBackend, StoreSchema, TxMode};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Backend store holding every key-value entity.
pub const SIMPLE_DB_STORE: &str = "SimpleDb";

const DATA_FIELD: &str = "data";

/// The key-value agent contract.
///
/// Implemented by [`SimpleDb`] and by proxies that forward to one.
pub trait SimpleDbApi: Send + Sync {
    /// Reads an entity's document; `None` if it was never set or was cleared.
    fn get_raw_data(&self, entity: &str) -> CoreResult<Option<Value>>;

    /// Replaces an entity's document. Setting `null` clears the entity.
    fn set_raw_data(&self, entity: &str, data: Value) -> CoreResult<()>;

    /// Removes an entity's document. Clearing an unset entity is a no-op.
    fn clear_raw_data(&self, entity: &str) -> CoreResult<()>;
}

/// A key-value store of JSON documents, one per entity.
///
/// # Example
///
/// ```rust
/// use localdb_core::{SimpleDb, SimpleDbApi};
/// use serde_json::json;
///
/// let db = SimpleDb::open_in_memory().unwrap().enable_cache("appStatus");
/// db.set_raw_data("appStatus", json!({"launchTimes": 3})).unwrap();
/// assert_eq!(
///     db.get_raw_data("appStatus").unwrap(),
///     Some(json!({"launchTimes": 3}))
/// );
/// ```
pub struct SimpleDb {
    backend: Arc<dyn StorageBackend>,
    cached_entities: HashSet<String>,
    cache: Mutex<HashMap<String, Option<Value>>>,
    stats: Arc<DbStats>,
}

impl SimpleDb {
    /// Opens the key-value store over a backend, creating its store if needed.
    ///
    /// The backend may be shared with a [`crate::LocalDb`].
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be created.
    pub fn open(backend: Arc<dyn StorageBackend>) -> CoreResult<Self> {
        backend
            .open_or_create(&[StoreSchema::new(SIMPLE_DB_STORE)])
            .map_err(|err| CoreError::store_unavailable(SIMPLE_DB_STORE, err.to_string()))?;
        tracing::info!(store = SIMPLE_DB_STORE, "opened key-value store");
        Ok(Self {
            backend,
            cached_entities: HashSet::new(),
            cache: Mutex::new(HashMap::new()),
            stats: Arc::new(DbStats::new()),
        })
    }

    /// Opens the key-value store over a fresh in-memory backend.
    ///
    /// # Errors
    ///
    /// As [`SimpleDb::open`].
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(Arc::new(InMemoryBackend::new()))
    }

    /// Keeps `entity`'s document in memory after the first read or write.
    #[must_use]
    pub fn enable_cache(mut self, entity: impl Into<String>) -> Self {
        self.cached_entities.insert(entity.into());
        self
    }

    /// Returns whether `entity` is served from memory.
    #[must_use]
    pub fn is_cached(&self, entity: &str) -> bool {
        self.cached_entities.contains(entity)
    }

    /// Returns a snapshot of the store's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Reads an entity and decodes it into `T`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the stored document does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, entity: &str) -> CoreResult<Option<T>> {
        match self.get_raw_data(entity)? {
            Some(data) => serde_json::from_value(data)
                .map(Some)
                .map_err(|err| CoreError::invalid_record(format!("entity {entity}: {err}"))),
            None => Ok(None),
        }
    }

    /// Encodes `value` and stores it as the entity's document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if `value` cannot be represented as JSON.
    pub fn set<T: Serialize>(&self, entity: &str, value: &T) -> CoreResult<()> {
        let data = serde_json::to_value(value)
            .map_err(|err| CoreError::invalid_record(format!("entity {entity}: {err}")))?;
        self.set_raw_data(entity, data)
    }

    /// Returns the names of every entity with a stored document, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn entity_names(&self) -> CoreResult<Vec<String>> {
        let tx = self.backend.begin(&[SIMPLE_DB_STORE], TxMode::ReadOnly)?;
        let mut names: Vec<String> = tx
            .get_all(SIMPLE_DB_STORE)?
            .iter()
            .map(|record| record.id().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn read(&self, entity: &str) -> CoreResult<Option<Value>> {
        let tx = self.backend.begin(&[SIMPLE_DB_STORE], TxMode::ReadOnly)?;
        let record = tx.get(SIMPLE_DB_STORE, entity)?;
        self.stats.record_reads(1);
        Ok(record.and_then(|record| record.get(DATA_FIELD).cloned()))
    }

    fn write(&self, entity: &str, data: Option<Value>) -> CoreResult<()> {
        let mut tx = self.backend.begin(&[SIMPLE_DB_STORE], TxMode::ReadWrite)?;
        self.stats.record_transaction_start();
        match data {
            Some(data) => {
                tx.put(SIMPLE_DB_STORE, Record::new(entity).with(DATA_FIELD, data))?;
                self.stats.record_writes(1);
            }
            None => {
                tx.delete(SIMPLE_DB_STORE, entity)?;
                self.stats.record_deletes(1);
            }
        }
        if let Err(err) = tx.commit() {
            self.stats.record_transaction_abort();
            tracing::warn!(entity, error = %err, "key-value commit failed");
            return Err(CoreError::transaction_aborted(err.to_string()));
        }
        self.stats.record_transaction_commit();
        Ok(())
    }

    fn store_cached(&self, entity: &str, data: Option<Value>) -> CoreResult<()> {
        let mut cache = self.cache.lock();
        cache.remove(entity);
        self.write(entity, data.clone())?;
        cache.insert(entity.to_string(), data);
        Ok(())
    }
}

fn check_entity(entity: &str) -> CoreResult<()> {
    if entity.is_empty() {
        return Err(CoreError::invalid_operation("entity name is empty"));
    }
    Ok(())
}

impl SimpleDbApi for SimpleDb {
    fn get_raw_data(&self, entity: &str) -> CoreResult<Option<Value>> {
        check_entity(entity)?;
        if !self.is_cached(entity) {
            return self.read(entity);
        }
        let mut cache = self.cache.lock();
        if let Some(data) = cache.get(entity) {
            self.stats.record_cache_hit();
            return Ok(data.clone());
        }
        self.stats.record_cache_miss();
        let data = self.read(entity)?;
        cache.insert(entity.to_string(), data.clone());
        Ok(data)
    }

    fn set_raw_data(&self, entity: &str, data: Value) -> CoreResult<()> {
        check_entity(entity)?;
        tracing::debug!(entity, "set key-value entity");
        let data = (!data.is_null()).then_some(data);
        if self.is_cached(entity) {
            self.store_cached(entity, data)
        } else {
            self.write(entity, data)
        }
    }

    fn clear_raw_data(&self, entity: &str) -> CoreResult<()> {
        check_entity(entity)?;
        tracing::debug!(entity, "clear key-value entity");
        if self.is_cached(entity) {
            self.store_cached(entity, None)
        } else {
            self.write(entity, None)
        }
    }
}

impl std::fmt::Debug for SimpleDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleDb")
            .field("cached_entities", &self.cached_entities)
            .field("cached", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AddOptions, Config, LocalDb, StoreName};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AppStatus {
        launch_times: Option<u32>,
        hd_wallet_hash_generated: Option<bool>,
    }

    #[test]
    fn unset_entity_reads_none() {
        let db = SimpleDb::open_in_memory().unwrap();
        assert_eq!(db.get_raw_data("appStatus").unwrap(), None);
        assert!(db.entity_names().unwrap().is_empty());
    }

    #[test]
    fn set_replaces_and_clear_removes() {
        let db = SimpleDb::open_in_memory().unwrap();
        db.set_raw_data("browserTabs", json!({"tabs": [1]})).unwrap();
        db.set_raw_data("browserTabs", json!({"tabs": [1, 2]})).unwrap();
        assert_eq!(
            db.get_raw_data("browserTabs").unwrap(),
            Some(json!({"tabs": [1, 2]}))
        );

        db.clear_raw_data("browserTabs").unwrap();
        assert_eq!(db.get_raw_data("browserTabs").unwrap(), None);
        db.clear_raw_data("browserTabs").unwrap();

        db.set_raw_data("browserTabs", json!([])).unwrap();
        db.set_raw_data("browserTabs", Value::Null).unwrap();
        assert_eq!(db.get_raw_data("browserTabs").unwrap(), None);
        assert!(db.entity_names().unwrap().is_empty());
    }

    #[test]
    fn typed_entities_round_trip() {
        let db = SimpleDb::open_in_memory().unwrap();
        assert_eq!(db.get::<AppStatus>("appStatus").unwrap(), None);

        let status = AppStatus {
            launch_times: Some(4),
            hd_wallet_hash_generated: Some(true),
        };
        db.set("appStatus", &status).unwrap();
        assert_eq!(db.get::<AppStatus>("appStatus").unwrap(), Some(status));
        assert_eq!(
            db.get_raw_data("appStatus").unwrap().unwrap()["launchTimes"],
            json!(4)
        );
    }

    #[test]
    fn mismatched_document_is_invalid_record() {
        let db = SimpleDb::open_in_memory().unwrap();
        db.set_raw_data("appStatus", json!("not an object")).unwrap();
        let err = db.get::<AppStatus>("appStatus").unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord { .. }));
    }

    #[test]
    fn empty_entity_name_is_rejected() {
        let db = SimpleDb::open_in_memory().unwrap();
        assert!(matches!(
            db.set_raw_data("", json!(1)),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn cached_entity_is_read_once() {
        let db = SimpleDb::open_in_memory().unwrap().enable_cache("appStatus");
        db.set_raw_data("appStatus", json!({"launchTimes": 1})).unwrap();
        for _ in 0..3 {
            assert_eq!(
                db.get_raw_data("appStatus").unwrap(),
                Some(json!({"launchTimes": 1}))
            );
        }
        let stats = db.stats();
        assert_eq!(stats.reads, 0);
        assert_eq!(stats.cache_hits, 3);

        db.clear_raw_data("appStatus").unwrap();
        assert_eq!(db.get_raw_data("appStatus").unwrap(), None);
        assert_eq!(db.stats().reads, 0);
    }

    #[test]
    fn uncached_entity_always_reads_backend() {
        let db = SimpleDb::open_in_memory().unwrap().enable_cache("appStatus");
        db.set_raw_data("feeInfo", json!(1)).unwrap();
        db.get_raw_data("feeInfo").unwrap();
        db.get_raw_data("feeInfo").unwrap();
        assert_eq!(db.stats().reads, 2);
        assert_eq!(db.stats().cache_hits, 0);
    }

    #[test]
    fn shares_a_backend_with_the_record_stores() {
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        let records = LocalDb::open(Arc::clone(&backend), Config::default()).unwrap();
        let simple = SimpleDb::open(Arc::clone(&backend)).unwrap();

        records
            .add(StoreName::Wallet, vec![Record::new("w1")], AddOptions::default())
            .unwrap();
        simple.set_raw_data("appStatus", json!({})).unwrap();

        assert_eq!(records.count(StoreName::Wallet).unwrap(), 1);
        assert_eq!(simple.entity_names().unwrap(), vec!["appStatus".to_string()]);
        assert!(backend
            .store_names()
            .unwrap()
            .contains(&SIMPLE_DB_STORE.to_string()));
    }

    #[test]
    fn documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = Arc::new(localdb_storage::FileBackend::open(dir.path()).unwrap());
            let db = SimpleDb::open(backend).unwrap();
            db.set_raw_data("referralCode", json!("ABC")).unwrap();
        }
        let backend = Arc::new(localdb_storage::FileBackend::open(dir.path()).unwrap());
        let db = SimpleDb::open(backend).unwrap().enable_cache("referralCode");
        assert_eq!(db.get_raw_data("referralCode").unwrap(), Some(json!("ABC")));
    }
}
