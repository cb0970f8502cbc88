//! The collection agent.
//!
//! [`LocalDb`] is the owning-process implementation of the CRUD contract.
//! Every operation comes in two flavors:
//!
//! - a top-level method that opens, and commits or aborts, its own
//!   transaction
//! - a `tx_` method that runs inside a transaction supplied by the caller
//!
//! Mutating operations invalidate the cache for their store before writing,
//! and the commit hook invalidates it once more after the transaction
//! commits.

use crate::api::{AddOptions, AddResult, GetAllOptions, LocalDbApi, RecordPair, RecordPatch};
use crate::cache::DbCache;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::registry::{AggregateKey, StoreName};
use crate::stats::{DbStats, StatsSnapshot};
use crate::transaction::{Transaction, TransactionManager, TransactionOptions};
use localdb_storage::{CursorDirection, FileBackend, InMemoryBackend, Record, StorageBackend};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A transactional multi-store database with a read-through cache.
///
/// # Example
///
/// ```rust
/// use localdb_core::{AddOptions, LocalDb, Record, StoreName};
/// use serde_json::json;
///
/// let db = LocalDb::open_in_memory().unwrap();
/// db.add(
///     StoreName::Wallet,
///     vec![Record::new("w1").with("name", json!("A"))],
///     AddOptions::default(),
/// )
/// .unwrap();
///
/// let wallet = db.get(StoreName::Wallet, "w1").unwrap();
/// assert_eq!(wallet.get("name"), Some(&json!("A")));
/// ```
pub struct LocalDb {
    manager: TransactionManager,
    cache: Arc<DbCache>,
    stats: Arc<DbStats>,
    resetting: AtomicBool,
}

impl LocalDb {
    /// Opens a database over a backend.
    ///
    /// Declared stores the backend lacks are created up front when
    /// `config.create_missing_stores` is set.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if a store cannot be created.
    pub fn open(backend: Arc<dyn StorageBackend>, config: Config) -> CoreResult<Self> {
        let stats = Arc::new(DbStats::new());
        let cache = Arc::new(DbCache::new(&config, Arc::clone(&stats)));
        let manager = TransactionManager::new(backend, config.create_missing_stores, Arc::clone(&stats));
        if config.create_missing_stores {
            manager.create_missing(&StoreName::ALL)?;
        }

        let hook_cache = Arc::clone(&cache);
        manager.on_commit(move |stores| {
            for store in stores {
                hook_cache.invalidate(*store);
            }
        });

        tracing::info!(cache = config.cache_enabled, "opened local database");
        Ok(Self {
            manager,
            cache,
            stats,
            resetting: AtomicBool::new(false),
        })
    }

    /// Opens a database over a fresh in-memory backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the stores cannot be created.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(Arc::new(InMemoryBackend::new()), Config::default())
    }

    /// Opens a database stored in a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is locked by another process or
    /// holds a corrupted snapshot.
    pub fn open_path(path: &Path, config: Config) -> CoreResult<Self> {
        let backend = FileBackend::open(path)?;
        Self::open(Arc::new(backend), config)
    }

    /// Runs `task` inside one transaction.
    ///
    /// See [`TransactionManager::with_transaction`].
    ///
    /// # Errors
    ///
    /// Returns the task's error unchanged, or an error opening or
    /// committing the transaction.
    pub fn with_transaction<T, E, F>(&self, options: &TransactionOptions, task: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<CoreError>,
    {
        self.manager.with_transaction(options, task)
    }

    /// Returns the cache shared by every operation of this database.
    #[must_use]
    pub fn cache(&self) -> &DbCache {
        &self.cache
    }

    /// Returns a snapshot of the database counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the names of the stores present in the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn store_names(&self) -> CoreResult<Vec<String>> {
        Ok(self.manager.backend().store_names()?)
    }

    fn read<T>(
        &self,
        store: StoreName,
        task: impl FnOnce(&mut Transaction<'_>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        self.with_transaction(&TransactionOptions::read_only().stores([store]), task)
    }

    fn write<T>(
        &self,
        store: StoreName,
        task: impl FnOnce(&mut Transaction<'_>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        self.with_transaction(&TransactionOptions::new().stores([store]), task)
    }

    fn ensure_not_resetting(&self) -> CoreResult<()> {
        if self.resetting.load(Ordering::Acquire) {
            return Err(CoreError::invalid_operation("database is being reset"));
        }
        Ok(())
    }

    // === Reads ===

    /// Reads one record, consulting the cache for hot stores.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has this id.
    pub fn get(&self, store: StoreName, id: &str) -> CoreResult<Record> {
        if let Some(record) = self.cache.get_record(store, id) {
            return Ok(record);
        }
        let generation = self.cache.generation();
        let record = self.read(store, |tx| self.tx_get(tx, store, id))?;
        self.cache.put_record(store, &record, generation);
        Ok(record)
    }

    /// Reads one record inside a transaction. Never served from the cache.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has this id.
    pub fn tx_get(&self, tx: &mut Transaction<'_>, store: StoreName, id: &str) -> CoreResult<Record> {
        tracing::debug!(store = %store, id, "get record");
        let record = tx.store(store)?.get(id)?;
        self.stats.record_reads(1);
        record.ok_or_else(|| CoreError::not_found(store.as_str(), id))
    }

    /// Reads every record of a store, or one page of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get_all(&self, store: StoreName, options: GetAllOptions) -> CoreResult<Vec<Record>> {
        self.read(store, |tx| self.tx_get_all(tx, store, options))
    }

    /// Reads every record of a store, or one page of them, inside a
    /// transaction.
    ///
    /// A page is taken from a descending scan of the store's ordering index.
    /// Records lacking a valid ordering key are not part of any page. Stores
    /// without an ordering index ignore the pagination and return everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn tx_get_all(
        &self,
        tx: &mut Transaction<'_>,
        store: StoreName,
        options: GetAllOptions,
    ) -> CoreResult<Vec<Record>> {
        let handle = tx.store(store)?;
        let ordering = match (options.limit, store.ordering_index()) {
            (Some(limit), Some(index)) => handle.has_index(index)?.then_some((limit, index)),
            _ => None,
        };
        let records: Vec<Record> = match ordering {
            Some((limit, index)) => {
                self.stats.record_index_scan();
                handle
                    .cursor(index, CursorDirection::Prev)?
                    .skip(options.offset.unwrap_or(0))
                    .take(limit)
                    .collect()
            }
            None => handle.get_all()?,
        };
        tracing::debug!(store = %store, count = records.len(), paged = ordering.is_some(), "get all records");
        self.stats.record_reads(records.len() as u64);
        Ok(records)
    }

    /// Reads records by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get_by_ids<S: AsRef<str>>(&self, store: StoreName, ids: &[S]) -> CoreResult<Vec<RecordPair>> {
        self.read(store, |tx| self.tx_get_by_ids(tx, store, ids))
    }

    /// Reads records by id inside a transaction.
    ///
    /// The result has one pair per id, in the same order; a missing id
    /// yields an empty pair rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn tx_get_by_ids<S: AsRef<str>>(
        &self,
        tx: &mut Transaction<'_>,
        store: StoreName,
        ids: &[S],
    ) -> CoreResult<Vec<RecordPair>> {
        tracing::debug!(store = %store, ids = ids.len(), "get records by ids");
        let handle = tx.store(store)?;
        let pairs = ids
            .iter()
            .map(|id| handle.get(id.as_ref()).map(RecordPair::fresh))
            .collect::<CoreResult<Vec<_>>>()?;
        self.stats.record_reads(ids.len() as u64);
        Ok(pairs)
    }

    /// Counts the records of a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn count(&self, store: StoreName) -> CoreResult<usize> {
        self.read(store, |tx| self.tx_count(tx, store))
    }

    /// Counts the records of a store inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn tx_count(&self, tx: &mut Transaction<'_>, store: StoreName) -> CoreResult<usize> {
        tracing::debug!(store = %store, "count records");
        tx.store(store)?.count()
    }

    /// Reads a whole hot store through the aggregate cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get_all_cached(&self, key: AggregateKey) -> CoreResult<Vec<Record>> {
        if let Some(records) = self.cache.get_aggregate(key) {
            return Ok(records);
        }
        let generation = self.cache.generation();
        let records = self.get_all(key.store(), GetAllOptions::default())?;
        self.cache.put_aggregate(key, &records, generation);
        Ok(records)
    }

    // === Writes ===

    /// Inserts records.
    ///
    /// # Errors
    ///
    /// Returns `RecordExists` if an id is already present and
    /// `skip_if_exists` is not set. Nothing is written in that case.
    pub fn add(&self, store: StoreName, records: Vec<Record>, options: AddOptions) -> CoreResult<AddResult> {
        self.write(store, |tx| self.tx_add(tx, store, records, options))
    }

    /// Inserts records inside a transaction.
    ///
    /// With `skip_if_exists`, each id is checked inside the same transaction
    /// right before its insert, so duplicates within one batch are skipped
    /// too.
    ///
    /// # Errors
    ///
    /// Returns `RecordExists` if an id is already present and
    /// `skip_if_exists` is not set.
    pub fn tx_add(
        &self,
        tx: &mut Transaction<'_>,
        store: StoreName,
        records: Vec<Record>,
        options: AddOptions,
    ) -> CoreResult<AddResult> {
        self.ensure_not_resetting()?;
        self.cache.invalidate(store);
        tracing::debug!(store = %store, records = records.len(), "add records");

        let mut handle = tx.store(store)?;
        let mut result = AddResult::default();
        for record in records {
            if options.skip_if_exists && handle.get(record.id())?.is_some() {
                result.skipped += 1;
                continue;
            }
            let id = record.id().to_string();
            handle.add(record)?;
            result.added += 1;
            result.added_ids.push(id);
        }
        self.stats.record_writes(result.added as u64);
        Ok(result)
    }

    /// Rewrites existing records through `updater`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if an id does not exist, `InvalidRecord` if the
    /// updater changes a record's id, or the updater's own error.
    pub fn update<S, F>(&self, store: StoreName, ids: &[S], updater: F) -> CoreResult<()>
    where
        S: AsRef<str>,
        F: FnMut(Record) -> CoreResult<Record>,
    {
        self.write(store, |tx| self.tx_update(tx, store, ids, updater))
    }

    /// Rewrites existing records through `updater` inside a transaction.
    ///
    /// Every id is loaded before the updater runs, so a missing id fails the
    /// call before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if an id does not exist, `InvalidRecord` if the
    /// updater changes a record's id, or the updater's own error.
    pub fn tx_update<S, F>(
        &self,
        tx: &mut Transaction<'_>,
        store: StoreName,
        ids: &[S],
        mut updater: F,
    ) -> CoreResult<()>
    where
        S: AsRef<str>,
        F: FnMut(Record) -> CoreResult<Record>,
    {
        self.ensure_not_resetting()?;
        self.cache.invalidate(store);
        let previous = self.existing_records(tx, store, ids)?;
        tracing::debug!(store = %store, records = previous.len(), "update records");

        let mut handle = tx.store(store)?;
        for record in previous {
            let id = record.id().to_string();
            let next = updater(record)?;
            if next.id() != id {
                return Err(CoreError::invalid_record(format!(
                    "updater changed record id {id} to {}",
                    next.id()
                )));
            }
            handle.put(next)?;
        }
        self.stats.record_writes(ids.len() as u64);
        Ok(())
    }

    /// Applies a patch to existing records.
    ///
    /// # Errors
    ///
    /// As [`LocalDb::update`].
    pub fn patch<S: AsRef<str>>(&self, store: StoreName, ids: &[S], patch: &RecordPatch) -> CoreResult<()> {
        self.update(store, ids, |record| patch.apply(record))
    }

    /// Applies a patch to existing records inside a transaction.
    ///
    /// # Errors
    ///
    /// As [`LocalDb::tx_update`].
    pub fn tx_patch<S: AsRef<str>>(
        &self,
        tx: &mut Transaction<'_>,
        store: StoreName,
        ids: &[S],
        patch: &RecordPatch,
    ) -> CoreResult<()> {
        self.tx_update(tx, store, ids, |record| patch.apply(record))
    }

    /// Deletes records.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if an id does not exist; nothing is deleted then.
    pub fn remove<S: AsRef<str>>(&self, store: StoreName, ids: &[S]) -> CoreResult<()> {
        self.write(store, |tx| self.tx_remove(tx, store, ids))
    }

    /// Deletes records inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if an id does not exist.
    pub fn tx_remove<S: AsRef<str>>(&self, tx: &mut Transaction<'_>, store: StoreName, ids: &[S]) -> CoreResult<()> {
        self.ensure_not_resetting()?;
        self.cache.invalidate(store);
        let existing = self.existing_records(tx, store, ids)?;
        tracing::debug!(store = %store, records = existing.len(), "remove records");

        let mut handle = tx.store(store)?;
        for record in &existing {
            handle.delete(record.id())?;
        }
        self.stats.record_deletes(existing.len() as u64);
        Ok(())
    }

    /// Deletes every record of a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn clear(&self, store: StoreName) -> CoreResult<()> {
        self.write(store, |tx| self.tx_clear(tx, store))
    }

    /// Deletes every record of a store inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn tx_clear(&self, tx: &mut Transaction<'_>, store: StoreName) -> CoreResult<()> {
        self.ensure_not_resetting()?;
        self.clear_store(tx, store)
    }

    /// Deletes every record of every store and empties the cache.
    ///
    /// Writes issued while a reset is running fail with `InvalidOperation`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if a reset is already running, or an error
    /// if the stores cannot be cleared; in that case nothing is cleared.
    pub fn reset(&self) -> CoreResult<()> {
        if self
            .resetting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::invalid_operation("a reset is already running"));
        }
        let result = self.with_transaction(&TransactionOptions::new(), |tx| {
            for store in StoreName::ALL {
                self.clear_store(tx, store)?;
            }
            Ok::<_, CoreError>(())
        });
        self.cache.clear();
        self.resetting.store(false, Ordering::Release);
        tracing::info!(ok = result.is_ok(), "reset local database");
        result
    }

    fn clear_store(&self, tx: &mut Transaction<'_>, store: StoreName) -> CoreResult<()> {
        self.cache.invalidate(store);
        tracing::debug!(store = %store, "clear records");
        tx.store(store)?.clear()
    }

    /// Loads every id, failing with `NotFound` on the first missing one.
    fn existing_records<S: AsRef<str>>(
        &self,
        tx: &mut Transaction<'_>,
        store: StoreName,
        ids: &[S],
    ) -> CoreResult<Vec<Record>> {
        let handle = tx.store(store)?;
        ids.iter()
            .map(|id| {
                let id = id.as_ref();
                handle
                    .get(id)?
                    .ok_or_else(|| CoreError::not_found(store.as_str(), id))
            })
            .collect()
    }
}

impl LocalDbApi for LocalDb {
    fn get(&self, store: StoreName, id: &str) -> CoreResult<Record> {
        LocalDb::get(self, store, id)
    }

    fn get_all(&self, store: StoreName, options: GetAllOptions) -> CoreResult<Vec<Record>> {
        LocalDb::get_all(self, store, options)
    }

    fn get_by_ids(&self, store: StoreName, ids: &[String]) -> CoreResult<Vec<RecordPair>> {
        LocalDb::get_by_ids(self, store, ids)
    }

    fn count(&self, store: StoreName) -> CoreResult<usize> {
        LocalDb::count(self, store)
    }

    fn add(&self, store: StoreName, records: Vec<Record>, options: AddOptions) -> CoreResult<AddResult> {
        LocalDb::add(self, store, records, options)
    }

    fn patch(&self, store: StoreName, ids: &[String], patch: &RecordPatch) -> CoreResult<()> {
        LocalDb::patch(self, store, ids, patch)
    }

    fn remove(&self, store: StoreName, ids: &[String]) -> CoreResult<()> {
        LocalDb::remove(self, store, ids)
    }

    fn clear(&self, store: StoreName) -> CoreResult<()> {
        LocalDb::clear(self, store)
    }

    fn get_all_cached(&self, key: AggregateKey) -> CoreResult<Vec<Record>> {
        LocalDb::get_all_cached(self, key)
    }
}

impl std::fmt::Debug for LocalDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDb")
            .field("manager", &self.manager)
            .field("cache", &self.cache)
            .field("resetting", &self.resetting.load(Ordering::Relaxed))
            .finish()
    }
}
