//! Table engine shared by the in-memory and on-disk backends.
//!
//! Committed state lives in a [`TableSet`] behind a read-write lock. A
//! [`TableTransaction`] copies the stores in its scope when it begins and
//! reads from that copy, buffers its writes per store and applies them in
//! one step under the write lock. Readers never see half of a transaction,
//! and every store of one transaction is read at the same point in time.

use crate::backend::{Cursor, NativeTransaction};
use crate::error::{StorageError, StorageResult};
use crate::record::{compare_index_keys, is_valid_index_key, Record};
use crate::schema::{CursorDirection, StoreSchema, TxMode};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One store's schema and committed records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoreData {
    pub schema: StoreSchema,
    pub records: BTreeMap<String, Record>,
}

impl StoreData {
    pub fn new(schema: StoreSchema) -> Self {
        Self {
            schema,
            records: BTreeMap::new(),
        }
    }
}

/// Every store of one backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct TableSet {
    pub stores: BTreeMap<String, StoreData>,
}

impl TableSet {
    /// Creates a store or merges new indexes into the existing schema.
    ///
    /// Returns true if anything changed.
    pub fn create_store(&mut self, schema: &StoreSchema) -> bool {
        match self.stores.get_mut(&schema.name) {
            Some(existing) => {
                let mut changed = false;
                for index in &schema.indexes {
                    if !existing.schema.has_index(index) {
                        existing.schema.indexes.push(index.clone());
                        changed = true;
                    }
                }
                changed
            }
            None => {
                self.stores
                    .insert(schema.name.clone(), StoreData::new(schema.clone()));
                true
            }
        }
    }

    fn store(&self, name: &str) -> StorageResult<&StoreData> {
        self.stores
            .get(name)
            .ok_or_else(|| StorageError::store_not_found(name))
    }

    fn apply(&mut self, pending: &BTreeMap<String, StorePending>) -> StorageResult<()> {
        // Validate first so a missing store cannot leave a partial apply behind.
        for name in pending.keys() {
            self.store(name)?;
        }
        for (name, changes) in pending {
            if let Some(data) = self.stores.get_mut(name) {
                if changes.cleared {
                    data.records.clear();
                }
                for (id, write) in &changes.writes {
                    match write {
                        PendingWrite::Put(record) => {
                            data.records.insert(id.clone(), record.clone());
                        }
                        PendingWrite::Delete => {
                            data.records.remove(id);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Receives the full table set before a commit becomes visible.
pub(crate) trait CommitSink: Send + Sync {
    /// Persists the state a commit is about to publish.
    fn persist(&self, tables: &TableSet) -> StorageResult<()>;
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Put(Record),
    Delete,
}

#[derive(Debug, Default)]
struct StorePending {
    cleared: bool,
    writes: BTreeMap<String, PendingWrite>,
}

/// A native transaction over a [`TableSet`].
pub(crate) struct TableTransaction<'a> {
    tables: &'a RwLock<TableSet>,
    sink: Option<&'a dyn CommitSink>,
    stores: Vec<String>,
    mode: TxMode,
    snapshot: BTreeMap<String, StoreData>,
    pending: BTreeMap<String, StorePending>,
}

impl<'a> TableTransaction<'a> {
    /// Begins a transaction; every requested store must exist.
    pub fn begin(
        tables: &'a RwLock<TableSet>,
        sink: Option<&'a dyn CommitSink>,
        stores: &[&str],
        mode: TxMode,
    ) -> StorageResult<Self> {
        let snapshot = {
            let guard = tables.read();
            let mut snapshot = BTreeMap::new();
            for name in stores {
                snapshot.insert((*name).to_string(), guard.store(name)?.clone());
            }
            snapshot
        };
        Ok(Self {
            tables,
            sink,
            stores: stores.iter().map(|s| (*s).to_string()).collect(),
            mode,
            snapshot,
            pending: BTreeMap::new(),
        })
    }

    fn ensure_scope(&self, store: &str) -> StorageResult<()> {
        if self.stores.iter().any(|s| s == store) {
            Ok(())
        } else {
            Err(StorageError::StoreNotInScope {
                name: store.to_string(),
            })
        }
    }

    /// The store as it was committed when this transaction began.
    fn committed(&self, store: &str) -> StorageResult<&StoreData> {
        self.ensure_scope(store)?;
        self.snapshot
            .get(store)
            .ok_or_else(|| StorageError::store_not_found(store))
    }

    fn ensure_writable(&self, store: &str) -> StorageResult<()> {
        self.ensure_scope(store)?;
        if self.mode.is_read_only() {
            return Err(StorageError::ReadOnly {
                store: store.to_string(),
            });
        }
        Ok(())
    }

    /// Committed records of a store with this transaction's writes applied.
    fn view(&self, store: &str) -> StorageResult<BTreeMap<String, Record>> {
        let committed = self.committed(store)?;
        let pending = self.pending.get(store);
        let mut records = if pending.is_some_and(|p| p.cleared) {
            BTreeMap::new()
        } else {
            committed.records.clone()
        };
        if let Some(pending) = pending {
            for (id, write) in &pending.writes {
                match write {
                    PendingWrite::Put(record) => {
                        records.insert(id.clone(), record.clone());
                    }
                    PendingWrite::Delete => {
                        records.remove(id);
                    }
                }
            }
        }
        Ok(records)
    }

    fn record_write(&mut self, store: &str, id: String, write: PendingWrite) {
        self.pending
            .entry(store.to_string())
            .or_default()
            .writes
            .insert(id, write);
    }
}

impl NativeTransaction for TableTransaction<'_> {
    fn mode(&self) -> TxMode {
        self.mode
    }

    fn stores(&self) -> &[String] {
        &self.stores
    }

    fn get(&self, store: &str, id: &str) -> StorageResult<Option<Record>> {
        let committed = self.committed(store)?;
        if let Some(pending) = self.pending.get(store) {
            match pending.writes.get(id) {
                Some(PendingWrite::Put(record)) => return Ok(Some(record.clone())),
                Some(PendingWrite::Delete) => return Ok(None),
                None if pending.cleared => return Ok(None),
                None => {}
            }
        }
        Ok(committed.records.get(id).cloned())
    }

    fn get_all(&self, store: &str) -> StorageResult<Vec<Record>> {
        Ok(self.view(store)?.into_values().collect())
    }

    fn count(&self, store: &str) -> StorageResult<usize> {
        if !self.pending.contains_key(store) {
            return Ok(self.committed(store)?.records.len());
        }
        Ok(self.view(store)?.len())
    }

    fn put(&mut self, store: &str, record: Record) -> StorageResult<()> {
        self.ensure_writable(store)?;
        let id = record.id().to_string();
        self.record_write(store, id, PendingWrite::Put(record));
        Ok(())
    }

    fn add(&mut self, store: &str, record: Record) -> StorageResult<()> {
        self.ensure_writable(store)?;
        if self.get(store, record.id())?.is_some() {
            return Err(StorageError::KeyExists {
                store: store.to_string(),
                id: record.id().to_string(),
            });
        }
        self.put(store, record)
    }

    fn delete(&mut self, store: &str, id: &str) -> StorageResult<()> {
        self.ensure_writable(store)?;
        self.record_write(store, id.to_string(), PendingWrite::Delete);
        Ok(())
    }

    fn clear(&mut self, store: &str) -> StorageResult<()> {
        self.ensure_writable(store)?;
        self.pending.insert(
            store.to_string(),
            StorePending {
                cleared: true,
                writes: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn has_index(&self, store: &str, index: &str) -> StorageResult<bool> {
        Ok(self.committed(store)?.schema.has_index(index))
    }

    fn cursor(&self, store: &str, index: &str, direction: CursorDirection) -> StorageResult<Cursor> {
        if !self.has_index(store, index)? {
            return Err(StorageError::IndexNotFound {
                store: store.to_string(),
                index: index.to_string(),
            });
        }
        let mut entries: Vec<Record> = self
            .view(store)?
            .into_values()
            .filter(|r| r.get(index).is_some_and(is_valid_index_key))
            .collect();
        entries.sort_by(|a, b| {
            let key_order = match (a.get(index), b.get(index)) {
                (Some(ka), Some(kb)) => compare_index_keys(ka, kb).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            key_order.then_with(|| a.id().cmp(b.id()))
        });
        if direction == CursorDirection::Prev {
            entries.reverse();
        }
        Ok(Cursor::new(entries))
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut guard = self.tables.write();
        match self.sink {
            Some(sink) => {
                let mut next = guard.clone();
                next.apply(&self.pending)?;
                sink.persist(&next)?;
                *guard = next;
            }
            None => guard.apply(&self.pending)?,
        }
        Ok(())
    }

    fn abort(self: Box<Self>) {
        tracing::debug!(
            stores = self.pending.len(),
            "discarding buffered writes of aborted transaction"
        );
    }
}
