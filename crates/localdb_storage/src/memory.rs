//! In-memory storage backend.

use crate::backend::{NativeTransaction, StorageBackend};
use crate::error::StorageResult;
use crate::schema::{StoreSchema, TxMode};
use crate::tables::{TableSet, TableTransaction};
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// This backend keeps every store in memory and is suitable for:
/// - Unit and integration tests
/// - Platforms without a persistent engine
/// - Ephemeral databases that don't need persistence
///
/// # Thread Safety
///
/// The backend is thread-safe and can be shared across threads. Commits
/// take the write lock for the duration of the apply only.
///
/// # Example
///
/// ```rust
/// use localdb_storage::{InMemoryBackend, Record, StorageBackend, StoreSchema, TxMode};
///
/// let backend = InMemoryBackend::new();
/// backend.create_store(&StoreSchema::new("wallets")).unwrap();
///
/// let mut tx = backend.begin(&["wallets"], TxMode::ReadWrite).unwrap();
/// tx.put("wallets", Record::new("w1")).unwrap();
/// tx.commit().unwrap();
///
/// let tx = backend.begin(&["wallets"], TxMode::ReadOnly).unwrap();
/// assert_eq!(tx.count("wallets").unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: RwLock<TableSet>,
}

impl InMemoryBackend {
    /// Creates a new backend with no stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with every store in `schemas` already present.
    #[must_use]
    pub fn with_stores(schemas: &[StoreSchema]) -> Self {
        let mut tables = TableSet::default();
        for schema in schemas {
            tables.create_store(schema);
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Drops a store and all of its records.
    ///
    /// Useful for testing how callers cope with a store that disappeared.
    pub fn drop_store(&self, name: &str) -> bool {
        self.tables.write().stores.remove(name).is_some()
    }
}

impl StorageBackend for InMemoryBackend {
    fn store_names(&self) -> StorageResult<Vec<String>> {
        Ok(self.tables.read().stores.keys().cloned().collect())
    }

    fn create_store(&self, schema: &StoreSchema) -> StorageResult<()> {
        self.tables.write().create_store(schema);
        Ok(())
    }

    fn begin(&self, stores: &[&str], mode: TxMode) -> StorageResult<Box<dyn NativeTransaction + '_>> {
        let tx = TableTransaction::begin(&self.tables, None, stores, mode)?;
        Ok(Box::new(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::record::Record;
    use serde_json::json;

    #[test]
    fn memory_new_has_no_stores() {
        let backend = InMemoryBackend::new();
        assert!(backend.store_names().unwrap().is_empty());
    }

    #[test]
    fn memory_open_or_create_is_idempotent() {
        let backend = InMemoryBackend::new();
        let schemas = [StoreSchema::new("a"), StoreSchema::new("b")];
        backend.open_or_create(&schemas).unwrap();
        backend.open_or_create(&schemas).unwrap();
        assert_eq!(backend.store_names().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn memory_commit_spans_stores() {
        let backend = InMemoryBackend::with_stores(&[StoreSchema::new("a"), StoreSchema::new("b")]);
        let mut tx = backend.begin(&["a", "b"], TxMode::ReadWrite).unwrap();
        tx.put("a", Record::new("1").with("v", json!(1))).unwrap();
        tx.put("b", Record::new("2").with("v", json!(2))).unwrap();
        tx.commit().unwrap();

        let tx = backend.begin(&["a", "b"], TxMode::ReadOnly).unwrap();
        assert_eq!(tx.get("a", "1").unwrap().unwrap().get("v"), Some(&json!(1)));
        assert_eq!(tx.get("b", "2").unwrap().unwrap().get("v"), Some(&json!(2)));
    }

    #[test]
    fn memory_dropped_transaction_discards_writes() {
        let backend = InMemoryBackend::with_stores(&[StoreSchema::new("a")]);
        {
            let mut tx = backend.begin(&["a"], TxMode::ReadWrite).unwrap();
            tx.put("a", Record::new("1")).unwrap();
        }
        let tx = backend.begin(&["a"], TxMode::ReadOnly).unwrap();
        assert_eq!(tx.count("a").unwrap(), 0);
    }

    #[test]
    fn memory_begin_after_drop_store_fails() {
        let backend = InMemoryBackend::with_stores(&[StoreSchema::new("a")]);
        assert!(backend.drop_store("a"));
        assert!(matches!(
            backend.begin(&["a"], TxMode::ReadOnly),
            Err(StorageError::StoreNotFound { .. })
        ));
    }

    #[test]
    fn memory_backend_is_shareable_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let backend = Arc::new(InMemoryBackend::with_stores(&[StoreSchema::new("a")]));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    let mut tx = backend.begin(&["a"], TxMode::ReadWrite).unwrap();
                    tx.put("a", Record::new(format!("r{i}"))).unwrap();
                    tx.commit().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let tx = backend.begin(&["a"], TxMode::ReadOnly).unwrap();
        assert_eq!(tx.count("a").unwrap(), 4);
    }
}
