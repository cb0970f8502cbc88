//! Transaction manager.

use crate::error::{CoreError, CoreResult};
use crate::registry::StoreName;
use crate::stats::DbStats;
use crate::transaction::scope::{Transaction, TransactionOptions};
use localdb_storage::{NativeTransaction, StorageBackend, StorageError, TxMode};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

type CommitHook = Box<dyn Fn(&BTreeSet<StoreName>) + Send + Sync>;

/// Runs logical units of work against a backend.
///
/// The transaction manager provides:
/// - Exactly one native transaction per [`with_transaction`] call
/// - Commit when the task returns `Ok`, abort when it returns `Err`
/// - Transparent creation of declared stores the backend does not have yet
/// - Commit hooks that learn which stores a committed transaction wrote
///
/// [`with_transaction`]: TransactionManager::with_transaction
pub struct TransactionManager {
    backend: Arc<dyn StorageBackend>,
    create_missing_stores: bool,
    stats: Arc<DbStats>,
    commit_hooks: RwLock<Vec<CommitHook>>,
}

impl TransactionManager {
    /// Creates a transaction manager over a backend.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        create_missing_stores: bool,
        stats: Arc<DbStats>,
    ) -> Self {
        Self {
            backend,
            create_missing_stores,
            stats,
            commit_hooks: RwLock::new(Vec::new()),
        }
    }

    /// Returns the backend transactions are opened against.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Registers a hook called after every successful commit that wrote to
    /// at least one store.
    pub fn on_commit<F>(&self, hook: F)
    where
        F: Fn(&BTreeSet<StoreName>) + Send + Sync + 'static,
    {
        self.commit_hooks.write().push(Box::new(hook));
    }

    /// Runs `task` inside one transaction.
    ///
    /// If the task returns `Ok`, the transaction is committed and the value
    /// returned. If it returns `Err`, the transaction is aborted and the
    /// error is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the task's error, `StoreUnavailable` if a store in scope
    /// cannot be opened, or `TransactionAborted` if the commit fails.
    ///
    /// # Example
    ///
    /// ```rust
    /// use localdb_core::{LocalDb, Record, StoreName, TransactionOptions};
    ///
    /// let db = LocalDb::open_in_memory().unwrap();
    /// let added = db
    ///     .with_transaction(&TransactionOptions::new(), |tx| {
    ///         db.tx_add(tx, StoreName::Wallet, vec![Record::new("w1")], Default::default())
    ///     })
    ///     .unwrap();
    /// assert_eq!(added.added, 1);
    /// ```
    pub fn with_transaction<T, E, F>(&self, options: &TransactionOptions, task: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<CoreError>,
    {
        let mut tx = self.begin(options)?;
        match task(&mut tx) {
            Ok(value) => {
                let (native, touched) = tx.into_parts();
                if let Err(err) = native.commit() {
                    self.stats.record_transaction_abort();
                    tracing::warn!(error = %err, "transaction commit failed");
                    return Err(CoreError::transaction_aborted(err.to_string()).into());
                }
                self.stats.record_transaction_commit();
                if !touched.is_empty() {
                    for hook in self.commit_hooks.read().iter() {
                        hook(&touched);
                    }
                }
                Ok(value)
            }
            Err(err) => {
                let (native, touched) = tx.into_parts();
                native.abort();
                self.stats.record_transaction_abort();
                tracing::warn!(written = touched.len(), "transaction aborted by task error");
                Err(err)
            }
        }
    }

    fn begin(&self, options: &TransactionOptions) -> CoreResult<Transaction<'_>> {
        let scope = options.scope();
        let native = self.begin_native(&scope, options.mode())?;
        self.stats.record_transaction_start();
        Ok(Transaction::new(native, scope))
    }

    fn begin_native(
        &self,
        scope: &[StoreName],
        mode: TxMode,
    ) -> CoreResult<Box<dyn NativeTransaction + '_>> {
        let names: Vec<&str> = scope.iter().map(|s| s.as_str()).collect();
        match self.backend.begin(&names, mode) {
            Err(StorageError::StoreNotFound { name }) => {
                if !self.create_missing_stores {
                    return Err(CoreError::store_unavailable(
                        name,
                        "store does not exist and creation is disabled",
                    ));
                }
                self.create_missing(scope)?;
                self.backend.begin(&names, mode).map_err(|err| match err {
                    StorageError::StoreNotFound { name } => {
                        CoreError::store_unavailable(name, "store still missing after creation")
                    }
                    other => other.into(),
                })
            }
            other => other.map_err(CoreError::from),
        }
    }

    /// Creates every store of `scope` the backend does not have yet.
    pub(crate) fn create_missing(&self, scope: &[StoreName]) -> CoreResult<()> {
        let existing = self.backend.store_names()?;
        for name in scope {
            if existing.iter().any(|e| e == name.as_str()) {
                continue;
            }
            self.backend
                .create_store(&name.schema())
                .map_err(|err| CoreError::store_unavailable(name.as_str(), err.to_string()))?;
            tracing::info!(store = %name, "created missing store");
        }
        Ok(())
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("create_missing_stores", &self.create_missing_stores)
            .field("commit_hooks", &self.commit_hooks.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdb_storage::{InMemoryBackend, Record};
    use parking_lot::Mutex;

    fn manager_with(backend: InMemoryBackend, create: bool) -> TransactionManager {
        TransactionManager::new(Arc::new(backend), create, Arc::new(DbStats::new()))
    }

    fn full_backend() -> InMemoryBackend {
        InMemoryBackend::with_stores(&StoreName::all_schemas())
    }

    fn wallet_count(tm: &TransactionManager) -> usize {
        tm.with_transaction(&TransactionOptions::read_only(), |tx| {
            tx.store(StoreName::Wallet)?.count()
        })
        .unwrap()
    }

    #[test]
    fn ok_task_commits() {
        let tm = manager_with(full_backend(), true);
        tm.with_transaction(&TransactionOptions::new(), |tx| {
            tx.store(StoreName::Wallet)?.put(Record::new("w1"))
        })
        .unwrap();
        assert_eq!(wallet_count(&tm), 1);
        assert_eq!(tm.stats.snapshot().transactions_committed, 2);
    }

    #[test]
    fn err_task_aborts_and_keeps_error() {
        let tm = manager_with(full_backend(), true);
        let result: CoreResult<()> = tm.with_transaction(&TransactionOptions::new(), |tx| {
            tx.store(StoreName::Wallet)?.put(Record::new("w1"))?;
            tx.store(StoreName::Account)?.put(Record::new("a1"))?;
            Err(CoreError::not_found("Wallet", "boom"))
        });
        assert!(matches!(result, Err(CoreError::NotFound { ref id, .. }) if id == "boom"));
        assert_eq!(wallet_count(&tm), 0);
        assert_eq!(tm.stats.snapshot().transactions_aborted, 1);
    }

    #[derive(Debug)]
    enum TaskError {
        Core(CoreError),
        Custom(&'static str),
    }

    impl From<CoreError> for TaskError {
        fn from(err: CoreError) -> Self {
            Self::Core(err)
        }
    }

    #[test]
    fn caller_error_type_passes_through() {
        let tm = manager_with(full_backend(), true);
        let result: Result<(), TaskError> = tm.with_transaction(&TransactionOptions::new(), |tx| {
            tx.store(StoreName::Wallet)?.put(Record::new("w1"))?;
            Err(TaskError::Custom("validation failed"))
        });
        assert!(matches!(result, Err(TaskError::Custom("validation failed"))));
        assert_eq!(wallet_count(&tm), 0);
    }

    #[test]
    fn missing_stores_are_created_transparently() {
        let tm = manager_with(InMemoryBackend::new(), true);
        assert_eq!(wallet_count(&tm), 0);
        let names = tm.backend().store_names().unwrap();
        assert_eq!(names.len(), StoreName::ALL.len());
    }

    #[test]
    fn missing_store_without_creation_is_unavailable() {
        let tm = manager_with(InMemoryBackend::new(), false);
        let result = tm.with_transaction(&TransactionOptions::read_only(), |tx| {
            tx.store(StoreName::Wallet)?.count()
        });
        assert!(matches!(result, Err(CoreError::StoreUnavailable { .. })));
    }

    #[test]
    fn store_outside_scope_is_rejected() {
        let tm = manager_with(full_backend(), true);
        let options = TransactionOptions::read_only().stores([StoreName::Wallet]);
        let result = tm.with_transaction(&options, |tx| tx.store(StoreName::Account).map(|_| ()));
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn read_only_transaction_rejects_writes() {
        let tm = manager_with(full_backend(), true);
        let result = tm.with_transaction(&TransactionOptions::read_only(), |tx| {
            tx.store(StoreName::Wallet)?.put(Record::new("w1"))
        });
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn commit_hooks_see_touched_stores() {
        let tm = manager_with(full_backend(), true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tm.on_commit(move |stores| sink.lock().push(stores.clone()));

        tm.with_transaction(&TransactionOptions::new(), |tx| {
            tx.store(StoreName::Device)?.put(Record::new("d1"))?;
            tx.store(StoreName::Wallet)?.put(Record::new("w1"))
        })
        .unwrap();
        // Read-only work does not fire hooks.
        wallet_count(&tm);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].iter().copied().collect::<Vec<_>>(),
            vec![StoreName::Wallet, StoreName::Device]
        );
    }

    #[test]
    fn one_native_transaction_spans_stores() {
        let tm = manager_with(full_backend(), true);
        tm.with_transaction(&TransactionOptions::new(), |tx| {
            tx.store(StoreName::Wallet)?.put(Record::new("w1"))?;
            let seen = tx.store(StoreName::Wallet)?.get("w1")?;
            assert!(seen.is_some());
            Ok::<_, CoreError>(())
        })
        .unwrap();
    }
}
