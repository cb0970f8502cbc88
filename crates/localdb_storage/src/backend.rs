//! Storage backend SPI.

use crate::error::StorageResult;
use crate::record::Record;
use crate::schema::{CursorDirection, StoreSchema, TxMode};

/// A platform storage engine.
///
/// A backend owns a set of named stores and hands out native transactions
/// spanning any subset of them. A new platform is supported by implementing
/// this trait and [`NativeTransaction`]; nothing above this layer knows which
/// engine it talks to.
///
/// # Invariants
///
/// - `begin` fails with `StoreNotFound` if any requested store does not exist
/// - Writes made through a transaction become visible to other transactions
///   only when it commits, and all of them at once
/// - Backends must be `Send + Sync` so one instance can serve every caller
///   in the owning process
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - Fallback engine, also used by tests
/// - [`super::FileBackend`] - On-disk engine for desktop and mobile
pub trait StorageBackend: Send + Sync {
    /// Returns the names of every store created so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn store_names(&self) -> StorageResult<Vec<String>>;

    /// Creates a store, or merges new indexes into an existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be created or persisted.
    fn create_store(&self, schema: &StoreSchema) -> StorageResult<()>;

    /// Begins a native transaction spanning `stores`.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` if a requested store has not been created.
    fn begin(&self, stores: &[&str], mode: TxMode) -> StorageResult<Box<dyn NativeTransaction + '_>>;

    /// Creates every store in `schemas` that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a store cannot be created.
    fn open_or_create(&self, schemas: &[StoreSchema]) -> StorageResult<()> {
        let existing = self.store_names()?;
        for schema in schemas {
            if !existing.contains(&schema.name) {
                self.create_store(schema)?;
            }
        }
        Ok(())
    }
}

/// One native transaction against a backend.
///
/// Every operation names the store it targets; the store must be part of the
/// scope the transaction was opened with. Dropping a transaction without
/// calling [`NativeTransaction::commit`] discards its writes.
pub trait NativeTransaction: Send {
    /// Returns the mode the transaction was opened in.
    fn mode(&self) -> TxMode;

    /// Returns the stores the transaction spans.
    fn stores(&self) -> &[String];

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is out of scope or unreadable.
    fn get(&self, store: &str, id: &str) -> StorageResult<Option<Record>>;

    /// Reads every record in the store, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is out of scope or unreadable.
    fn get_all(&self, store: &str) -> StorageResult<Vec<Record>>;

    /// Counts the records in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is out of scope or unreadable.
    fn count(&self, store: &str) -> StorageResult<usize>;

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` in a read-only transaction.
    fn put(&mut self, store: &str, record: Record) -> StorageResult<()>;

    /// Inserts a record that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `KeyExists` if a record with the same id is visible to this
    /// transaction, `ReadOnly` in a read-only transaction.
    fn add(&mut self, store: &str, record: Record) -> StorageResult<()>;

    /// Deletes a record. Deleting a missing id is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` in a read-only transaction.
    fn delete(&mut self, store: &str, id: &str) -> StorageResult<()>;

    /// Deletes every record in the store.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` in a read-only transaction.
    fn clear(&mut self, store: &str) -> StorageResult<()>;

    /// Returns whether the store declares an index on `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is out of scope.
    fn has_index(&self, store: &str, index: &str) -> StorageResult<bool>;

    /// Opens a cursor over the records ordered by `index`, ties broken by id.
    ///
    /// Records whose index field is missing or not a valid key are skipped.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotFound` if the store has no such index.
    fn cursor(&self, store: &str, index: &str, direction: CursorDirection) -> StorageResult<Cursor>;

    /// Applies every buffered write atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the writes cannot be applied or persisted; in that
    /// case none of them are visible.
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards every buffered write.
    fn abort(self: Box<Self>);
}

/// An ordered scan over index entries.
#[derive(Debug)]
pub struct Cursor {
    records: std::vec::IntoIter<Record>,
}

impl Cursor {
    /// Creates a cursor over records that are already in scan order.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }
}

impl Iterator for Cursor {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.records.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}
