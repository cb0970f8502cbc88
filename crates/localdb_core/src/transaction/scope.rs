//! Logical transactions and per-store handles.

use crate::error::{CoreError, CoreResult};
use crate::registry::StoreName;
use localdb_storage::{Cursor, CursorDirection, NativeTransaction, Record, TxMode};
use std::collections::BTreeSet;

/// One logical unit of work spanning a fixed set of stores.
///
/// A `Transaction` wraps exactly one native transaction. Every
/// [`StoreHandle`] obtained from it issues its operations against that same
/// native transaction, so all stores see each other's writes and commit or
/// abort together.
///
/// Transactions are only ever lent to a task by
/// [`super::TransactionManager::with_transaction`]; they cannot outlive the
/// call that opened them.
pub struct Transaction<'a> {
    native: Box<dyn NativeTransaction + 'a>,
    scope: Vec<StoreName>,
    touched: BTreeSet<StoreName>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(native: Box<dyn NativeTransaction + 'a>, scope: Vec<StoreName>) -> Self {
        Self {
            native,
            scope,
            touched: BTreeSet::new(),
        }
    }

    /// Returns whether the transaction was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.native.mode().is_read_only()
    }

    /// Returns the stores this transaction spans.
    #[must_use]
    pub fn scope(&self) -> &[StoreName] {
        &self.scope
    }

    /// Returns the stores written so far.
    #[must_use]
    pub fn touched(&self) -> &BTreeSet<StoreName> {
        &self.touched
    }

    /// Returns a handle to one store of this transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the store is outside the transaction's
    /// scope.
    pub fn store(&mut self, name: StoreName) -> CoreResult<StoreHandle<'_, 'a>> {
        if !self.scope.contains(&name) {
            return Err(CoreError::invalid_operation(format!(
                "store {name} is not in the transaction scope"
            )));
        }
        Ok(StoreHandle { tx: self, name })
    }

    pub(crate) fn into_parts(self) -> (Box<dyn NativeTransaction + 'a>, BTreeSet<StoreName>) {
        (self.native, self.touched)
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("mode", &self.native.mode())
            .field("scope", &self.scope)
            .field("touched", &self.touched)
            .finish_non_exhaustive()
    }
}

/// Primitive operations on one store inside a [`Transaction`].
pub struct StoreHandle<'t, 'a> {
    tx: &'t mut Transaction<'a>,
    name: StoreName,
}

impl StoreHandle<'_, '_> {
    /// Returns the store this handle targets.
    #[must_use]
    pub fn name(&self) -> StoreName {
        self.name
    }

    /// Reads one record.
    pub fn get(&self, id: &str) -> CoreResult<Option<Record>> {
        Ok(self.tx.native.get(self.name.as_str(), id)?)
    }

    /// Reads every record, in no particular order.
    pub fn get_all(&self) -> CoreResult<Vec<Record>> {
        Ok(self.tx.native.get_all(self.name.as_str())?)
    }

    /// Counts the records.
    pub fn count(&self) -> CoreResult<usize> {
        Ok(self.tx.native.count(self.name.as_str())?)
    }

    /// Returns whether the store has the given index.
    pub fn has_index(&self, index: &str) -> CoreResult<bool> {
        Ok(self.tx.native.has_index(self.name.as_str(), index)?)
    }

    /// Opens an ordered scan over an index.
    pub fn cursor(&self, index: &str, direction: CursorDirection) -> CoreResult<Cursor> {
        Ok(self.tx.native.cursor(self.name.as_str(), index, direction)?)
    }

    /// Inserts or replaces a record.
    pub fn put(&mut self, record: Record) -> CoreResult<()> {
        self.tx.native.put(self.name.as_str(), record)?;
        self.tx.touched.insert(self.name);
        Ok(())
    }

    /// Inserts a record whose id must not exist yet.
    pub fn add(&mut self, record: Record) -> CoreResult<()> {
        self.tx.native.add(self.name.as_str(), record)?;
        self.tx.touched.insert(self.name);
        Ok(())
    }

    /// Deletes a record.
    pub fn delete(&mut self, id: &str) -> CoreResult<()> {
        self.tx.native.delete(self.name.as_str(), id)?;
        self.tx.touched.insert(self.name);
        Ok(())
    }

    /// Deletes every record.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.tx.native.clear(self.name.as_str())?;
        self.tx.touched.insert(self.name);
        Ok(())
    }
}

/// Options for [`super::TransactionManager::with_transaction`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Open the native transaction read-only.
    pub read_only: bool,
    /// Stores to span; every declared store when `None`.
    pub stores: Option<Vec<StoreName>>,
}

impl TransactionOptions {
    /// Read-write options spanning every store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only options spanning every store.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            stores: None,
        }
    }

    /// Restricts the transaction to the given stores.
    #[must_use]
    pub fn stores(mut self, stores: impl IntoIterator<Item = StoreName>) -> Self {
        self.stores = Some(stores.into_iter().collect());
        self
    }

    pub(crate) fn mode(&self) -> TxMode {
        if self.read_only {
            TxMode::ReadOnly
        } else {
            TxMode::ReadWrite
        }
    }

    pub(crate) fn scope(&self) -> Vec<StoreName> {
        let mut scope = match &self.stores {
            Some(stores) => stores.clone(),
            None => StoreName::ALL.to_vec(),
        };
        scope.sort();
        scope.dedup();
        scope
    }
}
