//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The named store has not been created in this backend.
    #[error("store not found: {name}")]
    StoreNotFound {
        /// Name of the missing store.
        name: String,
    },

    /// The store was not part of the transaction's scope when it began.
    #[error("store {name} is not in the scope of this transaction")]
    StoreNotInScope {
        /// Name of the store.
        name: String,
    },

    /// The store has no index with the given name.
    #[error("index {index} not found on store {store}")]
    IndexNotFound {
        /// Name of the store.
        store: String,
        /// Name of the index.
        index: String,
    },

    /// An insert hit a record whose key already exists.
    #[error("key already exists: {id} in store {store}")]
    KeyExists {
        /// Name of the store.
        store: String,
        /// The conflicting record id.
        id: String,
    },

    /// A write was issued through a read-only transaction.
    #[error("write to {store} attempted in a read-only transaction")]
    ReadOnly {
        /// Name of the store.
        store: String,
    },

    /// A value could not be used as a record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The on-disk data is corrupted or uses an unknown format.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Encoding the snapshot failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Another process holds the store directory.
    #[error("storage locked: another process has exclusive access")]
    Locked,
}

impl StorageError {
    /// Creates a store-not-found error.
    pub fn store_not_found(name: impl Into<String>) -> Self {
        Self::StoreNotFound { name: name.into() }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }
}
