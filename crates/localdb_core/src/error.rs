//! Error types for LocalDB core.

use localdb_storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in LocalDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested record does not exist.
    #[error("record not found: {store} {id}")]
    NotFound {
        /// Store that was searched.
        store: String,
        /// Id that was not found.
        id: String,
    },

    /// An add hit a record whose id already exists.
    #[error("record already exists: {store} {id}")]
    RecordExists {
        /// Store that was written.
        store: String,
        /// The conflicting id.
        id: String,
    },

    /// A store could not be created or opened in the backend.
    #[error("store unavailable: {store}: {reason}")]
    StoreUnavailable {
        /// Name of the store.
        store: String,
        /// Why the store is unavailable.
        reason: String,
    },

    /// The native transaction failed to commit.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// A call to the owning process could not be delivered or answered.
    #[error("transport failure: {message}")]
    TransportFailure {
        /// Description of the failure.
        message: String,
    },

    /// A value could not be used as a record.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// An error raised in the owning process that has no local structured form.
    #[error("{kind} error in owning process: {message}")]
    Remote {
        /// Classification reported by the owning process.
        kind: ErrorKind,
        /// Rendered error message.
        message: String,
    },
}

/// Stable classification of a [`CoreError`].
///
/// Kinds are what travels across a process boundary, and what callers match
/// on when they only care whether a record was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// See [`CoreError::NotFound`].
    NotFound,
    /// See [`CoreError::RecordExists`].
    RecordExists,
    /// See [`CoreError::StoreUnavailable`].
    StoreUnavailable,
    /// See [`CoreError::TransactionAborted`].
    TransactionAborted,
    /// See [`CoreError::TransportFailure`].
    TransportFailure,
    /// See [`CoreError::InvalidRecord`].
    InvalidRecord,
    /// See [`CoreError::InvalidOperation`].
    InvalidOperation,
    /// See [`CoreError::Storage`].
    Storage,
}

impl ErrorKind {
    /// Returns the kind's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "notFound",
            Self::RecordExists => "recordExists",
            Self::StoreUnavailable => "storeUnavailable",
            Self::TransactionAborted => "transactionAborted",
            Self::TransportFailure => "transportFailure",
            Self::InvalidRecord => "invalidRecord",
            Self::InvalidOperation => "invalidOperation",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(store: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            store: store.into(),
            id: id.into(),
        }
    }

    /// Creates a record exists error.
    pub fn record_exists(store: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RecordExists {
            store: store.into(),
            id: id.into(),
        }
    }

    /// Creates a store unavailable error.
    pub fn store_unavailable(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            store: store.into(),
            reason: reason.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates a transport failure error.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the error's classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RecordExists { .. } => ErrorKind::RecordExists,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::TransactionAborted { .. } => ErrorKind::TransactionAborted,
            Self::TransportFailure { .. } => ErrorKind::TransportFailure,
            Self::InvalidRecord { .. } => ErrorKind::InvalidRecord,
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Remote { kind, .. } => *kind,
        }
    }

    /// Returns true if the error means the record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::KeyExists { store, id } => Self::RecordExists { store, id },
            StorageError::StoreNotFound { name } => {
                Self::store_unavailable(name, "store does not exist in the backend")
            }
            StorageError::InvalidRecord(message) => Self::InvalidRecord { message },
            StorageError::StoreNotInScope { name } => {
                Self::invalid_operation(format!("store {name} is not in the transaction scope"))
            }
            StorageError::ReadOnly { store } => Self::invalid_operation(format!(
                "write to {store} inside a read-only transaction"
            )),
            other => Self::Storage(other),
        }
    }
}
