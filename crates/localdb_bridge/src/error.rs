//! Error types for the bridge.

use localdb_core::{CoreError, ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while moving a call between contexts.
///
/// Every bridge error reaches callers as [`CoreError::TransportFailure`].
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A frame could not be encoded.
    #[error("failed to encode frame: {0}")]
    Encode(String),

    /// A frame could not be decoded.
    #[error("failed to decode frame: {0}")]
    Decode(String),

    /// The owning process is gone.
    #[error("owning process disconnected")]
    Disconnected,

    /// A reply did not belong to the request that was sent.
    #[error("reply {got} does not match request {expected}")]
    MismatchedReply {
        /// Id of the request sent.
        expected: u64,
        /// Id carried by the reply.
        got: u64,
    },

    /// The reply variant does not fit the method that was called.
    #[error("unexpected reply to {method}")]
    UnexpectedReply {
        /// Method that was called.
        method: &'static str,
    },
}

impl From<BridgeError> for CoreError {
    fn from(err: BridgeError) -> Self {
        CoreError::transport_failure(err.to_string())
    }
}

/// A [`CoreError`] in wire form.
///
/// Structured fields are kept so the caller side can rebuild the same
/// variant; errors without a local structured form come back as
/// [`CoreError::Remote`] with their kind intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Store the error refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// Record id the error refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

impl RemoteError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            store: None,
            id: None,
            message: message.into(),
        }
    }

    /// Rebuilds the error on the caller side.
    #[must_use]
    pub fn into_core(self) -> CoreError {
        let store = self.store.unwrap_or_default();
        let id = self.id.unwrap_or_default();
        match self.kind {
            ErrorKind::NotFound => CoreError::NotFound { store, id },
            ErrorKind::RecordExists => CoreError::RecordExists { store, id },
            ErrorKind::StoreUnavailable => CoreError::StoreUnavailable {
                store,
                reason: self.message,
            },
            ErrorKind::TransactionAborted => CoreError::TransactionAborted {
                reason: self.message,
            },
            ErrorKind::TransportFailure => CoreError::TransportFailure {
                message: self.message,
            },
            ErrorKind::InvalidRecord => CoreError::InvalidRecord {
                message: self.message,
            },
            ErrorKind::InvalidOperation => CoreError::InvalidOperation {
                message: self.message,
            },
            ErrorKind::Storage => CoreError::Remote {
                kind: ErrorKind::Storage,
                message: self.message,
            },
        }
    }
}

impl From<&CoreError> for RemoteError {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::NotFound { store, id } | CoreError::RecordExists { store, id } => Self {
                kind: err.kind(),
                store: Some(store.clone()),
                id: Some(id.clone()),
                message: err.to_string(),
            },
            CoreError::StoreUnavailable { store, reason } => Self {
                kind: ErrorKind::StoreUnavailable,
                store: Some(store.clone()),
                id: None,
                message: reason.clone(),
            },
            CoreError::TransactionAborted { reason } => {
                Self::new(ErrorKind::TransactionAborted, reason.clone())
            }
            CoreError::TransportFailure { message }
            | CoreError::InvalidRecord { message }
            | CoreError::InvalidOperation { message }
            | CoreError::Remote { message, .. } => Self::new(err.kind(), message.clone()),
            CoreError::Storage(inner) => Self::new(ErrorKind::Storage, inner.to_string()),
        }
    }
}
