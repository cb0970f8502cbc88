//! Call protocol between a caller context and the owning process.
//!
//! A call is one [`DbCall`] variant per operation of
//! [`localdb_core::LocalDbApi`] and [`localdb_core::SimpleDbApi`], tagged
//! with the operation's method name. Frames are CBOR-encoded [`Request`]s
//! and [`Response`]s.

use crate::error::{BridgeError, BridgeResult, RemoteError};
use localdb_core::{
    AddOptions, AddResult, AggregateKey, GetAllOptions, Record, RecordPair, RecordPatch, StoreName,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace the main record store is registered under.
pub const LOCAL_DB_NAMESPACE: &str = "localDb";

/// Namespace the key-value store is registered under.
pub const SIMPLE_DB_NAMESPACE: &str = "simpleDb";

/// One operation of the collection agent, with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum DbCall {
    /// `get`
    Get {
        /// Store to read.
        store: StoreName,
        /// Record id.
        id: String,
    },
    /// `getAll`
    GetAll {
        /// Store to read.
        store: StoreName,
        /// Pagination.
        options: GetAllOptions,
    },
    /// `getByIds`
    GetByIds {
        /// Store to read.
        store: StoreName,
        /// Ids to look up.
        ids: Vec<String>,
    },
    /// `count`
    Count {
        /// Store to count.
        store: StoreName,
    },
    /// `add`
    Add {
        /// Store to write.
        store: StoreName,
        /// Records to insert.
        records: Vec<Record>,
        /// Insert options.
        options: AddOptions,
    },
    /// `patch`
    Patch {
        /// Store to write.
        store: StoreName,
        /// Ids to update.
        ids: Vec<String>,
        /// Update to apply.
        patch: RecordPatch,
    },
    /// `remove`
    Remove {
        /// Store to write.
        store: StoreName,
        /// Ids to delete.
        ids: Vec<String>,
    },
    /// `clear`
    Clear {
        /// Store to clear.
        store: StoreName,
    },
    /// `getAllCached`
    GetAllCached {
        /// Aggregate to read.
        key: AggregateKey,
    },
    /// `getRawData`
    GetRawData {
        /// Key-value entity.
        entity: String,
    },
    /// `setRawData`
    SetRawData {
        /// Key-value entity.
        entity: String,
        /// New document.
        data: Value,
    },
    /// `clearRawData`
    ClearRawData {
        /// Key-value entity.
        entity: String,
    },
}

impl DbCall {
    /// Returns the method name carried on the wire.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::GetAll { .. } => "getAll",
            Self::GetByIds { .. } => "getByIds",
            Self::Count { .. } => "count",
            Self::Add { .. } => "add",
            Self::Patch { .. } => "patch",
            Self::Remove { .. } => "remove",
            Self::Clear { .. } => "clear",
            Self::GetAllCached { .. } => "getAllCached",
            Self::GetRawData { .. } => "getRawData",
            Self::SetRawData { .. } => "setRawData",
            Self::ClearRawData { .. } => "clearRawData",
        }
    }

    /// Returns whether the call targets the key-value store.
    #[must_use]
    pub const fn is_key_value(&self) -> bool {
        matches!(
            self,
            Self::GetRawData { .. } | Self::SetRawData { .. } | Self::ClearRawData { .. }
        )
    }
}

/// The value an operation returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum DbReply {
    /// One record.
    Record(Record),
    /// A list of records.
    Records(Vec<Record>),
    /// Record pairs, one per requested id.
    Pairs(Vec<RecordPair>),
    /// A count.
    Count(usize),
    /// Outcome of an add.
    Added(AddResult),
    /// A key-value document, absent if the entity is unset.
    RawData(Option<Value>),
    /// Completion with no value.
    Done,
}

/// A framed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlates the reply with this request.
    pub id: u64,
    /// Agent instance the call targets.
    pub namespace: String,
    /// The call.
    pub call: DbCall,
}

/// A framed reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request this answers.
    pub id: u64,
    /// The operation's value, or its error.
    pub result: Result<DbReply, RemoteError>,
}

/// Encodes a frame to CBOR.
///
/// # Errors
///
/// Returns `Encode` if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> BridgeResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| BridgeError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decodes a frame from CBOR.
///
/// # Errors
///
/// Returns `Decode` if the bytes are not a valid frame of type `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> BridgeResult<T> {
    ciborium::from_reader(bytes).map_err(|e| BridgeError::Decode(e.to_string()))
}
