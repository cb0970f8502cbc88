//! Caller-side stand-ins for the agents in the owning process.

use crate::error::BridgeError;
use crate::protocol::{DbCall, DbReply, LOCAL_DB_NAMESPACE, SIMPLE_DB_NAMESPACE};
use crate::transport::BackgroundTransport;
use localdb_core::{
    AddOptions, AddResult, AggregateKey, CoreResult, GetAllOptions, LocalDbApi, Record,
    RecordPair, RecordPatch, SimpleDbApi, StoreName,
};
use serde_json::Value;
use std::sync::Arc;

/// Forwards every [`LocalDbApi`] call to the owning process.
///
/// A proxy holds no data of its own and does no caching; each call is one
/// round trip. Errors raised in the owning process come back as the same
/// [`localdb_core::CoreError`] variant.
///
/// # Example
///
/// ```rust
/// use localdb_bridge::{BackgroundHost, LocalDbProxy, LoopbackTransport};
/// use localdb_core::{LocalDb, LocalDbApi, StoreName};
/// use std::sync::Arc;
///
/// let host = Arc::new(BackgroundHost::new());
/// host.register("localDb", Arc::new(LocalDb::open_in_memory().unwrap()));
///
/// let proxy = LocalDbProxy::new(Arc::new(LoopbackTransport::loopback(host)));
/// assert_eq!(proxy.count(StoreName::Wallet).unwrap(), 0);
/// ```
#[derive(Clone)]
pub struct LocalDbProxy {
    namespace: String,
    transport: Arc<dyn BackgroundTransport>,
}

impl LocalDbProxy {
    /// Creates a proxy for the main record store.
    #[must_use]
    pub fn new(transport: Arc<dyn BackgroundTransport>) -> Self {
        Self::with_namespace(LOCAL_DB_NAMESPACE, transport)
    }

    /// Creates a proxy for the agent registered under `namespace`.
    #[must_use]
    pub fn with_namespace(
        namespace: impl Into<String>,
        transport: Arc<dyn BackgroundTransport>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            transport,
        }
    }

    /// Returns the namespace calls are sent to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn call(&self, call: DbCall) -> CoreResult<(&'static str, DbReply)> {
        let method = call.method();
        let reply = self.transport.call_background(&self.namespace, &call)?;
        Ok((method, reply))
    }
}

fn unexpected<T>(method: &'static str) -> CoreResult<T> {
    Err(BridgeError::UnexpectedReply { method }.into())
}

impl LocalDbApi for LocalDbProxy {
    fn get(&self, store: StoreName, id: &str) -> CoreResult<Record> {
        match self.call(DbCall::Get {
            store,
            id: id.to_string(),
        })? {
            (_, DbReply::Record(record)) => Ok(record),
            (method, _) => unexpected(method),
        }
    }

    fn get_all(&self, store: StoreName, options: GetAllOptions) -> CoreResult<Vec<Record>> {
        match self.call(DbCall::GetAll { store, options })? {
            (_, DbReply::Records(records)) => Ok(records),
            (method, _) => unexpected(method),
        }
    }

    fn get_by_ids(&self, store: StoreName, ids: &[String]) -> CoreResult<Vec<RecordPair>> {
        match self.call(DbCall::GetByIds {
            store,
            ids: ids.to_vec(),
        })? {
            (_, DbReply::Pairs(pairs)) => Ok(pairs),
            (method, _) => unexpected(method),
        }
    }

    fn count(&self, store: StoreName) -> CoreResult<usize> {
        match self.call(DbCall::Count { store })? {
            (_, DbReply::Count(count)) => Ok(count),
            (method, _) => unexpected(method),
        }
    }

    fn add(
        &self,
        store: StoreName,
        records: Vec<Record>,
        options: AddOptions,
    ) -> CoreResult<AddResult> {
        match self.call(DbCall::Add {
            store,
            records,
            options,
        })? {
            (_, DbReply::Added(result)) => Ok(result),
            (method, _) => unexpected(method),
        }
    }

    fn patch(&self, store: StoreName, ids: &[String], patch: &RecordPatch) -> CoreResult<()> {
        match self.call(DbCall::Patch {
            store,
            ids: ids.to_vec(),
            patch: patch.clone(),
        })? {
            (_, DbReply::Done) => Ok(()),
            (method, _) => unexpected(method),
        }
    }

    fn remove(&self, store: StoreName, ids: &[String]) -> CoreResult<()> {
        match self.call(DbCall::Remove {
            store,
            ids: ids.to_vec(),
        })? {
            (_, DbReply::Done) => Ok(()),
            (method, _) => unexpected(method),
        }
    }

    fn clear(&self, store: StoreName) -> CoreResult<()> {
        match self.call(DbCall::Clear { store })? {
            (_, DbReply::Done) => Ok(()),
            (method, _) => unexpected(method),
        }
    }

    fn get_all_cached(&self, key: AggregateKey) -> CoreResult<Vec<Record>> {
        match self.call(DbCall::GetAllCached { key })? {
            (_, DbReply::Records(records)) => Ok(records),
            (method, _) => unexpected(method),
        }
    }
}

impl std::fmt::Debug for LocalDbProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDbProxy")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Forwards every [`SimpleDbApi`] call to the owning process.
///
/// Like [`LocalDbProxy`], it keeps nothing locally; entity caching happens
/// in the owning process only.
#[derive(Clone)]
pub struct SimpleDbProxy {
    namespace: String,
    transport: Arc<dyn BackgroundTransport>,
}

impl SimpleDbProxy {
    /// Creates a proxy for the key-value store.
    #[must_use]
    pub fn new(transport: Arc<dyn BackgroundTransport>) -> Self {
        Self::with_namespace(SIMPLE_DB_NAMESPACE, transport)
    }

    /// Creates a proxy for the key-value store registered under `namespace`.
    #[must_use]
    pub fn with_namespace(
        namespace: impl Into<String>,
        transport: Arc<dyn BackgroundTransport>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            transport,
        }
    }

    /// Returns the namespace calls are sent to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn call_done(&self, call: DbCall) -> CoreResult<()> {
        let method = call.method();
        match self.transport.call_background(&self.namespace, &call)? {
            DbReply::Done => Ok(()),
            _ => unexpected(method),
        }
    }
}

impl SimpleDbApi for SimpleDbProxy {
    fn get_raw_data(&self, entity: &str) -> CoreResult<Option<Value>> {
        let call = DbCall::GetRawData {
            entity: entity.to_string(),
        };
        match self.transport.call_background(&self.namespace, &call)? {
            DbReply::RawData(data) => Ok(data),
            _ => unexpected(call.method()),
        }
    }

    fn set_raw_data(&self, entity: &str, data: Value) -> CoreResult<()> {
        self.call_done(DbCall::SetRawData {
            entity: entity.to_string(),
            data,
        })
    }

    fn clear_raw_data(&self, entity: &str) -> CoreResult<()> {
        self.call_done(DbCall::ClearRawData {
            entity: entity.to_string(),
        })
    }
}

impl std::fmt::Debug for SimpleDbProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleDbProxy")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
