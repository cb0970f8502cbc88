//! The owning-process side of the bridge.

use crate::error::{BridgeResult, RemoteError};
use crate::protocol::{decode, encode, DbCall, DbReply, Request, Response};
use localdb_core::{CoreError, CoreResult, LocalDbApi, SimpleDbApi};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
enum Service {
    Records(Arc<dyn LocalDbApi>),
    KeyValue(Arc<dyn SimpleDbApi>),
}

/// Serves calls for every agent instance registered in the owning process.
///
/// Each instance is registered under a namespace: record stores with
/// [`BackgroundHost::register`], key-value stores with
/// [`BackgroundHost::register_simple`]. Calls are dispatched with an
/// exhaustive match on [`DbCall`], so adding an operation without handling
/// it here does not compile.
#[derive(Default)]
pub struct BackgroundHost {
    namespaces: RwLock<HashMap<String, Service>>,
}

impl BackgroundHost {
    /// Creates a host with no namespaces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record store, replacing anything under `namespace`.
    pub fn register(&self, namespace: impl Into<String>, api: Arc<dyn LocalDbApi>) {
        self.insert(namespace.into(), Service::Records(api));
    }

    /// Registers a key-value store, replacing anything under `namespace`.
    pub fn register_simple(&self, namespace: impl Into<String>, api: Arc<dyn SimpleDbApi>) {
        self.insert(namespace.into(), Service::KeyValue(api));
    }

    fn insert(&self, namespace: String, service: Service) {
        tracing::info!(namespace = %namespace, "registered background namespace");
        self.namespaces.write().insert(namespace, service);
    }

    /// Removes an agent instance. Returns whether it was registered.
    pub fn unregister(&self, namespace: &str) -> bool {
        self.namespaces.write().remove(namespace).is_some()
    }

    /// Returns the registered namespaces, sorted.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Runs one call against a namespace.
    ///
    /// # Errors
    ///
    /// Returns `TransportFailure` for an unknown namespace or a method the
    /// namespace's agent does not serve, otherwise the operation's own error.
    pub fn dispatch(&self, namespace: &str, call: DbCall) -> CoreResult<DbReply> {
        let service = self
            .namespaces
            .read()
            .get(namespace)
            .cloned()
            .ok_or_else(|| {
                CoreError::transport_failure(format!("unknown namespace: {namespace}"))
            })?;
        tracing::debug!(namespace, method = call.method(), "dispatching background call");

        match service {
            Service::Records(api) => dispatch_records(api.as_ref(), namespace, call),
            Service::KeyValue(api) => dispatch_key_value(api.as_ref(), namespace, call),
        }
    }

    /// Decodes a request frame, dispatches it and encodes the response.
    ///
    /// A frame that cannot be decoded is answered with a `TransportFailure`
    /// response carrying request id 0.
    ///
    /// # Errors
    ///
    /// Returns `Encode` if the response cannot be encoded.
    pub fn handle_frame(&self, frame: &[u8]) -> BridgeResult<Vec<u8>> {
        let response = match decode::<Request>(frame) {
            Ok(request) => {
                let result = self
                    .dispatch(&request.namespace, request.call)
                    .map_err(|err| RemoteError::from(&err));
                Response {
                    id: request.id,
                    result,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "rejecting undecodable request frame");
                Response {
                    id: 0,
                    result: Err(RemoteError::from(&CoreError::from(err))),
                }
            }
        };
        encode(&response)
    }
}

fn not_served(namespace: &str, method: &str) -> CoreError {
    CoreError::transport_failure(format!("namespace {namespace} does not serve {method}"))
}

fn dispatch_records(api: &dyn LocalDbApi, namespace: &str, call: DbCall) -> CoreResult<DbReply> {
    let method = call.method();
    match call {
        DbCall::Get { store, id } => api.get(store, &id).map(DbReply::Record),
        DbCall::GetAll { store, options } => api.get_all(store, options).map(DbReply::Records),
        DbCall::GetByIds { store, ids } => api.get_by_ids(store, &ids).map(DbReply::Pairs),
        DbCall::Count { store } => api.count(store).map(DbReply::Count),
        DbCall::Add {
            store,
            records,
            options,
        } => api.add(store, records, options).map(DbReply::Added),
        DbCall::Patch { store, ids, patch } => {
            api.patch(store, &ids, &patch).map(|()| DbReply::Done)
        }
        DbCall::Remove { store, ids } => api.remove(store, &ids).map(|()| DbReply::Done),
        DbCall::Clear { store } => api.clear(store).map(|()| DbReply::Done),
        DbCall::GetAllCached { key } => api.get_all_cached(key).map(DbReply::Records),
        DbCall::GetRawData { .. } | DbCall::SetRawData { .. } | DbCall::ClearRawData { .. } => {
            Err(not_served(namespace, method))
        }
    }
}

fn dispatch_key_value(api: &dyn SimpleDbApi, namespace: &str, call: DbCall) -> CoreResult<DbReply> {
    let method = call.method();
    match call {
        DbCall::GetRawData { entity } => api.get_raw_data(&entity).map(DbReply::RawData),
        DbCall::SetRawData { entity, data } => {
            api.set_raw_data(&entity, data).map(|()| DbReply::Done)
        }
        DbCall::ClearRawData { entity } => api.clear_raw_data(&entity).map(|()| DbReply::Done),
        DbCall::Get { .. }
        | DbCall::GetAll { .. }
        | DbCall::GetByIds { .. }
        | DbCall::Count { .. }
        | DbCall::Add { .. }
        | DbCall::Patch { .. }
        | DbCall::Remove { .. }
        | DbCall::Clear { .. }
        | DbCall::GetAllCached { .. } => Err(not_served(namespace, method)),
    }
}

impl std::fmt::Debug for BackgroundHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundHost")
            .field("namespaces", &self.namespaces())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LOCAL_DB_NAMESPACE, SIMPLE_DB_NAMESPACE};
    use localdb_core::{AddOptions, ErrorKind, LocalDb, Record, SimpleDb, StoreName};
    use serde_json::json;

    fn host() -> BackgroundHost {
        let host = BackgroundHost::new();
        host.register("localDb", Arc::new(LocalDb::open_in_memory().unwrap()));
        host
    }

    #[test]
    fn dispatch_runs_operation() {
        let host = host();
        let reply = host
            .dispatch(
                "localDb",
                DbCall::Add {
                    store: StoreName::Wallet,
                    records: vec![Record::new("w1")],
                    options: AddOptions::default(),
                },
            )
            .unwrap();
        assert!(matches!(reply, DbReply::Added(ref r) if r.added == 1));

        let reply = host
            .dispatch("localDb", DbCall::Count { store: StoreName::Wallet })
            .unwrap();
        assert_eq!(reply, DbReply::Count(1));
    }

    #[test]
    fn unknown_namespace_is_transport_failure() {
        let host = host();
        let err = host
            .dispatch("nope", DbCall::Count { store: StoreName::Wallet })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn handle_frame_answers_bad_frames() {
        let host = host();
        let reply: Response = decode(&host.handle_frame(&[0xff]).unwrap()).unwrap();
        assert_eq!(reply.id, 0);
        assert_eq!(reply.result.unwrap_err().kind, ErrorKind::TransportFailure);
    }

    #[test]
    fn handle_frame_carries_operation_errors() {
        let host = host();
        let request = Request {
            id: 9,
            namespace: "localDb".into(),
            call: DbCall::Get {
                store: StoreName::Wallet,
                id: "missing".into(),
            },
        };
        let reply: Response = decode(&host.handle_frame(&encode(&request).unwrap()).unwrap()).unwrap();
        assert_eq!(reply.id, 9);
        assert_eq!(reply.result.unwrap_err().kind, ErrorKind::NotFound);
    }

    #[test]
    fn unregister_removes_namespace() {
        let host = host();
        assert_eq!(host.namespaces(), vec!["localDb".to_string()]);
        assert!(host.unregister("localDb"));
        assert!(!host.unregister("localDb"));
        assert!(host.namespaces().is_empty());
    }

    #[test]
    fn key_value_namespace_serves_raw_data() {
        let host = host();
        host.register_simple(
            SIMPLE_DB_NAMESPACE,
            Arc::new(SimpleDb::open_in_memory().unwrap()),
        );
        assert_eq!(
            host.namespaces(),
            vec![LOCAL_DB_NAMESPACE.to_string(), SIMPLE_DB_NAMESPACE.to_string()]
        );

        let set = DbCall::SetRawData {
            entity: "appStatus".into(),
            data: json!({"launchTimes": 1}),
        };
        assert_eq!(host.dispatch(SIMPLE_DB_NAMESPACE, set).unwrap(), DbReply::Done);
        let reply = host
            .dispatch(
                SIMPLE_DB_NAMESPACE,
                DbCall::GetRawData {
                    entity: "appStatus".into(),
                },
            )
            .unwrap();
        assert_eq!(reply, DbReply::RawData(Some(json!({"launchTimes": 1}))));
    }

    #[test]
    fn calls_for_the_other_agent_kind_are_rejected() {
        let host = host();
        host.register_simple(
            SIMPLE_DB_NAMESPACE,
            Arc::new(SimpleDb::open_in_memory().unwrap()),
        );

        let err = host
            .dispatch(SIMPLE_DB_NAMESPACE, DbCall::Count { store: StoreName::Wallet })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(err.to_string().contains("count"));

        let err = host
            .dispatch(
                LOCAL_DB_NAMESPACE,
                DbCall::ClearRawData {
                    entity: "appStatus".into(),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }
}
