//! End-to-end tests: caller-side proxy against an owning-process database.

use localdb_bridge::{
    BackgroundHost, BackgroundTransport, LocalDbProxy, LoopbackTransport, SimpleDbProxy,
    ThreadTransport, LOCAL_DB_NAMESPACE, SIMPLE_DB_NAMESPACE,
};
use localdb_core::{
    AddOptions, AggregateKey, Config, CoreError, ErrorKind, GetAllOptions, LocalDb, LocalDbApi,
    Record, RecordPatch, SimpleDb, SimpleDbApi, StoreName,
};
use localdb_storage::{InMemoryBackend, StorageBackend};
use serde_json::json;
use std::sync::Arc;

fn wallet(id: &str, name: &str) -> Record {
    Record::new(id).with("name", json!(name))
}

fn message(id: &str, created_at: u64) -> Record {
    Record::new(id)
        .with("createdAt", json!(created_at))
        .with("message", json!(format!("msg {id}")))
}

fn ids(records: &[Record]) -> Vec<String> {
    let mut ids: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
    ids.sort();
    ids
}

fn loopback() -> (Arc<LocalDb>, LocalDbProxy) {
    let db = Arc::new(LocalDb::open_in_memory().unwrap());
    let host = Arc::new(BackgroundHost::new());
    host.register(LOCAL_DB_NAMESPACE, db.clone());
    let proxy = LocalDbProxy::new(Arc::new(LoopbackTransport::loopback(host)));
    (db, proxy)
}

/// Runs the same script against any implementation and records what it saw.
fn script(api: &dyn LocalDbApi) -> Vec<String> {
    let mut seen = Vec::new();

    let added = api
        .add(
            StoreName::Wallet,
            vec![wallet("w1", "Main"), wallet("w2", "Spare")],
            AddOptions::default(),
        )
        .unwrap();
    seen.push(format!("added {} skipped {}", added.added, added.skipped));

    let again = api
        .add(
            StoreName::Wallet,
            vec![wallet("w1", "Main"), wallet("w3", "New")],
            AddOptions::skip_if_exists(),
        )
        .unwrap();
    seen.push(format!("added {:?} skipped {}", again.added_ids, again.skipped));

    api.patch(
        StoreName::Wallet,
        &["w2".to_string()],
        &RecordPatch::new().set("name", json!("Renamed")),
    )
    .unwrap();
    seen.push(format!("{}", api.get(StoreName::Wallet, "w2").unwrap().get("name").unwrap()));

    let pairs = api
        .get_by_ids(StoreName::Wallet, &["w3".to_string(), "nope".to_string()])
        .unwrap();
    seen.push(format!(
        "pairs {:?}",
        pairs
            .iter()
            .map(|p| p.record.as_ref().map(|r| r.id().to_string()))
            .collect::<Vec<_>>()
    ));

    api.remove(StoreName::Wallet, &["w1".to_string()]).unwrap();
    seen.push(format!("count {}", api.count(StoreName::Wallet).unwrap()));
    seen.push(format!("all {:?}", ids(&api.get_all_cached(AggregateKey::AllWallets).unwrap())));

    api.clear(StoreName::Wallet).unwrap();
    seen.push(format!("cleared {}", api.count(StoreName::Wallet).unwrap()));
    seen
}

#[test]
fn proxy_matches_direct_calls() {
    let direct = LocalDb::open_in_memory().unwrap();
    let (_db, proxy) = loopback();
    assert_eq!(script(&direct), script(&proxy));
}

#[test]
fn proxy_writes_are_visible_in_owning_process() {
    let (db, proxy) = loopback();
    proxy
        .add(StoreName::Account, vec![Record::new("a1")], AddOptions::default())
        .unwrap();
    assert_eq!(db.get(StoreName::Account, "a1").unwrap().id(), "a1");
}

#[test]
fn errors_keep_their_variant() {
    let (_db, proxy) = loopback();

    let err = proxy.get(StoreName::Wallet, "missing").unwrap_err();
    assert!(matches!(err, CoreError::NotFound { ref store, ref id } if store == "Wallet" && id == "missing"));

    proxy
        .add(StoreName::Wallet, vec![wallet("w1", "A")], AddOptions::default())
        .unwrap();
    let err = proxy
        .add(StoreName::Wallet, vec![wallet("w1", "A")], AddOptions::default())
        .unwrap_err();
    assert!(matches!(err, CoreError::RecordExists { ref id, .. } if id == "w1"));

    let err = proxy
        .patch(
            StoreName::Wallet,
            &["w1".to_string()],
            &RecordPatch::new().set("id", json!("w9")),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRecord);

    let err = proxy
        .remove(StoreName::Wallet, &["ghost".to_string()])
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn pagination_passes_through() {
    let (_db, proxy) = loopback();
    let messages: Vec<Record> = (1..=5).map(|i| message(&format!("m{i}"), i * 100)).collect();
    proxy
        .add(StoreName::SignedMessage, messages, AddOptions::default())
        .unwrap();

    let page = proxy
        .get_all(StoreName::SignedMessage, GetAllOptions::page(2, 1))
        .unwrap();
    let page_ids: Vec<&str> = page.iter().map(Record::id).collect();
    assert_eq!(page_ids, vec!["m4", "m3"]);
}

#[test]
fn namespaces_are_independent() {
    let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
    let main = Arc::new(LocalDb::open(backend.clone(), Config::default()).unwrap());
    let simple = Arc::new(SimpleDb::open(backend).unwrap().enable_cache("appStatus"));
    let archive = Arc::new(LocalDb::open_in_memory().unwrap());
    let host = Arc::new(BackgroundHost::new());
    host.register(LOCAL_DB_NAMESPACE, main.clone());
    host.register("archiveDb", archive.clone());
    host.register_simple(SIMPLE_DB_NAMESPACE, simple.clone());
    let transport: Arc<dyn BackgroundTransport> = Arc::new(LoopbackTransport::loopback(host));

    let main_proxy = LocalDbProxy::new(transport.clone());
    let archive_proxy = LocalDbProxy::with_namespace("archiveDb", transport.clone());
    let simple_proxy = SimpleDbProxy::new(transport.clone());

    archive_proxy
        .add(StoreName::Context, vec![Record::new("ctx")], AddOptions::default())
        .unwrap();
    assert_eq!(archive.count(StoreName::Context).unwrap(), 1);
    assert_eq!(main_proxy.count(StoreName::Context).unwrap(), 0);

    simple_proxy
        .set_raw_data("appStatus", json!({"launchTimes": 1}))
        .unwrap();
    assert_eq!(
        simple.get_raw_data("appStatus").unwrap(),
        Some(json!({"launchTimes": 1}))
    );
    simple.set_raw_data("appStatus", json!({"launchTimes": 2})).unwrap();
    assert_eq!(
        simple_proxy.get_raw_data("appStatus").unwrap(),
        Some(json!({"launchTimes": 2}))
    );
    simple_proxy.clear_raw_data("appStatus").unwrap();
    assert_eq!(simple_proxy.get_raw_data("appStatus").unwrap(), None);
    assert_eq!(main_proxy.count(StoreName::Context).unwrap(), 0);

    let misrouted = LocalDbProxy::with_namespace(SIMPLE_DB_NAMESPACE, transport.clone());
    let err = misrouted.count(StoreName::Context).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);

    let unknown = LocalDbProxy::with_namespace("nowhere", transport);
    let err = unknown.count(StoreName::Context).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
}

#[test]
fn key_value_errors_keep_their_variant() {
    let host = Arc::new(BackgroundHost::new());
    host.register_simple(SIMPLE_DB_NAMESPACE, Arc::new(SimpleDb::open_in_memory().unwrap()));
    let proxy = SimpleDbProxy::new(Arc::new(ThreadTransport::spawn(host).unwrap()));

    let err = proxy.set_raw_data("", json!(1)).unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation { .. }), "got {err}");
    proxy.set_raw_data("feeInfo", json!([1, 2, 3])).unwrap();
    assert_eq!(proxy.get_raw_data("feeInfo").unwrap(), Some(json!([1, 2, 3])));
}

#[test]
fn thread_host_serves_concurrent_callers() {
    let db = Arc::new(LocalDb::open_in_memory().unwrap());
    let host = Arc::new(BackgroundHost::new());
    host.register(LOCAL_DB_NAMESPACE, db.clone());
    let transport: Arc<dyn BackgroundTransport> =
        Arc::new(ThreadTransport::spawn(host).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let proxy = LocalDbProxy::new(transport.clone());
            std::thread::spawn(move || {
                for i in 0..10 {
                    proxy
                        .add(
                            StoreName::Address,
                            vec![Record::new(format!("addr-{worker}-{i}"))],
                            AddOptions::default(),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.count(StoreName::Address).unwrap(), 40);
}

#[test]
fn file_backed_host_persists_proxy_writes() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Arc::new(LocalDb::open_path(dir.path(), Default::default()).unwrap());
        let host = Arc::new(BackgroundHost::new());
        host.register(LOCAL_DB_NAMESPACE, db);
        let proxy = LocalDbProxy::new(Arc::new(LoopbackTransport::loopback(host)));
        proxy
            .add(StoreName::Device, vec![Record::new("d1")], AddOptions::default())
            .unwrap();
    }
    let reopened = LocalDb::open_path(dir.path(), Default::default()).unwrap();
    assert_eq!(reopened.get(StoreName::Device, "d1").unwrap().id(), "d1");
}
