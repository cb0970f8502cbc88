//! End-to-end scenarios run against a direct database and a proxied one.

use localdb_core::{
    AddOptions, CoreError, LocalDbApi, Record, RecordPair, RecordPatch, SimpleDb, SimpleDbApi,
    StoreName, TransactionOptions,
};
use localdb_testkit::prelude::*;
use serde_json::json;

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn wallet_lifecycle(api: &dyn LocalDbApi) {
    let w1 = Record::new("w1").with("name", json!("A"));
    api.add(StoreName::Wallet, vec![w1.clone()], AddOptions::default())
        .unwrap();
    assert_eq!(api.get(StoreName::Wallet, "w1").unwrap(), w1);

    api.patch(
        StoreName::Wallet,
        &ids(&["w1"]),
        &RecordPatch::new().set("name", json!("B")),
    )
    .unwrap();
    assert_eq!(
        api.get(StoreName::Wallet, "w1").unwrap().get("name"),
        Some(&json!("B"))
    );

    api.remove(StoreName::Wallet, &ids(&["w1"])).unwrap();
    let err = api.get(StoreName::Wallet, "w1").unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {err}");
}

fn ordered_lookup(api: &dyn LocalDbApi) {
    let a1 = account("a1", "w1");
    let a2 = account("a2", "w1");
    api.add(
        StoreName::Account,
        vec![a1.clone(), a2.clone()],
        AddOptions::default(),
    )
    .unwrap();

    let pairs = api
        .get_by_ids(StoreName::Account, &ids(&["a1", "missing", "a2"]))
        .unwrap();
    assert_eq!(
        pairs,
        vec![
            RecordPair::fresh(Some(a1)),
            RecordPair::fresh(None),
            RecordPair::fresh(Some(a2)),
        ]
    );
}

fn skip_twice(api: &dyn LocalDbApi) {
    let d1 = device("d1", "Ledger");
    let first = api
        .add(StoreName::Device, vec![d1.clone()], AddOptions::skip_if_exists())
        .unwrap();
    assert_eq!((first.added, first.skipped), (1, 0));
    let second = api
        .add(StoreName::Device, vec![d1.clone()], AddOptions::skip_if_exists())
        .unwrap();
    assert_eq!((second.added, second.skipped), (0, 1));
    assert_eq!(api.get(StoreName::Device, "d1").unwrap(), d1);
}

fn missing_ids_fail_whole_call(api: &dyn LocalDbApi) {
    api.add(
        StoreName::Wallet,
        vec![wallet("w2", "Keep")],
        AddOptions::default(),
    )
    .unwrap();

    let err = api
        .remove(StoreName::Wallet, &ids(&["w2", "ghost"]))
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(api.get(StoreName::Wallet, "w2").is_ok());

    let err = api
        .patch(
            StoreName::Wallet,
            &ids(&["ghost", "w2"]),
            &RecordPatch::new().set("name", json!("Changed")),
        )
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        api.get(StoreName::Wallet, "w2").unwrap().get("name"),
        Some(&json!("Keep"))
    );
}

fn run_all(api: &dyn LocalDbApi) {
    wallet_lifecycle(api);
    ordered_lookup(api);
    skip_twice(api);
    missing_ids_fail_whole_call(api);
}

#[test]
fn scenarios_direct() {
    with_temp_db(|db| run_all(db));
}

#[test]
fn scenarios_file_backed() {
    with_file_db(|db, _path| run_all(db));
}

#[test]
fn scenarios_through_proxy() {
    let (_db, proxy) = scenarios::proxied(TestDb::memory().db);
    run_all(&proxy);
}

#[test]
fn transaction_spanning_stores_commits_together() {
    let db = TestDb::memory();
    db.with_transaction(
        &TransactionOptions::new().stores([StoreName::Wallet, StoreName::Account]),
        |tx| {
            db.tx_add(tx, StoreName::Wallet, vec![wallet("w1", "Main")], AddOptions::default())?;
            db.tx_add(tx, StoreName::Account, vec![account("a1", "w1")], AddOptions::default())?;
            db.tx_patch(
                tx,
                StoreName::Wallet,
                &["w1"],
                &RecordPatch::new().set("accounts", json!(["a1"])),
            )?;
            Ok::<_, CoreError>(())
        },
    )
    .unwrap();

    let wallet = db.get(StoreName::Wallet, "w1").unwrap();
    assert_eq!(wallet.get("accounts"), Some(&json!(["a1"])));
    assert_eq!(db.count(StoreName::Account).unwrap(), 1);
}

#[test]
fn populated_pages_come_newest_first() {
    let db = scenarios::populated_db(2, 10);
    let page = db
        .get_all(
            StoreName::SignedMessage,
            localdb_core::GetAllOptions::page(3, 0),
        )
        .unwrap();
    let page_ids: Vec<&str> = page.iter().map(Record::id).collect();
    assert_eq!(page_ids, vec!["m9", "m8", "m7"]);
}

fn key_value_lifecycle(api: &dyn SimpleDbApi) {
    assert_eq!(api.get_raw_data("appStatus").unwrap(), None);
    api.set_raw_data("appStatus", json!({"launchTimes": 1}))
        .unwrap();
    api.set_raw_data("appStatus", json!({"launchTimes": 2}))
        .unwrap();
    assert_eq!(
        api.get_raw_data("appStatus").unwrap(),
        Some(json!({"launchTimes": 2}))
    );
    api.clear_raw_data("appStatus").unwrap();
    assert_eq!(api.get_raw_data("appStatus").unwrap(), None);
}

#[test]
fn key_value_direct_and_proxied() {
    for cached in [false, true] {
        let open = || {
            let db = SimpleDb::open_in_memory().unwrap();
            if cached {
                db.enable_cache("appStatus")
            } else {
                db
            }
        };
        key_value_lifecycle(&open());
        let (_db, proxy) = scenarios::proxied_simple(open());
        key_value_lifecycle(&proxy);
    }
}
