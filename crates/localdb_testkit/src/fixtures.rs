//! Test fixtures and database helpers.
//!
//! Provides temporary databases, record builders for the declared stores and
//! a few pre-populated scenarios.

use localdb_core::{Config, LocalDb, Record};
use localdb_storage::InMemoryBackend;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A test database with automatic cleanup.
pub struct TestDb {
    /// The database instance.
    pub db: LocalDb,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
    config: Config,
}

impl TestDb {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self::memory_with(Config::default())
    }

    /// Creates a new in-memory test database with a custom config.
    pub fn memory_with(config: Config) -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        Self {
            db: LocalDb::open(backend, config.clone()).expect("Failed to open in-memory database"),
            temp_dir: None,
            config,
        }
    }

    /// Creates a new file-based test database.
    pub fn file() -> Self {
        Self::file_with(Config::default())
    }

    /// Creates a new file-based test database with a custom config.
    pub fn file_with(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = LocalDb::open_path(temp_dir.path(), config.clone())
            .expect("Failed to open file database");
        Self {
            db,
            temp_dir: Some(temp_dir),
            config,
        }
    }

    /// Returns the database directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }

    /// Closes and reopens a file-based database from disk.
    ///
    /// # Panics
    ///
    /// Panics if the database is in-memory.
    pub fn reopen(self) -> Self {
        let Self {
            db,
            temp_dir,
            config,
        } = self;
        let temp_dir = temp_dir.expect("Only file databases can be reopened");
        drop(db);
        let db = LocalDb::open_path(temp_dir.path(), config.clone())
            .expect("Failed to reopen file database");
        Self {
            db,
            temp_dir: Some(temp_dir),
            config,
        }
    }
}

impl std::ops::Deref for TestDb {
    type Target = LocalDb;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&LocalDb) -> R,
{
    let test_db = TestDb::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&LocalDb, &Path) -> R,
{
    let test_db = TestDb::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Returns a fresh random record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Builds a wallet record.
pub fn wallet(id: &str, name: &str) -> Record {
    Record::new(id)
        .with("name", json!(name))
        .with("type", json!("hd"))
        .with("accounts", json!([]))
}

/// Builds an account record belonging to a wallet.
pub fn account(id: &str, wallet_id: &str) -> Record {
    Record::new(id)
        .with("walletId", json!(wallet_id))
        .with("address", json!(format!("0x{}", id.replace('-', ""))))
}

/// Builds a paired device record.
pub fn device(id: &str, name: &str) -> Record {
    Record::new(id)
        .with("name", json!(name))
        .with("connectId", json!(new_id()))
}

/// Builds a signed message record created at `created_at` (milliseconds).
pub fn signed_message(id: &str, created_at: u64) -> Record {
    Record::new(id)
        .with("createdAt", json!(created_at))
        .with("message", json!(format!("message {id}")))
}

/// Builds a connected site record created at `created_at` (milliseconds).
pub fn connected_site(id: &str, url: &str, created_at: u64) -> Record {
    Record::new(id)
        .with("createdAt", json!(created_at))
        .with("url", json!(url))
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use localdb_bridge::{
        BackgroundHost, LocalDbProxy, LoopbackTransport, SimpleDbProxy, LOCAL_DB_NAMESPACE,
        SIMPLE_DB_NAMESPACE,
    };
    use localdb_core::{AddOptions, SimpleDb, StoreName};

    /// Creates a database with `wallets` wallets, one account each, and
    /// `messages` signed messages created one second apart.
    pub fn populated_db(wallets: usize, messages: usize) -> TestDb {
        let test_db = TestDb::memory();
        let wallet_records: Vec<Record> = (0..wallets)
            .map(|i| wallet(&format!("w{i}"), &format!("Wallet {i}")))
            .collect();
        let account_records: Vec<Record> = (0..wallets)
            .map(|i| account(&format!("a{i}"), &format!("w{i}")))
            .collect();
        let message_records: Vec<Record> = (0..messages)
            .map(|i| signed_message(&format!("m{i}"), 1_000 * (i as u64 + 1)))
            .collect();

        for (store, records) in [
            (StoreName::Wallet, wallet_records),
            (StoreName::Account, account_records),
            (StoreName::SignedMessage, message_records),
        ] {
            test_db
                .add(store, records, AddOptions::default())
                .expect("Failed to populate store");
        }
        test_db
    }

    /// Serves `db` from a loopback host and returns a proxy to it.
    pub fn proxied(db: LocalDb) -> (Arc<LocalDb>, LocalDbProxy) {
        let db = Arc::new(db);
        let host = Arc::new(BackgroundHost::new());
        host.register(LOCAL_DB_NAMESPACE, db.clone());
        let proxy = LocalDbProxy::new(Arc::new(LoopbackTransport::loopback(host)));
        (db, proxy)
    }

    /// Serves `db` as the key-value store of a loopback host and returns a
    /// proxy to it.
    pub fn proxied_simple(db: SimpleDb) -> (Arc<SimpleDb>, SimpleDbProxy) {
        let db = Arc::new(db);
        let host = Arc::new(BackgroundHost::new());
        host.register_simple(SIMPLE_DB_NAMESPACE, db.clone());
        let proxy = SimpleDbProxy::new(Arc::new(LoopbackTransport::loopback(host)));
        (db, proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdb_core::{AddOptions, StoreName};

    #[test]
    fn test_memory_database() {
        let test_db = TestDb::memory();
        assert!(test_db.path().is_none());
        assert_eq!(test_db.count(StoreName::Wallet).unwrap(), 0);
    }

    #[test]
    fn test_file_database_reopens() {
        let test_db = TestDb::file();
        test_db
            .add(StoreName::Wallet, vec![wallet("w1", "Main")], AddOptions::default())
            .unwrap();
        let test_db = test_db.reopen();
        assert_eq!(test_db.get(StoreName::Wallet, "w1").unwrap().id(), "w1");
    }

    #[test]
    fn test_populated_scenario() {
        let test_db = scenarios::populated_db(3, 5);
        assert_eq!(test_db.count(StoreName::Wallet).unwrap(), 3);
        assert_eq!(test_db.count(StoreName::Account).unwrap(), 3);
        assert_eq!(test_db.count(StoreName::SignedMessage).unwrap(), 5);
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
