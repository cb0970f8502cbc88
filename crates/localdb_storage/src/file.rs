//! File-based storage backend.
//!
//! Layout of a store directory:
//!
//! ```text
//! <dir>/
//! ├─ LOCK              # Advisory lock, one process at a time
//! └─ stores.cbor       # Snapshot of every store (schema + records)
//! ```

use crate::backend::{NativeTransaction, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::schema::{StoreSchema, TxMode};
use crate::tables::{CommitSink, TableSet, TableTransaction};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const SNAPSHOT_FILE: &str = "stores.cbor";
const SNAPSHOT_TEMP: &str = "stores.cbor.tmp";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    tables: &'a TableSet,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    tables: TableSet,
}

/// A persistent storage backend rooted in a directory.
///
/// All stores are kept in memory and written out as one CBOR snapshot on
/// every commit. A commit only becomes visible after its snapshot has been
/// synced and renamed into place, so a crash leaves either the old or the
/// new state on disk, never a mix.
///
/// # Durability
///
/// - The snapshot is written to a temporary file first
/// - `File::sync_all()` runs before the rename
/// - The directory is synced after the rename on Unix
///
/// # Locking
///
/// The backend holds an exclusive advisory lock on `LOCK` for its lifetime.
/// A second `open` on the same directory fails with `Locked`.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    tables: RwLock<TableSet>,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process holds the lock (`Locked`)
    /// - The snapshot cannot be decoded (`Corrupted`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let tables = load_snapshot(&path.join(SNAPSHOT_FILE))?;
        tracing::debug!(
            path = %path.display(),
            stores = tables.stores.len(),
            "opened file backend"
        );

        Ok(Self {
            path: path.to_path_buf(),
            tables: RwLock::new(tables),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory this backend lives in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl CommitSink for FileBackend {
    fn persist(&self, tables: &TableSet) -> StorageResult<()> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            tables,
        };
        let mut data = Vec::new();
        ciborium::into_writer(&snapshot, &mut data)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let temp_path = self.path.join(SNAPSHOT_TEMP);
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.path.join(SNAPSHOT_FILE))?;
        self.sync_directory()
    }
}

impl StorageBackend for FileBackend {
    fn store_names(&self) -> StorageResult<Vec<String>> {
        Ok(self.tables.read().stores.keys().cloned().collect())
    }

    fn create_store(&self, schema: &StoreSchema) -> StorageResult<()> {
        let mut guard = self.tables.write();
        let mut next = guard.clone();
        if next.create_store(schema) {
            self.persist(&next)?;
            *guard = next;
            tracing::debug!(store = %schema.name, "created store");
        }
        Ok(())
    }

    fn begin(&self, stores: &[&str], mode: TxMode) -> StorageResult<Box<dyn NativeTransaction + '_>> {
        let tx = TableTransaction::begin(&self.tables, Some(self as &dyn CommitSink), stores, mode)?;
        Ok(Box::new(tx))
    }
}

fn load_snapshot(path: &Path) -> StorageResult<TableSet> {
    if !path.exists() {
        return Ok(TableSet::default());
    }
    let data = fs::read(path)?;
    if data.is_empty() {
        return Ok(TableSet::default());
    }
    let snapshot: Snapshot =
        ciborium::from_reader(data.as_slice()).map_err(|e| StorageError::Corrupted(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StorageError::Corrupted(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    Ok(snapshot.tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("db");
        let backend = FileBackend::open(&path).unwrap();
        assert!(path.join(LOCK_FILE).exists());
        assert!(backend.store_names().unwrap().is_empty());
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _first = FileBackend::open(dir.path()).unwrap();
        assert!(matches!(
            FileBackend::open(dir.path()),
            Err(StorageError::Locked)
        ));
    }

    #[test]
    fn file_committed_records_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend
                .create_store(&StoreSchema::new("messages").with_index("createdAt"))
                .unwrap();
            let mut tx = backend.begin(&["messages"], TxMode::ReadWrite).unwrap();
            tx.put(
                "messages",
                Record::new("m1").with("createdAt", json!(5)).with("body", json!("hi")),
            )
            .unwrap();
            tx.commit().unwrap();
        }

        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.store_names().unwrap(), vec!["messages"]);
        let tx = backend.begin(&["messages"], TxMode::ReadOnly).unwrap();
        let record = tx.get("messages", "m1").unwrap().unwrap();
        assert_eq!(record.get("body"), Some(&json!("hi")));
        assert!(tx.has_index("messages", "createdAt").unwrap());
    }

    #[test]
    fn file_uncommitted_writes_are_not_persisted() {
        let dir = tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.create_store(&StoreSchema::new("a")).unwrap();
            let mut tx = backend.begin(&["a"], TxMode::ReadWrite).unwrap();
            tx.put("a", Record::new("1")).unwrap();
            tx.abort();
        }
        let backend = FileBackend::open(dir.path()).unwrap();
        let tx = backend.begin(&["a"], TxMode::ReadOnly).unwrap();
        assert_eq!(tx.count("a").unwrap(), 0);
    }

    #[test]
    fn file_corrupted_snapshot_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SNAPSHOT_FILE), [0xff, 0x00, 0x13]).unwrap();
        assert!(matches!(
            FileBackend::open(dir.path()),
            Err(StorageError::Corrupted(_))
        ));
    }
}
