//! # LocalDB Storage
//!
//! Backend adapter SPI and storage engines for LocalDB.
//!
//! This crate is the lowest layer of LocalDB. A backend owns a set of named
//! stores of [`Record`]s and hands out native transactions over them. It
//! knows nothing about collections, caching or where calls come from.
//!
//! ## Design Principles
//!
//! - Every store is keyed by the record `id`
//! - A native transaction spans a fixed set of stores and a fixed mode
//! - Writes are buffered and become visible all at once on commit
//! - Dropping a transaction without committing discards its writes
//! - Backends must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and platforms without persistence
//! - [`FileBackend`] - For persistent storage in a directory
//!
//! ## Example
//!
//! ```rust
//! use localdb_storage::{InMemoryBackend, Record, StorageBackend, StoreSchema, TxMode};
//!
//! let backend = InMemoryBackend::new();
//! backend.create_store(&StoreSchema::new("devices")).unwrap();
//!
//! let mut tx = backend.begin(&["devices"], TxMode::ReadWrite).unwrap();
//! tx.add("devices", Record::new("d1")).unwrap();
//! tx.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod record;
mod schema;
mod tables;

pub use backend::{Cursor, NativeTransaction, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use record::{compare_index_keys, is_valid_index_key, Record, ID_FIELD};
pub use schema::{CursorDirection, StoreSchema, TxMode};
