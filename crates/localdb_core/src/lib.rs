//! # LocalDB Core
//!
//! Transactional multi-store local database.
//!
//! This crate provides:
//! - The collection registry: every store, its schema and ordering index
//! - The transaction manager: one native transaction per logical operation,
//!   commit on success, abort on error
//! - The collection agent ([`LocalDb`]): the CRUD contract in a top-level
//!   and an in-transaction flavor
//! - A read-through cache for hot stores that stays coherent with writes
//! - A lightweight key-value store ([`SimpleDb`]) for per-entity documents
//!
//! Backends come from `localdb_storage`; callers in another execution
//! context reach a [`LocalDb`] through `localdb_bridge`, which implements
//! the same [`LocalDbApi`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod cache;
mod config;
mod db;
mod error;
mod registry;
mod simple;
mod stats;
mod transaction;

pub use api::{AddOptions, AddResult, GetAllOptions, LocalDbApi, RecordPair, RecordPatch};
pub use cache::DbCache;
pub use config::Config;
pub use db::LocalDb;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use registry::{AggregateKey, StoreName, CREATED_AT_INDEX};
pub use simple::{SimpleDb, SimpleDbApi, SIMPLE_DB_STORE};
pub use stats::{DbStats, StatsSnapshot};
pub use transaction::{StoreHandle, Transaction, TransactionManager, TransactionOptions};

pub use localdb_storage::Record;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
