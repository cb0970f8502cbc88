//! # LocalDB Testkit
//!
//! Test utilities for localdb.
//!
//! This crate provides:
//! - Test fixtures: temporary databases and record builders
//! - Property-based test generators using proptest
//! - Concurrency stress helpers that check cache coherence
//!
//! ## Usage
//!
//! ```rust
//! use localdb_testkit::prelude::*;
//! use localdb_core::{AddOptions, StoreName};
//!
//! with_temp_db(|db| {
//!     db.add(StoreName::Wallet, vec![wallet("w1", "Main")], AddOptions::default())
//!         .unwrap();
//!     assert_eq!(db.count(StoreName::Wallet).unwrap(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
