//! Transaction management.
//!
//! LocalDB transactions provide:
//! - **Atomicity**: all writes of one logical operation commit together or
//!   not at all
//! - **Isolation**: readers never observe a partially written transaction
//! - **Scoping**: a transaction is lent to one task and cannot be retained
//!   beyond it

mod manager;
mod scope;

pub use manager::TransactionManager;
pub use scope::{StoreHandle, Transaction, TransactionOptions};
