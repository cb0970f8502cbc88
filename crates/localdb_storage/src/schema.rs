//! Store schemas and transaction modes.

use crate::record::ID_FIELD;
use serde::{Deserialize, Serialize};

/// Declares a store: its name, key path and ordered indexes.
///
/// The key path is always the record `id`; indexes name record fields whose
/// values can be scanned in order with a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSchema {
    /// Store name.
    pub name: String,
    /// Field holding the primary key.
    pub key_path: String,
    /// Indexed fields.
    pub indexes: Vec<String>,
}

impl StoreSchema {
    /// Creates a schema keyed by `id` with no indexes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: ID_FIELD.to_string(),
            indexes: Vec::new(),
        }
    }

    /// Adds an ordered index on a field.
    #[must_use]
    pub fn with_index(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.indexes.contains(&field) {
            self.indexes.push(field);
        }
        self
    }

    /// Returns whether the schema declares the index.
    #[must_use]
    pub fn has_index(&self, field: &str) -> bool {
        self.indexes.iter().any(|i| i == field)
    }
}

/// Mode a native transaction is opened in. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxMode {
    /// Only reads are allowed.
    ReadOnly,
    /// Reads and writes are allowed.
    ReadWrite,
}

impl TxMode {
    /// Returns true for read-only transactions.
    #[must_use]
    pub fn is_read_only(self) -> bool {
        self == TxMode::ReadOnly
    }
}

/// Direction of an index cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorDirection {
    /// Ascending by index key.
    Next,
    /// Descending by index key.
    Prev,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_defaults_to_id_key() {
        let schema = StoreSchema::new("wallets");
        assert_eq!(schema.key_path, "id");
        assert!(schema.indexes.is_empty());
    }

    #[test]
    fn schema_index_is_deduplicated() {
        let schema = StoreSchema::new("messages")
            .with_index("createdAt")
            .with_index("createdAt");
        assert_eq!(schema.indexes, vec!["createdAt".to_string()]);
        assert!(schema.has_index("createdAt"));
        assert!(!schema.has_index("updatedAt"));
    }
}
