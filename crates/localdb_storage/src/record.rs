//! The record type stored by every backend.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Name of the key field every record carries.
pub const ID_FIELD: &str = "id";

/// A free-form object with a mandatory string `id`.
///
/// Records are opaque to the engine beyond their id: the remaining fields
/// are whatever the owning feature stores. The id is fixed when the record
/// is constructed; [`Record::set`] and [`Record::remove`] refuse to touch it.
///
/// # Example
///
/// ```rust
/// use localdb_storage::Record;
/// use serde_json::json;
///
/// let wallet = Record::new("w1").with("name", json!("Main"));
/// assert_eq!(wallet.id(), "w1");
/// assert_eq!(wallet.get("name"), Some(&json!("Main")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Creates a record holding only its id.
    pub fn new(id: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
        Self { fields }
    }

    /// Builds a record from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the value is not an object or lacks a
    /// non-empty string `id`.
    pub fn from_value(value: Value) -> StorageResult<Self> {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            other => Err(StorageError::invalid_record(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// Builds a record from an object map.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the map lacks a non-empty string `id`.
    pub fn from_map(fields: Map<String, Value>) -> StorageResult<Self> {
        match fields.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Ok(Self { fields }),
            Some(Value::String(_)) => Err(StorageError::invalid_record("record id is empty")),
            Some(other) => Err(StorageError::invalid_record(format!(
                "record id must be a string, got {other}"
            ))),
            None => Err(StorageError::invalid_record("record has no id field")),
        }
    }

    /// Returns the record id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.fields
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field and returns the record, builder style.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field. Returns `false` (and changes nothing) for `id`.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> bool {
        let field = field.into();
        if field == ID_FIELD {
            return false;
        }
        self.fields.insert(field, value.into());
        true
    }

    /// Removes a field. `id` cannot be removed.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return None;
        }
        self.fields.remove(field)
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consumes the record and returns it as a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = StorageError;

    fn try_from(fields: Map<String, Value>) -> StorageResult<Self> {
        Self::from_map(fields)
    }
}

impl From<Record> for Map<String, Value> {
    fn from(record: Record) -> Self {
        record.fields
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

/// Orders two index keys the way an ordered store index does.
///
/// Numbers sort before strings, strings before arrays; arrays compare
/// element-wise and then by length. Returns `None` when either value is not
/// a valid key (null, bool, object, or an array containing one of those);
/// such records are left out of index scans.
#[must_use]
pub fn compare_index_keys(a: &Value, b: &Value) -> Option<Ordering> {
    let (rank_a, rank_b) = (key_rank(a)?, key_rank(b)?);
    if rank_a != rank_b {
        return Some(rank_a.cmp(&rank_b));
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64()?, y.as_f64()?);
            Some(x.partial_cmp(&y).unwrap_or(Ordering::Equal))
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                match compare_index_keys(ex, ey)? {
                    Ordering::Equal => continue,
                    ord => return Some(ord),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => None,
    }
}

/// Returns whether a value can be used as an index key.
#[must_use]
pub fn is_valid_index_key(value: &Value) -> bool {
    key_rank(value).is_some()
}

fn key_rank(value: &Value) -> Option<u8> {
    match value {
        Value::Number(_) => Some(0),
        Value::String(_) => Some(1),
        Value::Array(items) if items.iter().all(is_valid_index_key) => Some(2),
        _ => None,
    }
}
