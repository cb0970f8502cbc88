//! The collection agent's operation surface.
//!
//! [`LocalDbApi`] is implemented by the owning-process database and by any
//! proxy that forwards calls to it. Callers written against the trait cannot
//! tell which one they hold.

use crate::error::{CoreError, CoreResult};
use crate::registry::{AggregateKey, StoreName};
use localdb_storage::{Record, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Pagination for `get_all`.
///
/// Without a `limit` the whole store is returned unordered. With a `limit`,
/// stores that have an ordering index return the most recent records first,
/// skipping `offset` of them; stores without one fall back to a full
/// unordered scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAllOptions {
    /// Maximum number of records to return.
    pub limit: Option<usize>,
    /// Number of records to skip.
    pub offset: Option<usize>,
}

impl GetAllOptions {
    /// Requests one page of `limit` records starting at `offset`.
    #[must_use]
    pub const fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}

/// Options for `add`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOptions {
    /// Count records whose id already exists as skipped instead of failing.
    pub skip_if_exists: bool,
}

impl AddOptions {
    /// Options that skip existing ids.
    #[must_use]
    pub const fn skip_if_exists() -> Self {
        Self {
            skip_if_exists: true,
        }
    }
}

/// Outcome of an `add`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddResult {
    /// Records written.
    pub added: usize,
    /// Records skipped because their id existed.
    pub skipped: usize,
    /// Ids of the written records, in input order.
    pub added_ids: Vec<String>,
}

/// A looked-up record and the value it replaced, if tracked.
///
/// Plain reads never track a previous value, so `previous` is `None` for
/// them; a missing id yields a pair with both sides `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPair {
    /// The record, if it exists.
    pub record: Option<Record>,
    /// The prior value, if tracked.
    pub previous: Option<Record>,
}

impl RecordPair {
    /// A freshly read record with no prior value.
    #[must_use]
    pub fn fresh(record: Option<Record>) -> Self {
        Self {
            record,
            previous: None,
        }
    }
}

/// A serializable field-level update.
///
/// Updaters are closures in-process; across a process boundary an update
/// is described as data instead. Fields in `unset` are removed after `set`
/// is applied.
///
/// ```rust
/// use localdb_core::{Record, RecordPatch};
/// use serde_json::json;
///
/// let patch = RecordPatch::new().set("name", json!("B")).unset("draft");
/// let record = Record::new("w1").with("name", json!("A")).with("draft", json!(true));
/// let next = patch.apply(record).unwrap();
/// assert_eq!(next.get("name"), Some(&json!("B")));
/// assert!(next.get("draft").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    /// Fields to write.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set: Map<String, Value>,
    /// Fields to remove.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unset: Vec<String>,
}

impl RecordPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to write.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Adds a field to remove.
    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// Applies the patch to a record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the patch touches the `id` field.
    pub fn apply(&self, mut record: Record) -> CoreResult<Record> {
        if self.set.contains_key(ID_FIELD) || self.unset.iter().any(|f| f == ID_FIELD) {
            return Err(CoreError::invalid_record("a patch cannot change the record id"));
        }
        for (field, value) in &self.set {
            record.set(field.clone(), value.clone());
        }
        for field in &self.unset {
            record.remove(field);
        }
        Ok(record)
    }
}

/// The collection agent contract.
///
/// Every operation runs in its own transaction. The trait is object safe so
/// an in-process database and a cross-context proxy can be used
/// interchangeably behind `Arc<dyn LocalDbApi>`.
pub trait LocalDbApi: Send + Sync {
    /// Reads one record; a missing id is `NotFound`.
    fn get(&self, store: StoreName, id: &str) -> CoreResult<Record>;

    /// Reads every record, or one page of them.
    fn get_all(&self, store: StoreName, options: GetAllOptions) -> CoreResult<Vec<Record>>;

    /// Reads records by id, one pair per id in input order.
    fn get_by_ids(&self, store: StoreName, ids: &[String]) -> CoreResult<Vec<RecordPair>>;

    /// Counts the records of a store.
    fn count(&self, store: StoreName) -> CoreResult<usize>;

    /// Inserts records.
    fn add(&self, store: StoreName, records: Vec<Record>, options: AddOptions) -> CoreResult<AddResult>;

    /// Applies a patch to existing records; a missing id is `NotFound`.
    fn patch(&self, store: StoreName, ids: &[String], patch: &RecordPatch) -> CoreResult<()>;

    /// Deletes records; a missing id is `NotFound`.
    fn remove(&self, store: StoreName, ids: &[String]) -> CoreResult<()>;

    /// Deletes every record of a store.
    fn clear(&self, store: StoreName) -> CoreResult<()>;

    /// Reads a whole hot store through the aggregate cache.
    fn get_all_cached(&self, key: AggregateKey) -> CoreResult<Vec<Record>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_rejects_id_changes() {
        let record = Record::new("w1");
        assert!(RecordPatch::new().set("id", json!("w2")).apply(record.clone()).is_err());
        assert!(RecordPatch::new().unset("id").apply(record).is_err());
    }

    #[test]
    fn empty_patch_is_identity() {
        let record = Record::new("w1").with("name", json!("A"));
        assert_eq!(RecordPatch::new().apply(record.clone()).unwrap(), record);
    }

    #[test]
    fn options_use_camel_case_on_the_wire() {
        let encoded = serde_json::to_value(AddOptions::skip_if_exists()).unwrap();
        assert_eq!(encoded, json!({"skipIfExists": true}));
        let result = AddResult {
            added: 1,
            skipped: 0,
            added_ids: vec!["w1".into()],
        };
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({"added": 1, "skipped": 0, "addedIds": ["w1"]})
        );
    }

    #[test]
    fn page_sets_limit_and_offset() {
        let page = GetAllOptions::page(10, 20);
        assert_eq!(page.limit, Some(10));
        assert_eq!(page.offset, Some(20));
        assert_eq!(GetAllOptions::default().limit, None);
    }
}
