//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records, operation sequences and
//! pages that respect the database's invariants.

use localdb_core::{GetAllOptions, Record, RecordPatch, StoreName};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for generating record ids from a small pool, so generated
/// operations collide often.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    (0u8..16).prop_map(|n| format!("id-{n:02}"))
}

/// Strategy for generating field names other than `id`.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z]{0,9}")
        .expect("Invalid regex")
        .prop_filter("Field name must not be the id field", |s| s != "id")
}

/// Strategy for generating JSON field values.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[ -~]{0,24}".prop_map(Value::String),
        prop::collection::vec(any::<u32>(), 0..4).prop_map(|v| json!(v)),
    ]
}

/// Strategy for generating a record with the given id.
pub fn record_with_id(id: String) -> impl Strategy<Value = Record> {
    prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..5).prop_map(
        move |fields| {
            fields
                .into_iter()
                .fold(Record::new(id.clone()), |record, (name, value)| {
                    record.with(name, value)
                })
        },
    )
}

/// Strategy for generating a record with a pooled id.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    record_id_strategy().prop_flat_map(record_with_id)
}

/// Strategy for generating ordered records with distinct ids and
/// `createdAt` keys.
pub fn ordered_records_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_set(0u64..1_000_000, 0..max).prop_map(|keys| {
        keys.into_iter()
            .enumerate()
            .map(|(i, created_at)| {
                Record::new(format!("m{i:04}")).with("createdAt", json!(created_at))
            })
            .collect()
    })
}

/// Strategy for generating page options.
pub fn page_strategy() -> impl Strategy<Value = GetAllOptions> {
    (0usize..12, 0usize..12).prop_map(|(limit, offset)| GetAllOptions::page(limit, offset))
}

/// Strategy for generating a patch that never touches the id.
pub fn patch_strategy() -> impl Strategy<Value = RecordPatch> {
    (
        prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..3),
        prop::collection::vec(field_name_strategy(), 0..2),
    )
        .prop_map(|(set, unset)| {
            let patch = set
                .into_iter()
                .fold(RecordPatch::new(), |patch, (name, value)| patch.set(name, value));
            unset.into_iter().fold(patch, |patch, name| patch.unset(name))
        })
}

/// Strategy for generating one of the stores whose reads are cached.
pub fn hot_store_strategy() -> impl Strategy<Value = StoreName> {
    prop::sample::select(
        StoreName::ALL
            .iter()
            .copied()
            .filter(|store| store.is_hot())
            .collect::<Vec<_>>(),
    )
}

/// An operation against one store.
#[derive(Debug, Clone)]
pub enum DbOperation {
    /// Insert records, optionally skipping existing ids.
    Add {
        /// Records to insert.
        records: Vec<Record>,
        /// Whether existing ids are skipped.
        skip_if_exists: bool,
    },
    /// Patch existing records.
    Patch {
        /// Ids to patch.
        ids: Vec<String>,
        /// Patch to apply.
        patch: RecordPatch,
    },
    /// Delete records.
    Remove {
        /// Ids to delete.
        ids: Vec<String>,
    },
    /// Read one record.
    Get {
        /// Id to read.
        id: String,
    },
    /// Read every record.
    GetAll,
    /// Delete everything.
    Clear,
}

/// Strategy for generating operations.
pub fn db_operation_strategy() -> impl Strategy<Value = DbOperation> {
    let ids = || prop::collection::vec(record_id_strategy(), 1..4);
    prop_oneof![
        4 => (prop::collection::vec(record_strategy(), 1..4), any::<bool>())
            .prop_map(|(records, skip_if_exists)| DbOperation::Add { records, skip_if_exists }),
        2 => (ids(), patch_strategy()).prop_map(|(ids, patch)| DbOperation::Patch { ids, patch }),
        2 => ids().prop_map(|ids| DbOperation::Remove { ids }),
        3 => record_id_strategy().prop_map(|id| DbOperation::Get { id }),
        2 => Just(DbOperation::GetAll),
        1 => Just(DbOperation::Clear),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<DbOperation>> {
    prop::collection::vec(db_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
