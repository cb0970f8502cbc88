//! Read commands: `get` and `dump`.

use super::{open, parse_store};
use localdb_core::GetAllOptions;
use std::path::Path;

/// Prints one record.
pub fn get(path: &Path, store: &str, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = open(path)?;
    let record = db.get(parse_store(store)?, id)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Prints every record of a store, or one page of them.
pub fn dump(
    path: &Path,
    store: &str,
    limit: Option<usize>,
    offset: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = open(path)?;
    let store = parse_store(store)?;
    if limit.is_some() && store.ordering_index().is_none() {
        tracing::warn!(store = %store, "store has no ordering index; dumping every record");
    }
    let records = db.get_all(store, GetAllOptions { limit, offset })?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    tracing::debug!(store = %store, count = records.len(), "dumped records");
    Ok(())
}
