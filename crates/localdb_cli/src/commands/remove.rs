//! Destructive commands: `remove` and `clear`.

use super::{open, parse_store};
use std::path::Path;

/// Deletes records by id. Fails without deleting anything if an id is
/// missing.
pub fn remove(path: &Path, store: &str, ids: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let db = open(path)?;
    let store = parse_store(store)?;
    db.remove(store, ids)?;
    println!("Removed {} record(s) from {}", ids.len(), store);
    Ok(())
}

/// Deletes every record of one store.
pub fn clear(path: &Path, store: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = open(path)?;
    let store = parse_store(store)?;
    let before = db.count(store)?;
    db.clear(store)?;
    println!("Cleared {} record(s) from {}", before, store);
    Ok(())
}

/// Deletes every record of every store.
pub fn reset(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = open(path)?;
    db.reset()?;
    println!("Cleared every store");
    Ok(())
}
