//! Import command implementation.

use super::{open, parse_store};
use localdb_core::{AddOptions, Record};
use std::path::Path;

/// Adds the records of a JSON array file to a store.
pub fn run(
    path: &Path,
    store: &str,
    file: &Path,
    skip_existing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = parse_store(store)?;
    let records = load_records(file)?;
    let db = open(path)?;

    let options = if skip_existing {
        AddOptions::skip_if_exists()
    } else {
        AddOptions::default()
    };
    let result = db.add(store, records, options)?;
    tracing::info!(store = %store, added = result.added, skipped = result.skipped, "import complete");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Reads a JSON array of records.
pub fn load_records(file: &Path) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(file)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&contents)?;
    let records = values
        .into_iter()
        .map(Record::from_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}
