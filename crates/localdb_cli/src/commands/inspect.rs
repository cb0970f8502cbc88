//! Inspect command implementation.

use super::open;
use localdb_core::StoreName;
use serde::Serialize;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// Total number of records.
    pub total_records: usize,
    /// Per-store details.
    pub stores: Vec<StoreInfo>,
}

/// Details of a single store.
#[derive(Debug, Serialize)]
pub struct StoreInfo {
    /// Store name.
    pub name: &'static str,
    /// Number of records.
    pub records: usize,
    /// Whether single-record reads are cached.
    pub cached: bool,
    /// Field paginated dumps are ordered by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered_by: Option<&'static str>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = open(path)?;

    let stores = StoreName::ALL
        .iter()
        .map(|&store| {
            Ok(StoreInfo {
                name: store.as_str(),
                records: db.count(store)?,
                cached: store.is_hot(),
                ordered_by: store.ordering_index(),
            })
        })
        .collect::<Result<Vec<_>, localdb_core::CoreError>>()?;

    let result = InspectResult {
        path: path.display().to_string(),
        total_records: stores.iter().map(|s| s.records).sum(),
        stores,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Database: {}", result.path);
    println!("Records:  {}", result.total_records);
    println!();
    println!("{:<20} {:>8}  {:<6} {}", "STORE", "RECORDS", "CACHED", "ORDERED BY");
    for store in &result.stores {
        println!(
            "{:<20} {:>8}  {:<6} {}",
            store.name,
            store.records,
            if store.cached { "yes" } else { "no" },
            store.ordered_by.unwrap_or("-")
        );
    }
}
