//! CLI command implementations.

pub mod import;
pub mod inspect;
pub mod records;
pub mod remove;

use localdb_core::{Config, LocalDb, StoreName};
use std::path::Path;

/// Opens the database at `path`, refusing to create one.
pub fn open(path: &Path) -> Result<LocalDb, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No database found at {:?}", path).into());
    }
    Ok(LocalDb::open_path(path, Config::default())?)
}

/// Parses a store name given on the command line.
pub fn parse_store(name: &str) -> Result<StoreName, Box<dyn std::error::Error>> {
    Ok(name.parse::<StoreName>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_stores_only() {
        assert_eq!(parse_store("Wallet").unwrap(), StoreName::Wallet);
        assert!(parse_store("wallet").is_err());
        assert!(parse_store("Nope").is_err());
    }

    #[test]
    fn open_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open(&dir.path().join("missing")).is_err());
        assert!(open(dir.path()).is_ok());
    }
}
