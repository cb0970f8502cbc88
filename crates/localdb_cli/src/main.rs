//! LocalDB CLI
//!
//! Command-line tools for inspecting and editing a file-backed local
//! database.
//!
//! # Commands
//!
//! - `inspect` - List stores with their record counts
//! - `get` - Print one record
//! - `dump` - Print every record of a store, or one page of them
//! - `import` - Add records from a JSON file
//! - `remove` - Delete records by id
//! - `clear` - Delete every record of a store, or of every store

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LocalDB command-line database tools.
#[derive(Parser)]
#[command(name = "localdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stores with their record counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print one record as JSON
    Get {
        /// Store name, e.g. Wallet
        store: String,

        /// Record id
        id: String,
    },

    /// Print the records of a store as JSON
    Dump {
        /// Store name, e.g. SignedMessage
        store: String,

        /// Page size; ordered stores return the most recent records first
        #[arg(short, long)]
        limit: Option<usize>,

        /// Records to skip before the page
        #[arg(short, long)]
        offset: Option<usize>,
    },

    /// Add records from a JSON file holding an array of objects
    Import {
        /// Store name, e.g. Account
        store: String,

        /// JSON file to read
        file: PathBuf,

        /// Skip records whose id already exists
        #[arg(short, long)]
        skip_existing: bool,
    },

    /// Delete records by id
    Remove {
        /// Store name
        store: String,

        /// Ids to delete
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete every record of a store
    Clear {
        /// Store name; omit together with --all to clear every store
        store: Option<String>,

        /// Clear every store
        #[arg(short, long)]
        all: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Get { store, id } => {
            let path = cli.path.ok_or("Database path required for get")?;
            commands::records::get(&path, &store, &id)?;
        }
        Commands::Dump {
            store,
            limit,
            offset,
        } => {
            let path = cli.path.ok_or("Database path required for dump")?;
            commands::records::dump(&path, &store, limit, offset)?;
        }
        Commands::Import {
            store,
            file,
            skip_existing,
        } => {
            let path = cli.path.ok_or("Database path required for import")?;
            commands::import::run(&path, &store, &file, skip_existing)?;
        }
        Commands::Remove { store, ids } => {
            let path = cli.path.ok_or("Database path required for remove")?;
            commands::remove::remove(&path, &store, &ids)?;
        }
        Commands::Clear { store, all } => {
            let path = cli.path.ok_or("Database path required for clear")?;
            match (store, all) {
                (Some(store), false) => commands::remove::clear(&path, &store)?,
                (None, true) => commands::remove::reset(&path)?,
                _ => return Err("Pass either a store name or --all".into()),
            }
        }
        Commands::Version => {
            println!("LocalDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("LocalDB Core v{}", localdb_core::VERSION);
        }
    }

    Ok(())
}
