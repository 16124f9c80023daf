//! tablelog CLI
//!
//! Inspect and maintain table files without knowing their row type.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tablelog::{DynamicRow, Id, Row, Table, TableError};
use tracing_subscriber::{fmt, EnvFilter};

/// tablelog CLI
#[derive(Parser, Debug)]
#[command(name = "tablelog")]
#[command(about = "Inspect and maintain tablelog journal files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the header, row count, id range and blob usage
    Info {
        /// Journal file
        path: PathBuf,
    },

    /// Print rows as JSON lines
    Dump {
        /// Journal file
        path: PathBuf,

        /// Only rows with an id greater than this one
        #[arg(short, long)]
        after: Option<String>,

        /// Maximum number of rows to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print one row
    Get {
        /// Journal file
        path: PathBuf,

        /// Row id (11-character form)
        id: String,
    },

    /// Open the table and sweep orphaned blobs
    Gc {
        /// Journal file
        path: PathBuf,
    },

    /// Generate new ids
    NewId {
        /// How many ids to print
        #[arg(short, long, default_value = "1")]
        count: usize,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,tablelog=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args.command) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode, TableError> {
    match command {
        Commands::Info { path } => {
            let table = open_existing(&path)?;
            let schema = table.schema();

            println!("path:     {}", table.path().display());
            println!("version:  {}", schema.version);
            println!("columns:  {}", schema.columns.len());
            for column in &schema.columns {
                println!("  - {} ({})", column.name, column.column_type);
            }
            println!("rows:     {}", table.len());

            let mut rows = table.iter(Id::ZERO);
            if let Some(first) = rows.next() {
                let last = rows.last().unwrap_or_else(|| first.clone());
                println!("first id: {}", first.id());
                println!("last id:  {}", last.id());
            }
            println!("blobs:    {} ({})", table.live_blob_count(), table.blob_dir().display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Dump { path, after, limit } => {
            let table = open_existing(&path)?;
            let start = match after {
                Some(s) => s.parse()?,
                None => Id::ZERO,
            };

            for row in table.iter(start).take(limit.unwrap_or(usize::MAX)) {
                println!("{}", serde_json::to_string(&row)?);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Get { path, id } => {
            let table = open_existing(&path)?;
            match table.get(id.parse()?) {
                Some(row) => {
                    println!("{}", serde_json::to_string_pretty(&row)?);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("not found: {}", id);
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Gc { path } => {
            let table = open_existing(&path)?;
            let report = table.sweep_report();
            println!("rows:            {}", table.len());
            println!("live blobs:      {}", table.live_blob_count());
            println!("removed orphans: {}", report.removed_blobs);
            println!("removed staging: {}", report.removed_staging);
            println!("removed unknown: {}", report.removed_unknown);
            println!("failures:        {}", report.failures);
            Ok(ExitCode::SUCCESS)
        }

        Commands::NewId { count } => {
            for _ in 0..count {
                println!("{}", Id::generate());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Open a table that must already exist
///
/// Every command here only inspects, so a mistyped path is an error rather
/// than a new empty table with its directories.
fn open_existing(path: &Path) -> Result<Table<DynamicRow>, TableError> {
    if !path.is_file() {
        return Err(TableError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such table: {}", path.display()),
        )));
    }
    Table::open_path(path)
}
