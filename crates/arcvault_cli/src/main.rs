//! ArcVault CLI
//!
//! Command-line tools for ArcVault repositories.
//!
//! # Commands
//!
//! - `inspect` - Display collections, AUs and log sizes
//! - `verify` - Check every record of every log
//! - `dump` - Print record headers for debugging
//! - `cdx` - Look up captures of a URL as CDX lines
//! - `ingest` - Add a raw HTTP response from a file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ArcVault command-line repository tools.
#[derive(Parser)]
#[command(name = "arcvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the repository directory
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
    /// Display collections, AUs and log sizes
    Inspect {
        /// List the AUs of every collection
        #[arg(short, long)]
        aus: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check every record of every log
    Verify {
        /// Recompute payload digests of artifact records
        #[arg(short, long)]
        digests: bool,
    },

    /// Print record headers for debugging
    Dump {
        /// Only dump logs of this collection
        #[arg(short, long)]
        collection: Option<String>,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Look up captures of a URL as CDX lines
    Cdx {
        /// Collection to search
        collection: String,

        /// URL, or URL prefix with --prefix
        url: String,

        /// Match every URL starting with the given one
        #[arg(long)]
        prefix: bool,

        /// Order by distance from this 14-digit timestamp (prefixes allowed)
        #[arg(short, long)]
        at: Option<String>,

        /// Output format (cdx, cdxj, xml)
        #[arg(short, long, default_value = "cdx")]
        format: String,
    },

    /// Add a raw HTTP response from a file
    Ingest {
        /// Target collection
        collection: String,

        /// Target archival unit
        au: String,

        /// Captured URI
        uri: String,

        /// File holding the status line, headers and body
        file: PathBuf,

        /// Capture time as a 14-digit timestamp
        #[arg(short = 't', long)]
        capture_time: Option<String>,

        /// Commit the artifact after ingesting it
        #[arg(short, long)]
        commit: bool,
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
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { aus, format } => {
            let path = cli.path.ok_or("Repository path required for inspect")?;
            commands::inspect::run(&path, aus, &format)?;
        }
        Commands::Verify { digests } => {
            let path = cli.path.ok_or("Repository path required for verify")?;
            commands::verify::run(&path, digests)?;
        }
        Commands::Dump {
            collection,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Repository path required for dump")?;
            commands::dump::run(&path, collection.as_deref(), limit, &format)?;
        }
        Commands::Cdx {
            collection,
            url,
            prefix,
            at,
            format,
        } => {
            let path = cli.path.ok_or("Repository path required for cdx")?;
            let query = commands::cdx::CdxQuery {
                collection,
                url,
                prefix,
                at,
                format,
            };
            commands::cdx::run(&path, &query)?;
        }
        Commands::Ingest {
            collection,
            au,
            uri,
            file,
            capture_time,
            commit,
        } => {
            let path = cli.path.ok_or("Repository path required for ingest")?;
            let request = commands::ingest::IngestRequest {
                collection,
                au,
                uri,
                file,
                capture_time,
                commit,
            };
            commands::ingest::run(&path, &request)?;
        }
        Commands::Version => {
            println!("ArcVault CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
