//! TZCache CLI
//!
//! Command-line tools for a TZCache store.
//!
//! # Commands
//!
//! - `bootstrap` - Replace the store with a bulk dataset
//! - `sync` - Run one pull cycle against a primary
//! - `watch` - Keep pulling from a primary on a timer
//! - `get`, `find`, `aliases`, `token` - Read the store
//! - `apply-diff` - Apply an administrative diff batch
//! - `changes` - Show the change list this store would serve as a primary
//! - `inspect` - Display store statistics
//! - `compact` - Reclaim space held by dead records

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// TZCache timezone store tools.
#[derive(Parser)]
#[command(name = "tzcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Storage engine
    #[arg(global = true, short, long, value_enum, default_value = "log")]
    backend: BackendKind,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Storage engine selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Append-only log files
    Log,
    /// A single SQLite database file
    Sqlite,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the store with a bulk dataset directory
    Bootstrap {
        /// Dataset root (holds zoneinfo/, aliases.txt, version.txt)
        dataset: PathBuf,
    },

    /// Run one sync cycle against a primary
    Sync {
        #[command(flatten)]
        primary: commands::sync::PrimaryArgs,
    },

    /// Keep the store in sync with a primary
    Watch {
        #[command(flatten)]
        primary: commands::sync::PrimaryArgs,

        /// Seconds between successful cycles
        #[arg(short, long, default_value = "3600")]
        interval: u64,

        /// Stop after this many cycles
        #[arg(short, long)]
        cycles: Option<u64>,
    },

    /// Print a timezone definition
    Get {
        /// Timezone id
        tzid: String,

        /// Print only the VCALENDAR body
        #[arg(long)]
        body: bool,
    },

    /// Find timezone ids by substring of their id or an alias
    Find {
        /// Case-sensitive substring
        pattern: String,
    },

    /// Print the alias report, or the targets of one alias
    Aliases {
        /// Alias id
        alias: Option<String>,
    },

    /// Print the sync token
    Token,

    /// Apply a diff batch from a JSON file
    ApplyDiff {
        /// File holding {"dtstamp": ..., "entries": [...]}
        file: PathBuf,
    },

    /// Show the change list this store would serve as a primary
    Changes {
        /// Only entries changed after this dtstamp
        #[arg(short, long)]
        since: Option<String>,
    },

    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Reclaim space held by overwritten and deleted records
    Compact,

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

    let target = || {
        cli.path
            .clone()
            .map(|path| commands::StoreTarget::new(path, cli.backend))
            .ok_or("Store path required (--path)")
    };

    match cli.command {
        Commands::Bootstrap { ref dataset } => {
            commands::bootstrap::run(&target()?, dataset)?;
        }
        Commands::Sync { ref primary } => {
            commands::sync::run_once(&target()?, primary)?;
        }
        Commands::Watch {
            ref primary,
            interval,
            cycles,
        } => {
            commands::sync::watch(&target()?, primary, interval, cycles)?;
        }
        Commands::Get { ref tzid, body } => {
            commands::query::get(&target()?, tzid, body)?;
        }
        Commands::Find { ref pattern } => {
            commands::query::find(&target()?, pattern)?;
        }
        Commands::Aliases { ref alias } => {
            commands::query::aliases(&target()?, alias.as_deref())?;
        }
        Commands::Token => {
            commands::query::token(&target()?)?;
        }
        Commands::ApplyDiff { ref file } => {
            commands::diff::run(&target()?, file)?;
        }
        Commands::Changes { ref since } => {
            commands::query::changes(&target()?, since.as_deref())?;
        }
        Commands::Inspect { ref format } => {
            commands::inspect::run(&target()?, format)?;
        }
        Commands::Compact => {
            commands::compact::run(&target()?)?;
        }
        Commands::Version => {
            println!("TZCache CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
