//! Vellum CLI
//!
//! Command-line tools for Vellum store dumps.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and per-object state
//! - `verify` - Check ledger and variant invariants
//! - `history` - List the version ledger of one object
//! - `demo` - Write a small sample store

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Vellum command-line store tools.
#[derive(Parser)]
#[command(name = "vellum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store dump (JSON)
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
    /// Display store statistics and metadata
    Inspect {
        /// List every object
        #[arg(short, long)]
        objects: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify store invariants
    Verify,

    /// Show the version history of an object
    History {
        /// Object ID
        #[arg(short, long)]
        object: u64,

        /// Include the captured content of each version
        #[arg(short, long)]
        content: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Write a sample store exercising every component
    Demo {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
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
        Commands::Inspect { objects, format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, objects, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Store path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::History {
            object,
            content,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for history")?;
            commands::history::run(&path, object, content, &format)?;
        }
        Commands::Demo { force } => {
            let path = cli.path.ok_or("Output path required for demo")?;
            commands::demo::run(&path, force)?;
        }
        Commands::Version => {
            println!("Vellum CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Vellum Core v{}", vellum_core::VERSION);
        }
    }

    Ok(())
}
