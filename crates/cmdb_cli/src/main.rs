//! CMDB CLI
//!
//! Command-line reconciler for CMDB configuration items.
//!
//! # Commands
//!
//! - `observe` - Report whether a record exists and matches its desired state
//! - `apply` - Run one reconcile cycle (create or update as needed)
//! - `delete` - Orphan or retire a record

mod commands;
mod files;

use clap::{Parser, Subcommand};
use commands::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Reconcile CMDB configuration items from JSON files.
#[derive(Parser)]
#[command(name = "cmdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider config file (JSON array)
    #[arg(global = true, short, long)]
    providers: Option<PathBuf>,

    /// Secrets file (JSON array)
    #[arg(global = true, short, long)]
    secrets: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the remote state of a record
    Observe {
        /// Managed record file
        record: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Create or update a record so it matches its desired state
    Apply {
        /// Managed record file
        record: PathBuf,

        /// Skip schema validation before creating
        #[arg(long)]
        skip_validation: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Stop managing a record
    Delete {
        /// Managed record file
        record: PathBuf,

        /// Field marking the record retired (e.g. install_status)
        #[arg(long, requires = "retire_value")]
        retire_field: Option<String>,

        /// Value of the retirement field (e.g. 7)
        #[arg(long, requires = "retire_field")]
        retire_value: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
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

    let context = |command: &str| -> Result<Context, Box<dyn std::error::Error>> {
        let providers = cli
            .providers
            .clone()
            .ok_or_else(|| format!("Provider config file required for {command}"))?;
        Ok(Context {
            providers,
            secrets: cli.secrets.clone(),
        })
    };

    match &cli.command {
        Commands::Observe { record, format } => {
            commands::observe::run(&context("observe")?, record, format)?;
        }
        Commands::Apply {
            record,
            skip_validation,
            format,
        } => {
            commands::apply::run(&context("apply")?, record, !skip_validation, format)?;
        }
        Commands::Delete {
            record,
            retire_field,
            retire_value,
            format,
        } => {
            let retire = retire_field.clone().zip(retire_value.clone());
            commands::delete::run(&context("delete")?, record, retire, format)?;
        }
        Commands::Version => {
            println!("CMDB CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
