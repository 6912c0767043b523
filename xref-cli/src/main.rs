//! xrefsync: cross-reference identifier synchronization CLI.
//!
//! # Usage
//!
//! ```text
//! xrefsync [--config <path>] init [--force]
//! xrefsync [--config <path>] run [--species <name>]... [--json]
//! xrefsync [--config <path>] diff [--species <name>]...
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, init::InitArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "xrefsync",
    version,
    about = "Reconcile stored cross-reference identifiers against the annotation source",
    long_about = None,
)]
struct Cli {
    /// Config file (default: ~/.xrefsync/config.yaml).
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config and an empty store.
    Init(InitArgs),

    /// Synchronize identifiers for the configured (or selected) species.
    Run(RunArgs),

    /// Show what `run` would insert and delete, without writing.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config)?;
    match cli.command {
        Commands::Init(args) => args.run(&config_path),
        Commands::Run(args) => args.run(&config_path),
        Commands::Diff(args) => args.run(&config_path),
    }
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => {
            let home = dirs::home_dir().context("could not determine home directory")?;
            Ok(xref_core::config::config_path_at(&home))
        }
    }
}

/// Log to stderr so `run --json` output stays parseable. `RUST_LOG`
/// overrides the default `info` level; `RUST_LOG=inserted=debug,deleted=debug`
/// shows audit records when no audit directory is configured.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
