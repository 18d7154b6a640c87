//! # Package Index CLI (`pkgidx`)
//!
//! ## Usage
//!
//! ```bash
//! pkgidx --config ./config/pkgidx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pkgidx init` | Create the SQLite database and run schema migrations |
//! | `pkgidx index` | Run one indexing pass over all live projects |
//! | `pkgidx stats` | Show document counts and version coverage |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use package_index::{config, migrate, pipeline, stats};

/// Prepares package records for the search index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "pkgidx",
    about = "Prepares community package records for a full-text and faceted search index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pkgidx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file with the index and stats tables.
    /// Safe to run more than once.
    Init,

    /// Run one indexing pass.
    ///
    /// Loads the content snapshot, joins live projects with their stats,
    /// shapes each one and writes it to the index. Documents whose shaped
    /// form did not change are left alone.
    Index {
        /// Print each flat row as JSON without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of projects to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show index statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("initialized");
        }
        Commands::Index { dry_run, limit } => {
            pipeline::run_index(&cfg, dry_run, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
