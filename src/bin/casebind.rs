//! casebind CLI tool
//!
//! Command-line interface for synchronizing in-source test metadata with a
//! remote test-management service.
//!
//! ## Commands
//!
//! - `sync <path>`: parse, reconcile and push metadata, then write
//!   remote-assigned ids back into the source files
//! - `prune`: delete remote suites that hold no cases and no child suites
//!
//! ## Write-back
//!
//! By default `sync` rewrites source files to carry the remote-assigned
//! ids (a `.bak` copy is written first). Use `--no-annotate` for a
//! read-only pass, or `--snapshot-only` to regenerate the audit snapshot
//! without contacting the remote service at all.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use casebind::{
    config::SyncConfig,
    orchestrate::{SyncOptions, SyncOrchestrator},
    remote::HttpRemoteApi,
};

#[derive(Parser)]
#[command(name = "casebind")]
#[command(author, version, about = "Sync in-source test metadata with a test-management service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a source tree and synchronize it with the remote service
    Sync {
        /// Root directory of the test sources
        path: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "casebind.toml")]
        config: PathBuf,

        /// Skip writing remote-assigned ids back into source files
        #[arg(long)]
        no_annotate: bool,

        /// Only regenerate the audit snapshot; contact no remote service
        #[arg(long)]
        snapshot_only: bool,

        /// Continue past pre-flight validation failures
        #[arg(long)]
        force: bool,
    },

    /// Delete remote suites containing no cases and no child suites
    Prune {
        /// Configuration file path
        #[arg(short, long, default_value = "casebind.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Sync {
            path,
            config,
            no_annotate,
            snapshot_only,
            force,
        } => {
            let config = SyncConfig::from_file(&config)?;
            let api = HttpRemoteApi::new(&config)?;
            let orchestrator = SyncOrchestrator::new(&config, &api);
            let options = SyncOptions {
                annotate: !no_annotate,
                snapshot_only,
                force,
            };

            let report = runtime.block_on(orchestrator.run(&path, &options))?;

            println!("\n=== Sync Results ===");
            println!("Created:        {}", report.created);
            println!("Updated:        {}", report.updated);
            println!("Unchanged:      {}", report.unchanged);
            println!("Failed:         {}", report.failed);
            println!("Suites created: {}", report.suites_created);
            println!("Files rewritten: {}", report.files_rewritten);
            for warning in &report.warnings {
                println!("warning: {warning}");
            }

            if !report.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Prune { config } => {
            let config = SyncConfig::from_file(&config)?;
            let api = HttpRemoteApi::new(&config)?;
            let orchestrator = SyncOrchestrator::new(&config, &api);

            let deleted = runtime.block_on(orchestrator.prune())?;
            println!("Deleted {deleted} empty suites");
            Ok(())
        }
    }
}
