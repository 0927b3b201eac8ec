///
/// This module implements the CLI interface for repo-harvest: command parsing,
/// main entrypoints and user-visible output.
///
/// All pipeline logic lives in the [`repo-harvest-core`] crate; this module is CLI
/// glue only.
///
/// ## How To Use
/// - From a shell: `repo-harvest harvest --config harvest.yaml` (needs `GITHUB_TOKEN`).
/// - Programmatically or from tests: call [`run`] with a constructed [`Cli`].
///
/// [`repo-harvest-core`]: ../../repo-harvest-core/
use crate::load_config::load_config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use repo_harvest_core::github::GitHubClient;
use repo_harvest_core::harvest::harvest;
use repo_harvest_core::ledger::Ledger;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Conventional exit status for a process ended by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// CLI for repo-harvest: build a source corpus from code-hosting search results.
#[derive(Parser)]
#[clap(
    name = "repo-harvest",
    version,
    about = "Search GitHub repositories and extract their sources into one text corpus file per repository"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the search and extract every repository not harvested yet
    Harvest {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// List repositories already harvested into the configured output directory
    Ledger {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Harvest { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "harvest", "Starting harvest");
            let cancel = CancellationToken::new();
            let client = GitHubClient::new_from_env(&config.api)
                .map_err(|e| anyhow::anyhow!("Cannot start without API credentials: {e}"))?
                .with_cancellation(cancel.clone());
            spawn_interrupt_handler(cancel.clone());

            println!("Harvest starting...");
            match harvest(&config, &client, &cancel).await {
                Ok(report) => {
                    tracing::info!(command = "harvest", ledger_size = report.ledger_size, "Harvest complete");
                    println!("Harvest complete.");
                    println!("  written:           {}", report.written().len());
                    println!("  already processed: {}", report.already_processed().len());
                    println!("  in flight (dupes): {}", report.in_flight().len());
                    println!("  skipped:           {}", report.skipped().len());
                    println!("  failed:            {}", report.failed().len());
                    println!("  total candidates:  {}", report.repositories.len());
                    println!("  ledger size:       {}", report.ledger_size);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "harvest", error = %e, "Harvest failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Ledger { config } => {
            let config = load_config(config)?;
            let ledger = Ledger::load(&config.output.dir, &config.output.extension).map_err(|e| {
                tracing::error!(command = "ledger", error = ?e, "Failed to read output directory");
                anyhow::anyhow!(
                    "Failed to read output directory {:?}: {e}",
                    config.output.dir
                )
            })?;
            for key in ledger.keys() {
                println!("{key}");
            }
            tracing::info!(command = "ledger", entries = ledger.len(), "Ledger listed");
            Ok(())
        }
    }
}

/// First Ctrl-C cancels the run and lets in-flight requests finish; a second
/// one exits immediately.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, finishing in-flight requests (Ctrl-C again to abort)");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt received, aborting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
}
