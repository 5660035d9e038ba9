//! PageHands - page-editing coding agent.
//!
//! Main entry point. The real host for this system is a browser
//! extension runtime; the CLI stands in with a local HTML file as the
//! page and stub host facilities, which still exercises the whole stack:
//! VFS, script lifecycle, agent loop, and fabric.

mod chat;
mod cli;
mod inspect;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] pagehands_protocols::error::StoreError),

    #[error("VFS error: {0}")]
    Vfs(#[from] pagehands_protocols::error::VfsError),

    #[error("Fabric error: {0}")]
    Fabric(#[from] pagehands_protocols::error::FabricError),

    #[error("{0}")]
    Config(String),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Chat {
            page,
            url,
            data_dir,
            model,
        } => chat::run(page, url, data_dir, model).await,
        Commands::Inspect { data_dir, export } => inspect::run(data_dir, export).await,
    }
}
