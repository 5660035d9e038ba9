//! CLI definitions for PageHands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// PageHands CLI.
#[derive(Parser)]
#[command(name = "pagehands")]
#[command(about = "Page-editing coding agent over a versioned virtual filesystem")]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Chat with the agent against a local HTML file standing in for a
    /// live page.
    Chat {
        /// HTML file to load as the page
        #[arg(long)]
        page: PathBuf,

        /// URL the page pretends to be served from
        #[arg(long, default_value = "https://example.test/")]
        url: String,

        /// Directory for the persistent store; omitted means in-memory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Model id for the provider
        #[arg(long, default_value = "claude-sonnet-4-5")]
        model: String,
    },

    /// Dump the persistent store: domains, paths, files, and versions.
    Inspect {
        /// Directory of the persistent store
        #[arg(long)]
        data_dir: PathBuf,

        /// Print the full export bundle as JSON instead of a summary
        #[arg(long)]
        export: bool,
    },
}
