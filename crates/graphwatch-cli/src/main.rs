//! Command-line host for Graphwatch.
//!
//! Usage:
//! ```bash
//! graphwatch poll                      # Run every enabled trigger in graphwatch.toml
//! graphwatch poll --once -t contracts  # Run one cycle of one trigger
//! graphwatch poll --test               # Preview sample output without touching state
//! graphwatch list /Contracts           # List documents in a library folder
//! graphwatch get <document-id>         # Show document metadata
//! graphwatch download <document-id>    # Save a document locally
//! graphwatch call <json>               # Run a batch of document operations
//! graphwatch describe                  # Show credential fields and option schemas
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod credentials;

#[derive(Debug, Parser)]
#[command(name = "graphwatch", author, version, about)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll configured triggers for document changes
    Poll(commands::poll::PollArgs),

    /// List documents in a library folder
    List(commands::documents::ListArgs),

    /// Show a document's metadata
    Get(commands::documents::GetArgs),

    /// Download a document
    Download(commands::documents::DownloadArgs),

    /// Run a batch of document operations
    Call(commands::documents::CallArgs),

    /// Describe credentials and option schemas
    Describe(commands::describe::DescribeArgs),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poll(_) => f.debug_tuple("Poll").finish(),
            Self::List(_) => f.debug_tuple("List").finish(),
            Self::Get(_) => f.debug_tuple("Get").finish(),
            Self::Download(_) => f.debug_tuple("Download").finish(),
            Self::Call(_) => f.debug_tuple("Call").finish(),
            Self::Describe(_) => f.debug_tuple("Describe").finish(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("info".parse().context("failed to parse log directive")?);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match &cli.command {
        Command::Poll(args) => commands::poll::run(args).await,
        Command::List(args) => commands::documents::list(args).await,
        Command::Get(args) => commands::documents::get(args).await,
        Command::Download(args) => commands::documents::download(args).await,
        Command::Call(args) => commands::documents::call(args).await,
        Command::Describe(args) => commands::describe::run(args),
    }
}
