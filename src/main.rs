//! ORBIT - local-first AI shell assistant
//!
//! Forwards questions (optionally with attached files) to a locally hosted
//! completion server, keeping requests inside the server's context window
//! by splitting and iteratively reducing oversized input.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

mod ai;
mod cli;
mod config;
mod context;
mod history;
mod knowledge;
mod session;
mod util;

/// ORBIT - ask a local model, stay inside its context window
#[derive(Parser)]
#[command(name = "orbit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Local-first AI shell assistant for context-limited models", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell
    Shell,

    /// Ask a one-shot question
    Ask {
        /// The question to ask
        question: String,

        /// Attach a file (repeatable)
        #[arg(short, long)]
        file: Vec<String>,
    },

    /// Ingest a directory into the knowledge store
    Index {
        /// Path to index (defaults to current directory)
        path: Option<String>,
    },

    /// Search the knowledge store
    Search {
        /// Search query
        query: String,

        /// Maximum results
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize configuration file
        #[arg(long)]
        init: bool,
    },

    /// Interactive setup wizard
    Init,

    /// Show version and system info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;
    config.verbose = cli.verbose;

    debug!("ORBIT v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Shell) => {
            cli::shell::run(config).await?;
        }
        Some(Commands::Ask { question, file }) => {
            cli::ask::run(config, &question, file).await?;
        }
        Some(Commands::Index { path }) => {
            cli::index::run(config, path.as_deref()).await?;
        }
        Some(Commands::Search { query, limit }) => {
            cli::search::run(config, &query, limit).await?;
        }
        Some(Commands::Config { show, init }) => {
            if init {
                config::init_config()?;
            } else if show {
                config::show_config(&config)?;
            }
        }
        Some(Commands::Init) => {
            cli::init::run(config).await?;
        }
        Some(Commands::Info) => {
            cli::info::run(config).await?;
        }
        None => {
            // Default: start the interactive shell
            cli::shell::run(config).await?;
        }
    }

    Ok(())
}
