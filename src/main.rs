//! # Unified RAG CLI (`urag`)
//!
//! ## Usage
//!
//! ```bash
//! urag [--config ./config/urag.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `urag sources` | List configured connectors |
//! | `urag ingest <selector>` | Ingest from `all`, a type, or `type:name` |
//! | `urag query "<question>"` | Answer one question and print its sources |
//! | `urag serve` | Start the retrieval HTTP service |
//!
//! Without `--config`, built-in defaults plus environment variables are
//! used (`QDRANT_URL`, `CONFLUENCE_BASE`, `GIT_REPOS`, ...). Log verbosity
//! follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use unified_rag::config::load_config;
use unified_rag::{ingest, query, server, sources};

/// Unified RAG: ingest wiki, issue and repository content into vector and
/// lexical indexes, then answer questions grounded in it.
#[derive(Parser)]
#[command(name = "urag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured connectors and whether they have credentials.
    Sources,

    /// Fetch documents from connectors and write them to both indexes.
    Ingest {
        /// `all`, a connector type (`wiki`, `issues`, `repository`), `type:name`, or
        /// `repository:name@<url>` for one repository URL.
        #[arg(default_value = "all")]
        selector: String,

        /// Fetch and count documents without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Do not print per-batch progress on stderr.
        #[arg(long)]
        no_progress: bool,
    },

    /// Answer a question from the command line.
    Query {
        /// The question to answer.
        question: String,

        /// Restrict retrieval to one source kind (`confluence`, `jira`, `git`).
        #[arg(long)]
        kind: Option<String>,
    },

    /// Start the retrieval HTTP service.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sources => sources::list_sources(&config)?,
        Commands::Ingest {
            selector,
            dry_run,
            no_progress,
        } => ingest::run_ingest(&config, &selector, dry_run, !no_progress).await?,
        Commands::Query { question, kind } => {
            query::run_query(&config, &question, kind.as_deref()).await?
        }
        Commands::Serve => server::run_server(&config).await?,
    }

    Ok(())
}
