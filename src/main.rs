//! # Repo QA CLI (`rqa`)
//!
//! ## Usage
//!
//! ```bash
//! rqa [--config ./config/rqa.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rqa ingest <repo>` | Walk and index a repository, print counts |
//! | `rqa ask <repo> "<question>"` | Index a repository and answer a question about it |
//! | `rqa serve` | Start the HTTP server |
//!
//! Logs go to stderr and are controlled with `RUST_LOG` (default `info`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use repo_qa::config::{self, Config};
use repo_qa::qa::{QaService, Source};
use repo_qa::server;

/// Repo QA: ask questions about a source repository.
#[derive(Parser)]
#[command(
    name = "rqa",
    about = "Repo QA: ask questions about a source repository",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rqa.toml` when present, otherwise built-in
    /// defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a repository and report what was indexed.
    Ingest {
        /// `owner/name` (github) or a directory path (local).
        repo: String,

        #[arg(long, value_enum, default_value = "github")]
        source: Source,
    },

    /// Index a repository and answer a question about it.
    Ask {
        /// `owner/name` (github) or a directory path (local).
        repo: String,

        /// The question.
        question: String,

        #[arg(long, value_enum, default_value = "github")]
        source: Source,

        /// Number of chunks to retrieve (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Start the HTTP server.
    Serve {
        #[arg(long, value_enum, default_value = "github")]
        source: Source,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg: Config = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { repo, source } => {
            let service = QaService::from_config(&cfg, source)?;
            let report = service.ingest_only(&repo).await?;
            println!("files indexed: {}", report.files_indexed);
            println!("chunks indexed: {}", report.chunks_indexed);
            println!("files skipped: {}", report.files_skipped);
        }
        Commands::Ask {
            repo,
            question,
            source,
            top_k,
        } => {
            let top_k = top_k.unwrap_or(cfg.retrieval.top_k);
            if top_k == 0 {
                anyhow::bail!("--top-k must be >= 1");
            }
            let service = QaService::from_config(&cfg, source)?;
            let outcome = service.ask(&repo, &question, top_k).await?;
            println!("{}", outcome.render());
        }
        Commands::Serve { source } => {
            if source == Source::Local && cfg.ingest.local_root.is_none() {
                anyhow::bail!("serve --source local requires [ingest] local_root in the config");
            }
            let service = QaService::from_config(&cfg, source)?;
            server::run_server(&cfg, service).await?;
        }
    }

    Ok(())
}
