//! # PDF Q&A CLI (`pdfqa`)
//!
//! ## Usage
//!
//! ```bash
//! pdfqa --config ./config/pdfqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfqa init` | Create the SQLite database and schema |
//! | `pdfqa ingest <files...>` | Extract, chunk, embed, and store PDFs |
//! | `pdfqa documents` | List ingested documents, newest first |
//! | `pdfqa search "<query>"` | Show what retrieval selects for a question |
//! | `pdfqa ask "<query>"` | Answer a question from the documents |
//! | `pdfqa serve` | Start the HTTP API |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pdf_qa::services::Services;
use pdf_qa::{ask, config, documents, ingest, logging, migrate, search, server};

/// Ask questions about your PDF documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pdfqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pdfqa",
    about = "Question answering over uploaded PDF documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pdfqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest one or more PDF files.
    ///
    /// Each file becomes a document named after its file name. Ingesting
    /// the same name again adds a newer version next to the old one.
    Ingest {
        /// PDF files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List ingested documents, newest first.
    Documents,

    /// Run retrieval for a question and print the selected chunks.
    Search {
        /// The question.
        query: String,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the ingested documents.
    Ask {
        /// The question.
        query: String,

        /// Print the answer and retrieval details as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init_tracing(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Ingest { files } => {
            let services = Services::open(&cfg).await?;
            ingest::run_ingest(&services, &files).await?;
        }
        Commands::Documents => {
            let services = Services::open(&cfg).await?;
            documents::run_documents(&services).await?;
        }
        Commands::Search { query, json } => {
            let services = Services::open(&cfg).await?;
            search::run_search(&services, &query, json).await?;
        }
        Commands::Ask { query, json } => {
            let services = Services::open(&cfg).await?;
            ask::run_ask(&services, &query, json).await?;
        }
        Commands::Serve => {
            let services = Services::open(&cfg).await?;
            server::run_server(services).await?;
        }
    }

    Ok(())
}
