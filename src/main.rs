//! # shelf CLI
//!
//! The `shelf` binary drives incremental ingestion of configured source
//! profiles into their collections.
//!
//! ## Usage
//!
//! ```bash
//! shelf --config ./config/shelf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shelf init` | Create the SQLite database and schema |
//! | `shelf sources` | List source profiles and whether their locations exist |
//! | `shelf ingest <profile\|all>` | Ingest new items of one or every profile |
//! | `shelf collections` | Per-collection chunk, source, and run overview |
//! | `shelf processed <collection>` | Print the processed set of a collection |

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use shelf_ingest::chunk::ParagraphChunker;
use shelf_ingest::config::{self, Config};
use shelf_ingest::ingest::{IngestRequest, Ingestor};
use shelf_ingest::parse::PdfParser;
use shelf_ingest::progress::ProgressMode;
use shelf_ingest::store::sqlite::SqliteCollectionStore;
use shelf_ingest::{collections, logging, migrate, sources};

/// shelf: incremental, deduplicating ingestion of PDF books and Q&A
/// datasets into vector collections.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/shelf.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Incremental, deduplicating ingestion of PDF books and Q&A datasets into vector collections",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/shelf.toml`.
    #[arg(long, global = true, default_value = "./config/shelf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the collections, chunks and
    /// ingest_runs tables. Safe to run more than once.
    Init,

    /// List configured source profiles and their location health.
    Sources,

    /// Ingest new items of a source profile.
    ///
    /// Reads what the target collection already holds, lists the profile's
    /// location, and transforms and commits only the new items in a
    /// single batch. Exits non-zero if any run is unsuccessful.
    Ingest {
        /// Profile name from `[sources.<name>]`, or `all`.
        profile: String,

        /// Transform everything but stop before the commit.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of new items to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Progress output on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` on a terminal and `off` otherwise.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// Show chunk counts, distinct sources and the last run per collection.
    Collections,

    /// Print the source identifiers already stored in a collection.
    Processed {
        /// Collection name.
        collection: String,
    },
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s)
        .ok_or_else(|| format!("invalid progress mode '{}': expected off, human or json", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Ingest {
            profile,
            dry_run,
            limit,
            progress,
        } => {
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            run_ingest(&cfg, &profile, dry_run, limit, progress).await?;
        }
        Commands::Collections => {
            collections::run_collections(&cfg).await?;
        }
        Commands::Processed { collection } => {
            collections::run_processed(&cfg, &collection).await?;
        }
    }

    Ok(())
}

async fn run_ingest(
    cfg: &Config,
    profile: &str,
    dry_run: bool,
    limit: Option<usize>,
    progress: ProgressMode,
) -> anyhow::Result<()> {
    let profiles: Vec<(&String, _)> = if profile == "all" {
        cfg.sources.iter().collect()
    } else {
        match cfg.sources.get_key_value(profile) {
            Some(entry) => vec![entry],
            None => {
                let known: Vec<&str> = cfg.sources.keys().map(String::as_str).collect();
                bail!(
                    "Unknown source profile: '{}'. Available: {}",
                    profile,
                    if known.is_empty() {
                        "(none configured)".to_string()
                    } else {
                        known.join(", ")
                    }
                );
            }
        }
    };
    if profiles.is_empty() {
        bail!("No source profiles configured.");
    }

    let store = SqliteCollectionStore::open(cfg).await?;
    let parser = PdfParser;
    let chunker = ParagraphChunker::from_config(&cfg.chunking);
    let ingestor = Ingestor::new(&store, &parser, &chunker)
        .with_progress(progress.reporter())
        .with_commit_policy(cfg.commit.clone());

    let mut failed = Vec::new();
    for (name, source) in profiles {
        let mut request = IngestRequest::new(name.clone(), source.clone());
        request.limit = limit;
        request.dry_run = dry_run;

        match ingestor.run(&request).await {
            Ok(report) => {
                report.print_summary();
                if !report.success() {
                    failed.push(name.clone());
                }
            }
            Err(e) => {
                tracing::error!(profile = %name, error = %e, "ingestion aborted");
                println!("ingest {} -> {}", name, source.collection);
                println!("  error: {}", e);
                println!("failed");
                failed.push(name.clone());
            }
        }
    }

    drop(ingestor);
    store.close().await;

    if !failed.is_empty() {
        bail!("ingestion failed for: {}", failed.join(", "));
    }
    Ok(())
}
