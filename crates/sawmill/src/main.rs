//! # Sawmill CLI (`sawmill`)
//!
//! The `sawmill` binary drives the log summarization cache. It provides
//! commands for database initialization, running the per-project
//! pipeline, and inspecting cached state.
//!
//! ## Usage
//!
//! ```bash
//! sawmill --config ./config/sawmill.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sawmill init` | Create the SQLite database and run schema migrations |
//! | `sawmill process <project>` | Run the fetch/group/merge pipeline for one project |
//! | `sawmill show <project>` | Print a project's cached summaries |
//! | `sawmill stats` | Print per-project cache statistics |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! sawmill init --config ./config/sawmill.toml
//!
//! # Summarize recent activity for one project (cached when fresh)
//! sawmill process payments --config ./config/sawmill.toml
//!
//! # Same, but emit the full result as JSON
//! sawmill process payments --json --config ./config/sawmill.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use sawmill::cloudwatch::CloudWatchLogSource;
use sawmill::config::load_config;
use sawmill::embedding::{create_embedder, Embedder};
use sawmill::pipeline::Processor;
use sawmill::sqlite_store::SqliteStore;
use sawmill::{db, stats};

use sawmill_core::models::ProcessingResult;

/// Sawmill — a log aggregation and cache-freshness engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/sawmill.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "sawmill",
    about = "Sawmill — a log aggregation and cache-freshness engine",
    version,
    long_about = "Sawmill summarizes a project's recent error and warning activity from a \
    paginated remote log store (CloudWatch Logs), deduplicating events into summary groups and \
    caching them per project with an explicit staleness contract, so repeated requests cost \
    zero remote calls while the cache is fresh."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/sawmill.toml`. All database, cache, fetch,
    /// source, and embedding settings are read from this file.
    #[arg(long, global = true, default_value = "./config/sawmill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (summaries, summary_vectors). This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Run the summarization pipeline for one project.
    ///
    /// Reads the project's cache, decides between serving it, an
    /// incremental fetch, or a full fetch, then merges and persists the
    /// result. Prints a processing report.
    Process {
        /// Project identifier (tenant).
        project: String,

        /// Emit the full processing result as JSON instead of a report.
        #[arg(long)]
        json: bool,
    },

    /// Print a project's cached summaries, newest activity first.
    Show {
        /// Project identifier (tenant).
        project: String,
    },

    /// Print per-project cache statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config).await?;
            db::run_migrations(&pool).await?;
            pool.close().await;
            println!("initialized {}", config.db.path.display());
        }
        Commands::Process { project, json } => {
            let pool = db::connect(&config).await?;
            let store = Arc::new(SqliteStore::new(pool));
            let source = Arc::new(CloudWatchLogSource::new(
                &config.source,
                config.fetch.timeout_secs,
            )?);
            let embedder: Option<Arc<dyn Embedder>> =
                create_embedder(&config.embedding)?.map(Arc::from);

            let processor = Processor::new(source, store, embedder, &config)?;
            let result = processor.process(&project).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_report(&result);
            }
        }
        Commands::Show { project } => {
            stats::run_show(&config, &project).await?;
        }
        Commands::Stats => {
            stats::run_stats(&config).await?;
        }
    }

    Ok(())
}

fn print_report(result: &ProcessingResult) {
    println!("process {}", result.project_id);
    println!("  source: {}", result.source);
    println!("  logs processed: {}", result.total_logs_processed);
    println!("  errors: {}", result.error_count);
    println!("  warnings: {}", result.warning_count);
    println!("  summaries created: {}", result.summaries_created);
    println!("  summaries updated: {}", result.summaries_updated);
    println!("  embeddings created: {}", result.embeddings_created);
    if result.streams_failed > 0 {
        println!("  failed streams: {}", result.streams_failed);
    }
    println!(
        "  durations: fetch {} ms, grouping {} ms, enrichment {} ms, total {} ms",
        result.stats.log_fetch_duration_ms,
        result.stats.log_processing_duration_ms,
        result.stats.embedding_generation_duration_ms,
        result.stats.total_duration_ms
    );
    println!("ok");
}
