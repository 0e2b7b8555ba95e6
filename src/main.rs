//! # Ragline CLI (`rag`)
//!
//! The `rag` binary is the primary interface for Ragline. It provides
//! commands for database initialization, plain-text ingestion, retrieval
//! queries, summarized answers, document deletion, and index statistics.
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag init` | Create the SQLite database and run schema migrations |
//! | `rag ingest <path>` | Chunk, embed, and index a text file or directory |
//! | `rag query "<q>"` | Retrieve relevant passages (simple or complex strategy) |
//! | `rag ask "<q>"` | Retrieve passages and summarize via the generation service |
//! | `rag delete <origin>` | Remove a document and all its chunks |
//! | `rag stats` | Show document/chunk counts and the pinned model version |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! rag init --config ./config/rag.toml
//!
//! # Index a directory of notes
//! rag ingest ./docs --config ./config/rag.toml
//!
//! # Threshold retrieval
//! rag query "deployment process" --config ./config/rag.toml
//!
//! # Citation-enriched retrieval with over-fetch and dedup
//! rag query "deployment process" --strategy complex
//!
//! # Retrieve and summarize with citations
//! rag ask "how do we deploy?"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ragline::assemble::{answer, HttpGenerationService};
use ragline::config;
use ragline::db;
use ragline::embedding;
use ragline::ingest;
use ragline::models::{RetrievalContext, SourceType};
use ragline::retrieve::{retrieve_complex, retrieve_simple, RetrievalEngine};
use ragline::session::Session;
use ragline::stats;
use ragline::store::VectorStore;

/// Ragline CLI — a local-first retrieval pipeline for RAG applications.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Ragline — a local-first retrieval pipeline: chunk, embed, index, and answer with citations",
    version,
    long_about = "Ragline ingests plain text handed over by external extractors, chunks and embeds \
    it into a SQLite-backed vector index, and answers queries through threshold or \
    citation-enriched retrieval, optionally summarized by an external generation service."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
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
    /// (collections, documents, index_entries). Idempotent.
    Init,

    /// Ingest a plain-text file or directory.
    ///
    /// Walks the path for `.txt`/`.md` files, normalizes and chunks each
    /// one, embeds the chunks with the configured provider, and upserts
    /// each document atomically. Re-ingesting an origin replaces its
    /// prior chunks. Reports partial success per document.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Source type tag recorded on the documents: pdf, csv, web, or text.
        #[arg(long, default_value = "text")]
        source_type: String,
    },

    /// Retrieve relevant passages for a query.
    Query {
        /// The natural-language query.
        query: String,

        /// Retrieval strategy: `simple` (threshold) or `complex`
        /// (over-fetch, span dedup, citations, history).
        #[arg(long, default_value = "simple")]
        strategy: String,

        /// Override the configured result count.
        #[arg(long)]
        k: Option<usize>,

        /// Override the configured minimum similarity score.
        #[arg(long)]
        min_score: Option<f64>,
    },

    /// Retrieve passages and summarize them via the generation service.
    ///
    /// Runs the complex strategy, assembles the passages and citations
    /// into a generation request, and prints the service's answer with
    /// the citations it was grounded on.
    Ask {
        /// The natural-language question.
        query: String,
    },

    /// Remove a document and all its chunks, by origin.
    Delete {
        /// Origin (path or URL) the document was ingested from.
        origin: String,
    },

    /// Show index statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            db::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }

        Commands::Ingest { path, source_type } => {
            let source_type = SourceType::parse(&source_type).ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown source type: '{}'. Must be pdf, csv, web, or text.",
                    source_type
                )
            })?;

            let items = ingest::collect_text_files(&path)?;
            if items.is_empty() {
                println!("No text files found under {}", path.display());
                return Ok(());
            }

            let pool = db::connect(&cfg.db.path).await?;
            db::run_migrations(&pool).await?;
            let store = Arc::new(VectorStore::new(pool, &cfg.collection));
            let provider = embedding::create_provider(&cfg.embedding)?;

            let items: Vec<_> = items
                .into_iter()
                .map(|(origin, _, text)| (origin, source_type, text))
                .collect();
            let total = items.len();

            let reports = ingest::ingest_batch(Arc::clone(&store), provider, &cfg, items).await;

            let mut docs_ok = 0usize;
            let mut chunks_total = 0usize;
            let mut chunks_indexed = 0usize;
            for report in &reports {
                match report {
                    Ok(r) => {
                        docs_ok += 1;
                        chunks_total += r.chunks_total;
                        chunks_indexed += r.chunks_indexed;
                        if !r.is_complete() {
                            eprintln!(
                                "warning: {}: {}/{} chunks indexed",
                                r.origin, r.chunks_indexed, r.chunks_total
                            );
                        }
                    }
                    Err(e) => eprintln!("error: {}", e),
                }
            }

            println!("ingest {}", path.display());
            println!("  documents: {} / {}", docs_ok, total);
            println!("  chunks indexed: {} / {}", chunks_indexed, chunks_total);
            println!("ok");
            store.pool().close().await;
        }

        Commands::Query {
            query,
            strategy,
            k,
            min_score,
        } => {
            let mut retrieval = cfg.retrieval.clone();
            if let Some(k) = k {
                retrieval.k = k;
                retrieval.over_fetch_k = retrieval.over_fetch_k.max(k);
            }
            if let Some(min_score) = min_score {
                retrieval.min_score = Some(min_score);
            }

            let pool = db::connect(&cfg.db.path).await?;
            db::run_migrations(&pool).await?;
            let store = Arc::new(VectorStore::new(pool, &cfg.collection));
            let provider = embedding::create_provider(&cfg.embedding)?;
            let engine = Arc::new(RetrievalEngine::new(store.clone(), provider, retrieval));

            let context = match strategy.as_str() {
                "simple" => retrieve_simple(engine, &query).await?,
                "complex" => {
                    let session = Arc::new(Session::new());
                    retrieve_complex(engine, session, &query).await?
                }
                other => anyhow::bail!(
                    "unknown strategy: '{}'. Use simple or complex.",
                    other
                ),
            };

            print_results(&context);
            store.pool().close().await;
        }

        Commands::Ask { query } => {
            let pool = db::connect(&cfg.db.path).await?;
            db::run_migrations(&pool).await?;
            let store = Arc::new(VectorStore::new(pool, &cfg.collection));
            let provider = embedding::create_provider(&cfg.embedding)?;
            let engine = Arc::new(RetrievalEngine::new(
                store.clone(),
                provider,
                cfg.retrieval.clone(),
            ));
            let session = Arc::new(Session::new());

            let context = retrieve_complex(engine, session, &query).await?;
            if context.results.is_empty() {
                println!("No relevant context found.");
                store.pool().close().await;
                return Ok(());
            }

            let service = HttpGenerationService::new(&cfg.generation)?;
            let ans = answer(&service, &context).await?;

            println!("{}", ans.text);
            println!();
            println!("Citations:");
            for (i, c) in ans.citations.iter().enumerate() {
                println!(
                    "  [{}] {} (chars {}-{})",
                    i + 1,
                    c.origin,
                    c.char_offset_start,
                    c.char_offset_end
                );
            }
            store.pool().close().await;
        }

        Commands::Delete { origin } => {
            let pool = db::connect(&cfg.db.path).await?;
            db::run_migrations(&pool).await?;
            let store = VectorStore::new(pool, &cfg.collection);
            store.delete_document(&origin).await?;
            println!("Deleted {}", origin);
            store.pool().close().await;
        }

        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

fn print_results(context: &RetrievalContext) {
    if context.results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, result) in context.results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (chars {}-{})",
            i + 1,
            result.score,
            result.citation.origin,
            result.citation.char_offset_start,
            result.citation.char_offset_end
        );
        let excerpt: String = result.text.chars().take(160).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
        println!("    chunk: {}", result.chunk_id);
        println!();
    }
}
