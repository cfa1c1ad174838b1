//! # docdex CLI
//!
//! The `docdex` binary is the interface to the document index. It
//! provides commands for building and updating the index, retrieving
//! context, asking grounded questions, and managing the document root.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docdex index` | Build or incrementally update the index |
//! | `docdex query "<text>"` | Retrieve context chunks for a query |
//! | `docdex ask "<question>"` | Retrieve context and generate an answer |
//! | `docdex remove <file>` | Remove one document from the index |
//! | `docdex reset` | Destroy and recreate the index |
//! | `docdex status` | Show index existence and chunk counts |
//! | `docdex files <list\|add\|rm>` | Manage the document root |
//! | `docdex health` | Check that Ollama is reachable |
//!
//! ## Examples
//!
//! ```bash
//! # Copy documents in and build the index
//! docdex files add ./paper.pdf ./notes.md
//! docdex index
//!
//! # Diversity-aware retrieval
//! docdex query "error handling" --mode mmr -k 5
//!
//! # Threshold-filtered retrieval with per-chunk scores
//! docdex query "deployment" --mode threshold --threshold 0.7 --show-chunks
//!
//! # Ask a grounded question
//! docdex ask "how are failed deployments rolled back?"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use docdex::chat::ChatEngine;
use docdex::config;
use docdex::embedding;
use docdex::error::RemovedCount;
use docdex::files;
use docdex::health;
use docdex::index::{CancelFlag, IndexManager};
use docdex::retrieval::{RetrievalMode, RetrievalParams, Retriever};
use docdex::store::VectorStore;

/// docdex — an incrementally-synchronized document index with multi-mode
/// context retrieval for RAG.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file falls back to built-in defaults.
#[derive(Parser)]
#[command(
    name = "docdex",
    about = "An incrementally-synchronized document index with multi-mode context retrieval",
    version,
    long_about = "docdex keeps a local vector index in sync with a folder of text, Markdown, \
    and PDF documents (only new and changed files are re-embedded) and serves context \
    retrieval — plain similarity, diversity-aware (mmr), or threshold-filtered — for \
    downstream question answering via Ollama."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build or incrementally update the index.
    ///
    /// Scans the document root, skips unchanged files, re-embeds new and
    /// changed ones. Ctrl-C cancels between documents, leaving every
    /// already-processed document fully indexed.
    Index,

    /// Retrieve context chunks for a query without generating an answer.
    Query {
        /// The query text.
        query: String,

        /// Retrieval mode: `similarity`, `mmr`, or `threshold`.
        /// Unrecognized values fall back to similarity.
        #[arg(long)]
        mode: Option<String>,

        /// Number of chunks to return.
        #[arg(short, long)]
        k: Option<usize>,

        /// Candidate pool size for mmr selection.
        #[arg(long)]
        fetch_k: Option<usize>,

        /// Minimum relevance score kept in threshold mode.
        #[arg(long)]
        threshold: Option<f32>,

        /// Print per-chunk debug records instead of the joined context.
        #[arg(long)]
        show_chunks: bool,
    },

    /// Retrieve context and generate a grounded answer via the LLM.
    Ask {
        /// The question to answer from the indexed documents.
        question: String,

        /// Retrieval mode: `similarity`, `mmr`, or `threshold`.
        #[arg(long)]
        mode: Option<String>,

        /// Number of context chunks to retrieve.
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Remove one document's chunks from the index.
    ///
    /// Accepts a path relative to the document root (or a bare doc id).
    /// The file itself is not touched; use `files rm` for that.
    Remove {
        /// Document reference.
        file: PathBuf,
    },

    /// Destroy the index and reinitialize an empty one. No undo.
    Reset,

    /// Show index existence, document count, and chunk count.
    Status,

    /// Manage files under the document root.
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },

    /// Check whether the Ollama backend is reachable.
    Health,
}

/// Document-root file subcommands.
#[derive(Subcommand)]
enum FilesAction {
    /// List files under the document root.
    List,
    /// Copy files into the document root (collisions renamed to `name_2.ext`).
    Add {
        /// Source paths to copy.
        paths: Vec<PathBuf>,
    },
    /// Delete files from the document root.
    Rm {
        /// File names (relative to the root) to delete.
        names: Vec<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DOCDEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn one_line(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ");
    let trimmed = flattened.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;
    let embedder = embedding::create_embedder(&cfg.embedding)?;
    let store = VectorStore::new(cfg.paths.index_dir.clone(), embedder);

    match cli.command {
        Commands::Index => {
            let cancel = CancelFlag::new();
            let signal_flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_flag.cancel();
                }
            });

            let manager = IndexManager::new(&cfg, &store);
            let (message, report) = manager.build_or_update(&cancel).await?;

            println!("index");
            println!("  new: {}", report.new);
            println!("  updated: {}", report.updated);
            println!("  skipped: {}", report.skipped);
            println!("  chunks written: {}", report.chunks);
            println!("{}", message);
        }

        Commands::Query {
            query,
            mode,
            k,
            fetch_k,
            threshold,
            show_chunks,
        } => {
            if !store.exists() {
                println!("No index found. Run `docdex index` first.");
                return Ok(());
            }

            let mut params = RetrievalParams::from_config(&cfg.retrieval);
            if let Some(mode) = mode {
                params.mode = RetrievalMode::parse(&mode);
            }
            if let Some(k) = k {
                params.k = k;
            }
            if let Some(fetch_k) = fetch_k {
                params.fetch_k = fetch_k;
            }
            if let Some(threshold) = threshold {
                params.score_threshold = threshold;
            }

            let retriever = Retriever::new(&store);
            let retrieval = retriever.retrieve(&query, &params).await?;

            if retrieval.chunks.is_empty() {
                println!("No results.");
                return Ok(());
            }

            println!("sources:");
            for (i, source) in retrieval.sources.iter().enumerate() {
                println!("  {}. {}", i + 1, source);
            }
            println!();

            if show_chunks {
                println!("chunks:");
                for chunk in &retrieval.chunks {
                    match chunk.score {
                        Some(score) => println!("  [{:.2}] {}", score, chunk.source),
                        None => println!("  [  - ] {}", chunk.source),
                    }
                    println!("    \"{}\"", one_line(&chunk.text, 160));
                }
            } else {
                println!("{}", retrieval.context);
            }
        }

        Commands::Ask { question, mode, k } => {
            let mut params = RetrievalParams::from_config(&cfg.retrieval);
            if let Some(mode) = mode {
                params.mode = RetrievalMode::parse(&mode);
            }
            if let Some(k) = k {
                params.k = k;
            }

            let retriever = Retriever::new(&store);
            let chat = ChatEngine::new(&cfg.llm, retriever);
            let (answer, sources) = chat.answer(&question, &params).await?;

            println!("{}", answer);
            if !sources.is_empty() {
                println!();
                println!("sources:");
                for (i, source) in sources.iter().enumerate() {
                    println!("  {}. {}", i + 1, source);
                }
            }
        }

        Commands::Remove { file } => {
            let manager = IndexManager::new(&cfg, &store);
            match manager.remove_from_index(&file).await? {
                RemovedCount::Exact(n) => println!("Removed {} chunks.", n),
                RemovedCount::Unknown => {
                    println!("Removal completed; exact count unknown.")
                }
            }
        }

        Commands::Reset => {
            let manager = IndexManager::new(&cfg, &store);
            manager.reset()?;
            println!("Index reset.");
        }

        Commands::Status => {
            if !store.exists() {
                println!("status: not indexed");
                return Ok(());
            }

            let docs = store.list_indexed_docs().await?;
            println!("status: ready");
            println!("  documents: {}", docs.len());
            match store.count().await {
                -1 => println!("  chunks: unavailable"),
                n => println!("  chunks: {}", n),
            }
        }

        Commands::Files { action } => match action {
            FilesAction::List => {
                if !cfg.paths.docs_dir.exists() {
                    println!("No files yet.");
                    return Ok(());
                }
                let listed = files::list_files(&cfg.paths.docs_dir, &cfg.scanner)?;
                if listed.is_empty() {
                    println!("No files yet.");
                } else {
                    for file in &listed {
                        println!(
                            "  {}  {:>10} B  {}",
                            file.modified.format("%Y-%m-%d %H:%M"),
                            file.size,
                            file.doc_id
                        );
                    }
                }
            }
            FilesAction::Add { paths } => {
                for path in &paths {
                    let dest = files::add_file(&cfg.paths.docs_dir, path)?;
                    println!("added {}", dest.display());
                }
            }
            FilesAction::Rm { names } => {
                for name in &names {
                    let path = files::delete_file(&cfg.paths.docs_dir, name)?;
                    println!("deleted {}", path.display());
                }
            }
        },

        Commands::Health => {
            let ready = health::is_ready(&cfg.embedding.url, Duration::from_millis(350)).await;
            if ready {
                println!("Ollama is reachable at {}.", cfg.embedding.url);
            } else {
                println!("Ollama is not reachable at {}.", cfg.embedding.url);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
