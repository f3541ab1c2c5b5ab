//! emvec CLI - Command-line interface
//!
//! Usage:
//!   emvec persist <embeddings.json>
//!   emvec related <query.json> --top-k 5

use anyhow::Context;
use clap::{Parser, Subcommand};
use emvec_core::{AppConfig, Embedding, LoggingConfig, VectorDatabase};
use emvec_vector::{InMemoryIndex, IndexedVectorStore, VectorIndexService};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "emvec")]
#[command(about = "Store and search text embeddings in a vector index")]
#[command(version)]
struct Cli {
    /// TOML config file (environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Namespace to read and write
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// Use a throwaway in-process index instead of the configured one
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist embeddings from a JSON array of {"contents", "vector"} objects
    Persist {
        /// Path to the embeddings file
        path: PathBuf,
    },
    /// Find stored embeddings related to a query embedding
    Related {
        /// Path to a JSON file holding one embedding
        path: PathBuf,

        /// Maximum number of results
        #[arg(long, default_value_t = 5)]
        top_k: usize,

        /// Embeddings to persist before searching
        #[arg(long)]
        seed: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct RelatedOutput<'a> {
    rank: usize,
    score: f32,
    contents: &'a str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    if let Some(namespace) = &cli.namespace {
        config.index.namespace = Some(namespace.clone());
    }

    init_logging(&config.logging);

    if cli.in_memory {
        let mut store = IndexedVectorStore::new(InMemoryIndex::new())
            .with_namespace(config.index.namespace());
        if let Some(dimension) = config.index.dimension {
            store = store.with_dimension(dimension);
        }
        run(store, cli.command).await
    } else {
        let store = IndexedVectorStore::from_config(&config.index)?;
        tracing::debug!(host = store.service().host(), "Connected to index");
        run(store, cli.command).await
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("emvec={0},emvec_vector={0}", config.level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run<S: VectorIndexService>(
    store: IndexedVectorStore<S>,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Persist { path } => {
            let embeddings = read_embeddings(&path)?;
            tracing::info!("Persisting {} embeddings from {}", embeddings.len(), path.display());

            let outcome = store.persist_all(&embeddings).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.ids)?);
        }
        Commands::Related { path, top_k, seed } => {
            if let Some(seed) = seed {
                store.persist_all(&read_embeddings(&seed)?).await?;
            }

            let query = read_embedding(&path)?;
            let related = store.find_related_scored(&query, top_k).await?;

            let output: Vec<RelatedOutput<'_>> = related
                .iter()
                .enumerate()
                .map(|(i, r)| RelatedOutput {
                    rank: i + 1,
                    score: r.score,
                    contents: r.embedding.contents(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn read_embeddings(path: &Path) -> anyhow::Result<Vec<Embedding>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Expected a JSON array of embeddings in {}", path.display()))
}

fn read_embedding(path: &Path) -> anyhow::Result<Embedding> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Expected one embedding object in {}", path.display()))
}
