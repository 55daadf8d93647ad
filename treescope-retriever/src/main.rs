use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::Level;
use treescope_embed::{EmbeddingProvider, FastEmbedProvider, HashingEmbeddingProvider};
use treescope_retriever::{
    EmbeddingModelMetadata, FilterCondition, FilterSpec, PlainTextExtractor, RetrievalService,
    RetrievalStore, RetrieverConfig, SearchResult, SqliteStore,
};

/// Index a folder tree of documents and search it by meaning and location.
#[derive(Parser, Debug)]
#[command(name = "treescope", author, version, about, long_about = None)]
struct Args {
    /// SQLite index file [default: .treescope.db]
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML config file; command-line flags take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use the offline feature-hashing embedder instead of a neural model
    #[arg(long, global = true)]
    hashing_embedder: bool,

    /// Embedding model name
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index documents in a folder
    Index {
        /// Path to the folder containing documents
        folder_path: PathBuf,
    },
    /// Search indexed documents
    Search {
        /// Search query
        query: String,
        /// Only documents at most this many folders deep
        #[arg(long, conflicts_with = "min_depth")]
        max_depth: Option<u32>,
        /// Only documents at least this many folders deep
        #[arg(long)]
        min_depth: Option<u32>,
        /// Only documents under this top-level folder
        #[arg(long)]
        root_folder: Option<String>,
        /// Only documents whose immediate folder has this name
        #[arg(long)]
        parent_folder: Option<String>,
        /// Maximum number of results [default: from config, 5]
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show index statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    filter: String,
    results: &'a [SearchResult],
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<RetrieverConfig> {
    let mut config = match &args.config {
        Some(path) => RetrieverConfig::load(path)?,
        None => RetrieverConfig::default(),
    };
    if let Some(db) = &args.db {
        config = config.with_database_path(db.clone());
    }
    if let Some(model) = &args.model {
        config = config.with_model_name(model.clone());
    }
    Ok(config)
}

/// Embedder for commands that need vectors.
async fn load_embedder(
    args: &Args,
    config: &RetrieverConfig,
) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let embed_config = config.embed_config();
    if args.hashing_embedder {
        let dimension = embed_config.expected_dimension().unwrap_or(384);
        return Ok(Arc::new(HashingEmbeddingProvider::new(dimension)?));
    }

    let provider = FastEmbedProvider::create(embed_config)
        .await
        .with_context(|| format!("failed to load embedding model {}", config.model_name))?;
    Ok(Arc::new(provider))
}

/// Model identity without loading model weights.
fn configured_model(args: &Args, config: &RetrieverConfig) -> anyhow::Result<EmbeddingModelMetadata> {
    let embed_config = config.embed_config();
    if args.hashing_embedder {
        let dimension = embed_config.expected_dimension().unwrap_or(384);
        let provider = HashingEmbeddingProvider::new(dimension)?;
        return Ok(EmbeddingModelMetadata::from_provider(&provider));
    }
    embed_config.validate()?;
    Ok(EmbeddingModelMetadata::from_provider(&FastEmbedProvider::new(
        embed_config,
    )))
}

/// Only `index` may create a missing database.
async fn open_store(
    config: &RetrieverConfig,
    model: &EmbeddingModelMetadata,
    create: bool,
) -> anyhow::Result<Arc<SqliteStore>> {
    let path = &config.database_path;
    let store = if create {
        SqliteStore::open(path, model).await
    } else {
        SqliteStore::open_existing(path, model).await
    }
    .with_context(|| format!("failed to open index {}", path.display()))?
    .with_write_batch_size(config.write_batch_size);
    Ok(Arc::new(store))
}

async fn build_service(
    args: &Args,
    config: &RetrieverConfig,
    create: bool,
) -> anyhow::Result<RetrievalService> {
    // Check the index against the configured model before loading weights.
    let store = open_store(config, &configured_model(args, config)?, create).await?;
    let embedder = load_embedder(args, config).await?;
    let service = RetrievalService::new(
        embedder,
        store,
        Arc::new(PlainTextExtractor::new()),
        config.indexing_config(),
    )?;
    Ok(service)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    match &args.command {
        Commands::Index { folder_path } => {
            let service = build_service(&args, &config, true).await?;
            println!("=== Indexing Documents from {} ===", folder_path.display());

            let summary = service.index_folder(folder_path).await?;
            println!(
                "Finished indexing {} files in {:.2?}",
                summary.indexed, summary.elapsed
            );
            if !summary.skipped.is_empty() {
                println!("Skipped {} files:", summary.skipped.len());
                for skipped in &summary.skipped {
                    println!("  {}: {}", skipped.path.display(), skipped.reason);
                }
            }
            Ok(())
        }
        Commands::Search {
            query,
            max_depth,
            min_depth,
            root_folder,
            parent_folder,
            limit,
            format,
        } => {
            let mut filter = FilterSpec::new();
            if let Some(depth) = max_depth {
                filter = filter.folder_depth(FilterCondition::lte(*depth));
            }
            if let Some(depth) = min_depth {
                filter = filter.folder_depth(FilterCondition::gte(*depth));
            }
            if let Some(root) = root_folder {
                filter = filter.root_folder(FilterCondition::eq(root.as_str()));
            }
            if let Some(parent) = parent_folder {
                filter = filter.parent_folder(FilterCondition::eq(parent.as_str()));
            }
            let compiled = filter.compile()?;
            let limit = limit.unwrap_or(config.default_limit);

            let service = build_service(&args, &config, false).await?;
            let results = service.search(query, &filter, limit).await?;

            match format {
                OutputFormat::Json => {
                    let output = SearchOutput {
                        query,
                        filter: compiled.to_string(),
                        results: &results,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("=== Searching for: {query} ===");
                    if !compiled.is_match_all() {
                        println!("Filters: {compiled}");
                    }
                    println!("\n=== Search Results ===");
                    if results.is_empty() {
                        println!("No results found");
                    }
                    for (i, result) in results.iter().enumerate() {
                        println!("\nResult {}:", i + 1);
                        println!("Path: {}", result.path);
                        println!("Similarity: {:.3}", result.similarity);
                        println!("Preview: {}...", result.preview.replace('\n', " "));
                    }
                }
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let store = open_store(&config, &configured_model(&args, &config)?, false).await?;
            let stats = store.stats().await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Summary => {
                    println!("Index: {}", config.database_path.display());
                    println!("Documents: {}", stats.document_count);
                    println!("Root folders: {}", stats.root_folder_count);
                    match stats.max_folder_depth {
                        Some(depth) => println!("Max folder depth: {depth}"),
                        None => println!("Max folder depth: -"),
                    }
                    println!("Embedding model: {}", stats.model_id);
                    println!("Embedding dimension: {}", stats.embedding_dimension);
                }
            }
            Ok(())
        }
    }
}
