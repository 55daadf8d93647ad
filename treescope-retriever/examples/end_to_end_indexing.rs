//! End-to-end example: index a small folder tree and run filtered searches.
//!
//! Uses the offline hashing embedder so no model download is required.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use treescope_embed::{EmbeddingProvider, HashingEmbeddingProvider};
use treescope_retriever::{
    EmbeddingModelMetadata, FilterCondition, FilterSpec, IndexingConfig, PlainTextExtractor,
    RetrievalService, RetrievalStore, SqliteStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let temp_dir = tempdir()?;
    let corpus = temp_dir.path().join("drive");
    create_test_files(&corpus)?;
    println!("Created test corpus at: {}", corpus.display());

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new(384)?);
    let model = EmbeddingModelMetadata::from_provider(embedder.as_ref());
    let store = Arc::new(SqliteStore::open_memory(&model).await?);
    let service = RetrievalService::new(
        embedder,
        store.clone(),
        Arc::new(PlainTextExtractor::new()),
        IndexingConfig::default(),
    )?;

    let summary = service.index_folder(&corpus).await?;
    println!(
        "Indexed {} files ({} skipped) in {:.2?}",
        summary.indexed,
        summary.skipped.len(),
        summary.elapsed
    );

    let stats = store.stats().await?;
    println!(
        "{} documents under {} root folders, deepest at depth {:?}\n",
        stats.document_count, stats.root_folder_count, stats.max_folder_depth
    );

    let searches = [
        ("revenue", FilterSpec::new()),
        (
            "revenue",
            FilterSpec::new().root_folder(FilterCondition::eq("finance")),
        ),
        (
            "installation",
            FilterSpec::new().folder_depth(FilterCondition::lte(1)),
        ),
    ];

    for (query, filter) in &searches {
        let compiled = filter.compile()?;
        println!("Query '{query}' where {compiled}");
        for result in service.search(query, filter, 3).await? {
            println!("  {:.3}  {}", result.similarity, result.path);
        }
        println!();
    }

    Ok(())
}

fn create_test_files(root: &Path) -> Result<()> {
    let files = [
        ("readme.txt", "Shared drive overview and conventions."),
        ("docs/install.md", "# Installation\n\nRun the installer and restart."),
        ("docs/guides/backup.md", "Nightly backup and restore procedures."),
        ("finance/budget.txt", "Annual budget with projected revenue."),
        ("finance/2024/q1.txt", "First quarter revenue and expenses."),
        ("finance/2024/q2.txt", "Second quarter revenue grew strongly."),
    ];
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
    }
    Ok(())
}
