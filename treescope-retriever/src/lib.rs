//! treescope-retriever: hybrid semantic search over a folder tree of documents
//!
//! Every indexed file carries its folder-hierarchy position as filterable
//! attributes next to its embedding, so one query can combine "what is this
//! about" with "where does it live".
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: hierarchy extraction, filter compilation, traversal,
//!   text extraction and the [`RetrievalService`] orchestrator
//! - **[`storage`]**: the [`RetrievalStore`] trait and its SQLite implementation
//! - **[`config`]**: TOML-backed settings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::{path::Path, sync::Arc};
//! use treescope_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//! use treescope_retriever::{
//!     EmbeddingModelMetadata, FilterCondition, FilterSpec, IndexingConfig, PlainTextExtractor,
//!     RetrievalService, SqliteStore,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let embedder = Arc::new(FastEmbedProvider::create(EmbedConfig::default()).await?);
//! let model = EmbeddingModelMetadata::from_provider(embedder.as_ref());
//! let store = Arc::new(SqliteStore::open(Path::new("docs.db"), &model).await?);
//!
//! let service = RetrievalService::new(
//!     embedder,
//!     store,
//!     Arc::new(PlainTextExtractor::new()),
//!     IndexingConfig::default(),
//! )?;
//! service.index_folder(Path::new("./corpus")).await?;
//!
//! let filter = FilterSpec::new()
//!     .folder_depth(FilterCondition::lte(2))
//!     .root_folder(FilterCondition::eq("reports"));
//! for result in service.search("quarterly revenue", &filter, 5).await? {
//!     println!("{} {:.3}", result.path, result.similarity);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! DocumentWalker → TextExtractor → FolderHierarchy ─┐
//!                                 EmbeddingProvider ─┴→ RetrievalStore (SQLite)
//!                                                              ↑
//! query → FilterSpec::compile ──→ EmbeddingProvider ───→ hybrid search
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use config::RetrieverConfig;
pub use error::{Result, RetrievalError};
pub use retrieval::extract::{ExtractedText, PlainTextExtractor, TextExtractor};
pub use retrieval::filter::{
    CompiledFilter, FilterCondition, FilterField, FilterSpec, FilterValue,
};
pub use retrieval::hierarchy::FolderHierarchy;
pub use retrieval::service::{
    IndexingConfig, IndexingObserver, IndexingSummary, LoggingObserver, RetrievalService,
    SearchResult, SkippedFile,
};
pub use retrieval::walker::{DiscoveredFile, DocumentWalker};
pub use storage::{
    DocumentId, DocumentRecord, RetrievalStore, SearchHit, StoreStats,
    sqlite_store::{EmbeddingModelMetadata, SqliteStore},
};
